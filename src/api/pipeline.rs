use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Per-connection sequencer. Requests draw tickets in arrival order; a ticket
/// may only write its response once every earlier ticket has written.
#[derive(Debug)]
pub struct Pipeline {
    next_seq: u64,
    written: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// `cancel` is the connection's token. Tickets give up waiting once it
    /// fires, and a ticket dropped before its turn fires it.
    pub fn new(cancel: CancellationToken) -> Self {
        let (written, _) = watch::channel(0);
        Self {
            next_seq: 1,
            written: Arc::new(written),
            cancel,
        }
    }

    pub fn ticket(&mut self) -> Ticket {
        let seq = self.next_seq;
        self.next_seq += 1;
        Ticket {
            seq,
            written: self.written.clone(),
            cancel: self.cancel.clone(),
            pending: true,
        }
    }

    /// Sequence number of the last response written.
    #[cfg(test)]
    fn last_written(&self) -> u64 {
        *self.written.borrow()
    }
}

#[derive(Debug)]
pub struct Ticket {
    seq: u64,
    written: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
    pending: bool,
}

/// Cancelled while waiting for an earlier response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abandoned;

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Waits until all earlier responses have been written.
    pub async fn turn(mut self) -> Result<Turn, Abandoned> {
        let mut written = self.written.subscribe();
        let previous = self.seq - 1;

        let ready = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            result = written.wait_for(|last| *last == previous) => result.is_ok(),
        };

        if !ready {
            return Err(Abandoned);
        }

        self.pending = false;
        Ok(Turn {
            seq: self.seq,
            written: self.written.clone(),
        })
    }
}

impl Drop for Ticket {
    // Later tickets can never get their turn, so the connection is closed.
    fn drop(&mut self) {
        if self.pending {
            self.cancel.cancel();
        }
    }
}

/// Holding a turn means this ticket is the one allowed to write. Dropping it
/// lets the next ticket proceed.
#[derive(Debug)]
pub struct Turn {
    seq: u64,
    written: Arc<watch::Sender<u64>>,
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.written.send_replace(self.seq);
    }
}

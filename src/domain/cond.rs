use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use tokio::sync::{mpsc, Mutex, MutexGuard};

use super::signal::{Interrupt, WaitSignal};

/// Broadcast wake primitive over an async mutex that, unlike a plain
/// condition variable, gives up waiting when a `WaitSignal` fires.
///
/// Each waiter registers a single-slot ticket before releasing the outer lock,
/// so a broadcast issued by the next lock holder can't be missed. Wakes are
/// best-effort: a ticket that already holds a wake is skipped, and waiters
/// must re-check their condition in a loop.
#[derive(Debug, Default)]
pub struct CancellableCondition {
    // Only ever held for bookkeeping, never across an await.
    tickets: StdMutex<HashMap<u64, mpsc::Sender<()>>>,
    next_ticket: AtomicU64,
}

impl CancellableCondition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases `guard`, waits for a broadcast or for `signal`, and re-acquires
    /// `lock` if woken. On interrupt the lock is not held.
    pub async fn wait<'a, T>(
        &self,
        lock: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
        signal: &WaitSignal,
    ) -> Result<MutexGuard<'a, T>, Interrupt> {
        let mut ticket = self.register();
        drop(guard);

        tokio::select! {
            biased;
            // The registry keeps a sender alive, so this only yields `Some`.
            _ = ticket.receiver.recv() => Ok(lock.lock().await),
            interrupt = signal.interrupted() => Err(interrupt),
        }
    }

    /// Wakes every registered waiter.
    pub fn broadcast(&self) {
        for sender in self.registry().values() {
            // Full means a wake is already pending.
            let _ = sender.try_send(());
        }
    }

    pub fn waiters(&self) -> usize {
        self.registry().len()
    }

    fn register(&self) -> Ticket<'_> {
        let id = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(1);
        self.registry().insert(id, sender);

        Ticket {
            cond: self,
            id,
            receiver,
        }
    }

    fn registry(&self) -> StdMutexGuard<'_, HashMap<u64, mpsc::Sender<()>>> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deregisters itself on drop, whatever the wait's outcome.
struct Ticket<'c> {
    cond: &'c CancellableCondition,
    id: u64,
    receiver: mpsc::Receiver<()>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.cond.registry().remove(&self.id);
    }
}

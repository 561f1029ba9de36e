use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::domain::{
    entity::JobId,
    error::StoreError,
    service::{JobService, PutRequest},
    signal::WaitSignal,
};

use super::{
    io::{discard_body, read_body, read_capped_line, Body, ReadError},
    pipeline::{Pipeline, Ticket},
    protocol::{Command, Response},
};

pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;
pub const DEFAULT_MAX_JOB_SIZE: usize = 65_535;

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_line_length: usize,
    pub max_job_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_job_size: DEFAULT_MAX_JOB_SIZE,
        }
    }
}

/// A fully read request, body included.
#[derive(Debug)]
enum Request {
    Put(PutRequest),
    Delete(JobId),
    Peek(JobId),
    Reserve { timeout: Option<Duration> },
    /// Answered without reaching the service.
    Reply(Response),
    Quit,
}

/// What a request's turn on the wire amounts to.
#[derive(Debug)]
enum Outcome {
    Send(Response),
    /// A reserve given up on before it found a job.
    Nothing,
    Close,
}

/// Serves one client. Requests are read one at a time, each is then executed
/// on its own task while the next one is read, and responses are written in
/// request order.
pub struct Connection<S, R, W> {
    service: Arc<S>,
    reader: BufReader<R>,
    writer: Arc<Mutex<W>>,
    pipeline: Pipeline,
    limits: Limits,
    cancel: CancellationToken,
    // Blocked reserves watch this; `quit` cancels it without closing.
    waits: CancellationToken,
}

impl<S, R, W> Connection<S, R, W>
where
    S: JobService,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Cancelling `cancel` closes the connection and unblocks anything it is
    /// waiting on.
    pub fn new(service: Arc<S>, reader: R, writer: W, limits: Limits, cancel: CancellationToken) -> Self {
        Self {
            service,
            reader: BufReader::new(reader),
            writer: Arc::new(Mutex::new(writer)),
            pipeline: Pipeline::new(cancel.clone()),
            limits,
            waits: cancel.child_token(),
            cancel,
        }
    }

    pub async fn handle(mut self) {
        let cancel = self.cancel.clone();
        let mut in_flight = JoinSet::new();
        let mut quit = false;

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                read = self.read_request() => read,
            };

            let request = match read {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("Client closed connection");
                    break;
                }
                Err(err) => {
                    warn!(%err, "Failed to read request");
                    break;
                }
            };

            quit = matches!(request, Request::Quit);
            let ticket = self.pipeline.ticket();
            debug!(seq = ticket.seq(), ?request, "Request read");

            in_flight.spawn(execute(
                self.service.clone(),
                request,
                ticket,
                self.writer.clone(),
                self.waits.clone(),
                cancel.clone(),
            ));

            if quit {
                break;
            }

            while let Some(finished) = in_flight.try_join_next() {
                log_task_failure(finished);
            }
        }

        // `quit` lets earlier responses flush first, anything else closes now.
        // Reserves still blocked at that point give up without a response.
        if quit {
            self.waits.cancel();
        } else {
            cancel.cancel();
        }
        while let Some(finished) = in_flight.join_next().await {
            log_task_failure(finished);
        }
        cancel.cancel();

        if let Err(err) = self.writer.lock().await.shutdown().await {
            debug!(%err, "Failed to shut down connection");
        }
    }

    async fn read_request(&mut self) -> Result<Option<Request>, ReadError> {
        let max_line = self.limits.max_line_length;

        let line = match read_capped_line(&mut self.reader, max_line).await? {
            Some(line) => line,
            None => return Ok(None),
        };

        let command = match Command::parse(&String::from_utf8_lossy(&line)) {
            Ok(command) => command,
            Err(reply) => return Ok(Some(Request::Reply(reply))),
        };

        let request = match command {
            Command::Put {
                priority,
                delay,
                time_to_run,
                bytes,
            } => match usize::try_from(bytes) {
                Ok(len) if len <= self.limits.max_job_size => {
                    match read_body(&mut self.reader, len, max_line).await? {
                        Body::Complete(body) => Request::Put(PutRequest {
                            priority,
                            delay,
                            time_to_run,
                            body,
                        }),
                        Body::MissingCrlf => Request::Reply(Response::ExpectedCrlf),
                    }
                }
                _ => {
                    discard_body(&mut self.reader, bytes, max_line).await?;
                    Request::Reply(Response::JobTooBig)
                }
            },
            Command::Delete(id) => Request::Delete(id),
            Command::Peek(id) => Request::Peek(id),
            Command::Reserve { timeout } => Request::Reserve { timeout },
            Command::Quit => Request::Quit,
        };

        Ok(Some(request))
    }
}

/// Runs one request, then waits for its turn to write the response. A
/// reserved job whose response never made it out is put back in line.
async fn execute<S, W>(
    service: Arc<S>,
    request: Request,
    ticket: Ticket,
    writer: Arc<Mutex<W>>,
    waits: CancellationToken,
    cancel: CancellationToken,
) where
    S: JobService,
    W: AsyncWrite + Unpin + Send,
{
    let outcome = respond(service.as_ref(), request, waits).await;
    let written = write_in_turn(ticket, &writer, &outcome, &cancel).await;

    if let (false, Outcome::Send(Response::Reserved(job))) = (written, &outcome) {
        match service.release(job.id).await {
            Ok(()) => debug!(id = job.id, "Undelivered job released"),
            // Deleted by another client in the meantime.
            Err(StoreError::NotFound(_)) => {}
            Err(err) => error!(%err, id = job.id, "Failed to release undelivered job"),
        }
    }
}

/// Returns whether a response was written.
async fn write_in_turn<W>(
    ticket: Ticket,
    writer: &Mutex<W>,
    outcome: &Outcome,
    cancel: &CancellationToken,
) -> bool
where
    W: AsyncWrite + Unpin + Send,
{
    let Ok(turn) = ticket.turn().await else {
        return false;
    };

    let response = match outcome {
        Outcome::Send(response) => response,
        Outcome::Nothing => return false,
        Outcome::Close => {
            cancel.cancel();
            return false;
        }
    };

    let mut writer = writer.lock().await;
    let written = tokio::select! {
        biased;
        _ = cancel.cancelled() => return false,
        written = write_response(&mut *writer, response) => written,
    };

    match written {
        Ok(()) => {
            if response.is_fatal() {
                cancel.cancel();
            }
            drop(turn);
            true
        }
        Err(err) => {
            debug!(%err, "Failed to write response");
            cancel.cancel();
            false
        }
    }
}

/// Maps a request and the service's typed result onto its wire response.
async fn respond<S: JobService>(service: &S, request: Request, waits: CancellationToken) -> Outcome {
    let response = match request {
        Request::Quit => return Outcome::Close,
        Request::Reply(reply) => reply,
        Request::Put(req) => match service.put(req).await {
            Ok(id) => Response::Inserted(id),
            Err(StoreError::Draining) => Response::Draining,
            Err(err) => internal_error(err),
        },
        Request::Delete(id) => match service.delete(id).await {
            Ok(()) => Response::Deleted,
            Err(StoreError::NotFound(_)) => Response::NotFound,
            Err(err) => internal_error(err),
        },
        Request::Peek(id) => match service.peek(id).await {
            Ok(job) => Response::Found(job),
            Err(StoreError::NotFound(_)) => Response::NotFound,
            Err(err) => internal_error(err),
        },
        Request::Reserve { timeout } => {
            let mut signal = WaitSignal::new(waits);
            if let Some(timeout) = timeout {
                signal = signal.with_timeout(timeout);
            }

            match service.reserve(signal).await {
                Ok(job) => Response::Reserved(job),
                Err(StoreError::TimedOut) => Response::TimedOut,
                Err(StoreError::Cancelled) => return Outcome::Nothing,
                Err(err) => internal_error(err),
            }
        }
    };

    Outcome::Send(response)
}

fn internal_error(err: StoreError) -> Response {
    error!(%err, "Request failed");
    Response::InternalError
}

async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&response.encode()).await?;
    writer.flush().await
}

fn log_task_failure(finished: Result<(), tokio::task::JoinError>) {
    if let Err(err) = finished {
        error!(%err, "Request handler failed");
    }
}

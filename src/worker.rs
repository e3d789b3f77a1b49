//! One controller's dedicated task: pulls queued commands and drives them through its
//! `Session` (SPEC_FULL.md §4.4).
//!
//! Grounded on `examples/original_source/telecortex/session.py`'s
//! `TelecortexThreadManager.run` loop (pop from an inbound queue, chunk, wait for
//! `ready`), reworked onto a `tokio::task` with an `mpsc` queue and cooperative
//! yielding per design note §9 (no sync/threaded/async strategy switch — everything is
//! `tokio`).

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::LedFleetResult;
use crate::session::Session;
use crate::transport::Transport;

/// One command submitted to a controller: opcode, arguments, optional chunked payload.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub opcode: String,
    pub args: Vec<(char, String)>,
    pub payload: Option<String>,
}

/// How long the worker waits on an empty inbound queue, and how long it yields while
/// waiting for `Session::ready`, before looping back to check again.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Owns one `Session<T>` and the receive half of its inbound command queue. Runs until
/// the queue's sender is dropped (graceful shutdown) or the session hits a transport
/// error (abrupt; the `Manager` observes this via the task's `JoinHandle`).
pub struct Worker<T: Transport> {
    session: Session<T>,
    inbox: mpsc::Receiver<QueuedCommand>,
}

impl<T: Transport> Worker<T> {
    pub fn new(session: Session<T>, inbox: mpsc::Receiver<QueuedCommand>) -> Self {
        Self { session, inbox }
    }

    /// Run until the channel closes or a transport error terminates the session.
    pub async fn run(mut self) -> LedFleetResult<()> {
        loop {
            let queued = match tokio::time::timeout(POLL_INTERVAL, self.inbox.recv()).await {
                Ok(Some(queued)) => queued,
                Ok(None) => {
                    info!("worker inbox closed, shutting down");
                    return Ok(());
                }
                Err(_timed_out) => {
                    // Nothing to send, but still pump so acks/telemetry/resends keep
                    // flowing for whatever's already outstanding.
                    self.session.pump().await?;
                    continue;
                }
            };

            self.session
                .chunk_numbered(&queued.opcode, &queued.args, queued.payload.as_deref())
                .await?;

            while !self.session.ready()? {
                self.session.pump().await?;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }

    pub fn queue_len(&self) -> usize { self.inbox.len() }

    pub async fn close(self) -> LedFleetResult<()> { self.session.close().await }
}

/// Spawn `worker` as its own `tokio::task`, returning a handle the `Manager` can inspect
/// for liveness and error propagation.
pub fn spawn<T: Transport + 'static>(worker: Worker<T>) -> tokio::task::JoinHandle<LedFleetResult<()>> {
    tokio::spawn(async move {
        let result = worker.run().await;
        if let Err(ref err) = result {
            error!(%err, "worker terminated");
        }
        result
    })
}

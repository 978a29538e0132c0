//! Single-owner task serializing access to the failover state machine.
//!
//! Both reconciliation loops hold a [`FailoverHandle`]. Observations are
//! handled one at a time by the task owning the machine; the state after each
//! one is published on a watch channel, so readers never wait on a transition.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::FailoverError;
use crate::failover::{FailoverMachine, FailoverStatus, TickReport};

/// Commands queued ahead of the actor before senders wait.
const COMMAND_BUFFER: usize = 16;

enum Command {
    Observe {
        closed: bool,
        reply: oneshot::Sender<Result<TickReport, FailoverError>>,
    },
}

/// Cloneable handle to the controller task.
#[derive(Clone)]
pub struct FailoverHandle {
    tx: mpsc::Sender<Command>,
    status: watch::Receiver<FailoverStatus>,
}

impl FailoverHandle {
    /// Feed a reachability observation and wait for the tick to complete.
    pub async fn observe(&self, closed: bool) -> Result<TickReport, FailoverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Observe { closed, reply })
            .await
            .map_err(|_| FailoverError::ControllerStopped)?;
        rx.await.map_err(|_| FailoverError::ControllerStopped)?
    }

    /// State after the most recently completed observation.
    pub fn status(&self) -> FailoverStatus {
        *self.status.borrow()
    }
}

/// Spawn the controller task owning `machine`.
///
/// The task stops when `cancel` fires or every handle is dropped.
pub fn spawn(machine: FailoverMachine, cancel: CancellationToken) -> (FailoverHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let (status_tx, status) = watch::channel(machine.status());
    let task = tokio::spawn(run(machine, rx, status_tx, cancel));
    (FailoverHandle { tx, status }, task)
}

async fn run(
    mut machine: FailoverMachine,
    mut rx: mpsc::Receiver<Command>,
    status: watch::Sender<FailoverStatus>,
    cancel: CancellationToken,
) {
    info!("Failover controller started");

    loop {
        let command = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Failover controller received shutdown signal");
                return;
            }

            command = rx.recv() => match command {
                Some(command) => command,
                None => {
                    debug!("All failover handles dropped");
                    return;
                }
            },
        };

        let Command::Observe { closed, reply } = command;
        let outcome = AssertUnwindSafe(machine.observe(closed, Instant::now()))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                error!("Failover transition panicked, resetting mode to unknown");
                machine.reset();
                Err(FailoverError::TransitionPanicked)
            }
        };

        status.send_replace(machine.status());
        let _ = reply.send(result);
    }
}

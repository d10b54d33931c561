//! Owner-side handle and final report of a spawned supervisor.

use std::path::PathBuf;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::SupervisorError;
use super::state::{SupervisorSnapshot, SupervisorState};

/// Outcome of one supervisor run.
#[derive(Debug, Clone)]
pub struct SupervisorReport {
    pub name: String,
    pub final_state: SupervisorState,
    /// Trusted resume data was handed to the engine at start.
    pub resumed: bool,
    pub checkpoints_requested: u32,
    pub checkpoints_written: u32,
    /// The checkpoint that ended the drain was persisted.
    pub final_checkpoint_written: bool,
    /// Resume file written by the last successful checkpoint.
    pub resume_path: Option<PathBuf>,
    pub error: Option<SupervisorError>,
}

impl SupervisorReport {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            final_state: SupervisorState::Registering,
            resumed: false,
            checkpoints_requested: 0,
            checkpoints_written: 0,
            final_checkpoint_written: false,
            resume_path: None,
            error: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Handle to a running supervisor.
///
/// Dropping the handle does not stop the supervisor; call
/// [`stop`](Self::stop) to start its drain.
#[derive(Debug)]
pub struct SupervisorHandle {
    name: String,
    stop: CancellationToken,
    status: watch::Receiver<SupervisorSnapshot>,
    join: JoinHandle<SupervisorReport>,
}

impl SupervisorHandle {
    pub(crate) fn new(
        name: String,
        stop: CancellationToken,
        status: watch::Receiver<SupervisorSnapshot>,
        join: JoinHandle<SupervisorReport>,
    ) -> Self {
        Self {
            name,
            stop,
            status,
            join,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raise the stop flag. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> SupervisorSnapshot {
        self.status.borrow().clone()
    }

    /// A receiver that observes every future snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorSnapshot> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the supervisor to exit.
    pub async fn join(self) -> Result<SupervisorReport, SupervisorError> {
        self.join
            .await
            .map_err(|e| SupervisorError::Join(e.to_string()))
    }

    /// Split into the stop token and the join handle, dropping the status
    /// receiver.
    pub(crate) fn detach(self) -> (CancellationToken, JoinHandle<SupervisorReport>) {
        (self.stop, self.join)
    }
}

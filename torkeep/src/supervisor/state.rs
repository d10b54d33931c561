//! Supervisor lifecycle state and the snapshot published to observers.

use std::fmt;

use crate::engine::TransferStatus;

/// Lifecycle of one supervisor.
///
/// ```text
/// Registering ──handle-confirmed──► Active ──stop / finished / error──► Draining
///      │                                                                   │
///      └──stop──────────────────────► Terminated ◄──checkpoint result──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Submitted; waiting for the engine to confirm a handle.
    Registering,
    /// Handle bound; transferring and checkpointing periodically.
    Active,
    /// A final checkpoint is outstanding.
    Draining,
    /// Session state persisted; the task has exited or is exiting.
    Terminated,
}

impl SupervisorState {
    pub fn name(self) -> &'static str {
        match self {
            SupervisorState::Registering => "registering",
            SupervisorState::Active => "active",
            SupervisorState::Draining => "draining",
            SupervisorState::Terminated => "terminated",
        }
    }

    pub fn is_terminated(self) -> bool {
        self == SupervisorState::Terminated
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Render an engine status as a one-line summary.
///
/// `"<phase> <rate> kB/s <done> kB (<percent>%) downloaded (<peers> peers)"`
pub fn format_status_line(status: &TransferStatus) -> String {
    format!(
        "{} {} kB/s {} kB ({}%) downloaded ({} peers)",
        status.phase,
        status.download_rate / 1000,
        status.total_done / 1000,
        status.progress_ppm / 10_000,
        status.num_peers
    )
}

/// Latest observable state of one supervisor.
///
/// Each update replaces the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSnapshot {
    pub name: String,
    pub state: SupervisorState,
    /// Most recent engine status, if any arrived.
    pub status: Option<TransferStatus>,
    /// Error surfaced to the front end.
    pub error: Option<String>,
    /// Whether trusted resume data was handed to the engine.
    pub resumed: bool,
}

impl SupervisorSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SupervisorState::Registering,
            status: None,
            error: None,
            resumed: false,
        }
    }

    /// Status line shown by the front end.
    pub fn status_line(&self) -> String {
        if let Some(message) = &self.error {
            return format!("error: {}", message);
        }
        match &self.status {
            Some(status) => format_status_line(status),
            None => self.state.name().to_string(),
        }
    }
}

//! Transfer engine interface.
//!
//! The transfer engine performs the actual peer-to-peer transfer. It is a
//! shared, internally synchronised collaborator: every supervisor holds an
//! `Arc<dyn TransferEngine>` and calls it concurrently.
//!
//! Calls are non-blocking. Results that take time (handle confirmation,
//! checkpoints, completion) come back as [`EngineEvent`]s that the owning
//! supervisor drains with [`TransferEngine::poll_events`].
//!
//! # Architecture
//!
//! ```text
//! Supervisor ──submit(params)──────────────► TransferEngine
//!     │                                          │
//!     │◄──poll_events(id): HandleConfirmed ──────┤
//!     │──request_checkpoint(handle)─────────────►│
//!     │◄──poll_events(id): CheckpointSucceeded ──┤  (computed off the caller)
//!     │──post_status_updates(handle)────────────►│
//!     │◄──poll_events(id): StatusUpdate ─────────┘
//! ```
//!
//! [`LoopbackEngine`] is an in-process implementation that simulates
//! transfer progress without touching the network.

mod error;
mod loopback;
mod resume;
mod types;

pub use error::{EngineError, EngineResult};
pub use loopback::{LoopbackConfig, LoopbackEngine, SessionCounters};
pub use resume::ResumeData;
pub use types::{
    AddTorrentParams, CheckpointFlags, DownloadHandle, EngineEvent, Phase, SubmissionId,
    TransferStatus,
};

/// A capability-rich transfer engine shared by all supervisors.
pub trait TransferEngine: Send + Sync + 'static {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Submit a download. The handle arrives later as
    /// [`EngineEvent::HandleConfirmed`].
    fn submit(&self, params: AddTorrentParams) -> EngineResult<SubmissionId>;

    /// Drain pending events for a submission without blocking.
    fn poll_events(&self, submission: SubmissionId) -> Vec<EngineEvent>;

    /// Ask the engine to post a fresh [`EngineEvent::StatusUpdate`].
    fn post_status_updates(&self, handle: DownloadHandle);

    /// Ask for a checkpoint; the result arrives as
    /// [`EngineEvent::CheckpointSucceeded`] or [`EngineEvent::CheckpointFailed`].
    fn request_checkpoint(&self, handle: DownloadHandle, flags: CheckpointFlags) -> EngineResult<()>;

    /// Stop transferring and forget the download.
    fn remove(&self, handle: DownloadHandle);

    /// Engine-wide state to persist at session end.
    fn serialize_session_state(&self) -> EngineResult<Vec<u8>>;

    /// Restore engine-wide state persisted by a previous process.
    fn restore_session_state(&self, state: &[u8]) -> EngineResult<()>;

    /// Serialise resume data to its on-disk form.
    fn encode_resume(&self, data: &ResumeData) -> Vec<u8> {
        data.encode()
    }

    /// Parse resume data from its on-disk form.
    fn decode_resume(&self, blob: &[u8]) -> EngineResult<ResumeData> {
        ResumeData::decode(blob)
    }
}

//! Value types exchanged with a transfer engine.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::resume::ResumeData;
use crate::descriptor::{Descriptor, InfoHash, Metainfo};

/// Ticket returned by [`submit`](super::TransferEngine::submit).
///
/// Events for a submission are polled with this id, before and after the
/// engine confirms a [`DownloadHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

/// Engine-side handle of a confirmed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadHandle(pub u64);

impl fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the engine needs to start a download.
#[derive(Debug, Clone)]
pub struct AddTorrentParams {
    pub info_hash: InfoHash,
    pub name: String,
    pub save_path: PathBuf,
    pub magnet_uri: String,
    /// Present for `.torrent` sources; magnet sources fetch it from peers.
    pub metainfo: Option<Arc<Metainfo>>,
    /// Verified progress from a previous run.
    pub resume: Option<ResumeData>,
}

impl AddTorrentParams {
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        Self {
            info_hash: descriptor.info_hash(),
            name: descriptor.name().to_string(),
            save_path: descriptor.save_path().to_path_buf(),
            magnet_uri: descriptor.magnet().to_uri(),
            metainfo: descriptor.metainfo().cloned(),
            resume: None,
        }
    }

    pub fn with_resume(mut self, resume: ResumeData) -> Self {
        self.resume = Some(resume);
        self
    }
}

/// Flags for a checkpoint request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointFlags {
    /// Embed the info dictionary so magnet downloads resume without
    /// re-fetching metadata.
    pub save_info_dict: bool,
    /// Skip the checkpoint if nothing changed since the last one.
    pub only_if_modified: bool,
}

impl CheckpointFlags {
    pub const SAVE_INFO_DICT: Self = Self {
        save_info_dict: true,
        only_if_modified: false,
    };
}

/// Lifecycle phase reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    CheckingFiles,
    DownloadingMetadata,
    Downloading,
    Finished,
    Seeding,
    CheckingResumeData,
}

impl Phase {
    /// Short name used in status lines.
    pub fn name(self) -> &'static str {
        match self {
            Phase::CheckingFiles => "checking",
            Phase::DownloadingMetadata => "dl metadata",
            Phase::Downloading => "downloading",
            Phase::Finished => "finished",
            Phase::Seeding => "seeding",
            Phase::CheckingResumeData => "checking resume",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Point-in-time status of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatus {
    pub phase: Phase,
    /// Payload download rate in bytes per second.
    pub download_rate: u64,
    /// Verified payload bytes.
    pub total_done: u64,
    /// Completion in parts per million.
    pub progress_ppm: u32,
    pub num_peers: u32,
}

impl TransferStatus {
    /// Completion as a fraction in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        f64::from(self.progress_ppm.min(1_000_000)) / 1_000_000.0
    }

    /// Whole percent, truncated.
    pub fn percent(&self) -> u32 {
        self.progress_ppm.min(1_000_000) / 10_000
    }
}

/// Asynchronous lifecycle events for one submission, in emission order.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine accepted the download and assigned a handle.
    HandleConfirmed(DownloadHandle),
    /// All wanted pieces are downloaded and verified.
    TransferFinished,
    /// A fatal condition for this download.
    TransferError { message: String },
    /// A requested checkpoint is ready.
    CheckpointSucceeded(ResumeData),
    /// A requested checkpoint could not be produced.
    CheckpointFailed { message: String },
    /// Fresh status snapshot.
    StatusUpdate(TransferStatus),
}

impl EngineEvent {
    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::HandleConfirmed(_) => "handle-confirmed",
            EngineEvent::TransferFinished => "transfer-finished",
            EngineEvent::TransferError { .. } => "transfer-error",
            EngineEvent::CheckpointSucceeded(_) => "checkpoint-succeeded",
            EngineEvent::CheckpointFailed { .. } => "checkpoint-failed",
            EngineEvent::StatusUpdate(_) => "status-update",
        }
    }
}

//! In-process transfer engine that simulates progress.
//!
//! The loopback engine never opens a socket. Each download advances at a
//! configured byte rate measured on the tokio clock, so paused-time tests
//! drive it deterministically. Magnet downloads spend a short, configurable
//! time in the metadata phase before their size becomes known.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::error::{EngineError, EngineResult};
use super::resume::ResumeData;
use super::types::{
    AddTorrentParams, CheckpointFlags, DownloadHandle, EngineEvent, Phase, SubmissionId,
    TransferStatus,
};
use super::TransferEngine;
use crate::descriptor::bencode::BencodeValue;
use crate::descriptor::{InfoHash, Metainfo};

/// Default simulated download rate (bytes per second).
pub const DEFAULT_RATE_BYTES_PER_SEC: u64 = 2_000_000;

/// Default time a magnet download spends fetching metadata.
pub const DEFAULT_METADATA_DELAY_MS: u64 = 1_000;

/// Size assumed for magnet downloads once "metadata" arrives.
pub const DEFAULT_MAGNET_SIZE: u64 = 64 * 1024 * 1024;

const MAGNET_PIECE_LENGTH: u64 = 256 * 1024;
const SESSION_FORMAT: &str = "torkeep session";

/// Configuration for [`LoopbackEngine`].
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    pub rate_bytes_per_sec: u64,
    pub metadata_delay: Duration,
    pub magnet_size: u64,
    /// Peer count reported while downloading.
    pub peers: u32,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            rate_bytes_per_sec: DEFAULT_RATE_BYTES_PER_SEC,
            metadata_delay: Duration::from_millis(DEFAULT_METADATA_DELAY_MS),
            magnet_size: DEFAULT_MAGNET_SIZE,
            peers: 8,
        }
    }
}

impl LoopbackConfig {
    pub fn with_rate(mut self, bytes_per_sec: u64) -> Self {
        self.rate_bytes_per_sec = bytes_per_sec;
        self
    }

    pub fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = delay;
        self
    }

    pub fn with_magnet_size(mut self, size: u64) -> Self {
        self.magnet_size = size;
        self
    }
}

/// Engine-wide counters persisted as session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Payload bytes downloaded over all sessions.
    pub downloaded: u64,
    /// Downloads that reached completion over all sessions.
    pub completed: u64,
}

struct Transfer {
    handle: DownloadHandle,
    info_hash: InfoHash,
    name: String,
    save_path: std::path::PathBuf,
    /// `None` until metadata is known.
    total_size: Option<u64>,
    piece_length: u64,
    phase: Phase,
    done: u64,
    rate: u64,
    started: Instant,
    last_advance: Instant,
    /// Bytes verified at the last successful checkpoint.
    checkpointed: Option<u64>,
    finished_reported: bool,
    events: VecDeque<EngineEvent>,
}

impl Transfer {
    fn new(handle: DownloadHandle, params: &AddTorrentParams, now: Instant) -> Self {
        let (total_size, piece_length) = match params.metainfo.as_deref() {
            Some(meta) => (Some(meta.total_size()), meta.piece_length),
            None => (None, MAGNET_PIECE_LENGTH),
        };
        let mut transfer = Self {
            handle,
            info_hash: params.info_hash,
            name: params.name.clone(),
            save_path: params.save_path.clone(),
            total_size,
            piece_length,
            phase: if total_size.is_some() {
                Phase::CheckingFiles
            } else {
                Phase::DownloadingMetadata
            },
            done: 0,
            rate: 0,
            started: now,
            last_advance: now,
            checkpointed: None,
            finished_reported: false,
            events: VecDeque::new(),
        };

        if let Some(resume) = params.resume.as_ref().filter(|r| r.info_hash == params.info_hash) {
            if transfer.total_size.is_none() && resume.total_size > 0 {
                transfer.total_size = Some(resume.total_size);
            }
            transfer.done = resume.total_done.min(transfer.total_size.unwrap_or(0));
            transfer.checkpointed = Some(transfer.done);
            transfer.phase = Phase::CheckingResumeData;
        }
        transfer
    }

    fn num_pieces(&self) -> usize {
        match self.total_size {
            Some(size) => size.div_ceil(self.piece_length) as usize,
            None => 0,
        }
    }

    /// Move the simulation forward to `now`; returns newly downloaded bytes.
    fn advance(&mut self, now: Instant, config: &LoopbackConfig) -> u64 {
        let elapsed = now.saturating_duration_since(self.last_advance);
        self.last_advance = now;

        match self.phase {
            Phase::DownloadingMetadata => {
                if now.saturating_duration_since(self.started) >= config.metadata_delay {
                    self.total_size = Some(config.magnet_size);
                    self.phase = Phase::Downloading;
                }
                0
            }
            Phase::CheckingFiles | Phase::CheckingResumeData => {
                self.phase = Phase::Downloading;
                self.complete_if_done();
                0
            }
            Phase::Downloading => {
                let total = self.total_size.unwrap_or(0);
                let budget = (u128::from(config.rate_bytes_per_sec) * elapsed.as_millis() / 1000) as u64;
                let delta = budget.min(total.saturating_sub(self.done));
                self.done += delta;
                self.rate = if elapsed.is_zero() {
                    0
                } else {
                    (u128::from(delta) * 1000 / elapsed.as_millis().max(1)) as u64
                };
                self.complete_if_done();
                delta
            }
            Phase::Finished | Phase::Seeding => {
                self.rate = 0;
                self.phase = Phase::Seeding;
                0
            }
        }
    }

    fn complete_if_done(&mut self) {
        if self.total_size.is_some_and(|total| self.done >= total) {
            self.phase = Phase::Finished;
            if !self.finished_reported {
                self.finished_reported = true;
                self.events.push_back(EngineEvent::TransferFinished);
            }
        }
    }

    fn status(&self, config: &LoopbackConfig) -> TransferStatus {
        let progress_ppm = match self.total_size {
            Some(0) => 1_000_000,
            Some(total) => (u128::from(self.done) * 1_000_000 / u128::from(total)) as u32,
            None => 0,
        };
        TransferStatus {
            phase: self.phase,
            download_rate: self.rate,
            total_done: self.done,
            progress_ppm,
            num_peers: match self.phase {
                Phase::Downloading | Phase::DownloadingMetadata => config.peers,
                _ => 0,
            },
        }
    }

    fn resume_data(&self) -> ResumeData {
        let mut data = ResumeData::new(self.info_hash, self.name.clone(), self.save_path.clone())
            .with_num_pieces(self.num_pieces())
            .with_total_size(self.total_size.unwrap_or(0));
        let complete = if self.total_size.is_some_and(|t| self.done >= t) {
            data.num_pieces
        } else {
            (self.done / self.piece_length) as usize
        };
        for index in 0..complete {
            data.set_piece(index);
        }
        data.total_done = self.done;
        data.peers.push(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 6881));
        data
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    transfers: HashMap<SubmissionId, Transfer>,
    by_handle: HashMap<DownloadHandle, SubmissionId>,
    counters: SessionCounters,
}

impl Inner {
    fn transfer_mut(&mut self, handle: DownloadHandle) -> Option<&mut Transfer> {
        let id = self.by_handle.get(&handle)?;
        self.transfers.get_mut(id)
    }
}

/// Simulating [`TransferEngine`].
///
/// # Example
///
/// ```ignore
/// use torkeep::engine::{LoopbackConfig, LoopbackEngine};
///
/// let engine = LoopbackEngine::new(LoopbackConfig::default().with_rate(10_000_000));
/// ```
pub struct LoopbackEngine {
    config: LoopbackConfig,
    inner: Mutex<Inner>,
}

impl LoopbackEngine {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Convenience for sharing between supervisors.
    pub fn shared(config: LoopbackConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn counters(&self) -> SessionCounters {
        self.inner.lock().counters
    }

    /// Number of downloads currently known to the engine.
    pub fn active_downloads(&self) -> usize {
        self.inner.lock().transfers.len()
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl TransferEngine for LoopbackEngine {
    fn name(&self) -> &str {
        "loopback"
    }

    fn submit(&self, params: AddTorrentParams) -> EngineResult<SubmissionId> {
        if params
            .metainfo
            .as_deref()
            .is_some_and(|meta: &Metainfo| meta.piece_length == 0)
        {
            return Err(EngineError::Rejected("piece length is zero".to_string()));
        }

        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SubmissionId(inner.next_id);
        let handle = DownloadHandle(inner.next_id);

        let mut transfer = Transfer::new(handle, &params, Instant::now());
        transfer.events.push_back(EngineEvent::HandleConfirmed(handle));
        debug!(
            download = %params.name,
            handle = %handle,
            resumed = transfer.checkpointed.is_some(),
            "Loopback engine accepted download"
        );

        inner.by_handle.insert(handle, id);
        inner.transfers.insert(id, transfer);
        Ok(id)
    }

    fn poll_events(&self, submission: SubmissionId) -> Vec<EngineEvent> {
        let mut inner = self.inner.lock();
        match inner.transfers.get_mut(&submission) {
            Some(transfer) => transfer.events.drain(..).collect(),
            None => Vec::new(),
        }
    }

    fn post_status_updates(&self, handle: DownloadHandle) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let Some(transfer) = inner.transfer_mut(handle) else {
            return;
        };
        let was_finished = transfer.finished_reported;
        let delta = transfer.advance(now, &self.config);
        let finished_now = !was_finished && transfer.finished_reported;
        let status = transfer.status(&self.config);
        transfer.events.push_back(EngineEvent::StatusUpdate(status));

        inner.counters.downloaded += delta;
        if finished_now {
            inner.counters.completed += 1;
        }
    }

    fn request_checkpoint(&self, handle: DownloadHandle, flags: CheckpointFlags) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        let transfer = inner
            .transfer_mut(handle)
            .ok_or(EngineError::UnknownHandle(handle))?;

        if flags.only_if_modified && transfer.checkpointed == Some(transfer.done) {
            transfer.events.push_back(EngineEvent::CheckpointFailed {
                message: "resume data not modified".to_string(),
            });
            return Ok(());
        }

        let data = transfer.resume_data();
        transfer.checkpointed = Some(transfer.done);
        transfer
            .events
            .push_back(EngineEvent::CheckpointSucceeded(data));
        Ok(())
    }

    fn remove(&self, handle: DownloadHandle) {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.by_handle.remove(&handle) {
            if let Some(transfer) = inner.transfers.remove(&id) {
                info!(download = %transfer.name, handle = %transfer.handle, "Loopback engine dropped download");
            }
        }
    }

    fn serialize_session_state(&self) -> EngineResult<Vec<u8>> {
        let counters = self.counters();
        Ok(BencodeValue::dict()
            .insert("format", BencodeValue::string(SESSION_FORMAT))
            .insert("downloaded", BencodeValue::integer(counters.downloaded as i64))
            .insert("completed", BencodeValue::integer(counters.completed as i64))
            .encode())
    }

    fn restore_session_state(&self, state: &[u8]) -> EngineResult<()> {
        if state.is_empty() {
            return Ok(());
        }
        let root = BencodeValue::decode(state)
            .map_err(|e| EngineError::InvalidSessionState(e.to_string()))?;
        if root.get("format").and_then(BencodeValue::as_string).as_deref() != Some(SESSION_FORMAT) {
            return Err(EngineError::InvalidSessionState(
                "unrecognised format".to_string(),
            ));
        }
        let read = |key: &str| {
            root.get(key)
                .and_then(BencodeValue::as_int)
                .map(|n| n.max(0) as u64)
                .unwrap_or(0)
        };
        self.inner.lock().counters = SessionCounters {
            downloaded: read("downloaded"),
            completed: read("completed"),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{fixtures, Descriptor, Source};

    fn torrent_params() -> AddTorrentParams {
        let meta = Metainfo::from_bytes(&fixtures::single_file_torrent("movie.mkv")).unwrap();
        let descriptor = Descriptor::from_metainfo(Source::parse("movie.torrent"), meta, "/save");
        AddTorrentParams::from_descriptor(&descriptor)
    }

    fn magnet_params() -> AddTorrentParams {
        let descriptor = Descriptor::open(
            Source::parse("magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a"),
            "/save",
        )
        .unwrap();
        AddTorrentParams::from_descriptor(&descriptor)
    }

    fn handle_of(events: &[EngineEvent]) -> DownloadHandle {
        match events.first() {
            Some(EngineEvent::HandleConfirmed(handle)) => *handle,
            other => panic!("expected handle confirmation, got {:?}", other),
        }
    }

    fn last_status(events: &[EngineEvent]) -> TransferStatus {
        events
            .iter()
            .rev()
            .find_map(|e| match e {
                EngineEvent::StatusUpdate(s) => Some(*s),
                _ => None,
            })
            .expect("status update")
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_confirms_handle() {
        let engine = LoopbackEngine::default();
        let id = engine.submit(torrent_params()).unwrap();
        let events = engine.poll_events(id);
        handle_of(&events);
        assert!(engine.poll_events(id).is_empty(), "events are drained");
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_progresses_and_finishes() {
        let engine = LoopbackEngine::new(LoopbackConfig::default().with_rate(10_000));
        let id = engine.submit(torrent_params()).unwrap();
        let handle = handle_of(&engine.poll_events(id));

        engine.post_status_updates(handle); // checking -> downloading
        tokio::time::advance(Duration::from_secs(1)).await;
        engine.post_status_updates(handle);
        let status = last_status(&engine.poll_events(id));
        assert_eq!(status.phase, Phase::Downloading);
        assert_eq!(status.total_done, 10_000);
        assert_eq!(status.percent(), 50);
        assert_eq!(status.download_rate, 10_000);

        tokio::time::advance(Duration::from_secs(5)).await;
        engine.post_status_updates(handle);
        let events = engine.poll_events(id);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::TransferFinished)));
        assert_eq!(last_status(&events).percent(), 100);
        assert_eq!(engine.counters().completed, 1);
        assert_eq!(engine.counters().downloaded, 20_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_magnet_waits_for_metadata() {
        let config = LoopbackConfig::default()
            .with_metadata_delay(Duration::from_millis(500))
            .with_magnet_size(1_000);
        let engine = LoopbackEngine::new(config);
        let id = engine.submit(magnet_params()).unwrap();
        let handle = handle_of(&engine.poll_events(id));

        engine.post_status_updates(handle);
        let status = last_status(&engine.poll_events(id));
        assert_eq!(status.phase, Phase::DownloadingMetadata);
        assert_eq!(status.progress_ppm, 0);

        tokio::time::advance(Duration::from_millis(600)).await;
        engine.post_status_updates(handle);
        assert_eq!(last_status(&engine.poll_events(id)).phase, Phase::Downloading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_carries_progress() {
        let engine = LoopbackEngine::new(LoopbackConfig::default().with_rate(16_384));
        let id = engine.submit(torrent_params()).unwrap();
        let handle = handle_of(&engine.poll_events(id));
        engine.post_status_updates(handle);
        tokio::time::advance(Duration::from_secs(1)).await;
        engine.post_status_updates(handle);
        engine.poll_events(id);

        engine
            .request_checkpoint(handle, CheckpointFlags::SAVE_INFO_DICT)
            .unwrap();
        let data = match engine.poll_events(id).pop() {
            Some(EngineEvent::CheckpointSucceeded(data)) => data,
            other => panic!("expected checkpoint, got {:?}", other),
        };
        assert_eq!(data.total_done, 16_384);
        assert_eq!(data.num_pieces, 2);
        assert_eq!(data.pieces_done(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmodified_checkpoint_fails_when_requested() {
        let engine = LoopbackEngine::default();
        let id = engine.submit(torrent_params()).unwrap();
        let handle = handle_of(&engine.poll_events(id));
        let flags = CheckpointFlags {
            only_if_modified: true,
            ..CheckpointFlags::default()
        };
        engine.request_checkpoint(handle, flags).unwrap();
        engine.request_checkpoint(handle, flags).unwrap();
        let events = engine.poll_events(id);
        assert!(matches!(events[0], EngineEvent::CheckpointSucceeded(_)));
        assert!(matches!(events[1], EngineEvent::CheckpointFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_restores_progress() {
        let engine = LoopbackEngine::default();
        let mut params = torrent_params();
        let resume = ResumeData {
            total_done: 16_384,
            ..ResumeData::new(params.info_hash, "movie.mkv", "/save")
                .with_num_pieces(2)
                .with_total_size(20_000)
        };
        params = params.with_resume(resume);
        let id = engine.submit(params).unwrap();
        let handle = handle_of(&engine.poll_events(id));
        engine.post_status_updates(handle);
        let status = last_status(&engine.poll_events(id));
        assert_eq!(status.total_done, 16_384);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_forgets_download() {
        let engine = LoopbackEngine::default();
        let id = engine.submit(torrent_params()).unwrap();
        let handle = handle_of(&engine.poll_events(id));
        engine.remove(handle);
        assert_eq!(engine.active_downloads(), 0);
        assert_eq!(
            engine.request_checkpoint(handle, CheckpointFlags::default()),
            Err(EngineError::UnknownHandle(handle))
        );
    }

    #[test]
    fn test_session_state_restores_counters() {
        let engine = LoopbackEngine::default();
        engine.inner.lock().counters = SessionCounters {
            downloaded: 42,
            completed: 3,
        };
        let state = engine.serialize_session_state().unwrap();

        let restored = LoopbackEngine::default();
        restored.restore_session_state(&state).unwrap();
        assert_eq!(restored.counters(), engine.counters());
        assert!(restored.restore_session_state(b"garbage").is_err());
        assert!(restored.restore_session_state(&[]).is_ok());
    }
}

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use torkeep::descriptor::bencode::BencodeValue;
use torkeep::descriptor::{Descriptor, Source};
use torkeep::engine::{
    AddTorrentParams, CheckpointFlags, DownloadHandle, EngineError, EngineEvent, EngineResult,
    ResumeData, SubmissionId, TransferEngine,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Bytes of a single-file torrent named `name`.
pub fn torrent_bytes(name: &str, length: i64) -> Vec<u8> {
    let pieces = (length as usize).div_ceil(16_384).max(1);
    let info = BencodeValue::dict()
        .insert("length", BencodeValue::integer(length))
        .insert("name", BencodeValue::string(name))
        .insert("piece length", BencodeValue::integer(16_384))
        .insert("pieces", BencodeValue::Bytes(vec![0x5a; 20 * pieces]));
    BencodeValue::dict()
        .insert("announce", BencodeValue::string("http://tracker.example/announce"))
        .insert("info", info)
        .encode()
}

/// Write a torrent file into `dir` and open it as a descriptor.
pub fn write_torrent(dir: &Path, file_name: &str, name: &str) -> (PathBuf, Descriptor) {
    let path = dir.join(file_name);
    std::fs::write(&path, torrent_bytes(name, 40_000)).unwrap();
    let descriptor =
        Descriptor::open(Source::TorrentFile(path.clone()), dir.join("save")).unwrap();
    (path, descriptor)
}

/// Poll `condition` on the (usually paused) tokio clock.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// ============================================================================
// Scripted engine
// ============================================================================

#[derive(Default)]
struct Inner {
    next_id: u64,
    queues: HashMap<SubmissionId, VecDeque<EngineEvent>>,
    params: HashMap<SubmissionId, AddTorrentParams>,
    submitted: Vec<AddTorrentParams>,
    checkpoint_requests: Vec<DownloadHandle>,
    rejected_checkpoints: usize,
    removed: Vec<DownloadHandle>,
    status_requests: usize,
    session_state: Vec<u8>,
}

/// A [`TransferEngine`] whose events are injected by the test.
///
/// Handles are confirmed on submit unless `auto_confirm` is off. With
/// `auto_checkpoint` on, every checkpoint request is answered with resume
/// data for the submission. While `reject_checkpoints` is set, checkpoint
/// requests fail synchronously.
pub struct ScriptedEngine {
    inner: Mutex<Inner>,
    auto_confirm: bool,
    auto_checkpoint: bool,
    reject_checkpoints: AtomicBool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            auto_confirm: true,
            auto_checkpoint: false,
            reject_checkpoints: AtomicBool::new(false),
        }
    }

    pub fn without_auto_confirm(mut self) -> Self {
        self.auto_confirm = false;
        self
    }

    pub fn with_auto_checkpoint(mut self) -> Self {
        self.auto_checkpoint = true;
        self
    }

    /// Refuse (or accept again) every checkpoint request.
    pub fn set_reject_checkpoints(&self, reject: bool) {
        self.reject_checkpoints.store(reject, Ordering::SeqCst);
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Queue an event for the `n`th submission (1-based).
    pub fn push(&self, submission: u64, event: EngineEvent) {
        self.inner
            .lock()
            .queues
            .entry(SubmissionId(submission))
            .or_default()
            .push_back(event);
    }

    /// Resume data the engine would produce for a submission.
    pub fn resume_for(&self, submission: u64) -> ResumeData {
        let inner = self.inner.lock();
        let params = &inner.params[&SubmissionId(submission)];
        let mut data = ResumeData::new(params.info_hash, params.name.clone(), params.save_path.clone())
            .with_num_pieces(3)
            .with_total_size(40_000);
        data.set_piece(0);
        data.total_done = 16_384;
        data
    }

    pub fn submitted(&self) -> Vec<AddTorrentParams> {
        self.inner.lock().submitted.clone()
    }

    pub fn checkpoint_requests(&self) -> usize {
        self.inner.lock().checkpoint_requests.len()
    }

    pub fn rejected_checkpoints(&self) -> usize {
        self.inner.lock().rejected_checkpoints
    }

    pub fn removed(&self) -> Vec<DownloadHandle> {
        self.inner.lock().removed.clone()
    }

    pub fn status_requests(&self) -> usize {
        self.inner.lock().status_requests
    }

    /// Session state handed to `restore_session_state`, empty if none.
    pub fn restored_session(&self) -> Vec<u8> {
        self.inner.lock().session_state.clone()
    }
}

impl TransferEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn submit(&self, params: AddTorrentParams) -> EngineResult<SubmissionId> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SubmissionId(inner.next_id);
        inner.submitted.push(params.clone());
        inner.params.insert(id, params);
        if self.auto_confirm {
            inner
                .queues
                .entry(id)
                .or_default()
                .push_back(EngineEvent::HandleConfirmed(DownloadHandle(id.0)));
        }
        Ok(id)
    }

    fn poll_events(&self, submission: SubmissionId) -> Vec<EngineEvent> {
        self.inner
            .lock()
            .queues
            .get_mut(&submission)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    fn post_status_updates(&self, _handle: DownloadHandle) {
        self.inner.lock().status_requests += 1;
    }

    fn request_checkpoint(&self, handle: DownloadHandle, _flags: CheckpointFlags) -> EngineResult<()> {
        let id = SubmissionId(handle.0);
        if !self.inner.lock().params.contains_key(&id) {
            return Err(EngineError::UnknownHandle(handle));
        }
        if self.reject_checkpoints.load(Ordering::SeqCst) {
            self.inner.lock().rejected_checkpoints += 1;
            return Err(EngineError::Rejected("checkpoints disabled".to_string()));
        }
        self.inner.lock().checkpoint_requests.push(handle);
        if self.auto_checkpoint {
            let data = self.resume_for(handle.0);
            self.push(handle.0, EngineEvent::CheckpointSucceeded(data));
        }
        Ok(())
    }

    fn remove(&self, handle: DownloadHandle) {
        self.inner.lock().removed.push(handle);
    }

    fn serialize_session_state(&self) -> EngineResult<Vec<u8>> {
        Ok(b"scripted-session".to_vec())
    }

    fn restore_session_state(&self, state: &[u8]) -> EngineResult<()> {
        self.inner.lock().session_state = state.to_vec();
        Ok(())
    }
}

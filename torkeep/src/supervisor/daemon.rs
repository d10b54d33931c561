//! The per-download event loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::config::SupervisorConfig;
use super::error::SupervisorError;
use super::handle::{SupervisorHandle, SupervisorReport};
use super::state::{SupervisorSnapshot, SupervisorState};
use crate::descriptor::Descriptor;
use crate::engine::{
    AddTorrentParams, CheckpointFlags, DownloadHandle, EngineEvent, ResumeData, SubmissionId,
    TransferEngine,
};
use crate::store::{ResumeLookup, StateFiles};

// =============================================================================
// Supervisor
// =============================================================================

/// Drives exactly one download from submission to a terminal state.
///
/// The supervisor owns its descriptor and its resume file. It shares the
/// engine and the session file with its siblings, and reports status only
/// through the `watch` channel it was given.
pub struct Supervisor {
    descriptor: Arc<Descriptor>,
    engine: Arc<dyn TransferEngine>,
    files: Arc<StateFiles>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(
        descriptor: Arc<Descriptor>,
        engine: Arc<dyn TransferEngine>,
        files: Arc<StateFiles>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            descriptor,
            engine,
            files,
            config,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Start the event loop on its own task.
    ///
    /// Returns immediately; the handle carries the stop flag, a status
    /// receiver and the task's join handle.
    pub fn spawn(self) -> SupervisorHandle {
        let name = self.descriptor.name().to_string();
        let stop = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(SupervisorSnapshot::new(name.clone()));
        let join = tokio::spawn(self.run(stop.clone(), status_tx));
        SupervisorHandle::new(name, stop, status_rx, join)
    }

    /// Run the event loop to completion on the current task.
    pub async fn run(
        self,
        stop: CancellationToken,
        status_tx: watch::Sender<SupervisorSnapshot>,
    ) -> SupervisorReport {
        info!(
            download = %self.descriptor.name(),
            info_hash = %self.descriptor.info_hash(),
            engine = self.engine.name(),
            "Supervisor starting"
        );

        let mut driver = Driver::new(&self, status_tx);
        match driver.submit() {
            Ok(submission) => driver.event_loop(submission, &stop).await,
            Err(e) => {
                error!(download = %self.descriptor.name(), error = %e, "Supervisor aborted");
                driver.fail(e);
            }
        }
        driver.terminate().await
    }
}

// =============================================================================
// Loop state
// =============================================================================

struct Driver<'a> {
    sup: &'a Supervisor,
    status_tx: watch::Sender<SupervisorSnapshot>,
    state: SupervisorState,
    handle: Option<DownloadHandle>,
    /// Set once the transfer finished or failed.
    done: bool,
    /// A checkpoint request awaits its result.
    outstanding: bool,
    /// Another checkpoint is due once the outstanding one resolves.
    queued: bool,
    retries_left: u32,
    last_checkpoint: Instant,
    report: SupervisorReport,
}

impl<'a> Driver<'a> {
    fn new(sup: &'a Supervisor, status_tx: watch::Sender<SupervisorSnapshot>) -> Self {
        Self {
            sup,
            status_tx,
            state: SupervisorState::Registering,
            handle: None,
            done: false,
            outstanding: false,
            queued: false,
            retries_left: sup.config.checkpoint_retries,
            last_checkpoint: Instant::now(),
            report: SupervisorReport::new(sup.descriptor.name()),
        }
    }

    fn name(&self) -> &str {
        self.sup.descriptor.name()
    }

    fn publish(&self, update: impl FnOnce(&mut SupervisorSnapshot)) {
        self.status_tx.send_modify(update);
    }

    fn set_state(&mut self, state: SupervisorState) {
        if self.state == state {
            return;
        }
        debug!(download = %self.name(), from = %self.state, to = %state, "Supervisor state change");
        self.state = state;
        // Observers see Terminated only after session state is persisted.
        if !state.is_terminated() {
            self.publish(|s| s.state = state);
        }
    }

    fn fail(&mut self, err: SupervisorError) {
        let message = err.to_string();
        self.publish(|s| s.error = Some(message));
        if self.report.error.is_none() {
            self.report.error = Some(err);
        }
    }

    /// Load trusted resume data and hand the download to the engine.
    fn submit(&mut self) -> Result<SubmissionId, SupervisorError> {
        let descriptor = &self.sup.descriptor;
        let lookup = self
            .sup
            .files
            .load_resume(descriptor, self.sup.engine.as_ref());
        match &lookup {
            ResumeLookup::Absent => debug!(download = %self.name(), "No resume data"),
            ResumeLookup::Loaded(data) => info!(
                download = %self.name(),
                pieces = data.pieces_done(),
                of = data.num_pieces,
                "Loaded resume data"
            ),
            ResumeLookup::Mismatch { found } => warn!(
                download = %self.name(),
                expected = %descriptor.info_hash(),
                found = %found,
                "Ignoring resume data recorded for another download"
            ),
            ResumeLookup::Unreadable(reason) => warn!(
                download = %self.name(),
                reason = %reason,
                "Ignoring unreadable resume data"
            ),
        }

        let resumed = lookup.is_loaded();
        self.report.resumed = resumed;
        self.publish(|s| s.resumed = resumed);

        let mut params = AddTorrentParams::from_descriptor(descriptor);
        if let Some(data) = lookup.into_resume() {
            params = params.with_resume(data);
        }
        self.sup.engine.submit(params).map_err(SupervisorError::Submit)
    }

    async fn event_loop(&mut self, submission: SubmissionId, stop: &CancellationToken) {
        let engine = Arc::clone(&self.sup.engine);
        let period = self.sup.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.state.is_terminated() {
            ticker.tick().await;

            for event in engine.poll_events(submission) {
                self.dispatch(event).await;
                if self.state.is_terminated() {
                    return;
                }
            }

            if self.state == SupervisorState::Active
                && !self.outstanding
                && self.last_checkpoint.elapsed() >= self.sup.config.checkpoint_interval
            {
                debug!(download = %self.name(), "Periodic checkpoint");
                self.request_checkpoint();
            }

            if stop.is_cancelled() {
                self.on_stop();
                if self.state.is_terminated() {
                    return;
                }
            }

            if let Some(handle) = self.handle {
                engine.post_status_updates(handle);
            }
        }
    }

    async fn dispatch(&mut self, event: EngineEvent) {
        trace!(download = %self.name(), event = event.kind(), state = %self.state, "Engine event");

        match (self.state, event) {
            (SupervisorState::Registering, EngineEvent::HandleConfirmed(handle)) => {
                info!(download = %self.name(), handle = %handle, "Engine confirmed download");
                self.handle = Some(handle);
                self.last_checkpoint = Instant::now();
                self.set_state(SupervisorState::Active);
            }
            (_, EngineEvent::HandleConfirmed(handle)) => {
                warn!(download = %self.name(), handle = %handle, "Ignoring duplicate handle confirmation");
            }
            (SupervisorState::Registering, EngineEvent::StatusUpdate(_)) => {
                trace!(download = %self.name(), "Dropping status update before handle confirmation");
            }
            (
                SupervisorState::Registering,
                event @ (EngineEvent::CheckpointSucceeded(_) | EngineEvent::CheckpointFailed { .. }),
            ) => {
                warn!(
                    download = %self.name(),
                    event = event.kind(),
                    "Dropping checkpoint result before handle confirmation"
                );
            }
            (
                SupervisorState::Registering,
                event @ (EngineEvent::TransferFinished | EngineEvent::TransferError { .. }),
            ) => {
                let err = SupervisorError::Consistency { event: event.kind() };
                error!(download = %self.name(), error = %err, "Engine contract violated");
                self.fail(err);
                self.set_state(SupervisorState::Terminated);
            }
            (_, EngineEvent::TransferFinished) => self.on_transfer_done(None),
            (_, EngineEvent::TransferError { message }) => self.on_transfer_done(Some(message)),
            (_, EngineEvent::CheckpointSucceeded(data)) => self.on_checkpoint(Ok(data)).await,
            (_, EngineEvent::CheckpointFailed { message }) => {
                self.on_checkpoint(Err(message)).await
            }
            (_, EngineEvent::StatusUpdate(status)) => {
                trace!(
                    download = %self.name(),
                    line = %super::state::format_status_line(&status),
                    "Status update"
                );
                self.publish(|s| s.status = Some(status));
            }
        }
    }

    fn on_stop(&mut self) {
        match self.state {
            SupervisorState::Registering => {
                info!(download = %self.name(), "Stopped before the engine confirmed the download");
                self.set_state(SupervisorState::Terminated);
            }
            SupervisorState::Active => {
                info!(download = %self.name(), "Stop requested, taking final checkpoint");
                self.set_state(SupervisorState::Draining);
                self.request_checkpoint();
            }
            SupervisorState::Draining | SupervisorState::Terminated => {}
        }
    }

    fn on_transfer_done(&mut self, failure: Option<String>) {
        if self.done {
            debug!(download = %self.name(), "Ignoring repeated completion event");
            return;
        }
        self.done = true;

        match failure {
            Some(message) => {
                warn!(download = %self.name(), error = %message, "Transfer failed, taking final checkpoint");
                self.fail(SupervisorError::Transfer(message));
            }
            None => info!(download = %self.name(), "Transfer finished, taking final checkpoint"),
        }

        self.set_state(SupervisorState::Draining);
        self.request_checkpoint();
    }

    async fn on_checkpoint(&mut self, result: Result<ResumeData, String>) {
        if !self.outstanding {
            debug!(download = %self.name(), "Checkpoint result without a pending request");
        }
        self.outstanding = false;

        let written = match result {
            Ok(data) => self.persist(data).await.is_some(),
            Err(reason) => {
                if self.state == SupervisorState::Draining {
                    warn!(download = %self.name(), reason = %reason, "Final checkpoint failed");
                } else {
                    debug!(download = %self.name(), reason = %reason, "Checkpoint failed");
                }
                false
            }
        };

        if self.queued {
            self.queued = false;
            self.request_checkpoint();
            return;
        }

        if self.state == SupervisorState::Draining {
            if !written && self.retries_left > 0 {
                self.retries_left -= 1;
                info!(
                    download = %self.name(),
                    retries_left = self.retries_left,
                    "Retrying final checkpoint"
                );
                self.request_checkpoint();
                return;
            }
            self.report.final_checkpoint_written = written;
            self.set_state(SupervisorState::Terminated);
        }
    }

    /// Write resume data on the blocking pool.
    async fn persist(&mut self, data: ResumeData) -> Option<PathBuf> {
        let files = Arc::clone(&self.sup.files);
        let descriptor = Arc::clone(&self.sup.descriptor);
        let engine = Arc::clone(&self.sup.engine);
        let pieces = data.pieces_done();

        let written = tokio::task::spawn_blocking(move || {
            files.save_resume(&descriptor, engine.as_ref(), &data)
        })
        .await;

        match written {
            Ok(Ok(path)) => {
                self.report.checkpoints_written += 1;
                self.report.resume_path = Some(path.clone());
                debug!(
                    download = %self.name(),
                    pieces,
                    path = %path.display(),
                    "Checkpoint persisted"
                );
                Some(path)
            }
            Ok(Err(e)) => {
                warn!(download = %self.name(), error = %e, "Failed to persist resume data");
                None
            }
            Err(e) => {
                warn!(download = %self.name(), error = %e, "Resume write task failed");
                None
            }
        }
    }

    /// Ask the engine for a checkpoint, or queue one behind the pending
    /// request.
    fn request_checkpoint(&mut self) {
        let Some(handle) = self.handle else {
            return;
        };
        if self.outstanding {
            self.queued = true;
            return;
        }

        match self
            .sup
            .engine
            .request_checkpoint(handle, CheckpointFlags::SAVE_INFO_DICT)
        {
            Ok(()) => {
                self.outstanding = true;
                self.report.checkpoints_requested += 1;
                self.last_checkpoint = Instant::now();
            }
            Err(e) => {
                // Wait a full interval before asking again.
                self.last_checkpoint = Instant::now();
                if self.state == SupervisorState::Draining {
                    warn!(download = %self.name(), error = %e, "Final checkpoint request rejected");
                    self.fail(SupervisorError::Checkpoint(e));
                    self.set_state(SupervisorState::Terminated);
                } else {
                    warn!(download = %self.name(), error = %e, "Checkpoint request rejected");
                }
            }
        }
    }

    /// Release the engine download and persist session state.
    async fn terminate(mut self) -> SupervisorReport {
        self.set_state(SupervisorState::Terminated);
        let sup = self.sup;

        if let Some(handle) = self.handle {
            sup.engine.remove(handle);
        }

        match sup.engine.serialize_session_state() {
            Ok(state) => {
                let files = Arc::clone(&sup.files);
                match tokio::task::spawn_blocking(move || files.save_session(&state)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(download = %self.name(), error = %e, "Failed to save session state")
                    }
                    Err(e) => {
                        warn!(download = %self.name(), error = %e, "Session write task failed")
                    }
                }
            }
            Err(e) => warn!(download = %self.name(), error = %e, "Engine could not serialize session state"),
        }

        self.report.final_state = SupervisorState::Terminated;
        self.publish(|s| s.state = SupervisorState::Terminated);
        info!(
            download = %self.name(),
            checkpoints = self.report.checkpoints_written,
            final_checkpoint = self.report.final_checkpoint_written,
            error = ?self.report.error,
            "Supervisor terminated"
        );
        self.report
    }
}

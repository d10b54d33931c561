//! Registry operations.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::RegistryConfig;
use super::error::{RegistryError, RegistryResult};
use super::mapping::RegistryFile;
use crate::descriptor::{Descriptor, Source};
use crate::engine::TransferEngine;
use crate::store::StateFiles;
use crate::supervisor::{
    Supervisor, SupervisorError, SupervisorHandle, SupervisorReport, SupervisorSnapshot,
    SupervisorState,
};

/// Minimum age of a temp file before it counts as abandoned.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(300);

/// Registry key of a download.
///
/// The managed copy's path for torrent files, the URI for magnet links.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DownloadId(String);

impl DownloadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for DownloadId {
    fn from(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

/// One active download as shown to the front end.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub id: DownloadId,
    pub name: String,
    pub save_path: PathBuf,
    pub state: SupervisorState,
    pub status_line: String,
}

struct Active {
    descriptor: Arc<Descriptor>,
    handle: SupervisorHandle,
}

/// Owner of every download and its supervisor.
///
/// Operations that start supervisors must run inside a tokio runtime.
pub struct Registry {
    config: RegistryConfig,
    engine: Arc<dyn TransferEngine>,
    files: Arc<StateFiles>,
    mapping: Mutex<RegistryFile>,
    active: Mutex<BTreeMap<DownloadId, Active>>,
    /// Removed supervisors still draining.
    retiring: Mutex<Vec<(String, JoinHandle<SupervisorReport>)>>,
}

impl Registry {
    /// Prepare directories, load the mapping and restore engine session
    /// state. No supervisor is started; call [`load_all`](Self::load_all).
    pub fn open(config: RegistryConfig, engine: Arc<dyn TransferEngine>) -> RegistryResult<Self> {
        fs::create_dir_all(&config.torrent_dir).map_err(|source| RegistryError::CreateDirFailed {
            path: config.torrent_dir.clone(),
            source,
        })?;

        let files = Arc::new(StateFiles::new(&config.sessions_dir));
        files.ensure_dir()?;

        match files.load_session() {
            Ok(Some(state)) => match engine.restore_session_state(&state) {
                Ok(()) => debug!(bytes = state.len(), "Restored engine session state"),
                Err(e) => warn!(error = %e, "Ignoring unusable session state"),
            },
            Ok(None) => debug!("No session state to restore"),
            Err(e) => warn!(error = %e, "Ignoring unreadable session state"),
        }

        let mapping = RegistryFile::load(&config.data_file, &config.default_save_path)?;
        info!(
            data_file = %config.data_file.display(),
            downloads = mapping.torlinks.len(),
            save_path = %mapping.save_path.display(),
            "Registry opened"
        );

        Ok(Self {
            config,
            engine,
            files,
            mapping: Mutex::new(mapping),
            active: Mutex::new(BTreeMap::new()),
            retiring: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn TransferEngine> {
        &self.engine
    }

    pub fn files(&self) -> &Arc<StateFiles> {
        &self.files
    }

    /// Where a torrent file is kept once added.
    fn managed_path(&self, path: &Path) -> PathBuf {
        if path.parent() == Some(self.config.torrent_dir.as_path()) {
            return path.to_path_buf();
        }
        match path.file_name() {
            Some(name) => self.config.torrent_dir.join(name),
            None => self.config.torrent_dir.join("download.torrent"),
        }
    }

    fn id_for(&self, source: &Source) -> DownloadId {
        match source {
            Source::TorrentFile(path) => DownloadId::from(self.managed_path(path).as_path()),
            Source::Magnet(uri) => DownloadId::new(uri.clone()),
        }
    }

    /// Copy `original` into the managed store unless it is already there.
    fn adopt(&self, original: &Path, managed: &Path) -> RegistryResult<()> {
        if original == managed || managed.exists() {
            debug!(path = %managed.display(), "Torrent file already managed");
            return Ok(());
        }
        fs::create_dir_all(&self.config.torrent_dir).map_err(|source| {
            RegistryError::CreateDirFailed {
                path: self.config.torrent_dir.clone(),
                source,
            }
        })?;
        fs::copy(original, managed).map_err(|source| RegistryError::CopyFailed {
            from: original.to_path_buf(),
            to: managed.to_path_buf(),
            source,
        })?;
        debug!(from = %original.display(), to = %managed.display(), "Copied torrent file");
        Ok(())
    }

    /// Add a download and start its supervisor.
    ///
    /// `locator` is a `.torrent` path or a magnet URI. Without `save_path`
    /// the recorded save path for this download is reused, falling back to
    /// the registry default. Adding a download that is already running
    /// returns its id and changes nothing.
    pub fn add(&self, locator: &str, save_path: Option<&Path>) -> RegistryResult<DownloadId> {
        let source = Source::parse(locator);
        let id = self.id_for(&source);
        if self.is_running(&id) {
            debug!(id = %id, "Download already active");
            return Ok(id);
        }

        let save = {
            let mapping = self.mapping.lock();
            save_path
                .map(Path::to_path_buf)
                .or_else(|| mapping.torlinks.get(id.as_str()).cloned())
                .unwrap_or_else(|| mapping.save_path.clone())
        };
        let descriptor = Arc::new(self.resolve(source, &id, &save)?);

        // Another add may have started the same download while this one
        // was reading and copying.
        let mut active = self.active.lock();
        if let Some(existing) = active.get(&id) {
            if !existing.handle.is_finished() {
                debug!(id = %id, "Download became active while resolving");
                return Ok(id);
            }
            active.remove(&id);
        }

        {
            let mut mapping = self.mapping.lock();
            mapping.torlinks.insert(id.to_string(), save.clone());
            mapping.save(&self.config.data_file)?;
        }

        let handle = Supervisor::new(
            Arc::clone(&descriptor),
            Arc::clone(&self.engine),
            Arc::clone(&self.files),
            self.config.supervisor.clone(),
        )
        .spawn();
        info!(
            id = %id,
            download = %descriptor.name(),
            save_path = %save.display(),
            "Download added"
        );
        active.insert(id.clone(), Active { descriptor, handle });
        Ok(id)
    }

    fn is_running(&self, id: &DownloadId) -> bool {
        self.active
            .lock()
            .get(id)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    /// Read the source and move a torrent file into the managed store.
    fn resolve(&self, source: Source, id: &DownloadId, save: &Path) -> RegistryResult<Descriptor> {
        let descriptor = Descriptor::open(source, save)?;
        let original = match descriptor.source() {
            Source::TorrentFile(path) => path.clone(),
            Source::Magnet(_) => return Ok(descriptor),
        };
        let managed = PathBuf::from(id.as_str());
        self.adopt(&original, &managed)?;
        Ok(descriptor.relocated(Source::TorrentFile(managed)))
    }

    /// Start a supervisor for every persisted download.
    ///
    /// Failures are logged and returned; they do not stop the others.
    pub fn load_all(&self) -> Vec<(String, RegistryResult<DownloadId>)> {
        let entries: Vec<(String, PathBuf)> = self
            .mapping
            .lock()
            .torlinks
            .iter()
            .map(|(id, save)| (id.clone(), save.clone()))
            .collect();

        entries
            .into_iter()
            .map(|(id, save)| {
                let result = self.add(&id, Some(&save));
                if let Err(e) = &result {
                    warn!(id = %id, error = %e, "Failed to restore download");
                }
                (id, result)
            })
            .collect()
    }

    /// Forget a download and raise its stop flag.
    ///
    /// Returns without waiting for the supervisor's final checkpoint.
    pub fn remove(&self, id: &DownloadId) -> RegistryResult<()> {
        let removed = self.active.lock().remove(id);
        if let Some(entry) = &removed {
            entry.handle.stop();
        }

        let mapped = {
            let mut mapping = self.mapping.lock();
            let existed = mapping.torlinks.remove(id.as_str()).is_some();
            if existed {
                mapping.save(&self.config.data_file)?;
            }
            existed
        };

        match removed {
            Some(entry) => {
                info!(id = %id, download = %entry.descriptor.name(), "Download removed");
                let (_, join) = entry.handle.detach();
                let mut retiring = self.retiring.lock();
                retiring.retain(|(name, task)| {
                    let done = task.is_finished();
                    if done {
                        debug!(download = %name, "Removed download finished draining");
                    }
                    !done
                });
                retiring.push((entry.descriptor.name().to_string(), join));
                Ok(())
            }
            None if mapped => {
                info!(id = %id, "Removed inactive download");
                Ok(())
            }
            None => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    /// Delete temp files abandoned by a write that never completed.
    ///
    /// Only files older than [`STALE_TEMP_AGE`] are touched, so writes in
    /// flight in another process keep theirs. Call once before
    /// [`load_all`](Self::load_all) in the process that drives downloads.
    pub fn sweep_interrupted_writes(&self) -> usize {
        let swept = self.files.sweep_temp_files(STALE_TEMP_AGE);
        if swept > 0 {
            info!(count = swept, "Removed temp files left by an interrupted write");
        }
        swept
    }

    /// Persisted downloads and their save paths.
    pub fn entries(&self) -> Vec<(DownloadId, PathBuf)> {
        self.mapping
            .lock()
            .torlinks
            .iter()
            .map(|(id, save)| (DownloadId::new(id.clone()), save.clone()))
            .collect()
    }

    /// Active downloads with their current status.
    pub fn list(&self) -> Vec<DownloadEntry> {
        self.active
            .lock()
            .iter()
            .map(|(id, entry)| {
                let snapshot = entry.handle.snapshot();
                DownloadEntry {
                    id: id.clone(),
                    name: entry.descriptor.name().to_string(),
                    save_path: entry.descriptor.save_path().to_path_buf(),
                    state: snapshot.state,
                    status_line: snapshot.status_line(),
                }
            })
            .collect()
    }

    /// `(id, status line)` for every active download.
    pub fn statuses(&self) -> Vec<(DownloadId, String)> {
        self.active
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.handle.snapshot().status_line()))
            .collect()
    }

    /// Observe one download's snapshots.
    pub fn subscribe(&self, id: &DownloadId) -> Option<watch::Receiver<SupervisorSnapshot>> {
        self.active.lock().get(id).map(|entry| entry.handle.subscribe())
    }

    /// Information report for an active or persisted download.
    pub fn info(&self, id: &DownloadId) -> RegistryResult<String> {
        if let Some(entry) = self.active.lock().get(id) {
            return Ok(entry.descriptor.report());
        }
        let save = self
            .mapping
            .lock()
            .torlinks
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(Descriptor::open(Source::parse(id.as_str()), save)?.report())
    }

    pub fn default_save_path(&self) -> PathBuf {
        self.mapping.lock().save_path.clone()
    }

    /// Change and persist the save path used for downloads added without one.
    pub fn set_default_save_path(&self, path: impl Into<PathBuf>) -> RegistryResult<()> {
        let path = path.into();
        let mut mapping = self.mapping.lock();
        mapping.save_path = path.clone();
        mapping.save(&self.config.data_file)?;
        info!(save_path = %path.display(), "Default save path changed");
        Ok(())
    }

    /// Supervisors that have not yet terminated.
    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .values()
            .filter(|entry| !entry.handle.snapshot().state.is_terminated())
            .count()
    }

    /// Handle a process interrupt: raise every supervisor's stop flag.
    ///
    /// Returns how many supervisors were signalled.
    pub fn interrupt(&self) -> usize {
        let active = self.active.lock();
        for entry in active.values() {
            entry.handle.stop();
        }
        info!(count = active.len(), "Interrupt: stopping all downloads");
        active.len()
    }

    /// Wait until every active supervisor has terminated.
    pub async fn wait_all(&self) {
        let receivers: Vec<_> = self
            .active
            .lock()
            .values()
            .map(|entry| entry.handle.subscribe())
            .collect();
        for mut rx in receivers {
            // A closed channel means the task is gone.
            let _ = rx.wait_for(|s| s.state.is_terminated()).await;
        }
    }

    /// Stop every supervisor, including removed ones still draining, and
    /// wait for all of them.
    pub async fn shutdown(&self) -> Vec<SupervisorReport> {
        let mut joins: Vec<(String, JoinHandle<SupervisorReport>)> =
            std::mem::take(&mut *self.retiring.lock());
        let active = std::mem::take(&mut *self.active.lock());
        for (_, entry) in active {
            entry.handle.stop();
            let (_, join) = entry.handle.detach();
            joins.push((entry.descriptor.name().to_string(), join));
        }

        info!(count = joins.len(), "Waiting for supervisors to finish");
        let (names, handles): (Vec<_>, Vec<_>) = joins.into_iter().unzip();
        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(result, name)| match result {
                Ok(report) => report,
                Err(e) => {
                    warn!(download = %name, error = %e, "Supervisor task failed");
                    let mut report = SupervisorReport::new(name);
                    report.error = Some(SupervisorError::Join(e.to_string()));
                    report
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::fixtures;
    use crate::engine::{LoopbackConfig, LoopbackEngine};
    use crate::supervisor::SupervisorConfig;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Registry, PathBuf) {
        let dir = TempDir::new().unwrap();
        let config = RegistryConfig::new(dir.path().join("state")).with_supervisor(
            SupervisorConfig::default().with_poll_interval(Duration::from_millis(10)),
        );
        let engine: Arc<dyn TransferEngine> =
            Arc::new(LoopbackEngine::new(LoopbackConfig::default().with_rate(1_000)));
        let registry = Registry::open(config, engine).unwrap();

        let torrent = dir.path().join("movie.torrent");
        fs::write(&torrent, fixtures::single_file_torrent("movie.mkv")).unwrap();
        (dir, registry, torrent)
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_copies_into_managed_store() {
        let (_dir, registry, torrent) = setup();
        let id = registry.add(torrent.to_str().unwrap(), None).unwrap();

        let managed = registry.config().torrent_dir.join("movie.torrent");
        assert_eq!(id.as_str(), managed.to_string_lossy());
        assert!(managed.exists());
        assert_eq!(registry.entries().len(), 1);
        assert_eq!(registry.entries()[0].1, registry.default_save_path());

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_twice_is_idempotent() {
        let (_dir, registry, torrent) = setup();
        let first = registry.add(torrent.to_str().unwrap(), None).unwrap();
        let second = registry.add(torrent.to_str().unwrap(), None).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.entries().len(), 1);
        assert_eq!(registry.list().len(), 1);
        assert_eq!(fs::read_dir(&registry.config().torrent_dir).unwrap().count(), 1);

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_source_creates_nothing() {
        let (dir, registry, _) = setup();
        let bogus = dir.path().join("bogus.torrent");
        fs::write(&bogus, b"not bencode").unwrap();

        let err = registry.add(bogus.to_str().unwrap(), None).unwrap_err();
        assert!(matches!(err, RegistryError::Descriptor(_)));
        assert!(registry.entries().is_empty());
        assert!(!registry.config().torrent_dir.join("bogus.torrent").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_unknown_is_not_found() {
        let (_dir, registry, _) = setup();
        let err = registry.remove(&DownloadId::new("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_forgets_mapping_and_stops() {
        let (_dir, registry, torrent) = setup();
        let id = registry.add(torrent.to_str().unwrap(), None).unwrap();
        registry.remove(&id).unwrap();

        assert!(registry.entries().is_empty());
        assert!(registry.list().is_empty());
        let reports = registry.shutdown().await;
        assert_eq!(reports.len(), 1);
        assert!(reports[0].final_state.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_drops_finished_drains() {
        let (dir, registry, torrent) = setup();
        let other = dir.path().join("other.torrent");
        fs::write(&other, fixtures::single_file_torrent("other.bin")).unwrap();
        let first = registry.add(torrent.to_str().unwrap(), None).unwrap();
        let second = registry.add(other.to_str().unwrap(), None).unwrap();

        registry.remove(&first).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !registry.retiring.lock()[0].1.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        registry.remove(&second).unwrap();
        assert_eq!(registry.retiring.lock().len(), 1);
        assert_eq!(registry.shutdown().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_adds_start_one_supervisor() {
        let (_dir, registry, torrent) = setup();
        let locator = torrent.to_str().unwrap();
        let runtime = tokio::runtime::Handle::current();

        let ids: Vec<DownloadId> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let _guard = runtime.enter();
                        registry.add(locator, None).unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.entries().len(), 1);
        assert_eq!(registry.shutdown().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mapping_survives_reopen() {
        let (dir, registry, torrent) = setup();
        registry.set_default_save_path("/srv/media").unwrap();
        let id = registry.add(torrent.to_str().unwrap(), None).unwrap();
        registry.shutdown().await;

        let engine: Arc<dyn TransferEngine> = Arc::new(LoopbackEngine::default());
        let reopened = Registry::open(RegistryConfig::new(dir.path().join("state")), engine).unwrap();
        assert_eq!(reopened.default_save_path(), PathBuf::from("/srv/media"));

        let results = reopened.load_all();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.as_ref().unwrap(), &id);
        assert!(reopened.info(&id).unwrap().contains("movie.mkv"));
        reopened.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_everything() {
        let (dir, registry, torrent) = setup();
        let other = dir.path().join("other.torrent");
        fs::write(&other, fixtures::single_file_torrent("other.bin")).unwrap();
        registry.add(torrent.to_str().unwrap(), None).unwrap();
        registry.add(other.to_str().unwrap(), None).unwrap();

        assert_eq!(registry.interrupt(), 2);
        tokio::time::timeout(Duration::from_secs(5), registry.wait_all())
            .await
            .unwrap();
        assert_eq!(registry.active_count(), 0);
        assert!(registry
            .statuses()
            .iter()
            .all(|(_, line)| !line.starts_with("error")));

        let reports = registry.shutdown().await;
        assert!(reports.iter().all(|r| r.final_checkpoint_written));
    }
}

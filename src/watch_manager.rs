//! # Watch Manager Module
//!
//! One live directory watch per `WatchConfig`, wired through the pattern
//! matcher and the rename filter to the optimizer.
//!
//! ## Per watch:
//! - a `WatchHandle` from the injected `WatchSource`; dropping it ends the watch
//! - a dispatcher task draining the watch's `WatchEvent` channel
//! - a stop signal (`broadcast`) observed by every file still settling
//! - the set of files currently between detection and delivery
//!
//! ## Per created file:
//! 1. Hidden paths and names rejected by the pattern are ignored
//! 2. A path that is still being processed, or was delivered less than
//!    `quiet_period` ago, is ignored: resize and pngquant both replace the
//!    file through a temp sibling + rename, which the backend reports again
//! 3. A create shortly after a delete in the same directory is a rename: skipped
//! 4. Settle delay, so the writer can finish. Stopping the watch cancels here
//! 5. The optimizer runs in its own task. Once started it always completes,
//!    and a panic becomes a failed `ProcessedFile`
//! 6. The result goes to the caller's callback
//!
//! Files are processed concurrently. Completion order is not arrival order.

use crate::clock::{Clock, TokioClock};
use crate::config::WatchConfig;
use crate::error::Result;
use crate::file_manager::FileManager;
use crate::optimizer::Optimize;
use crate::pattern::FilePattern;
use crate::rename_filter::{RenameFilter, DEFAULT_RENAME_WINDOW};
use crate::state::ProcessedFile;
use crate::watcher::{WatchEvent, WatchHandle, WatchSource};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Receives every processed file, success or failure
pub type FileProcessedCallback = Arc<dyn Fn(&Path, &ProcessedFile) + Send + Sync>;

/// Delays used by the watch pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTiming {
    /// Wait after a create before the file is read
    pub settle_delay: Duration,
    /// A create this soon after a delete in the same directory is a rename
    pub rename_window: Duration,
    /// How often stale rename entries are purged
    pub sweep_interval: Duration,
    /// Creates of a just-delivered path are ignored for this long
    pub quiet_period: Duration,
}

impl Default for WatchTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            rename_window: DEFAULT_RENAME_WINDOW,
            sweep_interval: Duration::from_secs(60),
            quiet_period: Duration::from_secs(2),
        }
    }
}

struct ActiveWatch {
    root: PathBuf,
    _handle: Box<dyn WatchHandle>,
    dispatcher: JoinHandle<()>,
    stop: broadcast::Sender<()>,
    pending: Arc<Mutex<Vec<PathBuf>>>,
}

impl ActiveWatch {
    fn shutdown(self) {
        // no receivers just means nothing was settling
        let _ = self.stop.send(());
        self.dispatcher.abort();
    }
}

/// Owns every live watch and the shared rename state
pub struct WatchManager {
    source: Arc<dyn WatchSource>,
    optimizer: Arc<dyn Optimize>,
    clock: Arc<dyn Clock>,
    timing: WatchTiming,
    renames: Arc<Mutex<RenameFilter>>,
    watchers: HashMap<String, ActiveWatch>,
    sweeper: Option<JoinHandle<()>>,
}

impl WatchManager {
    pub fn new(source: Arc<dyn WatchSource>, optimizer: Arc<dyn Optimize>) -> Self {
        Self {
            source,
            optimizer,
            clock: Arc::new(TokioClock),
            timing: WatchTiming::default(),
            renames: Arc::new(Mutex::new(RenameFilter::default())),
            watchers: HashMap::new(),
            sweeper: None,
        }
    }

    pub fn with_timing(mut self, timing: WatchTiming) -> Self {
        self.timing = timing;
        self.renames = Arc::new(Mutex::new(RenameFilter::new(timing.rename_window)));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timing(&self) -> WatchTiming {
        self.timing
    }

    pub fn optimizer(&self) -> &Arc<dyn Optimize> {
        &self.optimizer
    }

    /// Watch `config.path` recursively, replacing any watch with the same id.
    ///
    /// Files already in the directory are left alone; only later events count.
    pub async fn start_watching(
        &mut self,
        config: &WatchConfig,
        resize_ratio: Option<f64>,
        callback: FileProcessedCallback,
    ) -> Result<()> {
        self.stop_watching(&config.id);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = self.source.watch(&config.path, events_tx)?;

        let (stop, _) = broadcast::channel(1);
        let pending = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Arc::new(Dispatcher {
            watch_id: config.id.clone(),
            root: config.path.clone(),
            pattern: FilePattern::compile(&config.pattern),
            resize_ratio,
            settle_delay: self.timing.settle_delay,
            quiet_period: self.timing.quiet_period,
            optimizer: Arc::clone(&self.optimizer),
            clock: Arc::clone(&self.clock),
            renames: Arc::clone(&self.renames),
            stop: stop.clone(),
            pending: Arc::clone(&pending),
            delivered: Mutex::new(HashMap::new()),
            callback,
        });

        let task = tokio::spawn(dispatcher.run(events_rx));
        self.watchers.insert(
            config.id.clone(),
            ActiveWatch {
                root: config.path.clone(),
                _handle: handle,
                dispatcher: task,
                stop,
                pending,
            },
        );
        self.ensure_sweeper();

        info!("👀 Watching {} for {} ({})", config.path.display(), config.pattern, config.id);
        Ok(())
    }

    /// Tear down the watch for `id`; no-op if there is none
    pub fn stop_watching(&mut self, id: &str) {
        if let Some(watch) = self.watchers.remove(id) {
            info!("Stopped watching {} ({})", watch.root.display(), id);
            watch.shutdown();
        }
    }

    /// Tear down every watch and forget all rename state
    pub async fn stop_all_watching(&mut self) {
        for (id, watch) in self.watchers.drain() {
            debug!("Stopping watch {}", id);
            watch.shutdown();
        }
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        self.renames.lock().await.clear();
    }

    /// Ids of the live watches, sorted
    pub fn get_active_watchers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.watchers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_watching(&self, id: &str) -> bool {
        self.watchers.contains_key(id)
    }

    /// Files of watch `id` that were detected but not yet delivered
    pub async fn pending_files(&self, id: &str) -> Vec<PathBuf> {
        match self.watchers.get(id) {
            Some(watch) => watch.pending.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Directories with an unmatched delete
    pub async fn rename_entries(&self) -> usize {
        self.renames.lock().await.len()
    }

    fn ensure_sweeper(&mut self) {
        if self.sweeper.is_some() {
            return;
        }

        let renames = Arc::clone(&self.renames);
        let clock = Arc::clone(&self.clock);
        let interval = self.timing.sweep_interval;
        self.sweeper = Some(tokio::spawn(async move {
            loop {
                clock.sleep(interval).await;
                let removed = renames.lock().await.sweep(clock.now());
                if removed > 0 {
                    debug!("Purged {} stale rename entries", removed);
                }
            }
        }));
    }
}

impl Drop for WatchManager {
    fn drop(&mut self) {
        for (_, watch) in self.watchers.drain() {
            watch.shutdown();
        }
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// Event loop of one watch
struct Dispatcher {
    watch_id: String,
    root: PathBuf,
    pattern: FilePattern,
    resize_ratio: Option<f64>,
    settle_delay: Duration,
    quiet_period: Duration,
    optimizer: Arc<dyn Optimize>,
    clock: Arc<dyn Clock>,
    renames: Arc<Mutex<RenameFilter>>,
    stop: broadcast::Sender<()>,
    pending: Arc<Mutex<Vec<PathBuf>>>,
    /// Delivered paths and when their quiet period ends
    delivered: Mutex<HashMap<PathBuf, Instant>>,
    callback: FileProcessedCallback,
}

impl Dispatcher {
    async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<WatchEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                WatchEvent::Created(path) => self.on_created(path).await,
                WatchEvent::Deleted(path) => self.on_deleted(path).await,
                WatchEvent::Error(message) => {
                    error!("Watcher error for {}: {}", self.root.display(), message);
                }
            }
        }
        debug!("Event stream closed for watch {}", self.watch_id);
    }

    fn is_candidate(&self, path: &Path) -> bool {
        !FileManager::is_hidden(&self.root, path) && self.pattern.matches(path)
    }

    fn directory_of<'p>(&'p self, path: &'p Path) -> &'p Path {
        path.parent().unwrap_or(&self.root)
    }

    async fn on_deleted(&self, path: PathBuf) {
        if !self.is_candidate(&path) {
            return;
        }
        debug!("Deleted: {}", path.display());
        self.renames
            .lock()
            .await
            .record_unlink(self.directory_of(&path), self.clock.now());
    }

    async fn on_created(self: &Arc<Self>, path: PathBuf) {
        if !self.is_candidate(&path) {
            debug!("Ignoring {}", path.display());
            return;
        }

        if self.is_own_rewrite(&path).await {
            debug!("Ignoring rewrite of {}", path.display());
            return;
        }

        let likely_rename = self
            .renames
            .lock()
            .await
            .is_likely_rename(self.directory_of(&path), self.clock.now());
        if likely_rename {
            info!("Skipping likely rename: {}", path.display());
            return;
        }

        info!("📁 New file detected: {}", path.display());
        self.pending.lock().await.push(path.clone());
        let stop = self.stop.subscribe();
        tokio::spawn(Arc::clone(self).process(path, stop));
    }

    async fn process(self: Arc<Self>, path: PathBuf, mut stop: broadcast::Receiver<()>) {
        tokio::select! {
            _ = self.clock.sleep(self.settle_delay) => {}
            _ = stop.recv() => {
                debug!("Watch stopped before {} settled", path.display());
                self.forget(&path).await;
                return;
            }
        }

        if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
            debug!("Watch stopped, not processing {}", path.display());
            self.forget(&path).await;
            return;
        }

        let optimizer = Arc::clone(&self.optimizer);
        let resize_ratio = self.resize_ratio;
        let task_path = path.clone();
        let attempt = tokio::spawn(async move { optimizer.optimize(&task_path, resize_ratio).await });

        let result = match attempt.await {
            Ok(result) => result,
            Err(e) => {
                error!("Optimizer task failed for {}: {}", path.display(), e);
                ProcessedFile::failed(path.clone(), format!("Optimizer task failed: {}", e))
            }
        };

        self.quiet(&path).await;
        self.forget(&path).await;
        if !result.success {
            warn!("Processing failed: {}", path.display());
        }
        (self.callback)(&path, &result);
    }

    /// In flight, or delivered within the quiet period
    async fn is_own_rewrite(&self, path: &Path) -> bool {
        if self.pending.lock().await.iter().any(|pending_path| pending_path == path) {
            return true;
        }

        let now = self.clock.now();
        let mut delivered = self.delivered.lock().await;
        delivered.retain(|_, until| *until > now);
        delivered.contains_key(path)
    }

    async fn quiet(&self, path: &Path) {
        let until = self.clock.now() + self.quiet_period;
        self.delivered.lock().await.insert(path.to_path_buf(), until);
    }

    async fn forget(&self, path: &Path) {
        let mut pending = self.pending.lock().await;
        if let Some(index) = pending.iter().position(|pending_path| pending_path == path) {
            pending.remove(index);
        }
    }
}

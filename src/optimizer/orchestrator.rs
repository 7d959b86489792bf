//! # Orchestrator
//!
//! Owns the configuration and keeps the live watches in line with it.
//!
//! ## Responsibilities:
//! - Starts one watch per enabled `WatchConfig`; a directory that cannot be
//!   watched is logged and skipped
//! - Saves every configuration change, then restarts the affected watches
//! - Turns each processed file into a notification and session statistics
//! - Serves the processing history
//!
//! Configuration edits work whether or not watching has started. Before
//! `start` they only touch the file.

use crate::config::{AppConfig, ConfigStore, WatchConfig};
use crate::notifier::{Notification, Notifier, TracingNotifier};
use crate::optimizer::{ImageOptimizer, Optimize};
use crate::pattern::FilePattern;
use crate::progress::OptimizationStats;
use crate::state::{ProcessLog, ProcessedFile};
use crate::watch_manager::{FileProcessedCallback, WatchManager};
use crate::watcher::{NotifySource, WatchSource};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

pub struct Orchestrator {
    store: ConfigStore,
    config: AppConfig,
    watches: WatchManager,
    log: ProcessLog,
    notifier: Arc<dyn Notifier>,
    notifications: Arc<AtomicBool>,
    stats: Arc<Mutex<OptimizationStats>>,
    running: bool,
}

impl Orchestrator {
    /// Production wiring: config and log in `config_dir`, native watches, pngquant
    pub async fn load(config_dir: &Path) -> Result<Self> {
        let store = ConfigStore::new(config_dir);
        let config = store.load().await?;
        let optimizer = Arc::new(ImageOptimizer::new(config_dir));
        let log = optimizer.log().clone();

        Ok(Self::with_parts(
            store,
            config,
            WatchManager::new(Arc::new(NotifySource), optimizer),
            log,
            Arc::new(TracingNotifier),
        ))
    }

    pub fn with_parts(
        store: ConfigStore,
        config: AppConfig,
        watches: WatchManager,
        log: ProcessLog,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let notifications = Arc::new(AtomicBool::new(config.notifications));
        Self {
            store,
            config,
            watches,
            log,
            notifier,
            notifications,
            stats: Arc::new(Mutex::new(OptimizationStats::new())),
            running: false,
        }
    }

    /// Shorthand for tests and embedders that bring their own source and optimizer
    pub fn with_components(
        store: ConfigStore,
        config: AppConfig,
        source: Arc<dyn WatchSource>,
        optimizer: Arc<dyn Optimize>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let log = ProcessLog::in_dir(store.dir());
        Self::with_parts(store, config, WatchManager::new(source, optimizer), log, notifier)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Watch every enabled directory; returns how many watches are live
    pub async fn start(&mut self) -> usize {
        self.running = true;
        let enabled: Vec<WatchConfig> = self.config.enabled_watches().cloned().collect();
        for watch in &enabled {
            self.start_watch(watch).await;
        }
        let active = self.watches.get_active_watchers().len();
        info!("🚀 Watching {} of {} directories", active, self.config.watch_configs.len());
        active
    }

    /// Stop and start every enabled watch with the current settings
    pub async fn restart_watching(&mut self) -> usize {
        self.watches.stop_all_watching().await;
        self.start().await
    }

    /// Stop all watches and hand back the session statistics
    pub async fn shutdown(&mut self) -> OptimizationStats {
        self.watches.stop_all_watching().await;
        self.running = false;
        info!("Stopped watching");
        self.stats()
    }

    /// Whether the optimizer behind the watches can find its tools
    pub async fn tools_ready(&self) -> bool {
        self.watches.optimizer().is_ready().await
    }

    pub fn active_watchers(&self) -> Vec<String> {
        self.watches.get_active_watchers()
    }

    pub async fn pending_files(&self, id: &str) -> Vec<PathBuf> {
        self.watches.pending_files(id).await
    }

    pub fn stats(&self) -> OptimizationStats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Most recent attempts, newest first
    pub async fn history(&self, limit: usize) -> Vec<ProcessedFile> {
        match self.log.recent(limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not read processing log {}: {}", self.log.path().display(), e);
                Vec::new()
            }
        }
    }

    /// Add `path` to the watch list and start watching it
    pub async fn add_watch_dir(&mut self, path: &Path, pattern: Option<&str>) -> Result<WatchConfig> {
        let path = tokio::fs::canonicalize(path)
            .await
            .with_context(|| format!("Directory does not exist: {}", path.display()))?;
        if !path.is_dir() {
            return Err(anyhow::anyhow!("Not a directory: {}", path.display()));
        }
        if let Some(existing) = self.config.watch_configs.iter().find(|watch| watch.path == path) {
            return Err(anyhow::anyhow!("Already watching {} ({})", path.display(), existing.id));
        }

        let mut watch = WatchConfig::new(&path);
        if let Some(pattern) = pattern {
            warn_if_invalid(pattern);
            watch.pattern = pattern.to_string();
        }

        let mut next = self.config.clone();
        next.watch_configs.push(watch.clone());
        self.commit(next).await?;

        if self.running {
            self.start_watch(&watch).await;
        }
        self.announce(Notification::directory_added(&watch.path));
        Ok(watch)
    }

    /// Remove a watch by id; returns the removed entry
    pub async fn remove_watch(&mut self, id: &str) -> Result<WatchConfig> {
        let mut next = self.config.clone();
        let index = next
            .watch_configs
            .iter()
            .position(|watch| watch.id == id)
            .with_context(|| format!("No watch with id {}", id))?;
        let removed = next.watch_configs.remove(index);
        self.commit(next).await?;

        self.watches.stop_watching(id);
        self.announce(Notification::directory_removed(&removed.path));
        Ok(removed)
    }

    pub async fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let mut next = self.config.clone();
        let watch = next
            .find_watch_mut(id)
            .with_context(|| format!("No watch with id {}", id))?;
        watch.enabled = enabled;
        let watch = watch.clone();
        self.commit(next).await?;

        if !self.running {
            return Ok(());
        }
        if enabled {
            self.start_watch(&watch).await;
        } else {
            self.watches.stop_watching(id);
        }
        Ok(())
    }

    pub async fn set_pattern(&mut self, id: &str, pattern: &str) -> Result<()> {
        warn_if_invalid(pattern);
        let mut next = self.config.clone();
        let watch = next
            .find_watch_mut(id)
            .with_context(|| format!("No watch with id {}", id))?;
        watch.pattern = pattern.to_string();
        let watch = watch.clone();
        self.commit(next).await?;

        if self.running && watch.enabled {
            self.start_watch(&watch).await;
        }
        Ok(())
    }

    /// `None` turns resizing off
    pub async fn set_resize_ratio(&mut self, ratio: Option<f64>) -> Result<()> {
        let mut next = self.config.clone();
        next.resize_ratio = ratio;
        self.commit(next).await?;

        if self.running {
            self.restart_watching().await;
        }
        Ok(())
    }

    pub async fn set_notifications(&mut self, enabled: bool) -> Result<()> {
        let mut next = self.config.clone();
        next.notifications = enabled;
        self.commit(next).await?;
        self.notifications.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    pub async fn set_auto_start(&mut self, enabled: bool) -> Result<()> {
        let mut next = self.config.clone();
        next.auto_start = enabled;
        self.commit(next).await
    }

    async fn commit(&mut self, next: AppConfig) -> Result<()> {
        next.validate()?;
        self.store.save(&next).await?;
        self.config = next;
        Ok(())
    }

    async fn start_watch(&mut self, watch: &WatchConfig) {
        let callback = self.result_callback();
        if let Err(e) = self
            .watches
            .start_watching(watch, self.config.resize_ratio, callback)
            .await
        {
            error!("Failed to watch {} ({}): {}", watch.path.display(), watch.id, e);
        }
    }

    fn announce(&self, notification: Notification) {
        if self.notifications.load(Ordering::Relaxed) {
            self.notifier.notify(&notification.title, &notification.body);
        }
    }

    fn result_callback(&self) -> FileProcessedCallback {
        let notifier = Arc::clone(&self.notifier);
        let notifications = Arc::clone(&self.notifications);
        let stats = Arc::clone(&self.stats);

        Arc::new(move |path: &Path, result: &ProcessedFile| {
            match stats.lock() {
                Ok(mut stats) => stats.record(result),
                Err(poisoned) => poisoned.into_inner().record(result),
            }
            if notifications.load(Ordering::Relaxed) {
                let notification = Notification::for_result(path, result);
                notifier.notify(&notification.title, &notification.body);
            }
        })
    }
}

fn warn_if_invalid(pattern: &str) {
    if !FilePattern::compile(pattern).is_valid() {
        warn!("Pattern {} never matches anything", pattern);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HOME_WATCHER_ID;
    use crate::notifier::RecordingNotifier;
    use crate::watch_manager::tests::{advance, created, FakeOptimizer, FakeSource};
    use tempfile::TempDir;

    struct Harness {
        _temp_dir: TempDir,
        root: PathBuf,
        source: Arc<FakeSource>,
        optimizer: Arc<FakeOptimizer>,
        notifier: Arc<RecordingNotifier>,
        orchestrator: Orchestrator,
    }

    fn harness(config: impl FnOnce(&Path) -> AppConfig) -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("shots");
        std::fs::create_dir(&root).unwrap();
        let root = std::fs::canonicalize(&root).unwrap();

        let source = Arc::new(FakeSource::default());
        let optimizer = Arc::new(FakeOptimizer::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let store = ConfigStore::new(temp_dir.path().join("config"));
        let orchestrator = Orchestrator::with_components(
            store,
            config(&root),
            source.clone(),
            optimizer.clone(),
            notifier.clone(),
        );

        Harness {
            _temp_dir: temp_dir,
            root,
            source,
            optimizer,
            notifier,
            orchestrator,
        }
    }

    fn one_watch(root: &Path) -> AppConfig {
        AppConfig {
            watch_configs: vec![WatchConfig::with_id("w1", root)],
            ..AppConfig::default()
        }
    }

    fn root_str(h: &Harness) -> String {
        h.root.display().to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_watches_enabled_only() {
        let mut h = harness(|root| {
            let mut disabled = WatchConfig::with_id("off", "/elsewhere");
            disabled.enabled = false;
            AppConfig {
                watch_configs: vec![WatchConfig::with_id("w1", root), disabled],
                ..AppConfig::default()
            }
        });

        assert_eq!(h.orchestrator.start().await, 1);
        assert_eq!(h.orchestrator.active_watchers(), vec!["w1".to_string()]);
        assert!(h.orchestrator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_directory_does_not_stop_others() {
        let temp_dir = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::failing(&["/gone"]));
        let config = AppConfig {
            watch_configs: vec![WatchConfig::with_id("gone", "/gone"), WatchConfig::with_id("ok", "/shots")],
            ..AppConfig::default()
        };
        let mut orchestrator = Orchestrator::with_components(
            ConfigStore::new(temp_dir.path()),
            config,
            source,
            Arc::new(FakeOptimizer::default()),
            Arc::new(RecordingNotifier::new()),
        );

        assert_eq!(orchestrator.start().await, 1);
        assert_eq!(orchestrator.active_watchers(), vec!["ok".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processed_file_notifies_and_counts() {
        let mut h = harness(one_watch);
        h.orchestrator.start().await;

        let file = h.root.join("shot.png");
        h.source.emit(&root_str(&h), created(&file.display().to_string()));
        advance(1500).await;

        let notifications = h.notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Image optimized");
        assert_eq!(notifications[0].body, "Compression 60% : shot.png");

        let stats = h.orchestrator.shutdown().await;
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.total_bytes_saved, 600);
        assert!(h.orchestrator.active_watchers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_can_be_turned_off() {
        let mut h = harness(one_watch);
        h.orchestrator.start().await;
        h.orchestrator.set_notifications(false).await.unwrap();

        h.source.emit(&root_str(&h), created(&h.root.join("a.png").display().to_string()));
        advance(1500).await;

        assert!(h.notifier.notifications().is_empty());
        assert_eq!(h.orchestrator.stats().files_processed, 1);
        assert!(!h.orchestrator.config().notifications);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_ratio_change_restarts_watches() {
        let mut h = harness(one_watch);
        h.orchestrator.start().await;
        h.orchestrator.set_resize_ratio(Some(0.5)).await.unwrap();
        assert_eq!(h.source.live(), 1);

        let file = h.root.join("a.png");
        h.source.emit(&root_str(&h), created(&file.display().to_string()));
        advance(1500).await;

        assert_eq!(h.optimizer.calls(), vec![(file, Some(0.5))]);
        assert!(h.orchestrator.set_resize_ratio(Some(4.0)).await.is_err());
        assert_eq!(h.orchestrator.config().resize_ratio, Some(0.5));
    }

    #[tokio::test]
    async fn test_add_and_remove_directory() {
        let mut h = harness(|_| AppConfig {
            watch_configs: vec![WatchConfig::with_id(DEFAULT_HOME_WATCHER_ID, "/home/someone")],
            ..AppConfig::default()
        });
        h.orchestrator.start().await;

        let added = h.orchestrator.add_watch_dir(&h.root, Some(r"^Screen.*\.png$")).await.unwrap();
        assert_eq!(added.path, h.root);
        assert!(h.orchestrator.active_watchers().contains(&added.id));
        assert!(h.orchestrator.add_watch_dir(&h.root, None).await.is_err());

        let saved = ConfigStore::new(h.orchestrator.store.dir()).load().await.unwrap();
        assert_eq!(saved.watch_configs.len(), 2);

        let removed = h.orchestrator.remove_watch(&added.id).await.unwrap();
        assert_eq!(removed.id, added.id);
        assert!(!h.orchestrator.active_watchers().contains(&added.id));
        assert!(h.orchestrator.remove_watch(&added.id).await.is_err());

        let bodies: Vec<String> = h.notifier.notifications().into_iter().map(|n| n.body).collect();
        assert!(bodies[0].starts_with("Directory added to watch list"));
        assert!(bodies[1].starts_with("Directory removed from watch list"));
    }

    #[tokio::test]
    async fn test_add_missing_directory_fails() {
        let mut h = harness(one_watch);
        let missing = h.root.join("nope");
        assert!(h.orchestrator.add_watch_dir(&missing, None).await.is_err());
        assert_eq!(h.orchestrator.config().watch_configs.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_disable_and_pattern() {
        let mut h = harness(one_watch);
        h.orchestrator.start().await;

        h.orchestrator.set_enabled("w1", false).await.unwrap();
        assert!(h.orchestrator.active_watchers().is_empty());
        h.orchestrator.set_enabled("w1", true).await.unwrap();
        assert_eq!(h.orchestrator.active_watchers(), vec!["w1".to_string()]);
        assert!(h.orchestrator.set_enabled("missing", true).await.is_err());

        h.orchestrator.set_pattern("w1", r"^keep.*").await.unwrap();
        assert_eq!(h.source.live(), 1);
        h.source.emit(&root_str(&h), created(&h.root.join("drop.png").display().to_string()));
        h.source.emit(&root_str(&h), created(&h.root.join("keep.jpg").display().to_string()));
        advance(1500).await;

        assert_eq!(h.optimizer.calls().len(), 1);
        assert_eq!(h.orchestrator.config().find_watch("w1").unwrap().pattern, "^keep.*");
    }

    #[tokio::test]
    async fn test_edits_before_start_only_touch_config() {
        let mut h = harness(one_watch);
        h.orchestrator.set_enabled("w1", false).await.unwrap();
        h.orchestrator.set_auto_start(false).await.unwrap();
        assert!(h.orchestrator.active_watchers().is_empty());

        let saved = ConfigStore::new(h.orchestrator.store.dir()).load().await.unwrap();
        assert!(!saved.watch_configs[0].enabled);
        assert!(!saved.auto_start);
    }

    #[tokio::test]
    async fn test_history_reads_log() {
        let h = harness(one_watch);
        assert!(h.orchestrator.history(10).await.is_empty());

        let log = ProcessLog::in_dir(h.orchestrator.store.dir());
        log.append(&ProcessedFile::failed("/x/a.png", "boom")).await.unwrap();
        log.append(&ProcessedFile::failed("/x/b.png", "boom")).await.unwrap();

        let history = h.orchestrator.history(1).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].file_path, PathBuf::from("/x/b.png"));
    }

    #[tokio::test]
    async fn test_tools_ready_asks_the_watch_optimizer() {
        use crate::image_processor::PNGQUANT;
        use crate::tool_resolver::ToolPathResolver;

        let h = harness(one_watch);
        assert!(h.orchestrator.tools_ready().await);

        let temp_dir = TempDir::new().unwrap();
        let without_tool = Arc::new(ImageOptimizer::with_parts(
            ToolPathResolver::with_candidates(PNGQUANT, Vec::new()),
            ProcessLog::in_dir(temp_dir.path()),
        ));
        let orchestrator = Orchestrator::with_components(
            ConfigStore::new(temp_dir.path()),
            AppConfig::default(),
            Arc::new(FakeSource::default()),
            without_tool,
            Arc::new(RecordingNotifier::new()),
        );
        assert!(!orchestrator.tools_ready().await);
    }
}

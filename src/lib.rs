//! # Karuku Library
//!
//! Watches directories for new PNG files and shrinks them in place with
//! pngquant, optionally downscaling them first.
//!
//! ## Module layout:
//! - `config`: `config.json` loading, migration, first-run defaults
//! - `error`: error types of the processing pipeline
//! - `state`: `ProcessedFile` and the append-only processing log
//! - `watcher`: native watch backend and the `WatchEvent` boundary
//! - `watch_manager`: one live watch per config, settle delay, cancellation
//! - `rename_filter`: delete + create correlation per directory
//! - `pattern`: `*.png` and regular expression file patterns
//! - `optimizer`: per-file pipeline and the orchestrator on top of it
//! - `image_processor` / `resize`: pngquant invocation and Lanczos3 downscale
//! - `tool_resolver` / `platform`: finding external tools on disk
//! - `installer`: package manager driven installation of pngquant
//! - `notifier` / `progress`: notifications and session statistics
//!
//! ## Usage:
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use karuku::{ConfigStore, Orchestrator};
//!
//! let dir = ConfigStore::default_dir()?;
//! let mut orchestrator = Orchestrator::load(&dir).await?;
//! orchestrator.start().await;
//! tokio::signal::ctrl_c().await?;
//! println!("{}", orchestrator.shutdown().await.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod installer;
pub mod notifier;
pub mod optimizer;
pub mod pattern;
pub mod platform;
pub mod progress;
pub mod rename_filter;
pub mod resize;
pub mod state;
pub mod tool_resolver;
pub mod utils;
pub mod watch_manager;
pub mod watcher;

pub use config::{AppConfig, ConfigStore, WatchConfig};
pub use error::OptimizeError;
pub use optimizer::{ImageOptimizer, Optimize, Orchestrator};
pub use state::{ProcessLog, ProcessedFile};
pub use watch_manager::{WatchManager, WatchTiming};

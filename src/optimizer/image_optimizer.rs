//! # Image Optimizer
//!
//! Error boundary for one file: resize (optional) → compress → measure → log.
//!
//! ## Pipeline per file:
//! 1. Size probe: `originalSize`. Failure here ends the attempt
//! 2. Resize, when a ratio is configured. Never fatal: an undecodable image is
//!    skipped with a warning, any other resize failure becomes a `warning` note
//! 3. Compression with pngquant. A missing tool fails the attempt with an
//!    install hint
//! 4. Size probe: `optimizedSize`, `success = true`
//! 5. Exactly one record appended to the processing log, success or not
//!
//! `optimize_image` never returns an error; every failure ends up in the
//! returned `ProcessedFile`. A failed log write is reported through `tracing`
//! and does not change the result.

use crate::error::Result;
use crate::file_manager::FileManager;
use crate::image_processor::{ImageProcessor, PNGQUANT};
use crate::resize;
use crate::state::{ProcessLog, ProcessedFile};
use crate::tool_resolver::ToolPathResolver;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Anything that can run the per-file optimization chain
pub trait Optimize: Send + Sync {
    fn optimize<'a>(&'a self, file_path: &'a Path, resize_ratio: Option<f64>) -> BoxFuture<'a, ProcessedFile>;

    /// Whether the external tools the pipeline needs can be found
    fn is_ready(&self) -> BoxFuture<'_, bool>;
}

/// Resize + pngquant pipeline with a durable log
#[derive(Debug)]
pub struct ImageOptimizer {
    processor: ImageProcessor,
    log: ProcessLog,
}

impl ImageOptimizer {
    /// Optimizer logging to `<config_dir>/processed_files.log`, full pngquant search
    pub fn new(config_dir: &Path) -> Self {
        Self::with_parts(ToolPathResolver::new(PNGQUANT), ProcessLog::in_dir(config_dir))
    }

    pub fn with_parts(resolver: ToolPathResolver, log: ProcessLog) -> Self {
        Self {
            processor: ImageProcessor::new(resolver),
            log,
        }
    }

    pub fn log(&self) -> &ProcessLog {
        &self.log
    }

    /// Run the whole chain on one file and log the attempt
    pub async fn optimize_image(&self, file_path: &Path, resize_ratio: Option<f64>) -> ProcessedFile {
        let mut result = ProcessedFile::started(file_path);

        match self.run_pipeline(file_path, resize_ratio, &mut result).await {
            Ok(()) => {
                result.success = true;
                let resize_info = match (result.original_dimensions, result.resized_dimensions) {
                    (Some(from), Some(to)) if result.was_resized() => format!(" (resized from {} to {})", from, to),
                    _ => String::new(),
                };
                info!(
                    "Optimized: {} ({} → {} bytes){}",
                    file_path.display(),
                    result.original_size,
                    result.optimized_size,
                    resize_info
                );
            }
            Err(e) => {
                result.optimized_size = 0;
                result.error = Some(e.to_string());
                error!("Failed to optimize: {}: {}", file_path.display(), e);
            }
        }

        if let Err(e) = self.log.append(&result).await {
            error!("Failed to write log {}: {}", self.log.path().display(), e);
        }

        result
    }

    async fn run_pipeline(&self, file_path: &Path, resize_ratio: Option<f64>, result: &mut ProcessedFile) -> Result<()> {
        result.original_size = FileManager::file_size(file_path).await?;

        if let Some(ratio) = resize_ratio {
            match resize::resize_in_place(file_path, ratio).await {
                Ok(Some(outcome)) => {
                    result.resized = Some(true);
                    result.original_dimensions = Some(outcome.original);
                    result.resized_dimensions = Some(outcome.resized);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("❌ Failed to resize image: {}: {}", file_path.display(), e);
                    result.warning = Some(e.to_string());
                }
            }
        }

        self.processor.compress(file_path).await?;

        result.optimized_size = FileManager::file_size(file_path).await?;
        Ok(())
    }

    /// Up to `limit` most recent attempts, newest first; empty on any read failure
    pub async fn get_processed_files(&self, limit: usize) -> Vec<ProcessedFile> {
        match self.log.recent(limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not read processing log {}: {}", self.log.path().display(), e);
                Vec::new()
            }
        }
    }

    pub async fn check_pngquant_available(&self) -> bool {
        self.processor.resolver().is_available().await
    }

    pub async fn pngquant_path(&self) -> Option<PathBuf> {
        self.processor.resolver().resolve().await
    }

    pub async fn tools_report(&self) -> String {
        self.processor.resolver().report().await
    }
}

impl Optimize for ImageOptimizer {
    fn optimize<'a>(&'a self, file_path: &'a Path, resize_ratio: Option<f64>) -> BoxFuture<'a, ProcessedFile> {
        self.optimize_image(file_path, resize_ratio).boxed()
    }

    fn is_ready(&self) -> BoxFuture<'_, bool> {
        self.check_pngquant_available().boxed()
    }
}

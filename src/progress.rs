//! # Progress and Statistics Module
//!
//! ## Components:
//! - `OptimizationStats`: cumulative numbers for one watch session
//! - `ProgressManager`: terminal progress bar for long-running work such as
//!   the dependency installer
//!
//! ## Tracked statistics:
//! - **files_processed**: every attempt delivered by the watch manager
//! - **files_optimized**: attempts that ended with `success`
//! - **files_resized**: successful attempts that also ran the resize step
//! - **errors**: failed attempts
//! - **total_original_size** / **total_bytes_saved**: over successful attempts
//!
//! ## Example:
//! ```rust
//! use karuku::progress::OptimizationStats;
//! use karuku::state::ProcessedFile;
//!
//! let mut stats = OptimizationStats::new();
//! let mut result = ProcessedFile::started("/tmp/shot.png");
//! result.success = true;
//! result.original_size = 2048;
//! result.optimized_size = 1024;
//! stats.record(&result);
//! assert_eq!(stats.total_bytes_saved, 1024);
//! ```

use crate::file_manager::FileManager;
use crate::state::ProcessedFile;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal progress bar measured in percent
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Bar from 0 to 100
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Move to `percent` (when known) and show `message`
    pub fn update(&self, percent: Option<u8>, message: &str) {
        if let Some(percent) = percent {
            self.bar.set_position(u64::from(percent.min(100)));
        }
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Stop and leave the bar where it is
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics tracker for optimization results
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptimizationStats {
    pub files_processed: usize,
    pub files_optimized: usize,
    pub files_resized: usize,
    pub errors: usize,
    pub total_bytes_saved: u64,
    pub total_original_size: u64,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one delivered attempt
    pub fn record(&mut self, result: &ProcessedFile) {
        self.files_processed += 1;
        if !result.success {
            self.errors += 1;
            return;
        }

        self.files_optimized += 1;
        if result.was_resized() {
            self.files_resized += 1;
        }
        self.total_original_size += result.original_size;
        self.total_bytes_saved += result.original_size.saturating_sub(result.optimized_size);
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Optimized: {} | Resized: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.files_processed,
            self.files_optimized,
            self.files_resized,
            self.errors,
            FileManager::format_size(self.total_bytes_saved),
            self.overall_reduction_percent()
        )
    }
}

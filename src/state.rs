//! # Processing History Module
//!
//! Durable, append-only record of every optimization attempt.
//!
//! ## Responsibilities:
//! - Defines `ProcessedFile`, the outcome of one attempt (success or failure)
//! - Appends one JSON line per attempt to `processed_files.log`
//! - Reads the history back, newest first, tolerating damaged lines
//!
//! ## Persistence strategy:
//! - One JSON object per line, never rewritten
//! - Each append is a single write on an `O_APPEND` descriptor, so concurrent
//!   attempts cannot interleave inside a line
//! - Unknown fields are ignored and optional fields may be missing: older
//!   records predate the resize fields
//!
//! ## Example log line:
//! ```json
//! {"timestamp":"2024-05-01T09:12:44.120Z","filePath":"/Users/me/Desktop/shot.png","originalSize":500000,"optimizedSize":120000,"success":true}
//! ```

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pixel dimensions of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Outcome of one optimization attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFile {
    /// Instant processing began
    pub timestamp: DateTime<Utc>,
    pub file_path: PathBuf,
    pub original_size: u64,
    /// Only meaningful when `success` is true
    pub optimized_size: u64,
    pub success: bool,
    /// Present iff `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal note, e.g. a resize that could not be applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_dimensions: Option<Dimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resized_dimensions: Option<Dimensions>,
}

impl ProcessedFile {
    /// Fresh record for an attempt starting now
    pub fn started(file_path: impl Into<PathBuf>) -> Self {
        Self {
            timestamp: Utc::now(),
            file_path: file_path.into(),
            original_size: 0,
            optimized_size: 0,
            success: false,
            error: None,
            warning: None,
            resized: None,
            original_dimensions: None,
            resized_dimensions: None,
        }
    }

    /// Failed record with zero sizes
    pub fn failed(file_path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::started(file_path)
        }
    }

    /// Percentage of bytes removed, 0 when nothing meaningful can be said
    pub fn reduction_percent(&self) -> f64 {
        if self.success {
            crate::file_manager::FileManager::calculate_reduction(self.original_size, self.optimized_size)
        } else {
            0.0
        }
    }

    pub fn was_resized(&self) -> bool {
        self.resized.unwrap_or(false)
    }
}

/// Append-only JSON-lines log of processing attempts
#[derive(Debug, Clone)]
pub struct ProcessLog {
    path: PathBuf,
}

impl ProcessLog {
    pub const FILE_NAME: &'static str = "processed_files.log";

    /// Log stored as `processed_files.log` inside `config_dir`
    pub fn in_dir(config_dir: &Path) -> Self {
        Self::new(config_dir.join(Self::FILE_NAME))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record without touching earlier ones
    pub async fn append(&self, record: &ProcessedFile) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            // one write per record
            file.write_all(line.as_bytes())?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?
    }

    /// Up to `limit` most recent records, newest first.
    ///
    /// A missing log is an empty history. Lines that fail to parse are skipped.
    pub async fn recent(&self, limit: usize) -> Result<Vec<ProcessedFile>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records: Vec<ProcessedFile> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping unreadable log line: {}", e);
                    None
                }
            })
            .collect();

        let skip = records.len().saturating_sub(limit);
        records.drain(..skip);
        records.reverse();
        Ok(records)
    }
}

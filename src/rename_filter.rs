//! # Rename Filter Module
//!
//! Suppresses re-processing when a save-as or atomic rename shows up as a
//! delete followed by a create in the same directory.
//!
//! State is one timestamp per directory: the most recent delete of a
//! pattern-matching file. A create arriving strictly less than `window` after
//! that delete is judged a rename and consumes the entry. Entries older than
//! twice the window are garbage and removed by `sweep`.
//!
//! Known limitation: an unrelated file deleted and a different one created in
//! the same directory inside the window are also treated as a rename.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_RENAME_WINDOW: Duration = Duration::from_millis(1000);

/// Per-directory delete/create correlation
#[derive(Debug)]
pub struct RenameFilter {
    window: Duration,
    last_unlink: HashMap<PathBuf, Instant>,
}

impl RenameFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_unlink: HashMap::new(),
        }
    }

    /// Remember a delete in `dir`, replacing any earlier one
    pub fn record_unlink(&mut self, dir: &Path, now: Instant) {
        self.last_unlink.insert(dir.to_path_buf(), now);
    }

    /// True if a create in `dir` at `now` looks like the second half of a rename
    pub fn is_likely_rename(&mut self, dir: &Path, now: Instant) -> bool {
        let Some(&unlinked_at) = self.last_unlink.get(dir) else {
            return false;
        };

        if now.saturating_duration_since(unlinked_at) < self.window {
            self.last_unlink.remove(dir);
            true
        } else {
            false
        }
    }

    /// Drop entries older than twice the window; returns how many were removed
    pub fn sweep(&mut self, now: Instant) -> usize {
        let max_age = self.window * 2;
        let before = self.last_unlink.len();
        self.last_unlink
            .retain(|_, unlinked_at| now.saturating_duration_since(*unlinked_at) <= max_age);
        before - self.last_unlink.len()
    }

    pub fn clear(&mut self) {
        self.last_unlink.clear();
    }

    pub fn len(&self) -> usize {
        self.last_unlink.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_unlink.is_empty()
    }
}

impl Default for RenameFilter {
    fn default() -> Self {
        Self::new(DEFAULT_RENAME_WINDOW)
    }
}

//! User-facing notifications for processed files.
//!
//! The desktop notification primitive is an outside collaborator; `Notifier`
//! is the seam. `TracingNotifier` is the default and writes notifications to
//! the log.

use crate::state::ProcessedFile;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Title and body of one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    /// Message shown after a file has been processed
    pub fn for_result(file_path: &Path, result: &ProcessedFile) -> Self {
        let name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.display().to_string());

        if !result.success {
            return Self {
                title: "Optimization failed".to_string(),
                body: format!("Failed to optimize: {}", name),
            };
        }

        let body = if result.original_size > 0 && result.optimized_size > 0 {
            let resize_info = match (result.original_dimensions, result.resized_dimensions) {
                (Some(from), Some(to)) if result.was_resized() => format!(" ({} → {})", from, to),
                _ => String::new(),
            };
            format!(
                "Compression {}%{} : {}",
                result.reduction_percent().round() as i64,
                resize_info,
                name
            )
        } else {
            format!("Successfully optimized: {}", name)
        };

        Self {
            title: "Image optimized".to_string(),
            body,
        }
    }

    pub fn directory_added(path: &Path) -> Self {
        Self {
            title: "Karuku".to_string(),
            body: format!("Directory added to watch list: {}", path.display()),
        }
    }

    pub fn directory_removed(path: &Path) -> Self {
        Self {
            title: "Karuku".to_string(),
            body: format!("Directory removed from watch list: {}", path.display()),
        }
    }
}

/// Displays notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the log at INFO level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!("🔔 {}: {}", title, body);
    }
}

/// Keeps every notification in memory, for tests and diagnostics
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        let notification = Notification {
            title: title.to_string(),
            body: body.to_string(),
        };
        match self.seen.lock() {
            Ok(mut seen) => seen.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Dimensions;

    #[test]
    fn test_success_with_sizes() {
        let path = Path::new("/shots/Screen Shot.png");
        let mut result = ProcessedFile::started(path);
        result.success = true;
        result.original_size = 500_000;
        result.optimized_size = 120_000;

        let notification = Notification::for_result(path, &result);
        assert_eq!(notification.title, "Image optimized");
        assert_eq!(notification.body, "Compression 76% : Screen Shot.png");

        result.resized = Some(true);
        result.original_dimensions = Some(Dimensions::new(1000, 800));
        result.resized_dimensions = Some(Dimensions::new(500, 400));
        let notification = Notification::for_result(path, &result);
        assert_eq!(notification.body, "Compression 76% (1000x800 → 500x400) : Screen Shot.png");
    }

    #[test]
    fn test_success_without_sizes() {
        let path = Path::new("/shots/empty.png");
        let mut result = ProcessedFile::started(path);
        result.success = true;

        let notification = Notification::for_result(path, &result);
        assert_eq!(notification.body, "Successfully optimized: empty.png");
    }

    #[test]
    fn test_failure() {
        let path = Path::new("/shots/a.png");
        let result = ProcessedFile::failed(path, "boom");

        let notification = Notification::for_result(path, &result);
        assert_eq!(notification.title, "Optimization failed");
        assert_eq!(notification.body, "Failed to optimize: a.png");
    }

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.notify("t", "b");
        TracingNotifier.notify("t", "b");
        assert_eq!(
            notifier.notifications(),
            vec![Notification {
                title: "t".to_string(),
                body: "b".to_string()
            }]
        );
    }
}

//! # File Management Module
//!
//! Small file operations shared by the optimizer and the watcher.
//!
//! ## Operations:
//! - `file_size()`: current byte length of a file
//! - `temp_sibling()`: `<file>.tmp` next to the original
//! - `replace_file()`: atomic rename of a rendered file over the original
//! - `is_hidden()`: dot-prefixed path component below a watch root
//! - `format_size()` / `calculate_reduction()`: human-readable reporting

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Manages file operations
pub struct FileManager;

impl FileManager {
    /// Byte length of a file
    pub async fn file_size(path: &Path) -> std::io::Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Temporary path in the same directory, so a rename stays on one filesystem
    pub fn temp_sibling(path: &Path) -> PathBuf {
        let mut name: OsString = path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Atomically move `rendered` over `original`
    pub async fn replace_file(original: &Path, rendered: &Path) -> std::io::Result<()> {
        fs::rename(rendered, original).await
    }

    /// True when any component of `path` below `root` starts with a dot
    pub fn is_hidden(root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        relative.components().any(|component| match component {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        })
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hidden_components() {
        let root = Path::new("/home/me/Desktop");
        assert!(FileManager::is_hidden(root, Path::new("/home/me/Desktop/.shot.png")));
        assert!(FileManager::is_hidden(root, Path::new("/home/me/Desktop/.cache/shot.png")));
        assert!(!FileManager::is_hidden(root, Path::new("/home/me/Desktop/shot.png")));
        assert!(!FileManager::is_hidden(root, Path::new("/home/me/Desktop/a.b/shot.png")));
    }

    #[test]
    fn test_hidden_root_does_not_hide_children() {
        let root = Path::new("/home/me/.screenshots");
        assert!(!FileManager::is_hidden(root, Path::new("/home/me/.screenshots/shot.png")));
    }

    #[test]
    fn test_temp_sibling() {
        assert_eq!(
            FileManager::temp_sibling(Path::new("/d/shot.png")),
            PathBuf::from("/d/shot.png.tmp")
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
        assert_eq!(FileManager::calculate_reduction(200, 50), 75.0);
    }

    #[tokio::test]
    async fn test_replace_file() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("shot.png");
        let rendered = FileManager::temp_sibling(&original);
        fs::write(&original, b"old").await.unwrap();
        fs::write(&rendered, b"new!").await.unwrap();

        FileManager::replace_file(&original, &rendered).await.unwrap();

        assert_eq!(fs::read(&original).await.unwrap(), b"new!");
        assert!(!rendered.exists());
        assert_eq!(FileManager::file_size(&original).await.unwrap(), 4);
    }
}

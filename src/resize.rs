//! # Image Resize Module
//!
//! Optional in-place downscale that runs before compression.
//!
//! ## Behaviour
//! - **Linear ratio**: width and height are both multiplied by the ratio and
//!   floored, never below 1 pixel
//! - **Never enlarges**: ratios outside `(0, 1]` are rejected
//! - **High quality**: Lanczos3 resampling
//! - **Atomic replace**: the result is rendered to `<file>.tmp` in the source
//!   format and renamed over the original
//! - **Non-fatal**: callers treat every failure here as a note, not an error
//!
//! Decoding and encoding are CPU bound and run on the blocking pool.

use crate::error::{OptimizeError, Result};
use crate::file_manager::FileManager;
use crate::state::Dimensions;
use image::imageops::FilterType;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a resize that actually ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeOutcome {
    pub original: Dimensions,
    pub resized: Dimensions,
}

/// Target dimensions for `ratio`, floored and clamped to at least 1x1
pub fn scaled_dimensions(original: Dimensions, ratio: f64) -> Dimensions {
    let scale = |value: u32| ((value as f64 * ratio).floor() as u32).clamp(1, value.max(1));
    Dimensions::new(scale(original.width), scale(original.height))
}

/// Pixel dimensions, or `None` when the header cannot be decoded
pub async fn read_dimensions(path: &Path) -> Option<Dimensions> {
    let path = path.to_path_buf();
    let probed = tokio::task::spawn_blocking(move || image::image_dimensions(&path)).await;

    match probed {
        Ok(Ok((width, height))) if width > 0 && height > 0 => Some(Dimensions::new(width, height)),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            debug!("Could not read dimensions: {}", e);
            None
        }
        Err(e) => {
            debug!("Dimension probe task failed: {}", e);
            None
        }
    }
}

/// Downscale `path` in place by `ratio`.
///
/// Returns `Ok(None)` when the dimensions are unavailable (the resize is
/// skipped with a warning), `Ok(Some(_))` when the file was replaced, and
/// `Err` for any other failure. On error the temporary file is removed.
pub async fn resize_in_place(path: &Path, ratio: f64) -> Result<Option<ResizeOutcome>> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(OptimizeError::Resize(format!(
            "ratio {} is outside (0, 1]",
            ratio
        )));
    }

    info!("🔍 Analyzing image for resize: {} (ratio: {})", path.display(), ratio);
    let Some(original) = read_dimensions(path).await else {
        warn!("⚠️ Unable to get image dimensions, skipping resize: {}", path.display());
        return Ok(None);
    };

    let target = scaled_dimensions(original, ratio);
    info!(
        "📐 Resizing image: {} → {} ({}%)",
        original,
        target,
        (ratio * 100.0).round()
    );

    let temp_path = FileManager::temp_sibling(path);
    if let Err(e) = render(path, &temp_path, target).await {
        if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
            debug!("No temporary file to clean up at {}: {}", temp_path.display(), cleanup);
        }
        return Err(e);
    }

    if let Err(e) = FileManager::replace_file(path, &temp_path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    info!("✅ Image resized successfully: {}", path.display());
    Ok(Some(ResizeOutcome {
        original,
        resized: target,
    }))
}

async fn render(source: &Path, destination: &Path, target: Dimensions) -> Result<()> {
    let source: PathBuf = source.to_path_buf();
    let destination: PathBuf = destination.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let format = ImageFormat::from_path(&source).unwrap_or(ImageFormat::Png);
        let img = image::open(&source)?;
        let resized = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
        resized.save_with_format(&destination, format)?;
        Ok(())
    })
    .await
    .map_err(|e| OptimizeError::Resize(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_scaled_dimensions_floor() {
        let scaled = scaled_dimensions(Dimensions::new(1000, 800), 0.5);
        assert_eq!(scaled, Dimensions::new(500, 400));

        let scaled = scaled_dimensions(Dimensions::new(1001, 799), 0.5);
        assert_eq!(scaled, Dimensions::new(500, 399));

        let scaled = scaled_dimensions(Dimensions::new(3, 1), 0.25);
        assert_eq!(scaled, Dimensions::new(1, 1));

        let scaled = scaled_dimensions(Dimensions::new(640, 480), 1.0);
        assert_eq!(scaled, Dimensions::new(640, 480));
    }

    #[tokio::test]
    async fn test_resize_in_place_halves_png() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shot.png");
        write_png(&path, 1000, 800);

        let outcome = resize_in_place(&path, 0.5).await.unwrap().unwrap();

        assert_eq!(outcome.original, Dimensions::new(1000, 800));
        assert_eq!(outcome.resized, Dimensions::new(500, 400));
        assert_eq!(read_dimensions(&path).await, Some(Dimensions::new(500, 400)));
        assert!(!FileManager::temp_sibling(&path).exists());
    }

    #[tokio::test]
    async fn test_undecodable_file_skips_resize() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("not-really.png");
        tokio::fs::write(&path, b"definitely not a png").await.unwrap();

        let outcome = resize_in_place(&path, 0.5).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"definitely not a png");
    }

    #[tokio::test]
    async fn test_out_of_range_ratio_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shot.png");
        write_png(&path, 10, 10);

        assert!(resize_in_place(&path, 1.5).await.is_err());
        assert!(resize_in_place(&path, 0.0).await.is_err());
        assert_eq!(read_dimensions(&path).await, Some(Dimensions::new(10, 10)));
    }

    #[tokio::test]
    async fn test_truncated_body_cleans_up_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("truncated.png");
        write_png(&path, 64, 64);
        // header survives, pixel data does not
        let bytes = tokio::fs::read(&path).await.unwrap();
        tokio::fs::write(&path, &bytes[..40]).await.unwrap();

        let result = resize_in_place(&path, 0.5).await;
        if read_dimensions(&path).await.is_some() {
            assert!(result.is_err());
        }
        assert!(!FileManager::temp_sibling(&path).exists());
    }
}

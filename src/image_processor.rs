//! # Image Processing Module
//!
//! Lossy in-place compression through the external `pngquant` tool.
//!
//! ## Invocation
//! ```text
//! pngquant --force --ext .png <file>
//! ```
//! `--force` allows overwriting and `--ext .png` makes the output name equal to
//! the input name, so the file is replaced by its compressed version.
//!
//! ## Outcome
//! - exit code 0: success
//! - non-zero exit whose output says the image is "already" at the target
//!   quality: success, the file is left as it was
//! - anything else: `OptimizeError::Compression` with the tool's stderr
//! - tool not found: `OptimizeError::MissingDependency` with an install hint.
//!   Compression is never emulated in-process.

use crate::args;
use crate::error::{OptimizeError, Result};
use crate::tool_resolver::ToolPathResolver;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

pub const PNGQUANT: &str = "pngquant";

/// Runs the external compression tool against single files
#[derive(Debug)]
pub struct ImageProcessor {
    resolver: ToolPathResolver,
}

impl ImageProcessor {
    pub fn new(resolver: ToolPathResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ToolPathResolver {
        &self.resolver
    }

    /// Compress `path` in place
    pub async fn compress(&self, path: &Path) -> Result<()> {
        let tool = self
            .resolver
            .resolve()
            .await
            .ok_or_else(|| OptimizeError::MissingDependency(self.resolver.missing_message()))?;

        let args = args!["--force", "--ext", ".png"];
        info!("Executing: {} {} {}", tool.display(), args.join(" "), path.display());

        let output = Command::new(&tool).args(&args).arg(path).output().await?;
        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains("already") || stderr.contains("already") {
            debug!("{} left {} unchanged: {}", PNGQUANT, path.display(), stderr.trim());
            return Ok(());
        }

        Err(OptimizeError::Compression(format!(
            "{} exited with {}: {}",
            self.resolver.tool_name(),
            output.status,
            stderr.trim()
        )))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Executable shell script standing in for pngquant
    #[cfg(unix)]
    pub(crate) fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("pngquant");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo 3.0.3; exit 0; fi\nfor last in \"$@\"; do :; done\n{}\n",
            body
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let processor = ImageProcessor::new(ToolPathResolver::with_candidates(PNGQUANT, Vec::new()));
        let err = processor.compress(Path::new("/tmp/a.png")).await.unwrap_err();
        assert!(matches!(err, OptimizeError::MissingDependency(_)));
        assert!(err.to_string().contains("install"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compresses_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let tool = fake_tool(temp_dir.path(), "head -c 1200 /dev/zero > \"$last\"");
        let file = temp_dir.path().join("shot.png");
        tokio::fs::write(&file, vec![1u8; 5000]).await.unwrap();

        let processor = ImageProcessor::new(ToolPathResolver::with_candidates(PNGQUANT, vec![tool]));
        processor.compress(&file).await.unwrap();

        assert_eq!(tokio::fs::metadata(&file).await.unwrap().len(), 1200);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_already_optimized_counts_as_success() {
        let temp_dir = TempDir::new().unwrap();
        let tool = fake_tool(
            temp_dir.path(),
            "echo \"$last: image already optimized\" >&2; exit 98",
        );
        let file = temp_dir.path().join("shot.png");
        tokio::fs::write(&file, b"png").await.unwrap();

        let processor = ImageProcessor::new(ToolPathResolver::with_candidates(PNGQUANT, vec![tool]));
        processor.compress(&file).await.unwrap();
        assert_eq!(tokio::fs::read(&file).await.unwrap(), b"png");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_failure_carries_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let tool = fake_tool(temp_dir.path(), "echo 'error: not a PNG file' >&2; exit 15");
        let file = temp_dir.path().join("shot.png");
        tokio::fs::write(&file, b"jpeg bytes").await.unwrap();

        let processor = ImageProcessor::new(ToolPathResolver::with_candidates(PNGQUANT, vec![tool]));
        let err = processor.compress(&file).await.unwrap_err();
        assert!(matches!(err, OptimizeError::Compression(_)));
        assert!(err.to_string().contains("not a PNG file"));
    }
}

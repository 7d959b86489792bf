//! # Tool Path Resolver
//!
//! Finds the external compression tool on disk.
//!
//! Search order:
//! 1. The bare command name, relying on PATH
//! 2. Common installation prefixes for the host OS/architecture
//! 3. The platform locator command (`which` / `where`)
//! 4. The package manager prefix query (`brew --prefix <tool>`)
//!
//! Every candidate is probed with `<tool> --version`. The first hit is cached
//! for the lifetime of the resolver; a miss is not cached, so a later install
//! is picked up on the next attempt.

use crate::platform::Platform;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Locates and caches the path of one external tool
#[derive(Debug)]
pub struct ToolPathResolver {
    tool: String,
    platform: Platform,
    /// Explicit candidates tried in order before the system lookups
    candidates: Vec<PathBuf>,
    use_locator: bool,
    use_package_manager: bool,
    cached: Mutex<Option<PathBuf>>,
}

impl ToolPathResolver {
    /// Resolver using the full platform search order
    pub fn new(tool: &str) -> Self {
        let platform = Platform::current();
        let mut candidates = vec![PathBuf::from(platform.executable_name(tool))];
        candidates.extend(platform.common_install_paths(tool));

        Self {
            tool: tool.to_string(),
            platform,
            candidates,
            use_locator: true,
            use_package_manager: true,
            cached: Mutex::new(None),
        }
    }

    /// Resolver restricted to the given candidates, no system lookups
    pub fn with_candidates(tool: &str, candidates: Vec<PathBuf>) -> Self {
        Self {
            tool: tool.to_string(),
            platform: Platform::current(),
            candidates,
            use_locator: false,
            use_package_manager: false,
            cached: Mutex::new(None),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool
    }

    /// Path of the tool, probing the system only until the first success
    pub async fn resolve(&self) -> Option<PathBuf> {
        let mut cached = self.cached.lock().await;
        if let Some(path) = cached.as_ref() {
            return Some(path.clone());
        }

        let found = self.search().await;
        if let Some(ref path) = found {
            info!("Found {} at: {}", self.tool, path.display());
            *cached = Some(path.clone());
        }
        found
    }

    pub async fn is_available(&self) -> bool {
        self.resolve().await.is_some()
    }

    /// Error text telling the user how to install the tool
    pub fn missing_message(&self) -> String {
        format!(
            "{} not found. Please install {} using: {}",
            self.tool,
            self.tool,
            self.platform.install_instructions(&self.tool)
        )
    }

    /// Human-readable availability report
    pub async fn report(&self) -> String {
        let mut report = format!("Platform: {}\n", self.platform);
        match self.resolve().await {
            Some(path) => report.push_str(&format!("  ✅ {} -> {}\n", self.tool, path.display())),
            None => report.push_str(&format!(
                "  ❌ {} (install with: {})\n",
                self.tool,
                self.platform.install_instructions(&self.tool)
            )),
        }
        report
    }

    async fn search(&self) -> Option<PathBuf> {
        for candidate in &self.candidates {
            if Self::probe(candidate).await {
                return Some(candidate.clone());
            }
        }

        if self.use_locator {
            if let Some(path) = self.locate_with_which().await {
                return Some(path);
            }
        }

        if self.use_package_manager {
            if let Some(path) = self.locate_with_package_manager().await {
                return Some(path);
            }
        }

        debug!("{} not found in any known location", self.tool);
        None
    }

    /// True when `<candidate> --version` runs and exits successfully
    async fn probe(candidate: &Path) -> bool {
        match Command::new(candidate).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!("Probe of {} failed: {}", candidate.display(), e);
                false
            }
        }
    }

    async fn locate_with_which(&self) -> Option<PathBuf> {
        let output = Command::new(self.platform.which_command())
            .arg(self.platform.executable_name(&self.tool))
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let found = stdout.lines().next()?.trim();
        if found.is_empty() {
            return None;
        }
        Some(PathBuf::from(found))
    }

    async fn locate_with_package_manager(&self) -> Option<PathBuf> {
        let manager = self.platform.package_manager()?;
        let output = Command::new(manager)
            .args(["--prefix", self.tool.as_str()])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let prefix = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if prefix.is_empty() {
            return None;
        }
        let candidate = PathBuf::from(prefix)
            .join("bin")
            .join(self.platform.executable_name(&self.tool));
        Self::probe(&candidate).await.then_some(candidate)
    }
}

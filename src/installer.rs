//! # Dependency Installer
//!
//! Installs the compression tool through the system package manager.
//!
//! ## Stages:
//! 1. `checking`: package manager present? tool already installed?
//! 2. `updating`: refresh package metadata; failure here is only a warning
//! 3. `installing`: run the install command, killed after 5 minutes
//! 4. `verifying`: search for the tool again
//! 5. `completed` or `error`
//!
//! Every stage is reported to the caller's callback. The outcome is always an
//! `InstallationResult`, never an error.

use crate::args;
use crate::platform::Platform;
use crate::tool_resolver::ToolPathResolver;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStage {
    Checking,
    Updating,
    Installing,
    Verifying,
    Completed,
    Error,
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Checking => "checking",
            Self::Updating => "updating",
            Self::Installing => "installing",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallProgress {
    pub stage: InstallStage,
    pub message: String,
    /// Percent complete, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl InstallationResult {
    fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: None,
        }
    }

    fn failed(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: Some(details.into()),
        }
    }
}

pub type InstallProgressCallback = Arc<dyn Fn(&InstallProgress) + Send + Sync>;

/// Package manager commands for one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub manager: PathBuf,
    pub update_args: Vec<String>,
    pub install_args: Vec<String>,
}

impl InstallPlan {
    /// Homebrew on macOS, apt-get on Linux, nothing elsewhere
    pub fn for_platform(platform: &Platform, tool: &str) -> Option<Self> {
        match platform.os {
            "macos" => Some(Self {
                manager: PathBuf::from("brew"),
                update_args: args!["update"],
                install_args: args!["install", tool],
            }),
            "linux" => Some(Self {
                manager: PathBuf::from("apt-get"),
                update_args: args!["update"],
                install_args: args!["install", "-y", tool],
            }),
            _ => None,
        }
    }

    pub fn manager_name(&self) -> String {
        self.manager
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.manager.display().to_string())
    }
}

/// Captured output of a finished package manager run
struct RunOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Runs an `InstallPlan` and reports progress
pub struct Installer {
    plan: Option<InstallPlan>,
    resolver: ToolPathResolver,
    install_timeout: Duration,
    update_timeout: Duration,
    on_progress: Option<InstallProgressCallback>,
}

impl Installer {
    /// Installer for `tool` on the current platform
    pub fn for_tool(tool: &str) -> Self {
        Self::new(
            InstallPlan::for_platform(&Platform::current(), tool),
            ToolPathResolver::new(tool),
        )
    }

    pub fn new(plan: Option<InstallPlan>, resolver: ToolPathResolver) -> Self {
        Self {
            plan,
            resolver,
            install_timeout: INSTALL_TIMEOUT,
            update_timeout: UPDATE_TIMEOUT,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, callback: InstallProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_timeouts(mut self, install: Duration, update: Duration) -> Self {
        self.install_timeout = install;
        self.update_timeout = update;
        self
    }

    /// Manual steps, for when automatic installation is not possible
    pub fn manual_steps(&self) -> Vec<String> {
        let tool = self.resolver.tool_name();
        vec![
            format!("1. Install {}:", tool),
            format!("   {}", Platform::current().install_instructions(tool)),
            "2. Verify the installation:".to_string(),
            format!("   {} --version", tool),
            "3. Restart karuku".to_string(),
        ]
    }

    pub async fn install(&self) -> InstallationResult {
        let tool = self.resolver.tool_name().to_string();
        info!("Starting {} installation", tool);

        let Some(plan) = self.plan.as_ref() else {
            let details = self.manual_steps().join("\n");
            self.report(InstallStage::Error, "No supported package manager on this platform", None);
            return InstallationResult::failed("Automatic installation is not supported", details);
        };
        let manager = plan.manager_name();

        self.report(InstallStage::Checking, "Checking system environment...", Some(10));
        if !self.manager_available(plan).await {
            self.report(InstallStage::Error, &format!("{} is not installed", manager), None);
            return InstallationResult::failed(
                format!("{} is not installed", manager),
                format!("Install {} first, then run the installer again", manager),
            );
        }

        self.report(
            InstallStage::Checking,
            &format!("Checking if {} is already installed...", tool),
            Some(20),
        );
        if self.resolver.is_available().await {
            self.report(InstallStage::Completed, &format!("{} is already installed", tool), Some(100));
            return InstallationResult::succeeded(format!("{} is already installed!", tool));
        }

        self.report(InstallStage::Updating, &format!("Updating {}...", manager), Some(30));
        match self.run(plan, &plan.update_args, self.update_timeout).await {
            Ok(output) if output.success => debug!("{} update finished", manager),
            Ok(output) => warn!("{} update failed, continuing: {}", manager, output.stderr.trim()),
            Err(e) => warn!("{} update failed, continuing: {}", manager, e),
        }

        self.report(InstallStage::Installing, &format!("Installing {}...", tool), Some(50));
        let output = match self.run(plan, &plan.install_args, self.install_timeout).await {
            Ok(output) => output,
            Err(e) => return self.fail(e),
        };
        let already_installed = output.stdout.contains("already installed") || output.stderr.contains("already installed");
        if !output.success && !already_installed {
            let code = output
                .code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let details = [output.stderr.trim(), output.stdout.trim()]
                .into_iter()
                .find(|text| !text.is_empty())
                .unwrap_or("No additional details available");
            return self.fail(format!("Installation failed with exit code {}\n{}", code, details));
        }

        self.report(InstallStage::Verifying, "Verifying installation...", Some(90));
        if !self.resolver.is_available().await {
            return self.fail(format!(
                "Installation verification failed - {} not found after installation",
                tool
            ));
        }

        self.report(InstallStage::Completed, "Installation completed successfully!", Some(100));
        info!("{} installed", tool);
        InstallationResult::succeeded(format!("{} has been successfully installed!", tool))
    }

    fn fail(&self, details: String) -> InstallationResult {
        warn!("Installation failed: {}", details);
        self.report(InstallStage::Error, &format!("Installation failed: {}", details), None);
        InstallationResult::failed("Installation failed", details)
    }

    fn report(&self, stage: InstallStage, message: &str, progress: Option<u8>) {
        debug!("[{}] {}", stage, message);
        if let Some(callback) = &self.on_progress {
            callback(&InstallProgress {
                stage,
                message: message.to_string(),
                progress,
            });
        }
    }

    async fn manager_available(&self, plan: &InstallPlan) -> bool {
        match Command::new(&plan.manager).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!("{} probe failed: {}", plan.manager.display(), e);
                false
            }
        }
    }

    /// Run the package manager; the child is killed if `limit` elapses
    async fn run(&self, plan: &InstallPlan, args: &[String], limit: Duration) -> Result<RunOutput, String> {
        let child = Command::new(&plan.manager)
            .args(args)
            .env("HOMEBREW_NO_AUTO_UPDATE", "1")
            .env("HOMEBREW_NO_INSTALL_CLEANUP", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start {}: {}", plan.manager.display(), e))?;

        // dropping the wait future drops the child, which kills it
        match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(RunOutput {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(format!("{} failed: {}", plan.manager.display(), e)),
            Err(_) => Err(format!("Installation timed out after {} seconds", limit.as_secs())),
        }
    }
}

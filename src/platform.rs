//! # Platform-specific utilities
//!
//! Where external tools usually live on each OS, how to look them up, and
//! how to tell the user to install them.

use std::path::PathBuf;

/// Platform-specific lookup rules for external tools
#[derive(Debug, Clone, Copy)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl Platform {
    /// The platform this binary was built for
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }

    /// Executable file name (`.exe` on Windows)
    pub fn executable_name(&self, tool: &str) -> String {
        if self.os == "windows" {
            format!("{}.exe", tool)
        } else {
            tool.to_string()
        }
    }

    /// Command used to locate a program on PATH
    pub fn which_command(&self) -> &'static str {
        if self.os == "windows" {
            "where"
        } else {
            "which"
        }
    }

    /// Package manager that can report an install prefix, if any
    pub fn package_manager(&self) -> Option<&'static str> {
        match self.os {
            "macos" | "linux" => Some("brew"),
            _ => None,
        }
    }

    /// Common installation locations, most likely first
    pub fn common_install_paths(&self, tool: &str) -> Vec<PathBuf> {
        let exe = self.executable_name(tool);
        let dirs: Vec<PathBuf> = match self.os {
            "macos" => {
                let mut dirs = vec![
                    PathBuf::from("/usr/local/bin"),
                    PathBuf::from("/opt/homebrew/bin"),
                ];
                // Homebrew on Apple Silicon
                if self.arch == "aarch64" {
                    dirs.swap(0, 1);
                }
                dirs.push(PathBuf::from("/usr/bin"));
                dirs.push(PathBuf::from(format!("/usr/local/opt/{}/bin", tool)));
                dirs
            }
            "linux" => vec![
                PathBuf::from("/usr/bin"),
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/home/linuxbrew/.linuxbrew/bin"),
                PathBuf::from("/snap/bin"),
            ],
            "windows" => vec![
                PathBuf::from(format!("C:\\Program Files\\{}", tool)),
                PathBuf::from(format!("C:\\Program Files (x86)\\{}", tool)),
            ],
            _ => vec![PathBuf::from("/usr/local/bin"), PathBuf::from("/usr/bin")],
        };

        dirs.into_iter().map(|dir| dir.join(&exe)).collect()
    }

    /// Installation instructions for a tool on this platform
    pub fn install_instructions(&self, tool: &str) -> String {
        match self.os {
            "macos" => format!("brew install {}", tool),
            "linux" => format!("sudo apt-get install {}", tool),
            _ => format!("download {} and add it to your PATH", tool),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(os: &'static str, arch: &'static str) -> Platform {
        Platform { os, arch }
    }

    #[test]
    fn test_apple_silicon_prefers_opt_homebrew() {
        let paths = platform("macos", "aarch64").common_install_paths("pngquant");
        assert_eq!(paths[0], PathBuf::from("/opt/homebrew/bin/pngquant"));
        assert!(paths.contains(&PathBuf::from("/usr/local/opt/pngquant/bin/pngquant")));
    }

    #[test]
    fn test_intel_mac_prefers_usr_local() {
        let paths = platform("macos", "x86_64").common_install_paths("pngquant");
        assert_eq!(paths[0], PathBuf::from("/usr/local/bin/pngquant"));
    }

    #[test]
    fn test_windows_names() {
        let windows = platform("windows", "x86_64");
        assert_eq!(windows.executable_name("pngquant"), "pngquant.exe");
        assert_eq!(windows.which_command(), "where");
        assert!(windows.package_manager().is_none());
        assert!(windows
            .common_install_paths("pngquant")
            .iter()
            .all(|p| p.to_string_lossy().ends_with("pngquant.exe")));
    }

    #[test]
    fn test_install_instructions() {
        assert_eq!(platform("macos", "aarch64").install_instructions("pngquant"), "brew install pngquant");
        assert_eq!(platform("linux", "x86_64").install_instructions("pngquant"), "sudo apt-get install pngquant");
    }

    #[test]
    fn test_current_platform() {
        let current = Platform::current();
        assert!(!current.os.is_empty());
        assert!(!current.arch.is_empty());
    }
}

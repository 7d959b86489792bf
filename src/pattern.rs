//! # File Pattern Module
//!
//! Decides whether a file name belongs to a watch.
//!
//! `*.png` is special-cased as a case-insensitive suffix test. Anything else
//! is compiled as a regular expression and tested against the base name only.
//! A pattern that does not compile never matches; the failure is logged once,
//! at compile time, instead of surfacing as an error.

use regex::Regex;
use std::path::Path;
use tracing::error;

pub const PNG_WILDCARD: &str = "*.png";

/// Compiled watch pattern
#[derive(Debug, Clone)]
pub enum FilePattern {
    PngSuffix,
    Regex(Regex),
    Invalid(String),
}

impl FilePattern {
    pub fn compile(pattern: &str) -> Self {
        if pattern == PNG_WILDCARD {
            return Self::PngSuffix;
        }

        match Regex::new(pattern) {
            Ok(regex) => Self::Regex(regex),
            Err(e) => {
                error!("Invalid pattern: {} ({})", pattern, e);
                Self::Invalid(pattern.to_string())
            }
        }
    }

    /// Test the base name of `path`
    pub fn matches(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name() else {
            return false;
        };
        let file_name = file_name.to_string_lossy();

        match self {
            Self::PngSuffix => file_name.to_lowercase().ends_with(".png"),
            Self::Regex(regex) => regex.is_match(&file_name),
            Self::Invalid(_) => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

/// One-shot form of `FilePattern::compile(pattern).matches(path)`
pub fn matches_pattern(path: &Path, pattern: &str) -> bool {
    FilePattern::compile(pattern).matches(path)
}

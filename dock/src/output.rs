//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use dock_core::{Digest, FileStatus, Rename, Starlog};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write output using the configured format.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error and its context chain.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Informational outcome that is not a failure (e.g. nothing to commit).
#[derive(Debug, Serialize)]
pub struct NoticeOutput {
    pub success: bool,
    pub result_code: u8,
    pub notice: String,
}

/// Output for `start` command.
#[derive(Debug, Serialize)]
pub struct StartOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repaired: Vec<String>,
}

/// Output for `beam` command.
#[derive(Debug, Serialize)]
pub struct BeamOutput {
    pub success: bool,
    pub result_code: u8,
    pub beamed: Vec<String>,
    pub unchanged: Vec<String>,
    pub missing: Vec<String>,
    pub ignored: Vec<String>,
}

/// Output for `starlog --create`.
#[derive(Debug, Serialize)]
pub struct StarlogCreateOutput {
    pub success: bool,
    pub result_code: u8,
    pub digest: Digest,
    pub parent: Option<Digest>,
    pub course: String,
    pub recorded: Vec<String>,
    pub skipped: Vec<String>,
    pub renamed: Vec<Rename>,
}

/// A starlog as shown by `starlog --list`.
#[derive(Debug, Clone, Serialize)]
pub struct StarlogInfo {
    pub digest: Digest,
    pub parent: Option<Digest>,
    pub author: String,
    pub email: String,
    pub timestamp: String,
    pub message: String,
    pub files: usize,
}

impl From<(Digest, Starlog)> for StarlogInfo {
    fn from((digest, starlog): (Digest, Starlog)) -> Self {
        Self {
            digest,
            parent: starlog.parent,
            files: starlog.files.len(),
            author: starlog.author,
            email: starlog.email,
            timestamp: starlog.timestamp,
            message: starlog.message,
        }
    }
}

/// Output for `starlog --list`.
#[derive(Debug, Serialize)]
pub struct StarlogListOutput {
    pub success: bool,
    pub result_code: u8,
    pub starlogs: Vec<StarlogInfo>,
}

/// Course information for `course` without arguments.
#[derive(Debug, Clone, Serialize)]
pub struct CourseInfo {
    pub name: String,
    pub latest: Option<Digest>,
    pub current: bool,
}

/// Output for `course` without arguments.
#[derive(Debug, Serialize)]
pub struct CourseListOutput {
    pub success: bool,
    pub result_code: u8,
    pub courses: Vec<CourseInfo>,
}

/// Output for `course NAME`.
#[derive(Debug, Serialize)]
pub struct CourseCreateOutput {
    pub success: bool,
    pub result_code: u8,
    pub name: String,
    pub latest: Option<Digest>,
}

/// Output for `course NAME --delete`.
#[derive(Debug, Serialize)]
pub struct CourseDeleteOutput {
    pub success: bool,
    pub result_code: u8,
    pub name: String,
}

/// Output for `warp` command.
#[derive(Debug, Serialize)]
pub struct WarpOutput {
    pub success: bool,
    pub result_code: u8,
    pub from: String,
    pub to: String,
    pub written: Vec<String>,
    pub removed: Vec<String>,
}

/// One non-clean path for `scan`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub path: String,
    pub status: FileStatus,
}

/// Output for `scan` command.
#[derive(Debug, Serialize)]
pub struct ScanOutput {
    pub success: bool,
    pub result_code: u8,
    pub course: String,
    pub latest: Option<Digest>,
    pub entries: Vec<ScanEntry>,
    pub renames: Vec<Rename>,
}

/// Output for `config` command.
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub success: bool,
    pub result_code: u8,
    pub name: Option<String>,
    pub email: Option<String>,
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error taxonomy and consistent error formatting for segcat.
//!
//! Library code returns `anyhow::Result`, wrapping a [`ConcatError`] so the
//! binary can downcast and pick an exit code. Fatal errors are printed to the
//! operator with possible causes and suggested fixes.

use std::fmt;

use crate::fetch::FetchError;
use crate::manifest::DecodeError;
use crate::sink::SinkError;

/// Hint appended to every formatted error.
pub const DEBUG_HINT: &str = "Re-run with --level debug for the full request log.";

/// Everything that can end a run early.
#[derive(Debug)]
pub enum ConcatError {
    /// Missing or invalid run configuration.
    Config(String),
    /// The output file could not be created.
    SinkOpen(SinkError),
    /// The manifest was gzip but failed to inflate.
    Decode(DecodeError),
    /// The manifest or a segment could not be fetched.
    Fetch(FetchError),
    /// Writing to or closing the output failed.
    Write(std::io::Error),
    /// A shutdown signal arrived mid-run.
    Cancelled,
}

impl ConcatError {
    /// Format this error for the operator.
    pub fn report(&self) -> String {
        match self {
            Self::Config(msg) => ErrorBuilder::new(format!("Invalid configuration: {}", msg))
                .fix("Pass the manifest address: segcat --url <URL>")
                .fix("Pass the output file: segcat --output <PATH>")
                .fix("Or set both in ~/.segcat/config.json")
                .build(),
            Self::SinkOpen(e) => ErrorBuilder::new(e.to_string())
                .cause("Parent directory does not exist")
                .cause("No write permission for the output location")
                .fix("Create the directory or choose another --output path")
                .build(),
            Self::Decode(e) => ErrorBuilder::new(e.to_string())
                .cause("Manifest truncated in transit")
                .cause("Server sent a corrupt compressed body")
                .fix("Retry the download")
                .fix("Use --lenient-decode to treat the manifest as empty")
                .build(),
            Self::Fetch(e) => {
                let mut builder = ErrorBuilder::new(e.to_string());
                builder = match e {
                    FetchError::Status { status: 404, .. } => builder
                        .cause("Segment address resolved against the wrong base")
                        .fix("Try --base directory or --base authority"),
                    FetchError::Timeout { .. } => builder
                        .cause("Server is slow or unreachable")
                        .fix("Raise the limit with --timeout <SECS>"),
                    _ => builder
                        .cause("No network connection")
                        .cause("Server refused the request"),
                };
                builder.build()
            }
            Self::Write(e) => ErrorBuilder::new(format!("Failed to write output: {}", e))
                .cause("Disk full")
                .build(),
            Self::Cancelled => format_simple_error("Cancelled, output is incomplete"),
        }
    }
}

impl fmt::Display for ConcatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::SinkOpen(e) => write!(f, "{}", e),
            Self::Decode(e) => write!(f, "{}", e),
            Self::Fetch(e) => write!(f, "{}", e),
            Self::Write(e) => write!(f, "failed to write output: {}", e),
            Self::Cancelled => write!(f, "run cancelled"),
        }
    }
}

impl std::error::Error for ConcatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SinkOpen(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Fetch(e) => Some(e),
            Self::Write(e) => Some(e),
            Self::Config(_) | Self::Cancelled => None,
        }
    }
}

impl From<SinkError> for ConcatError {
    fn from(e: SinkError) -> Self {
        Self::SinkOpen(e)
    }
}

impl From<DecodeError> for ConcatError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<FetchError> for ConcatError {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

impl From<std::io::Error> for ConcatError {
    fn from(e: std::io::Error) -> Self {
        Self::Write(e)
    }
}

/// Formats an error message with title, causes, fixes, and a debug hint.
///
/// # Example
///
/// ```
/// use segcat::error::format_error;
///
/// let error = format_error(
///     "HTTP 404 fetching http://h/a/seg1.ts",
///     &["Segment address resolved against the wrong base"],
///     &["Try --base directory"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = String::new();

    output.push_str(&format!("[✗] {}\n\n", title));

    if !causes.is_empty() {
        output.push_str("Possible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
        output.push('\n');
    }

    if !fixes.is_empty() {
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
        output.push('\n');
    }

    output.push_str(DEBUG_HINT);

    output
}

/// Formats a simple error with just a title and the debug hint.
pub fn format_simple_error(title: &str) -> String {
    format!("[✗] {}\n\n{}", title, DEBUG_HINT)
}

/// Builder for constructing formatted error messages.
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Add a possible cause.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a suggested fix.
    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pipeline states, options and progress types.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::RunConfig;
use crate::fetch::http::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::utils::{format_bytes, format_rate};

/// Where the pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not started yet
    Idle,
    /// Waiting for the manifest body
    FetchManifest,
    /// Sniffing and inflating the manifest
    DecodeManifest,
    /// Splitting the manifest into entries
    ParseManifest,
    /// Fetching and appending the segment at `index`
    ResolveAndFetchSegment { index: usize },
    /// All segments appended, output closed
    Complete,
    /// Aborted by an unrecoverable error
    Failed,
    /// Aborted by a shutdown signal
    Cancelled,
}

impl PipelineState {
    /// Returns true once the run is over (success or not).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

/// Knobs for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Upper bound for a single fetch, manifest included
    pub fetch_timeout: Duration,
    /// Treat a gzip inflate failure as fatal instead of an empty manifest
    pub strict_decode: bool,
    /// Skip blank manifest lines instead of fetching the bare base address
    pub skip_empty_entries: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            strict_decode: true,
            skip_empty_entries: true,
        }
    }
}

impl From<&RunConfig> for PipelineOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout,
            strict_decode: config.strict_decode,
            skip_empty_entries: config.skip_empty_entries,
        }
    }
}

/// Notification sent after each segment has been appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentProgress {
    /// Zero-based manifest position
    pub index: usize,
    /// Number of manifest entries
    pub total: usize,
    pub url: String,
    /// Size of this segment
    pub bytes: u64,
    /// Bytes written to the output so far
    pub total_bytes: u64,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub output: PathBuf,
    /// Manifest entries parsed
    pub entries: usize,
    /// Segments fetched and appended
    pub segments: usize,
    /// Empty entries that were not fetched
    pub skipped: usize,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// One-line description for the operator.
    pub fn describe(&self) -> String {
        format!(
            "{} segments, {} written to {} in {:.1}s ({})",
            self.segments,
            format_bytes(self.bytes_written),
            self.output.display(),
            self.elapsed.as_secs_f64(),
            format_rate(self.bytes_written, self.elapsed),
        )
    }
}

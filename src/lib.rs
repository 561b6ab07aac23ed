// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! segcat - fetch a segment manifest and concatenate its segments
//!
//! Given the address of a manifest (an m3u-style list of segment
//! references with `#` comments), segcat resolves every entry against the
//! manifest's location, downloads the segments strictly one after another,
//! and appends their raw bytes to a single output file in manifest order.
//!
//! # Core Modules
//!
//! - [`uri`] - Base address computation and segment resolution
//! - [`manifest`] - gzip sniffing and comment-aware manifest parsing
//! - [`fetch`] - The fetch boundary and its HTTP implementation
//! - [`sink`] - Append-only output file
//! - [`pipeline`] - The sequential fetch-and-append state machine
//! - [`config`] - Config file and CLI layering
//! - [`error`] - Error taxonomy and operator-facing formatting

pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod sink;
pub mod uri;
pub mod utils;

pub use config::{Config, RunConfig};
pub use error::{format_error, format_simple_error, ConcatError, ErrorBuilder};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use logging::LogLevel;
pub use manifest::{decode_manifest, parse_manifest, DecodeError, ManifestEntries, ManifestEntry};
pub use pipeline::{Pipeline, PipelineOptions, PipelineState, RunContext, RunSummary, SegmentProgress};
pub use sink::{OutputSink, SinkError};
pub use uri::{BaseMode, BasePolicy, BaseResolutionError, ResolvedSegment};

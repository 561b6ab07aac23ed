// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sequential download pipeline.
//!
//! Fetches the manifest, decodes and parses it, then fetches every segment
//! one at a time and appends it to the output. A segment fetch is only issued
//! after the previous one has been written, so the output order always equals
//! the manifest order and there is never more than one request in flight.
//!
//! # Usage
//!
//! ```rust,no_run
//! use segcat::fetch::HttpFetcher;
//! use segcat::pipeline::{Pipeline, PipelineOptions, RunContext};
//! use segcat::uri::BaseMode;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ctx = RunContext::open("http://h/a/b/index.m3u8", "out.ts", BaseMode::Auto)?;
//! let mut pipeline = Pipeline::new(HttpFetcher::new()?, PipelineOptions::default());
//!
//! let summary = pipeline.run(ctx).await?;
//! println!("{}", summary.describe());
//! # Ok(())
//! # }
//! ```

pub mod types;

use std::borrow::Cow;
use std::future::Future;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use bytes::Bytes;

use crate::config::RunConfig;
use crate::error::ConcatError;
use crate::fetch::{FetchError, Fetcher};
use crate::manifest::{decode_manifest, ManifestEntries, ManifestEntry};
use crate::sink::OutputSink;
use crate::uri::{BaseMode, BasePolicy};

pub use types::{PipelineOptions, PipelineState, RunSummary, SegmentProgress};

/// Everything one run owns. Mutated only by [`Pipeline`] transitions.
#[derive(Debug)]
pub struct RunContext {
    pub manifest_url: String,
    pub policy: BasePolicy,
    pub entries: Vec<ManifestEntry>,
    /// Index of the next entry to fetch
    pub cursor: usize,
    segments: usize,
    skipped: usize,
    sink: Option<OutputSink>,
    started: Instant,
}

impl RunContext {
    /// Open the output and compute the base addresses.
    ///
    /// The output is created here, before any network activity.
    pub fn open(
        manifest_url: impl Into<String>,
        output: impl AsRef<Path>,
        mode: BaseMode,
    ) -> Result<Self, ConcatError> {
        let manifest_url = manifest_url.into();
        let sink = OutputSink::create(output)?;

        let resolution = BasePolicy::resolve(&manifest_url, mode);
        for warning in &resolution.warnings {
            tracing::warn!("{}", warning);
        }
        let policy = resolution.policy;
        match mode {
            BaseMode::Directory => {
                tracing::info!("uri base {}", policy.directory_base.as_deref().unwrap_or(""))
            }
            BaseMode::Authority => {
                tracing::info!("uri base {}", policy.authority_base.as_deref().unwrap_or(""))
            }
            BaseMode::Auto => tracing::info!(
                "uri base {} (root-relative: {})",
                policy.directory_base.as_deref().unwrap_or(""),
                policy.authority_base.as_deref().unwrap_or("")
            ),
        }

        Ok(Self {
            manifest_url,
            policy,
            entries: Vec::new(),
            cursor: 0,
            segments: 0,
            skipped: 0,
            sink: Some(sink),
            started: Instant::now(),
        })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, ConcatError> {
        Self::open(config.url.clone(), &config.output, config.base_mode)
    }

    pub fn bytes_written(&self) -> u64 {
        self.sink.as_ref().map_or(0, OutputSink::bytes_written)
    }

    fn append(&mut self, data: &[u8]) -> Result<u64, ConcatError> {
        let sink = self.sink.as_mut().ok_or_else(|| {
            ConcatError::Write(std::io::Error::new(
                std::io::ErrorKind::Other,
                "output already closed",
            ))
        })?;
        sink.append(data)?;
        Ok(sink.bytes_written())
    }

    /// Close the output and produce the summary.
    fn finish(&mut self) -> Result<RunSummary, ConcatError> {
        let sink = self.sink.take().ok_or_else(|| {
            ConcatError::Write(std::io::Error::new(
                std::io::ErrorKind::Other,
                "output already closed",
            ))
        })?;
        let output = sink.path().to_path_buf();
        let bytes_written = sink.close()?;

        Ok(RunSummary {
            output,
            entries: self.entries.len(),
            segments: self.segments,
            skipped: self.skipped,
            bytes_written,
            elapsed: self.started.elapsed(),
        })
    }

    /// Drop the output without the success-path sync.
    fn abort(&mut self) {
        if let Some(sink) = self.sink.take() {
            tracing::warn!(
                "output {} left incomplete after {} of {} entries",
                sink.path().display(),
                self.cursor,
                self.entries.len()
            );
        }
    }
}

/// Drives one run through its states using a [`Fetcher`].
pub struct Pipeline<F> {
    fetcher: F,
    options: PipelineOptions,
    state: PipelineState,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(fetcher: F, options: PipelineOptions) -> Self {
        Self {
            fetcher,
            options,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run to completion.
    pub async fn run(&mut self, ctx: RunContext) -> Result<RunSummary> {
        self.run_until(ctx, std::future::pending::<()>(), |_| {}).await
    }

    /// Run to completion, calling `progress` after each appended segment.
    pub async fn run_with_progress<P>(&mut self, ctx: RunContext, progress: P) -> Result<RunSummary>
    where
        P: FnMut(&SegmentProgress),
    {
        self.run_until(ctx, std::future::pending::<()>(), progress).await
    }

    /// Run until completion, a fatal error, or `shutdown` resolving.
    ///
    /// The output is closed on every path. On cancellation the in-flight
    /// fetch is dropped and [`ConcatError::Cancelled`] is returned.
    pub async fn run_until<S, P>(
        &mut self,
        mut ctx: RunContext,
        shutdown: S,
        mut progress: P,
    ) -> Result<RunSummary>
    where
        S: Future<Output = ()>,
        P: FnMut(&SegmentProgress),
    {
        let result = {
            let drive = self.drive(&mut ctx, &mut progress);
            tokio::pin!(drive);
            tokio::pin!(shutdown);

            tokio::select! {
                biased;
                result = &mut drive => result,
                _ = &mut shutdown => Err(ConcatError::Cancelled),
            }
        };

        match result {
            Ok(summary) => {
                self.state = PipelineState::Complete;
                tracing::info!("done");
                Ok(summary)
            }
            Err(e) => {
                self.state = match e {
                    ConcatError::Cancelled => PipelineState::Cancelled,
                    _ => PipelineState::Failed,
                };
                ctx.abort();
                Err(e.into())
            }
        }
    }

    async fn drive<P>(&mut self, ctx: &mut RunContext, progress: &mut P) -> Result<RunSummary, ConcatError>
    where
        P: FnMut(&SegmentProgress),
    {
        self.state = PipelineState::FetchManifest;
        let raw = self.fetch(&ctx.manifest_url).await?;
        tracing::debug!("manifest {} is {} bytes", ctx.manifest_url, raw.len());

        self.state = PipelineState::DecodeManifest;
        let decoded = match decode_manifest(&raw) {
            Ok(decoded) => decoded,
            Err(e) if !self.options.strict_decode => {
                tracing::warn!("{}; continuing with an empty manifest", e);
                Cow::Borrowed(&[][..])
            }
            Err(e) => return Err(e.into()),
        };

        self.state = PipelineState::ParseManifest;
        ctx.entries = ManifestEntries::new(&decoded).collect();
        ctx.cursor = 0;
        if ctx.entries.is_empty() {
            tracing::warn!("manifest {} contained no segments", ctx.manifest_url);
        } else {
            tracing::info!("manifest lists {} segments", ctx.entries.len());
        }

        let total = ctx.entries.len();
        while ctx.cursor < total {
            let index = ctx.cursor;
            self.state = PipelineState::ResolveAndFetchSegment { index };

            let entry = &ctx.entries[index];
            if entry.is_empty() && self.options.skip_empty_entries {
                tracing::debug!("skipping empty entry {}", index + 1);
                ctx.skipped += 1;
                ctx.cursor += 1;
                continue;
            }

            let segment = ctx.policy.resolve_entry(entry, index);
            tracing::debug!("fetching {}", segment.url);
            let body = self.fetch(&segment.url).await?;

            let total_bytes = ctx.append(&body)?;
            ctx.segments += 1;
            tracing::info!("downloaded {} {}/{}", body.len(), index + 1, total);

            progress(&SegmentProgress {
                index,
                total,
                url: segment.url,
                bytes: body.len() as u64,
                total_bytes,
            });
            ctx.cursor += 1;
        }

        ctx.finish()
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, ConcatError> {
        let after = self.options.fetch_timeout;
        match tokio::time::timeout(after, self.fetcher.fetch(url)).await {
            Ok(result) => result.map_err(ConcatError::from),
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                after,
            }
            .into()),
        }
    }
}

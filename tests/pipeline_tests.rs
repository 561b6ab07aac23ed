// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pipeline behaviour tests against an in-memory fetcher.
//!
//! The mock fetcher can delay responses, hang forever on chosen addresses,
//! and records how many fetches were in flight at once so ordering and the
//! one-request-at-a-time guarantee can be checked.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use segcat::error::ConcatError;
use segcat::fetch::{FetchError, Fetcher};
use segcat::pipeline::{Pipeline, PipelineOptions, PipelineState, RunContext, SegmentProgress};
use segcat::uri::BaseMode;

const MANIFEST_URL: &str = "http://h/a/b/manifest.m3u";

// =============================================================================
// MOCK FETCHER
// =============================================================================

#[derive(Default)]
struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    hang: Vec<String>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    fn new(manifest: &[u8]) -> Self {
        Self::default().body(MANIFEST_URL, manifest)
    }

    fn body(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }

    fn delayed(mut self, url: &str, body: &[u8], delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self.body(url, body)
    }

    fn hanging(mut self, url: &str) -> Self {
        self.hang.push(url.to_string());
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn segment_requests(&self) -> usize {
        self.requests().iter().filter(|u| u.as_str() != MANIFEST_URL).count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hang.iter().any(|h| h == url) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.bodies
            .get(url)
            .map(|b| Bytes::from(b.clone()))
            .ok_or(FetchError::Status { url: url.to_string(), status: 404 })
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn open(dir: &TempDir, mode: BaseMode) -> (RunContext, std::path::PathBuf) {
    let out = dir.path().join("out.ts");
    let ctx = RunContext::open(MANIFEST_URL, &out, mode).expect("Failed to open output");
    (ctx, out)
}

// =============================================================================
// ORDERING AND CONCURRENCY
// =============================================================================

#[tokio::test]
async fn test_output_is_manifest_order_concatenation() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    // Earlier segments answer slower than later ones.
    let fetcher = MockFetcher::new(b"#EXTM3U\n#EXTINF:4,\ns0.ts\n#EXTINF:4,\ns1.ts\ns2.ts\ns3.ts\n")
        .delayed("http://h/a/b/s0.ts", b"zero-", Duration::from_millis(40))
        .delayed("http://h/a/b/s1.ts", b"one-", Duration::from_millis(30))
        .delayed("http://h/a/b/s2.ts", b"two-", Duration::from_millis(10))
        .body("http://h/a/b/s3.ts", b"three");

    let (ctx, out) = open(&dir, BaseMode::Directory);
    let mut pipeline = Pipeline::new(&fetcher, PipelineOptions::default());
    let summary = pipeline.run(ctx).await.unwrap();

    assert_eq!(std::fs::read(&out).unwrap(), b"zero-one-two-three");
    assert_eq!(summary.segments, 4);
    assert_eq!(summary.bytes_written, 18);
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(
        fetcher.requests(),
        vec![
            MANIFEST_URL,
            "http://h/a/b/s0.ts",
            "http://h/a/b/s1.ts",
            "http://h/a/b/s2.ts",
            "http://h/a/b/s3.ts",
        ]
    );
}

#[tokio::test]
async fn test_progress_reported_per_segment() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let fetcher = MockFetcher::new(b"a.ts\nb.ts")
        .body("http://h/a/b/a.ts", b"AAA")
        .body("http://h/a/b/b.ts", b"BB");

    let (ctx, _out) = open(&dir, BaseMode::Directory);
    let mut pipeline = Pipeline::new(&fetcher, PipelineOptions::default());
    let mut seen: Vec<SegmentProgress> = Vec::new();
    pipeline
        .run_with_progress(ctx, |p| seen.push(p.clone()))
        .await
        .unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!((seen[0].index, seen[0].total, seen[0].bytes, seen[0].total_bytes), (0, 2, 3, 3));
    assert_eq!((seen[1].index, seen[1].total, seen[1].bytes, seen[1].total_bytes), (1, 2, 2, 5));
    assert_eq!(seen[1].url, "http://h/a/b/b.ts");
}

// =============================================================================
// MANIFEST HANDLING
// =============================================================================

#[tokio::test]
async fn test_comment_only_manifest_writes_nothing() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let fetcher = MockFetcher::new(b"#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXT-X-ENDLIST\n");

    let (ctx, out) = open(&dir, BaseMode::Auto);
    let mut pipeline = Pipeline::new(&fetcher, PipelineOptions::default());
    let summary = pipeline.run(ctx).await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Complete);
    assert_eq!(summary.entries, 0);
    assert_eq!(summary.bytes_written, 0);
    assert_eq!(fetcher.segment_requests(), 0);
    assert!(std::fs::read(&out).unwrap().is_empty());
}

#[tokio::test]
async fn test_gzip_manifest_matches_plain() {
    let manifest = b"#EXTM3U\nseg1.ts\n/root.ts\nhttps://cdn/abs.ts";

    let run = |body: Vec<u8>| async move {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let fetcher = MockFetcher::default()
            .body(MANIFEST_URL, &body)
            .body("http://h/a/b/seg1.ts", b"1")
            .body("http://h/root.ts", b"2")
            .body("https://cdn/abs.ts", b"3");
        let (ctx, out) = open(&dir, BaseMode::Auto);
        let mut pipeline = Pipeline::new(&fetcher, PipelineOptions::default());
        pipeline.run(ctx).await.unwrap();
        (fetcher.requests(), std::fs::read(&out).unwrap())
    };

    let plain = run(manifest.to_vec()).await;
    let compressed = run(gzip(manifest)).await;

    assert_eq!(plain, compressed);
    assert_eq!(plain.1, b"123");
}

#[tokio::test]
async fn test_auto_mode_resolution() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let fetcher = MockFetcher::new(b"/seg1.ts\nseg1.ts\n")
        .body("http://h/seg1.ts", b"root-")
        .body("http://h/a/b/seg1.ts", b"dir");

    let (ctx, out) = open(&dir, BaseMode::Auto);
    let mut pipeline = Pipeline::new(&fetcher, PipelineOptions::default());
    pipeline.run(ctx).await.unwrap();

    assert_eq!(std::fs::read(&out).unwrap(), b"root-dir");
}

#[tokio::test]
async fn test_corrupt_gzip_is_fatal_by_default() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut body = gzip(b"seg1.ts\nseg2.ts\nseg3.ts\n");
    let len = body.len();
    body.truncate(len - 4);
    let fetcher = MockFetcher::new(&body);

    let (ctx, _out) = open(&dir, BaseMode::Directory);
    let mut pipeline = Pipeline::new(&fetcher, PipelineOptions::default());
    let err = pipeline.run(ctx).await.unwrap_err();

    assert!(matches!(err.downcast_ref::<ConcatError>(), Some(ConcatError::Decode(_))));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(fetcher.segment_requests(), 0);
}

#[tokio::test]
async fn test_corrupt_gzip_lenient_completes_empty() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut body = gzip(b"seg1.ts\nseg2.ts\nseg3.ts\n");
    let len = body.len();
    body.truncate(len - 4);
    let fetcher = MockFetcher::new(&body);

    let (ctx, out) = open(&dir, BaseMode::Directory);
    let options = PipelineOptions { strict_decode: false, ..Default::default() };
    let mut pipeline = Pipeline::new(&fetcher, options);
    let summary = pipeline.run(ctx).await.unwrap();

    assert_eq!(summary.entries, 0);
    assert_eq!(fetcher.segment_requests(), 0);
    assert!(std::fs::read(&out).unwrap().is_empty());
}

// =============================================================================
// FAILURE PATHS
// =============================================================================

#[tokio::test]
async fn test_manifest_fetch_failure() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let fetcher = MockFetcher::default();

    let (ctx, out) = open(&dir, BaseMode::Auto);
    let mut pipeline = Pipeline::new(&fetcher, PipelineOptions::default());
    let err = pipeline.run(ctx).await.unwrap_err();

    match err.downcast_ref::<ConcatError>() {
        Some(ConcatError::Fetch(e)) => assert_eq!(e.url(), MANIFEST_URL),
        other => panic!("unexpected error: {:?}", other),
    }
    // The output was opened before the fetch and still exists.
    assert!(out.exists());
}

#[tokio::test]
async fn test_hanging_fetch_times_out() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let fetcher = MockFetcher::new(b"a.ts\nb.ts\n")
        .body("http://h/a/b/a.ts", b"A")
        .hanging("http://h/a/b/b.ts");

    let (ctx, out) = open(&dir, BaseMode::Directory);
    let options = PipelineOptions {
        fetch_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(&fetcher, options);
    let err = pipeline.run(ctx).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConcatError>(),
        Some(ConcatError::Fetch(FetchError::Timeout { .. }))
    ));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(std::fs::read(&out).unwrap(), b"A");
}

#[tokio::test]
async fn test_shutdown_cancels_run() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let fetcher = MockFetcher::new(b"a.ts\nb.ts\nc.ts\n")
        .body("http://h/a/b/a.ts", b"A")
        .hanging("http://h/a/b/b.ts")
        .body("http://h/a/b/c.ts", b"C");

    let (ctx, out) = open(&dir, BaseMode::Directory);
    let mut pipeline = Pipeline::new(&fetcher, PipelineOptions::default());
    let shutdown = tokio::time::sleep(Duration::from_millis(50));
    let err = pipeline.run_until(ctx, shutdown, |_| {}).await.unwrap_err();

    assert!(matches!(err.downcast_ref::<ConcatError>(), Some(ConcatError::Cancelled)));
    assert_eq!(pipeline.state(), PipelineState::Cancelled);
    assert!(!fetcher.requests().iter().any(|u| u == "http://h/a/b/c.ts"));
    assert_eq!(std::fs::read(&out).unwrap(), b"A");
}

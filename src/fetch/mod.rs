// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Fetch boundary for manifests and segments.
//!
//! The pipeline only talks to the network through [`Fetcher`], so tests can
//! substitute an in-memory implementation. Unlike a bare "eventually resolves"
//! callback, every fetch either yields the body or a [`FetchError`].

pub mod http;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub use http::HttpFetcher;

/// Error types for a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, DNS or protocol failure.
    Network { url: String, message: String },
    /// The server answered with a non-success status.
    Status { url: String, status: u16 },
    /// No complete response within the allotted time.
    Timeout { url: String, after: Duration },
    /// The response body could not be read.
    Body { url: String, message: String },
}

impl FetchError {
    /// Address of the failed fetch.
    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. }
            | Self::Status { url, .. }
            | Self::Timeout { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { url, message } => write!(f, "network error fetching {}: {}", url, message),
            Self::Status { url, status } => write!(f, "HTTP {} fetching {}", status, url),
            Self::Timeout { url, after } => {
                write!(f, "timed out after {}s fetching {}", after.as_secs_f64(), url)
            }
            Self::Body { url, message } => write!(f, "failed to read body of {}: {}", url, message),
        }
    }
}

impl std::error::Error for FetchError {}

/// Retrieves the full body of one address.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for &F {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        (**self).fetch(url).await
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        (**self).fetch(url).await
    }
}

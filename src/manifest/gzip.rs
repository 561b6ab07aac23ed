// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! gzip sniffing and inflation for manifests.
//!
//! Servers sometimes hand out manifests gzip-compressed without a
//! `Content-Encoding` header, so the body is sniffed for the gzip magic and
//! inflated here instead of relying on the transport.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read};

use flate2::read::GzDecoder;

/// gzip magic bytes (RFC 1952).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Smallest possible gzip member header.
const GZIP_HEADER_LEN: usize = 10;

/// Inflate output is pulled in chunks of this size.
const INFLATE_CHUNK: usize = 16 * 1024;

/// The manifest looked like gzip but could not be inflated.
#[derive(Debug)]
pub struct DecodeError {
    /// Bytes inflated before the failure.
    pub inflated: usize,
    source: io::Error,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed gzip manifest after {} inflated bytes: {}",
            self.inflated, self.source
        )
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// True if `data` starts with the gzip magic and can hold a gzip header.
#[inline]
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= GZIP_HEADER_LEN && data[0] == GZIP_MAGIC[0] && data[1] == GZIP_MAGIC[1]
}

/// Return the plain manifest text for `data`.
///
/// Non-gzip input is passed through untouched.
pub fn decode_manifest(data: &[u8]) -> Result<Cow<'_, [u8]>, DecodeError> {
    if !is_gzip(data) {
        return Ok(Cow::Borrowed(data));
    }
    inflate(data).map(Cow::Owned)
}

/// Inflate the first gzip member. Bytes after its trailer are ignored.
fn inflate(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len().saturating_mul(4));
    let mut chunk = vec![0u8; INFLATE_CHUNK];

    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(DecodeError {
                    inflated: out.len(),
                    source,
                })
            }
        }
    }

    tracing::debug!("inflated gzip manifest: {} -> {} bytes", data.len(), out.len());
    Ok(out)
}

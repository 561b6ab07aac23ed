// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Manifest decoding and parsing.
//!
//! A manifest is a line-oriented list of segment references. Lines that
//! start with `#` are comments. The document may be gzip-compressed, in
//! which case it is inflated before parsing.
//!
//! ```
//! use segcat::manifest::{decode_manifest, parse_manifest};
//!
//! let raw = b"#EXTM3U\nseg0.ts\n#EXTINF:4.0,\nseg1.ts";
//! let decoded = decode_manifest(raw).unwrap();
//! let entries = parse_manifest(&decoded);
//! assert_eq!(entries.len(), 2);
//! assert_eq!(entries[1].as_str(), "seg1.ts");
//! ```

pub mod gzip;
pub mod parser;

use std::fmt;

pub use gzip::{decode_manifest, is_gzip, DecodeError, GZIP_MAGIC};
pub use parser::{parse_manifest, ManifestEntries};

/// One non-comment line of a manifest, terminator stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestEntry(String);

impl ManifestEntry {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ManifestEntry {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

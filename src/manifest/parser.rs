// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Comment-aware line splitter for manifests.

use super::ManifestEntry;

const COMMENT: u8 = b'#';
const NEWLINE: u8 = b'\n';

/// Lazy iterator over the entries of a decoded manifest.
///
/// Only `\n` terminates a line; a `\r` before it stays part of the entry.
#[derive(Debug, Clone)]
pub struct ManifestEntries<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> ManifestEntries<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, off: 0 }
    }

    /// Offset of the next line terminator at or after `from`, or the end.
    fn line_end(&self, from: usize) -> usize {
        self.data[from..]
            .iter()
            .position(|&b| b == NEWLINE)
            .map_or(self.data.len(), |p| from + p)
    }
}

impl Iterator for ManifestEntries<'_> {
    type Item = ManifestEntry;

    fn next(&mut self) -> Option<ManifestEntry> {
        while self.off < self.data.len() {
            let start = self.off;
            let end = self.line_end(start);
            self.off = (end + 1).min(self.data.len());

            if self.data[start] == COMMENT {
                continue;
            }

            let line = &self.data[start..end];
            let raw = match std::str::from_utf8(line) {
                Ok(s) => s.to_string(),
                Err(_) => {
                    let escaped = percent_encode_invalid(line);
                    tracing::warn!("entry at byte {} is not valid UTF-8, escaped as '{}'", start, escaped);
                    escaped
                }
            };
            tracing::debug!("parsed entry '{}' ({} bytes)", raw, end - start);
            return Some(ManifestEntry::new(raw));
        }
        None
    }
}

impl std::iter::FusedIterator for ManifestEntries<'_> {}

/// Decode `line` as UTF-8, writing each invalid byte as `%XX`.
fn percent_encode_invalid(mut line: &[u8]) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    loop {
        match std::str::from_utf8(line) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = line.split_at(e.valid_up_to());
                // valid_up_to() marks a UTF-8 boundary
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let bad = e.error_len().unwrap_or(rest.len());
                for b in &rest[..bad] {
                    out.push_str(&format!("%{:02X}", b));
                }
                line = &rest[bad..];
            }
        }
    }
}

/// Collect every entry of a decoded manifest, in order.
pub fn parse_manifest(data: &[u8]) -> Vec<ManifestEntry> {
    ManifestEntries::new(data).collect()
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Base address computation and segment resolution.
//!
//! A manifest lists its segments either as absolute addresses or relative to
//! the manifest's own location. Two candidate bases are derived from the
//! manifest address:
//!
//! - the *directory* base, everything up to and including the last `/`
//! - the *authority* base, everything up to and including the first `/`
//!   after the `://` marker
//!
//! ```
//! use segcat::uri::{BaseMode, BasePolicy};
//! use segcat::manifest::ManifestEntry;
//!
//! let resolution = BasePolicy::resolve("http://h/a/b/manifest.m3u", BaseMode::Auto);
//! let policy = resolution.policy;
//!
//! let seg = policy.resolve_entry(&ManifestEntry::new("seg1.ts"), 0);
//! assert_eq!(seg.url, "http://h/a/b/seg1.ts");
//!
//! let seg = policy.resolve_entry(&ManifestEntry::new("/seg1.ts"), 1);
//! assert_eq!(seg.url, "http://h/seg1.ts");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::manifest::ManifestEntry;

/// Marker separating the scheme from the authority.
pub const SCHEME_SEPARATOR: &str = "://";

/// How relative manifest entries are turned into absolute addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseMode {
    /// Relative to the manifest's directory
    Directory,
    /// Relative to the scheme and host of the manifest
    Authority,
    /// Directory base, except root-relative entries use the authority base
    Auto,
}

impl Default for BaseMode {
    fn default() -> Self {
        BaseMode::Auto
    }
}

impl BaseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseMode::Directory => "directory",
            BaseMode::Authority => "authority",
            BaseMode::Auto => "auto",
        }
    }
}

impl fmt::Display for BaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "directory" | "dir" => Ok(BaseMode::Directory),
            "authority" | "host" => Ok(BaseMode::Authority),
            "auto" => Ok(BaseMode::Auto),
            other => Err(format!(
                "unknown base mode '{}' (expected directory, authority or auto)",
                other
            )),
        }
    }
}

/// A base address could not be computed from the manifest address.
///
/// Not fatal: the run continues with an empty base for that kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseResolutionError {
    /// The address contains no `/` at all.
    NoDirectory { url: String },
    /// The address has no `://` marker, or no `/` after the authority.
    NoAuthority { url: String },
}

impl fmt::Display for BaseResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDirectory { url } => write!(f, "no directory base in '{}'", url),
            Self::NoAuthority { url } => write!(f, "no authority base in '{}'", url),
        }
    }
}

impl std::error::Error for BaseResolutionError {}

/// Prefix of `url` up to and including its last `/`.
pub fn directory_base(url: &str) -> Option<&str> {
    url.rfind('/').map(|pos| &url[..=pos])
}

/// Prefix of `url` up to and including the first `/` after `://`.
///
/// The search starts one character past the end of the marker, so an empty
/// authority (`file:///x`) does not end the base at the first slash.
pub fn authority_base(url: &str) -> Option<&str> {
    let marker = url.find(SCHEME_SEPARATOR)?;
    let from = marker + SCHEME_SEPARATOR.len() + 1;
    if from > url.len() {
        return None;
    }
    let slash = url.as_bytes().get(from..)?.iter().position(|&b| b == b'/')?;
    Some(&url[..=from + slash])
}

/// Base addresses computed for one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasePolicy {
    pub mode: BaseMode,
    pub directory_base: Option<String>,
    pub authority_base: Option<String>,
}

/// Result of computing a [`BasePolicy`], with any non-fatal failures.
#[derive(Debug, Clone)]
pub struct BaseResolution {
    pub policy: BasePolicy,
    pub warnings: Vec<BaseResolutionError>,
}

impl BasePolicy {
    /// Compute the bases `mode` needs from the manifest address.
    pub fn resolve(manifest_url: &str, mode: BaseMode) -> BaseResolution {
        let mut warnings = Vec::new();

        let wants_directory = matches!(mode, BaseMode::Directory | BaseMode::Auto);
        let wants_authority = matches!(mode, BaseMode::Authority | BaseMode::Auto);

        let directory = if wants_directory {
            let base = directory_base(manifest_url);
            if base.is_none() {
                warnings.push(BaseResolutionError::NoDirectory {
                    url: manifest_url.to_string(),
                });
            }
            base.map(str::to_string)
        } else {
            None
        };

        let authority = if wants_authority {
            let base = authority_base(manifest_url);
            if base.is_none() {
                warnings.push(BaseResolutionError::NoAuthority {
                    url: manifest_url.to_string(),
                });
            }
            base.map(str::to_string)
        } else {
            None
        };

        BaseResolution {
            policy: BasePolicy {
                mode,
                directory_base: directory,
                authority_base: authority,
            },
            warnings,
        }
    }

    /// The base that applies to `entry`. Empty when it could not be computed.
    pub fn base_for(&self, entry: &str) -> &str {
        let base = match self.mode {
            BaseMode::Directory => self.directory_base.as_deref(),
            BaseMode::Authority => self.authority_base.as_deref(),
            BaseMode::Auto if entry.starts_with('/') => self.authority_base.as_deref(),
            BaseMode::Auto => self.directory_base.as_deref(),
        };
        base.unwrap_or("")
    }

    /// Turn a manifest entry into the address to fetch.
    pub fn resolve_entry(&self, entry: &ManifestEntry, index: usize) -> ResolvedSegment {
        let raw = entry.as_str();
        let url = if raw.contains(SCHEME_SEPARATOR) {
            raw.to_string()
        } else {
            let base = self.base_for(raw);
            // Authority bases end in '/', so a root-relative entry would double it.
            let raw = if base.ends_with('/') && self.mode == BaseMode::Auto {
                raw.strip_prefix('/').unwrap_or(raw)
            } else {
                raw
            };
            format!("{}{}", base, raw)
        };
        ResolvedSegment { index, url }
    }
}

/// An absolute segment address and its position in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSegment {
    pub index: usize,
    pub url: String,
}

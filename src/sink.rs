// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Append-only output file.
//!
//! The sink is opened before any network activity and is released exactly
//! once: either through [`OutputSink::close`] or, on an early exit, by `Drop`.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write buffer in front of the output file.
const SINK_BUFFER_SIZE: usize = 256 * 1024;

/// The output file could not be created.
#[derive(Debug)]
pub struct SinkError {
    pub path: PathBuf,
    source: io::Error,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "can't open {}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Destination for the concatenated segment bytes.
pub struct OutputSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl OutputSink {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| SinkError {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            writer: Some(BufWriter::with_capacity(SINK_BUFFER_SIZE, file)),
            bytes_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append `data` after everything written so far.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "output sink already closed"))?;
        writer.write_all(data)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flush, sync and close the file. Returns the total bytes written.
    pub fn close(mut self) -> io::Result<u64> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        tracing::debug!("closed {} ({} bytes)", self.path.display(), self.bytes_written);
        Ok(self.bytes_written)
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("path", &self.path)
            .field("open", &self.writer.is_some())
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                tracing::warn!("Failed to flush {} on drop: {}", self.path.display(), e);
            }
        }
    }
}

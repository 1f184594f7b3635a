// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for report discovery and parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading benchmark reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem access failed.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An artifact is malformed or lacks a required key.
    #[error("Failed to parse {file}: {reason}")]
    Parse {
        /// Artifact file name.
        file: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ReportError {
    /// Create a parse error for `file`.
    pub fn parse(file: impl Into<String>, reason: impl Into<String>) -> Self {
        ReportError::Parse {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Retouch.

use thiserror::Error;

/// Top-level error type for all Retouch operations.
///
/// Only the input-error variants are expected to reach a caller of the edit
/// pipeline; everything else is absorbed by a per-operation fallback.
#[derive(Debug, Error)]
pub enum RetouchError {
    // -- Input errors --
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("invalid edit #{index}: {reason}")]
    InvalidEdit { index: usize, reason: String },

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("rendering failed: {0}")]
    RenderError(String),

    // -- Storage / persistence --
    #[error("storage error: {0}")]
    Storage(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RetouchError {
    /// Whether this error describes bad caller input (unreadable document,
    /// out-of-range page, malformed edit) rather than an internal failure.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDocument(_)
                | Self::PageOutOfRange { .. }
                | Self::InvalidEdit { .. }
                | Self::DocumentNotFound(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RetouchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_classified() {
        assert!(RetouchError::PageOutOfRange { page: 3, count: 1 }.is_input_error());
        assert!(RetouchError::InvalidDocument("garbage".into()).is_input_error());
        assert!(!RetouchError::RenderError("no PDFium".into()).is_input_error());
        assert!(!RetouchError::PdfError("save".into()).is_input_error());
    }

    #[test]
    fn page_out_of_range_message() {
        let err = RetouchError::PageOutOfRange { page: 4, count: 2 };
        assert_eq!(err.to_string(), "page 4 out of range (document has 2 pages)");
    }
}

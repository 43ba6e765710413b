// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 fingerprints for stored documents.

use retouch_core::error::RetouchError;
use retouch_core::types::DocumentId;
use sha2::{Digest, Sha256};

/// Hex characters of the digest kept in a document id.
pub const DOCUMENT_ID_LEN: usize = 16;

/// SHA-256 of `data` as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Content-addressed id of a document: the first 16 hex chars of its digest.
pub fn document_id(data: &[u8]) -> DocumentId {
    let mut digest = hash_bytes(data);
    digest.truncate(DOCUMENT_ID_LEN);
    DocumentId(digest)
}

/// Check `data` against an expected digest. A truncated (id-length) digest is
/// compared as a prefix.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<(), RetouchError> {
    let actual = hash_bytes(data);
    let expected = expected_hex.to_ascii_lowercase();
    if !expected.is_empty() && actual.starts_with(&expected) {
        Ok(())
    } else {
        Err(RetouchError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

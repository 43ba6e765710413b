// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// retouch-store: storage for uploaded documents and the font programs
// extracted from them.
//
// Documents are content-addressed by a truncated SHA-256 digest, so storing
// the same upload twice yields the same id. Fonts are filed per document and
// looked up by cleaned family name.

pub mod integrity;
pub mod store;

pub use integrity::{document_id, hash_bytes, verify_hash};
pub use store::{AssetStore, DocumentFonts, FONT_EXTENSIONS, FsStore};

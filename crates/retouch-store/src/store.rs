// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document and font asset storage.
//
// `FsStore` lays assets out under a data directory:
//
//   <data_dir>/uploads/<id>.pdf
//   <data_dir>/fonts/<id>/<family>.<ext>

use std::fs;
use std::path::{Path, PathBuf};

use retouch_core::error::{Result, RetouchError};
use retouch_core::types::{DocumentId, FontAsset, FontLookup};
use tracing::{debug, info, instrument, warn};

use crate::integrity::{document_id, verify_hash};

/// Font file extensions, in lookup order.
pub const FONT_EXTENSIONS: [&str; 6] = ["ttf", "otf", "cff", "woff", "woff2", "pfb"];

/// Storage for uploaded documents and their extracted fonts.
pub trait AssetStore {
    /// Store a document and return its content-addressed id.
    fn put_document(&self, bytes: &[u8]) -> Result<DocumentId>;

    /// Load a previously stored document.
    fn document(&self, id: &DocumentId) -> Result<Vec<u8>>;

    /// Store one font program for a document.
    fn put_font(&self, id: &DocumentId, family: &str, ext: &str, bytes: &[u8]) -> Result<FontAsset>;

    /// Find a stored font by family name.
    fn font(&self, id: &DocumentId, family: &str) -> Option<FontAsset>;

    /// Family names of every stored font for a document, sorted.
    fn fonts(&self, id: &DocumentId) -> Result<Vec<String>>;
}

/// Filesystem-backed [`AssetStore`].
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    fn fonts_dir(&self, id: &DocumentId) -> PathBuf {
        self.root.join("fonts").join(safe_component(id.as_str()))
    }

    fn document_path(&self, id: &DocumentId) -> PathBuf {
        self.uploads_dir().join(format!("{}.pdf", safe_component(id.as_str())))
    }
}

impl AssetStore for FsStore {
    #[instrument(skip_all, fields(len = bytes.len()))]
    fn put_document(&self, bytes: &[u8]) -> Result<DocumentId> {
        let id = document_id(bytes);
        let path = self.document_path(&id);
        if path.exists() {
            debug!(%id, "document already stored");
            return Ok(id);
        }
        fs::create_dir_all(self.uploads_dir())?;
        fs::write(&path, bytes)?;
        info!(%id, path = %path.display(), "document stored");
        Ok(id)
    }

    fn document(&self, id: &DocumentId) -> Result<Vec<u8>> {
        let path = self.document_path(id);
        if !path.is_file() {
            return Err(RetouchError::DocumentNotFound(id.to_string()));
        }
        let bytes = fs::read(path)?;
        verify_hash(&bytes, id.as_str())?;
        Ok(bytes)
    }

    #[instrument(skip_all, fields(id = %id, family = %family, ext = %ext, len = bytes.len()))]
    fn put_font(&self, id: &DocumentId, family: &str, ext: &str, bytes: &[u8]) -> Result<FontAsset> {
        let family = family.trim();
        if family.is_empty() {
            return Err(RetouchError::Storage("font family name is empty".into()));
        }
        let dir = self.fonts_dir(id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.{}", safe_component(family), ext));
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), "font stored");
        Ok(FontAsset {
            family: family.to_string(),
            path,
        })
    }

    fn font(&self, id: &DocumentId, family: &str) -> Option<FontAsset> {
        let family = family.trim();
        if family.is_empty() {
            return None;
        }
        let dir = self.fonts_dir(id);
        let stem = safe_component(family);
        FONT_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{stem}.{ext}")))
            .find(|path| path.is_file())
            .map(|path| FontAsset {
                family: family.to_string(),
                path,
            })
    }

    fn fonts(&self, id: &DocumentId) -> Result<Vec<String>> {
        let dir = self.fonts_dir(id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut families: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable font entry");
                    None
                }
            })
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| FONT_EXTENSIONS.contains(&e))
            })
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        families.sort();
        families.dedup();
        Ok(families)
    }
}

/// A store bound to one document, usable as the editor's [`FontLookup`].
pub struct DocumentFonts<'a, S: AssetStore + ?Sized> {
    store: &'a S,
    id: DocumentId,
}

impl<'a, S: AssetStore + ?Sized> DocumentFonts<'a, S> {
    pub fn new(store: &'a S, id: DocumentId) -> Self {
        Self { store, id }
    }
}

impl<S: AssetStore + ?Sized> FontLookup for DocumentFonts<'_, S> {
    fn find(&self, family: &str) -> Option<FontAsset> {
        self.store.font(&self.id, family)
    }
}

/// Replace path separators and other awkward characters so a name is a
/// single safe path component.
fn safe_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn documents_are_content_addressed() {
        let (_dir, store) = store();
        let a = store.put_document(b"%PDF-1.7 one").unwrap();
        let again = store.put_document(b"%PDF-1.7 one").unwrap();
        let b = store.put_document(b"%PDF-1.7 two").unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert_eq!(store.document(&a).unwrap(), b"%PDF-1.7 one");
        assert!(store.root().join("uploads").join(format!("{a}.pdf")).is_file());
    }

    #[test]
    fn missing_document_is_an_input_error() {
        let (_dir, store) = store();
        let err = store.document(&DocumentId("0123456789abcdef".into())).unwrap_err();
        assert!(matches!(err, RetouchError::DocumentNotFound(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn tampered_document_fails_integrity_check() {
        let (_dir, store) = store();
        let id = store.put_document(b"%PDF-1.7 original").unwrap();
        fs::write(store.root().join("uploads").join(format!("{id}.pdf")), b"%PDF-1.7 swapped").unwrap();
        assert!(matches!(
            store.document(&id),
            Err(RetouchError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn font_lookup_follows_extension_order() {
        let (_dir, store) = store();
        let id = store.put_document(b"doc").unwrap();
        store.put_font(&id, "ArialMT", "otf", b"otf").unwrap();
        store.put_font(&id, "ArialMT", "ttf", b"ttf").unwrap();

        let asset = store.font(&id, "ArialMT").unwrap();
        assert_eq!(asset.family, "ArialMT");
        assert_eq!(asset.path.extension().unwrap(), "ttf");
        assert!(store.font(&id, "Missing").is_none());
        assert!(store.font(&id, "").is_none());
    }

    #[test]
    fn fonts_lists_unique_families() {
        let (_dir, store) = store();
        let id = store.put_document(b"doc").unwrap();
        assert!(store.fonts(&id).unwrap().is_empty());

        store.put_font(&id, "Times-Roman", "pfb", b"x").unwrap();
        store.put_font(&id, "ArialMT", "ttf", b"x").unwrap();
        store.put_font(&id, "ArialMT", "cff", b"x").unwrap();
        assert_eq!(store.fonts(&id).unwrap(), vec!["ArialMT", "Times-Roman"]);
    }

    #[test]
    fn family_names_cannot_escape_the_font_dir() {
        let (_dir, store) = store();
        let id = store.put_document(b"doc").unwrap();
        let asset = store.put_font(&id, "../evil/Font", "ttf", b"x").unwrap();
        assert!(asset.path.starts_with(store.root().join("fonts").join(id.as_str())));
        assert_eq!(store.font(&id, "../evil/Font").unwrap().path, asset.path);
    }

    #[test]
    fn document_fonts_implements_lookup() {
        let (_dir, store) = store();
        let id = store.put_document(b"doc").unwrap();
        store.put_font(&id, "Georgia", "ttf", b"x").unwrap();

        let lookup = DocumentFonts::new(&store, id);
        assert!(lookup.find("Georgia").is_some());
        assert!(lookup.find("Verdana").is_none());
    }
}

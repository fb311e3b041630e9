//! Reads the source document into page-delimited fragments.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::chunk::chunk_page;
use crate::error::InitError;
use crate::extract::{content_type_for, extract_pages};
use crate::models::Fragment;

/// The fragments of one document plus a fingerprint of its raw bytes.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub fragments: Vec<Fragment>,
    /// Number of pages, blank ones included.
    pub pages: usize,
    /// SHA-256 hex digest of the file contents.
    pub fingerprint: String,
}

/// Loads `path` and splits every page with `max_tokens`.
///
/// Fails when the file cannot be read, its type is unsupported, extraction
/// fails, or no page holds any text.
pub fn load_document(path: &Path, max_tokens: usize) -> Result<LoadedDocument, InitError> {
    let content_type = content_type_for(path).ok_or_else(|| InitError::UnsupportedDocument {
        path: path.to_path_buf(),
    })?;

    let bytes = std::fs::read(path).map_err(|source| InitError::DocumentRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let fingerprint = format!("{:x}", hasher.finalize());

    let pages = extract_pages(&bytes, content_type)?;
    let source = path.display().to_string();

    let fragments: Vec<Fragment> = pages
        .iter()
        .enumerate()
        .flat_map(|(page, text)| chunk_page(&source, page, text, max_tokens))
        .collect();

    if fragments.is_empty() {
        return Err(InitError::EmptyDocument {
            path: path.to_path_buf(),
        });
    }

    tracing::info!(
        document = %source,
        pages = pages.len(),
        fragments = fragments.len(),
        "loaded document"
    );

    Ok(LoadedDocument {
        fragments,
        pages: pages.len(),
        fingerprint,
    })
}

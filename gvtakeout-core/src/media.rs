//! Attachment resolution
//!
//! Image references in exported markup do not carry file extensions, and
//! the exported file name may differ slightly from the reference. Resolution
//! works on the last space-separated token of the reference:
//!
//! 1. glob for `*{token}*` in the export directory, ignoring `.html` files
//! 2. if nothing matches, strip a trailing `-N` from the token and retry once
//!
//! Matches are sorted, so the same directory listing always yields the same
//! file.

use std::path::{Path, PathBuf};

/// Find the local file for an image reference.
pub fn resolve_attachment(dir: &Path, reference: &str) -> Option<PathBuf> {
    let token = reference.split(' ').filter(|t| !t.is_empty()).last()?;

    if let Some(found) = first_match(dir, token) {
        return Some(found);
    }

    let stripped = strip_numeric_suffix(token)?;
    tracing::debug!(reference, retry = stripped, "No attachment match, retrying without suffix");
    first_match(dir, stripped)
}

/// `"abc-2-1"` -> `"abc-2"`; `None` when there is no `-N` suffix.
fn strip_numeric_suffix(token: &str) -> Option<&str> {
    let (head, tail) = token.rsplit_once('-')?;
    if !head.is_empty() && !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
        Some(head)
    } else {
        None
    }
}

fn first_match(dir: &Path, token: &str) -> Option<PathBuf> {
    let pattern = format!(
        "{}/*{}*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(token)
    );

    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Invalid attachment pattern");
            return None;
        }
    };

    let mut matches: Vec<PathBuf> = entries
        .flatten()
        .filter(|p| p.is_file())
        .filter(|p| {
            !p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("html"))
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Reads attachment bytes from an export directory.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    dir: PathBuf,
}

/// A resolved attachment.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl MediaResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve and read one attachment. Failures only lose this attachment.
    pub fn load(&self, reference: &str) -> Option<Attachment> {
        let Some(path) = resolve_attachment(&self.dir, reference) else {
            tracing::warn!(reference, dir = %self.dir.display(), "Attachment not found");
            return None;
        };

        match std::fs::read(&path) {
            Ok(content) => Some(Attachment {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                content,
            }),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to read attachment");
                None
            }
        }
    }
}

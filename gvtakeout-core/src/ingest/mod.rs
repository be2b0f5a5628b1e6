//! Import layer for Google Voice takeout documents
//!
//! This module turns export documents on disk into conversations handed
//! to a [`ConversationSink`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  Export files   │ ──► │ ImportCoordinator│ ──► │ ConversationSink │
//! │   (*.html)      │     │                  │     │  ├─ JSON lines   │
//! └─────────────────┘     └──────────────────┘     │  └─ SQLite       │
//!                               │                  └──────────────────┘
//!                               ▼
//!                    ┌──────────────────────┐
//!                    │ markup -> extract    │
//!                    └──────────────────────┘
//! ```
//!
//! Files are processed one at a time. A document that cannot be read,
//! parsed, extracted or written is recorded in [`ImportResult::errors`] and
//! the import moves on to the next file.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gvtakeout_core::ingest::{ImportCoordinator, JsonLinesSink};
//!
//! let coordinator = ImportCoordinator::new("Takeout/Voice/Calls", "*.html");
//! let mut sink = JsonLinesSink::new(std::io::stdout());
//! let result = coordinator.import_all(&mut sink)?;
//! eprintln!("{} conversations from {} files", result.conversations_written, result.files_processed);
//! # Ok::<(), gvtakeout_core::Error>(())
//! ```

mod sink;

pub use sink::{ConversationSink, JsonLinesSink, SourceDocument, SqliteSink};

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::extract;
use crate::types::ConversationKind;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Result of importing a whole export directory.
#[derive(Debug, Default)]
pub struct ImportResult {
    /// Number of files whose conversation was written
    pub files_processed: usize,
    /// Number of files skipped (unchanged or empty)
    pub files_skipped: usize,
    /// Number of conversations handed to the sink
    pub conversations_written: usize,
    /// Number of chat messages in those conversations
    pub messages_written: usize,
    /// Errors encountered (file path → error message)
    pub errors: Vec<(PathBuf, String)>,
    /// Non-fatal oddities in otherwise imported documents
    pub warnings: Vec<String>,
}

/// Result of importing a single file.
#[derive(Debug)]
pub struct FileImportResult {
    pub path: PathBuf,
    /// Kind of the written conversation (`None` when skipped)
    pub kind: Option<ConversationKind>,
    pub messages: usize,
    pub warnings: Vec<String>,
    /// Reason the file was skipped (if skipped)
    pub skip_reason: Option<SkipReason>,
}

/// Reason a file was skipped during import.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Same content hash as the last import into this sink
    Unchanged { content_hash: String },
    /// File is empty
    EmptyFile,
}

/// Discovers export documents and feeds them through extraction into a sink.
pub struct ImportCoordinator {
    dir: PathBuf,
    pattern: String,
}

impl ImportCoordinator {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }

    pub fn from_config(config: &ImportConfig) -> Self {
        Self::new(&config.export_dir, &config.pattern)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files in the export directory matching the pattern, sorted.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            self.pattern
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| Error::Config(format!("invalid import pattern: {}", e)))?;

        let mut files: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
        files.sort();

        tracing::info!(
            dir = %self.dir.display(),
            pattern = %self.pattern,
            count = files.len(),
            "Discovered export files"
        );
        Ok(files)
    }

    /// Import all discovered files.
    pub fn import_all<S: ConversationSink + ?Sized>(&self, sink: &mut S) -> Result<ImportResult> {
        self.import_all_with_progress(sink, |_, _, _| {})
    }

    /// Import all discovered files with progress callback.
    ///
    /// The callback receives `(current_file_index, total_files, file_path)` before
    /// each file is processed.
    pub fn import_all_with_progress<S, F>(
        &self,
        sink: &mut S,
        mut on_progress: F,
    ) -> Result<ImportResult>
    where
        S: ConversationSink + ?Sized,
        F: FnMut(usize, usize, &Path),
    {
        let files = self.discover_files()?;
        let total = files.len();
        let mut result = ImportResult::default();

        for (i, path) in files.iter().enumerate() {
            on_progress(i, total, path);

            match self.import_file(path, sink) {
                Ok(file_result) => Self::update_result(&mut result, file_result),
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "Failed to import file");
                    result.errors.push((path.clone(), e.to_string()));
                }
            }
        }

        sink.finish()?;

        tracing::info!(
            sink = sink.name(),
            processed = result.files_processed,
            skipped = result.files_skipped,
            errors = result.errors.len(),
            "Import complete"
        );
        Ok(result)
    }

    /// Update result counters from a file import result.
    fn update_result(result: &mut ImportResult, file_result: FileImportResult) {
        match &file_result.skip_reason {
            None => {
                result.files_processed += 1;
                result.conversations_written += 1;
                result.messages_written += file_result.messages;
            }
            Some(reason) => {
                result.files_skipped += 1;
                let reason = match reason {
                    SkipReason::Unchanged { content_hash } => {
                        format!("unchanged (sha256 {})", content_hash)
                    }
                    SkipReason::EmptyFile => "empty file".to_string(),
                };
                tracing::debug!(
                    path = %file_result.path.display(),
                    reason = %reason,
                    "File skipped"
                );
            }
        }
        result.warnings.extend(file_result.warnings);
    }

    /// Import a single file into `sink`.
    pub fn import_file<S: ConversationSink + ?Sized>(
        &self,
        path: &Path,
        sink: &mut S,
    ) -> Result<FileImportResult> {
        let bytes = std::fs::read(path)?;
        let skipped = |reason| FileImportResult {
            path: path.to_path_buf(),
            kind: None,
            messages: 0,
            warnings: Vec::new(),
            skip_reason: Some(reason),
        };

        if bytes.is_empty() {
            return Ok(skipped(SkipReason::EmptyFile));
        }

        let content_hash = hex::encode(Sha256::digest(&bytes));
        let doc = SourceDocument {
            path,
            content_hash: &content_hash,
        };
        if sink.imported_hash(&doc)?.as_deref() == Some(content_hash.as_str()) {
            return Ok(skipped(SkipReason::Unchanged {
                content_hash: content_hash.clone(),
            }));
        }

        let mut conversation = extract::extract_document(&mut bytes.as_slice())?;
        conversation.source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut warnings = Vec::new();
        if conversation.participants.is_empty() {
            warnings.push(format!("{}: no participants", conversation.source_file));
        }
        if conversation.timestamp.is_none() {
            warnings.push(format!("{}: no timestamp", conversation.source_file));
        }
        for warning in &warnings {
            tracing::warn!(file = %path.display(), "{}", warning);
        }

        sink.write(&doc, &conversation)?;

        tracing::debug!(
            file = %path.display(),
            kind = %conversation.kind,
            messages = conversation.messages.len(),
            "Imported conversation"
        );

        Ok(FileImportResult {
            path: path.to_path_buf(),
            kind: Some(conversation.kind),
            messages: conversation.messages.len(),
            warnings,
            skip_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MISSED: &str = r#"<html><head><title>Missed call from Dwigt</title></head><body>
        <div class="haudio"><span class="fn">Missed call from Dwigt</span>
        <div class="contributor vcard">Missed call from
        <a class="tel" href="tel:+66666"><span class="fn">Dwigt</span></a></div>
        <abbr class="published" title="2009-09-17T17:26:41.000-07:00">Sep 17</abbr>
        </div></body></html>"#;

    #[test]
    fn test_import_result_default() {
        let result = ImportResult::default();
        assert_eq!(result.files_processed, 0);
        assert_eq!(result.messages_written, 0);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_discover_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.html"), MISSED).unwrap();
        fs::write(dir.path().join("a.html"), MISSED).unwrap();
        fs::write(dir.path().join("a.jpg"), b"jpg").unwrap();

        let files = ImportCoordinator::new(dir.path(), "*.html")
            .discover_files()
            .unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.html", "b.html"]);
    }

    #[test]
    fn test_bad_documents_do_not_stop_import() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.html"), MISSED).unwrap();
        fs::write(dir.path().join("junk.html"), "<html><body>nothing</body></html>").unwrap();
        fs::write(dir.path().join("empty.html"), "").unwrap();

        let mut sink = JsonLinesSink::new(Vec::new());
        let mut seen = Vec::new();
        let result = ImportCoordinator::new(dir.path(), "*.html")
            .import_all_with_progress(&mut sink, |i, total, _| seen.push((i, total)))
            .unwrap();

        assert_eq!(seen, [(0, 3), (1, 3), (2, 3)]);
        assert_eq!(result.files_processed, 1);
        assert_eq!(result.files_skipped, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].0.ends_with("junk.html"));

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("\"source_file\":\"good.html\""));
    }

    #[test]
    fn test_unchanged_file_is_skipped_by_sqlite_sink() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("missed.html"), MISSED).unwrap();
        let db = crate::db::Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let coordinator = ImportCoordinator::new(dir.path(), "*.html");
        let first = coordinator.import_all(&mut SqliteSink::new(&db)).unwrap();
        assert_eq!(first.files_processed, 1);

        let second = coordinator.import_all(&mut SqliteSink::new(&db)).unwrap();
        assert_eq!(second.files_processed, 0);
        assert_eq!(second.files_skipped, 1);
        assert_eq!(db.stats().unwrap().conversations, 1);

        fs::write(
            dir.path().join("missed.html"),
            MISSED.replace("Sep 17", "September 17"),
        )
        .unwrap();
        let third = coordinator.import_all(&mut SqliteSink::new(&db)).unwrap();
        assert_eq!(third.files_processed, 1);
        assert_eq!(db.stats().unwrap().conversations, 1);
    }
}

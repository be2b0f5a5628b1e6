//! Conversation sinks
//!
//! A sink receives every successfully extracted conversation. Two sinks
//! exist: JSON lines (one object per conversation) and SQLite.

use crate::db::Database;
use crate::error::Result;
use crate::media::MediaResolver;
use crate::types::Conversation;
use std::io::Write;
use std::path::Path;

/// Identity of the document a conversation came from.
#[derive(Debug, Clone, Copy)]
pub struct SourceDocument<'a> {
    pub path: &'a Path,
    /// Hex-encoded SHA-256 of the document bytes
    pub content_hash: &'a str,
}

impl SourceDocument<'_> {
    /// Key under which imports of this document are tracked: the canonical
    /// path when it can be resolved.
    pub fn key(&self) -> String {
        self.path
            .canonicalize()
            .unwrap_or_else(|_| self.path.to_path_buf())
            .to_string_lossy()
            .into_owned()
    }
}

/// Destination for extracted conversations.
///
/// Implementations must write a conversation completely or not at all.
pub trait ConversationSink {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Content hash recorded the last time `doc` was written, for sinks
    /// that remember what they imported.
    fn imported_hash(&self, doc: &SourceDocument<'_>) -> Result<Option<String>> {
        let _ = doc;
        Ok(None)
    }

    /// Write one conversation.
    fn write(&mut self, doc: &SourceDocument<'_>, conversation: &Conversation) -> Result<()>;

    /// Flush buffered output.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================
// JSON lines
// ============================================

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ConversationSink for JsonLinesSink<W> {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write(&mut self, _doc: &SourceDocument<'_>, conversation: &Conversation) -> Result<()> {
        let line = serde_json::to_string(conversation)?;
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================
// SQLite
// ============================================

/// Inserts conversations into the database, replacing earlier imports of
/// the same document.
pub struct SqliteSink<'a> {
    db: &'a Database,
    media: Option<MediaResolver>,
}

impl<'a> SqliteSink<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db, media: None }
    }

    /// Capture attachment bytes found through `media`.
    pub fn with_media(mut self, media: MediaResolver) -> Self {
        self.media = Some(media);
        self
    }
}

impl ConversationSink for SqliteSink<'_> {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn imported_hash(&self, doc: &SourceDocument<'_>) -> Result<Option<String>> {
        Ok(self
            .db
            .get_source_file(&doc.key())?
            .filter(|record| record.conversation_id.is_some())
            .map(|record| record.content_hash))
    }

    fn write(&mut self, doc: &SourceDocument<'_>, conversation: &Conversation) -> Result<()> {
        self.db.replace_source_conversation(
            &doc.key(),
            doc.content_hash,
            conversation,
            self.media.as_ref(),
        )?;
        Ok(())
    }
}

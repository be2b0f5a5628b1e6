//! Database repository layer
//!
//! Writes go through [`Database`] and are transactional per conversation.
//! Reads go through a [`Snapshot`] so that multi-query views (groups,
//! search pages) see one consistent state.

use super::queries::Snapshot;
use crate::error::Result;
use crate::media::MediaResolver;
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// Import bookkeeping for one export document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFileRecord {
    pub path: String,
    /// Hex-encoded SHA-256 of the document bytes
    pub content_hash: String,
    /// `None` once the conversation has been deleted
    pub conversation_id: Option<i64>,
    pub imported_at: DateTime<Utc>,
}

/// Row counts for the whole database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub conversations: i64,
    pub contacts: i64,
    pub messages: i64,
    pub images: i64,
    pub media_files: i64,
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Run `f` against one read transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Snapshot<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let value = f(&Snapshot::new(&tx))?;
        tx.commit()?;
        Ok(value)
    }

    // ============================================
    // Conversation writes
    // ============================================

    /// Insert one conversation with its contacts, messages and images.
    ///
    /// Everything happens in one transaction: on error nothing is kept.
    /// When `media` is given, attachment bytes are captured as well.
    pub fn insert_conversation(
        &self,
        conversation: &Conversation,
        media: Option<&MediaResolver>,
    ) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let id = insert_conversation_rows(&tx, conversation, media)?;
        tx.commit()?;
        Ok(id)
    }

    /// Import the conversation of one source document.
    ///
    /// A conversation previously imported from the same path is deleted in
    /// the same transaction, and the source file record is updated to point
    /// at the new conversation.
    pub fn replace_source_conversation(
        &self,
        path: &str,
        content_hash: &str,
        conversation: &Conversation,
        media: Option<&MediaResolver>,
    ) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let previous: Option<Option<i64>> = tx
            .query_row(
                "SELECT conversation_id FROM source_file WHERE path = ?",
                [path],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(Some(old_id)) = previous {
            tx.execute("DELETE FROM conversation WHERE id = ?", [old_id])?;
            tracing::debug!(path, old_id, "Replaced previously imported conversation");
        }

        let id = insert_conversation_rows(&tx, conversation, media)?;
        upsert_source_file(&tx, path, content_hash, Some(id))?;

        tx.commit()?;
        Ok(id)
    }

    /// Delete a conversation and everything hanging off it.
    ///
    /// Returns false when no such conversation exists. Contacts are kept.
    #[cfg(test)]
    pub(crate) fn delete_conversation(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM conversation WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    // ============================================
    // SourceFile operations
    // ============================================

    /// Get a source file by path
    pub fn get_source_file(&self, path: &str) -> Result<Option<SourceFileRecord>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT * FROM source_file WHERE path = ?",
                [path],
                row_to_source_file,
            )
            .optional()?)
    }

    // ============================================
    // Read shortcuts
    // ============================================

    /// Get a conversation header by id
    pub fn get_conversation(&self, id: i64) -> Result<StoredConversation> {
        self.read(|s| s.get_conversation(id))
    }

    /// Search conversations, newest first, with previews
    pub fn search_conversations(
        &self,
        term: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ConversationSummary>> {
        self.read(|s| s.search_conversations(term, limit, offset))
    }

    /// Number of conversations [`Self::search_conversations`] can return for `term`
    pub fn count_conversations(&self, term: Option<&str>) -> Result<i64> {
        self.read(|s| s.count_conversations(term))
    }

    /// Row counts for the whole database
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.read(|s| s.stats())
    }

    /// Captured bytes of an attachment, if any
    pub fn media_for_image(&self, image_id: i64) -> Result<Option<MediaFile>> {
        self.read(|s| s.media_for_image(image_id))
    }
}

// ============================================
// Row helpers
// ============================================

/// Store timestamps so that lexical order equals chronological order.
pub(crate) fn timestamp_to_sql(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub(crate) fn timestamp_from_sql(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

fn row_to_source_file(row: &Row) -> rusqlite::Result<SourceFileRecord> {
    let imported_at: Option<String> = row.get("imported_at")?;
    Ok(SourceFileRecord {
        path: row.get("path")?,
        content_hash: row.get("content_hash")?,
        conversation_id: row.get("conversation_id")?,
        imported_at: timestamp_from_sql(imported_at).unwrap_or_else(Utc::now),
    })
}

fn upsert_source_file(
    conn: &Connection,
    path: &str,
    content_hash: &str,
    conversation_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO source_file (path, content_hash, conversation_id, imported_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(path) DO UPDATE SET
            content_hash = excluded.content_hash,
            conversation_id = excluded.conversation_id,
            imported_at = excluded.imported_at
        "#,
        params![
            path,
            content_hash,
            conversation_id,
            timestamp_to_sql(Some(Utc::now())),
        ],
    )?;
    Ok(())
}

/// Find or create the contact for (name, phone_number).
fn upsert_contact(conn: &Connection, name: &str, phone_number: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO contact (name, phone_number) VALUES (?1, ?2)
         ON CONFLICT(name, phone_number) DO NOTHING",
        params![name, phone_number],
    )?;
    let id = conn.query_row(
        "SELECT id FROM contact WHERE name = ?1 AND phone_number = ?2",
        params![name, phone_number],
        |r| r.get(0),
    )?;
    Ok(id)
}

fn insert_conversation_rows(
    conn: &Connection,
    conversation: &Conversation,
    media: Option<&MediaResolver>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO conversation (type, timestamp, duration, transcript, source_file)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            conversation.kind.as_str(),
            timestamp_to_sql(conversation.timestamp),
            conversation.duration,
            conversation.transcript,
            conversation.source_file,
        ],
    )?;
    let conversation_id = conn.last_insert_rowid();

    for (name, number) in &conversation.participants {
        let contact_id = upsert_contact(conn, name, number)?;
        conn.execute(
            "INSERT OR IGNORE INTO participant (conversation_id, contact_id) VALUES (?1, ?2)",
            params![conversation_id, contact_id],
        )?;
    }

    let mut captured = 0usize;
    for message in &conversation.messages {
        let sender_id = upsert_contact(conn, &message.sender, &message.sender_number)?;
        conn.execute(
            r#"
            INSERT INTO message (conversation_id, timestamp, sender_contact_id, content)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                conversation_id,
                timestamp_to_sql(message.timestamp),
                sender_id,
                message.content,
            ],
        )?;
        let message_id = conn.last_insert_rowid();

        for (position, url) in message.images.iter().enumerate() {
            conn.execute(
                "INSERT INTO image (message_id, position, image_url) VALUES (?1, ?2, ?3)",
                params![message_id, position as i64, url],
            )?;
            let image_id = conn.last_insert_rowid();

            if let Some(attachment) = media.and_then(|m| m.load(url)) {
                conn.execute(
                    "INSERT INTO media_file (image_id, file_name, content) VALUES (?1, ?2, ?3)",
                    params![image_id, attachment.file_name, attachment.content],
                )?;
                captured += 1;
            }
        }
    }

    tracing::debug!(
        conversation_id,
        source_file = %conversation.source_file,
        messages = conversation.messages.len(),
        media = captured,
        "Inserted conversation"
    );

    Ok(conversation_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn message(sender: &str, number: &str, content: &str, images: &[&str]) -> Message {
        Message {
            timestamp: Some(Utc::now()),
            sender: sender.to_string(),
            sender_number: number.to_string(),
            content: content.to_string(),
            images: images.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn create_test_chat(source_file: &str) -> Conversation {
        let messages = vec![
            message("Me", "+2222", "hello", &[]),
            message("Tony", "+333", "MMS Sent", &["Tony - Text - 2022-07-01T01_06_39Z-2-1"]),
        ];
        Conversation {
            kind: ConversationKind::Chat,
            participants: BTreeMap::from([
                ("Me".to_string(), "+2222".to_string()),
                ("Tony".to_string(), "+333".to_string()),
            ]),
            timestamp: messages[0].timestamp,
            duration: None,
            messages,
            transcript: None,
            source_file: source_file.to_string(),
        }
    }

    #[test]
    fn test_insert_conversation_shares_contacts() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let first = db.insert_conversation(&create_test_chat("a.html"), None).unwrap();
        let second = db.insert_conversation(&create_test_chat("b.html"), None).unwrap();
        assert_ne!(first, second);

        let stats = db.stats().unwrap();
        assert_eq!(stats.conversations, 2);
        assert_eq!(stats.contacts, 2);
        assert_eq!(stats.messages, 4);
        assert_eq!(stats.images, 2);
        assert_eq!(stats.media_files, 0);
    }

    #[test]
    fn test_failed_insert_leaves_no_rows() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.connection()
            .execute_batch(
                "CREATE TRIGGER reject_image BEFORE INSERT ON image
                 BEGIN SELECT RAISE(ABORT, 'image rejected'); END;",
            )
            .unwrap();

        let result = db.insert_conversation(&create_test_chat("a.html"), None);
        assert!(result.is_err());

        let stats = db.stats().unwrap();
        assert_eq!(stats, DatabaseStats::default());
    }

    #[test]
    fn test_media_is_captured_when_resolvable() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Tony - Text - 2022-07-01T01_06_39Z-2-1.jpg"),
            b"jpeg bytes",
        )
        .unwrap();
        let resolver = MediaResolver::new(dir.path());

        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let id = db
            .insert_conversation(&create_test_chat("a.html"), Some(&resolver))
            .unwrap();

        let messages = db.read(|s| s.messages_for_conversations(&[id])).unwrap();
        let image = messages
            .iter()
            .flat_map(|m| m.images.iter())
            .next()
            .unwrap();
        assert!(image.has_media);

        let media = db.media_for_image(image.id).unwrap().unwrap();
        assert_eq!(media.file_name, "Tony - Text - 2022-07-01T01_06_39Z-2-1.jpg");
        assert_eq!(media.content, b"jpeg bytes");
    }

    #[test]
    fn test_replace_source_conversation() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let first = db
            .replace_source_conversation("a.html", "hash-1", &create_test_chat("a.html"), None)
            .unwrap();
        let record = db.get_source_file("a.html").unwrap().unwrap();
        assert_eq!(record.content_hash, "hash-1");
        assert_eq!(record.conversation_id, Some(first));

        let second = db
            .replace_source_conversation("a.html", "hash-2", &create_test_chat("a.html"), None)
            .unwrap();
        assert_ne!(first, second);

        let stats = db.stats().unwrap();
        assert_eq!(stats.conversations, 1);
        assert_eq!(stats.messages, 2);
        assert!(db.get_conversation(first).is_err());

        let record = db.get_source_file("a.html").unwrap().unwrap();
        assert_eq!(record.content_hash, "hash-2");
        assert_eq!(record.conversation_id, Some(second));
    }

    #[test]
    fn test_delete_conversation_cascades() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let id = db
            .replace_source_conversation("a.html", "hash", &create_test_chat("a.html"), None)
            .unwrap();

        assert!(db.delete_conversation(id).unwrap());
        assert!(!db.delete_conversation(id).unwrap());

        let stats = db.stats().unwrap();
        assert_eq!(stats.conversations, 0);
        assert_eq!(stats.messages, 0);
        assert_eq!(stats.images, 0);
        assert_eq!(stats.contacts, 2);

        let record = db.get_source_file("a.html").unwrap().unwrap();
        assert_eq!(record.conversation_id, None);
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = DateTime::parse_from_rfc3339("2022-06-30T18:06:39.894-07:00")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2022-07-01T01:06:46.025Z")
            .unwrap()
            .with_timezone(&Utc);

        let a = timestamp_to_sql(Some(earlier)).unwrap();
        let b = timestamp_to_sql(Some(later)).unwrap();
        assert_eq!(a, "2022-07-01T01:06:39.894Z");
        assert!(a < b);
        assert_eq!(timestamp_from_sql(Some(a)), Some(earlier));
    }
}

//! Read queries over one transaction
//!
//! A [`Snapshot`] is handed out by [`Database::read`](super::Database::read).
//! Every query in a single `read` call observes the same database state.

use super::repo::{timestamp_from_sql, DatabaseStats};
use crate::error::{Error, Result};
use crate::types::*;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

/// Maximum ids bound into one `IN (...)` list.
const ID_CHUNK: usize = 500;

/// Number of chat lines in a conversation preview.
const PREVIEW_LINES: i64 = 5;

/// Search joins and filter. `?1` is a LIKE pattern, or NULL to match all.
const SEARCH_FROM: &str = r#"
    FROM conversation c
    LEFT JOIN message m ON m.conversation_id = c.id
    LEFT JOIN contact ct ON ct.id = m.sender_contact_id
    WHERE ?1 IS NULL
       OR c.transcript LIKE ?1
       OR m.content LIKE ?1
       OR ct.name LIKE ?1
"#;

/// One `(conversation, contact)` participant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantRow {
    pub conversation_id: i64,
    pub contact_id: i64,
}

/// A conversation header joined with one of its participants.
///
/// `contact_id` is `None` for conversations without participants.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationParticipantRow {
    pub conversation_id: i64,
    pub kind: ConversationKind,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub contact_id: Option<i64>,
}

/// Read access inside one transaction.
pub struct Snapshot<'a> {
    conn: &'a Connection,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ============================================
    // Reconciler inputs
    // ============================================

    /// All participant rows ordered by conversation id.
    pub fn participant_rows(&self) -> Result<Vec<ParticipantRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT conversation_id, contact_id FROM participant
             ORDER BY conversation_id, contact_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ParticipantRow {
                    conversation_id: row.get(0)?,
                    contact_id: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every conversation with its participants, most recent conversation
    /// first. Rows of one conversation are adjacent.
    pub fn conversation_participant_rows(&self) -> Result<Vec<ConversationParticipantRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.type, c.timestamp, p.contact_id
            FROM conversation c
            LEFT JOIN participant p ON p.conversation_id = c.id
            ORDER BY c.timestamp DESC, c.id DESC, p.contact_id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                let kind: String = row.get(1)?;
                Ok(ConversationParticipantRow {
                    conversation_id: row.get(0)?,
                    kind: parse_kind(&kind),
                    timestamp: timestamp_from_sql(row.get(2)?),
                    contact_id: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Messages of the given conversations, most recent first, with senders
    /// and images resolved.
    pub fn messages_for_conversations(&self, ids: &[i64]) -> Result<Vec<ThreadMessage>> {
        let mut messages = Vec::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                r#"
                SELECT m.id, m.conversation_id, m.timestamp, m.content,
                       ct.id AS contact_id, ct.name, ct.phone_number
                FROM message m
                JOIN contact ct ON ct.id = m.sender_contact_id
                WHERE m.conversation_id IN ({})
                "#,
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), row_to_thread_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            messages.extend(rows);
        }

        // None sorts below every timestamp, so undated messages come last
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        let mut images = self.images_for_messages(&ids)?;
        for message in &mut messages {
            message.images = images.remove(&message.id).unwrap_or_default();
        }

        Ok(messages)
    }

    fn images_for_messages(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<StoredImage>>> {
        let mut images: HashMap<i64, Vec<StoredImage>> = HashMap::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                r#"
                SELECT i.id, i.message_id, i.image_url, mf.id IS NOT NULL AS has_media
                FROM image i
                LEFT JOIN media_file mf ON mf.image_id = i.id
                WHERE i.message_id IN ({})
                ORDER BY i.message_id, i.position
                "#,
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, i64>(1)?,
                    StoredImage {
                        id: row.get(0)?,
                        image_url: row.get(2)?,
                        has_media: row.get(3)?,
                    },
                ))
            })?;
            for row in rows {
                let (message_id, image) = row?;
                images.entry(message_id).or_default().push(image);
            }
        }
        Ok(images)
    }

    // ============================================
    // Contacts and conversations
    // ============================================

    /// Contacts for the given ids, ordered by id. Unknown ids are skipped.
    pub fn get_contacts(&self, ids: &[i64]) -> Result<Vec<Contact>> {
        let mut contacts = Vec::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT id, name, phone_number FROM contact WHERE id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), row_to_contact)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            contacts.extend(rows);
        }
        contacts.sort_by_key(|c| c.id);
        contacts.dedup_by_key(|c| c.id);
        Ok(contacts)
    }

    /// Get a conversation header with its participants
    pub fn get_conversation(&self, id: i64) -> Result<StoredConversation> {
        let header = self
            .conn
            .query_row(
                r#"
                SELECT id, type, timestamp, duration, transcript, source_file
                FROM conversation WHERE id = ?
                "#,
                [id],
                |row| {
                    let kind: String = row.get(1)?;
                    Ok(StoredConversation {
                        id: row.get(0)?,
                        kind: parse_kind(&kind),
                        timestamp: timestamp_from_sql(row.get(2)?),
                        duration: row.get(3)?,
                        transcript: row.get(4)?,
                        source_file: row.get(5)?,
                        participants: Vec::new(),
                    })
                },
            )
            .optional()?;

        let mut conversation = header.ok_or(Error::ConversationNotFound(id))?;
        conversation.participants = self.get_participants(id)?;
        Ok(conversation)
    }

    /// Participants of a conversation, ordered by contact id
    pub fn get_participants(&self, conversation_id: i64) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ct.id, ct.name, ct.phone_number
            FROM participant p
            JOIN contact ct ON ct.id = p.contact_id
            WHERE p.conversation_id = ?
            ORDER BY ct.id
            "#,
        )?;
        let contacts = stmt
            .query_map([conversation_id], row_to_contact)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    // ============================================
    // Search
    // ============================================

    /// Conversations whose transcript, message content or sender name
    /// contains `term`, newest first. `None` matches every conversation.
    pub fn search_conversations(
        &self,
        term: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ConversationSummary>> {
        let sql = format!(
            r#"
            SELECT DISTINCT c.id, c.type, c.timestamp, c.duration
            {}
            ORDER BY c.timestamp DESC, c.id DESC
            LIMIT ?2 OFFSET ?3
            "#,
            SEARCH_FROM
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let headers = stmt
            .query_map(params![like_pattern(term), limit as i64, offset as i64], |row| {
                let kind: String = row.get(1)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    parse_kind(&kind),
                    timestamp_from_sql(row.get(2)?),
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        headers
            .into_iter()
            .map(|(id, kind, timestamp, duration)| {
                Ok(ConversationSummary {
                    id,
                    kind,
                    timestamp,
                    duration,
                    participants: self.get_participants(id)?,
                    preview: self.conversation_preview(id)?,
                })
            })
            .collect()
    }

    /// Number of conversations matching `term`
    pub fn count_conversations(&self, term: Option<&str>) -> Result<i64> {
        let sql = format!("SELECT COUNT(DISTINCT c.id) {}", SEARCH_FROM);
        Ok(self
            .conn
            .query_row(&sql, params![like_pattern(term)], |r| r.get(0))?)
    }

    /// Voicemail transcript, or the first chat lines as `name: content`.
    pub fn conversation_preview(&self, id: i64) -> Result<String> {
        let transcript: Option<String> = self
            .conn
            .query_row(
                "SELECT transcript FROM conversation WHERE id = ?",
                [id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or(Error::ConversationNotFound(id))?;
        if let Some(transcript) = transcript {
            return Ok(transcript);
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT ct.name, m.content
            FROM message m
            JOIN contact ct ON ct.id = m.sender_contact_id
            WHERE m.conversation_id = ?1
            ORDER BY m.timestamp ASC, m.id ASC
            LIMIT ?2
            "#,
        )?;
        let lines = stmt
            .query_map(params![id, PREVIEW_LINES], |row| {
                Ok(format!(
                    "{}: {}",
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    // ============================================
    // Stats and media
    // ============================================

    pub fn count_messages(&self) -> Result<i64> {
        self.count("message")
    }

    pub fn count_contacts(&self) -> Result<i64> {
        self.count("contact")
    }

    /// Row counts for the whole database
    pub fn stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            conversations: self.count("conversation")?,
            contacts: self.count_contacts()?,
            messages: self.count_messages()?,
            images: self.count("image")?,
            media_files: self.count("media_file")?,
        })
    }

    fn count(&self, table: &str) -> Result<i64> {
        Ok(self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
    }

    /// Captured bytes of an attachment, if any
    pub fn media_for_image(&self, image_id: i64) -> Result<Option<MediaFile>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, image_id, file_name, content FROM media_file WHERE image_id = ?",
                [image_id],
                |row| {
                    Ok(MediaFile {
                        id: row.get(0)?,
                        image_id: row.get(1)?,
                        file_name: row.get(2)?,
                        content: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// `%term%`, or `None` to match everything.
fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(|t| format!("%{}%", t))
}

fn parse_kind(raw: &str) -> ConversationKind {
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unknown conversation type in database");
        ConversationKind::Chat
    })
}

fn row_to_contact(row: &Row) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        phone_number: row.get(2)?,
    })
}

fn row_to_thread_message(row: &Row) -> rusqlite::Result<ThreadMessage> {
    Ok(ThreadMessage {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        timestamp: timestamp_from_sql(row.get("timestamp")?),
        sender: Contact {
            id: row.get("contact_id")?,
            name: row.get("name")?,
            phone_number: row.get("phone_number")?,
        },
        content: row.get("content")?,
        images: Vec::new(),
    })
}

//! Reconciliation of split conversations into groups
//!
//! An export may split one ongoing thread over several documents. The only
//! stable merge key is the exact set of contacts involved, so conversations
//! are grouped by that set. Subsets and supersets are different groups.
//!
//! Groups are never stored. Each query recomputes them from the persisted
//! conversations inside one read transaction.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gvtakeout_core::{ContactSet, Database, Reconciler};
//!
//! let db = Database::open_in_memory()?;
//! db.migrate()?;
//!
//! let reconciler = Reconciler::new(&db);
//! for group in reconciler.list_groups()? {
//!     println!("{} {} messages", group.key, group.messages.len());
//! }
//!
//! let thread = reconciler.group(&ContactSet::parse_key("1,2,3")?)?;
//! # Ok::<(), gvtakeout_core::Error>(())
//! ```

pub mod state;

pub use state::{ContactSet, ExactSetMatcher, GroupIndex, GroupSeed, Verdict};

use crate::db::{Database, Snapshot};
use crate::error::Result;
use crate::types::{Contact, ConversationKind, ThreadMessage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Conversations that share one exact contact set.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    /// Sorted, comma-joined contact ids
    pub key: String,
    /// Type of the most recent conversation
    pub kind: ConversationKind,
    pub timestamp: Option<DateTime<Utc>>,
    pub last_conversation_id: i64,
    /// Most recent first
    pub conversation_ids: Vec<i64>,
    pub participants: Vec<Contact>,
    /// Union of all member conversations' messages, most recent first
    pub messages: Vec<ThreadMessage>,
}

/// Computes groups over a database.
pub struct Reconciler<'a> {
    db: &'a Database,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Every group, most recent first.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        self.db.read(|snapshot| {
            let seeds = GroupIndex::from_rows(snapshot.conversation_participant_rows()?)
                .into_groups();
            tracing::debug!(groups = seeds.len(), "Indexed groups");
            assemble(snapshot, seeds)
        })
    }

    /// The group for exactly `contacts`, or `None` when no conversation has
    /// that contact set.
    ///
    /// The empty set selects conversations without any participants.
    pub fn group(&self, contacts: &ContactSet) -> Result<Option<Group>> {
        self.db.read(|snapshot| {
            let ids = if contacts.is_empty() {
                snapshot
                    .conversation_participant_rows()?
                    .into_iter()
                    .filter(|row| row.contact_id.is_none())
                    .map(|row| row.conversation_id)
                    .collect()
            } else {
                state::matching_conversations(snapshot.participant_rows()?, contacts)
            };
            tracing::debug!(key = %contacts, conversations = ids.len(), "Matched group");

            if ids.is_empty() {
                return Ok(None);
            }

            let mut headers = ids
                .iter()
                .map(|&id| snapshot.get_conversation(id))
                .collect::<Result<Vec<_>>>()?;
            headers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

            let latest = &headers[0];
            let seed = GroupSeed {
                contacts: contacts.clone(),
                kind: latest.kind,
                timestamp: latest.timestamp,
                last_conversation_id: latest.id,
                conversation_ids: headers.iter().map(|h| h.id).collect(),
            };
            Ok(assemble(snapshot, vec![seed])?.pop())
        })
    }
}

/// Attach contacts and messages to group seeds with one query each.
fn assemble(snapshot: &Snapshot<'_>, seeds: Vec<GroupSeed>) -> Result<Vec<Group>> {
    let mut group_of: HashMap<i64, usize> = HashMap::new();
    let mut conversation_ids = Vec::new();
    let mut contact_ids = Vec::new();
    for (i, seed) in seeds.iter().enumerate() {
        for &id in &seed.conversation_ids {
            group_of.insert(id, i);
            conversation_ids.push(id);
        }
        contact_ids.extend_from_slice(seed.contacts.ids());
    }

    let contacts: HashMap<i64, Contact> = snapshot
        .get_contacts(&contact_ids)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut messages: Vec<Vec<ThreadMessage>> = vec![Vec::new(); seeds.len()];
    for message in snapshot.messages_for_conversations(&conversation_ids)? {
        if let Some(&i) = group_of.get(&message.conversation_id) {
            messages[i].push(message);
        }
    }

    Ok(seeds
        .into_iter()
        .zip(messages)
        .map(|(seed, messages)| Group {
            key: seed.contacts.key(),
            kind: seed.kind,
            timestamp: seed.timestamp,
            last_conversation_id: seed.last_conversation_id,
            participants: seed
                .contacts
                .ids()
                .iter()
                .filter_map(|id| contacts.get(id).cloned())
                .collect(),
            conversation_ids: seed.conversation_ids,
            messages,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Conversation, Message};
    use std::collections::BTreeMap;

    fn ts(raw: &str) -> Option<DateTime<Utc>> {
        Some(
            DateTime::parse_from_rfc3339(raw)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn chat(source: &str, people: &[(&str, &str)], lines: &[(&str, &str)]) -> Conversation {
        let participants: BTreeMap<String, String> = people
            .iter()
            .map(|(n, p)| (n.to_string(), p.to_string()))
            .collect();
        let messages: Vec<Message> = lines
            .iter()
            .map(|(at, sender)| Message {
                timestamp: ts(at),
                sender: sender.to_string(),
                sender_number: participants[*sender].clone(),
                content: format!("{} at {}", sender, at),
                images: vec![],
            })
            .collect();
        Conversation {
            kind: ConversationKind::Chat,
            participants,
            timestamp: messages.iter().filter_map(|m| m.timestamp).min(),
            duration: None,
            messages,
            transcript: None,
            source_file: source.to_string(),
        }
    }

    const TRIO: &[(&str, &str)] = &[("Me", "+2222"), ("Mike", "+8888"), ("Tony", "+333")];
    const PAIR: &[(&str, &str)] = &[("Me", "+2222"), ("Tony", "+333")];

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.insert_conversation(
            &chat(
                "group-1.html",
                TRIO,
                &[("2024-05-22T21:48:32Z", "Mike"), ("2024-05-22T21:49:25Z", "Me")],
            ),
            None,
        )
        .unwrap();
        db.insert_conversation(
            &chat("pair.html", PAIR, &[("2024-06-01T10:00:00Z", "Tony")]),
            None,
        )
        .unwrap();
        db.insert_conversation(
            &chat(
                "group-2.html",
                TRIO,
                &[("2024-05-23T08:00:00Z", "Tony"), ("2024-05-23T08:01:00Z", "Me")],
            ),
            None,
        )
        .unwrap();
        db
    }

    #[test]
    fn test_list_groups_merges_exact_sets() {
        let db = seeded();
        let groups = Reconciler::new(&db).list_groups().unwrap();

        assert_eq!(groups.len(), 2);
        // pair conversation is the most recent
        assert_eq!(groups[0].participants.len(), 2);
        assert_eq!(groups[0].messages.len(), 1);

        let trio = &groups[1];
        assert_eq!(trio.participants.len(), 3);
        assert_eq!(trio.conversation_ids.len(), 2);
        assert_eq!(trio.messages.len(), 4);
        assert_eq!(trio.last_conversation_id, trio.conversation_ids[0]);
        assert_eq!(trio.timestamp, ts("2024-05-23T08:00:00Z"));

        let times: Vec<_> = trio.messages.iter().map(|m| m.timestamp).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_group_query_matches_list() {
        let db = seeded();
        let reconciler = Reconciler::new(&db);
        let groups = reconciler.list_groups().unwrap();

        for listed in &groups {
            let key = ContactSet::parse_key(&listed.key).unwrap();
            let group = reconciler.group(&key).unwrap().unwrap();
            assert_eq!(group.key, listed.key);
            assert_eq!(group.conversation_ids, listed.conversation_ids);
            assert_eq!(group.messages, listed.messages);
        }
    }

    #[test]
    fn test_subset_is_not_folded() {
        let db = seeded();
        let reconciler = Reconciler::new(&db);
        let trio = reconciler.list_groups().unwrap().remove(1);

        let ids = ContactSet::parse_key(&trio.key).unwrap();
        let subset = ContactSet::new(ids.ids()[..2].iter().copied());
        let superset = ContactSet::new(ids.ids().iter().copied().chain([999]));

        if let Some(group) = reconciler.group(&subset).unwrap() {
            assert!(group
                .conversation_ids
                .iter()
                .all(|id| !trio.conversation_ids.contains(id)));
        }
        assert!(reconciler.group(&superset).unwrap().is_none());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let db = seeded();
        let reconciler = Reconciler::new(&db);
        let first = reconciler.list_groups().unwrap();
        let second = reconciler.list_groups().unwrap();

        let shape = |groups: &[Group]| -> Vec<(String, usize)> {
            groups
                .iter()
                .map(|g| (g.key.clone(), g.messages.len()))
                .collect()
        };
        assert_eq!(shape(&first), shape(&second));
    }

    #[test]
    fn test_participantless_conversations_group_under_empty_key() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let mut conv = chat("x.html", &[], &[]);
        conv.kind = ConversationKind::MissedCall;
        let id = db.insert_conversation(&conv, None).unwrap();

        let groups = Reconciler::new(&db).list_groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "");
        assert!(groups[0].participants.is_empty());

        let group = Reconciler::new(&db)
            .group(&ContactSet::default())
            .unwrap()
            .unwrap();
        assert_eq!(group.conversation_ids, [id]);
    }

    #[test]
    fn test_empty_database() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let reconciler = Reconciler::new(&db);
        assert!(reconciler.list_groups().unwrap().is_empty());
        assert!(reconciler
            .group(&ContactSet::new([1, 2]))
            .unwrap()
            .is_none());
    }
}

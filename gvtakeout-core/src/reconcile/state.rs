//! Grouping state machines
//!
//! Both folds consume participant rows in a fixed order and never look back:
//!
//! - [`ExactSetMatcher`] reads rows ordered by conversation id and decides,
//!   per conversation, whether its contact set equals a target set.
//! - [`GroupIndex`] reads rows ordered most-recent-conversation-first and
//!   assigns every conversation to the group of its exact contact set.

use crate::db::{ConversationParticipantRow, ParticipantRow};
use crate::error::{Error, Result};
use crate::types::ConversationKind;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

// ============================================
// ContactSet
// ============================================

/// A sorted, de-duplicated set of contact ids.
///
/// The key form is the ids joined by commas, e.g. `"1,4,9"`. The empty set
/// has the empty key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactSet(Vec<i64>);

impl ContactSet {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut ids: Vec<i64> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    /// Parse a key produced by [`Self::key`].
    pub fn parse_key(key: &str) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(Self::default());
        }
        key.split(',')
            .map(|part| part.trim().parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Self::new)
            .map_err(|_| Error::InvalidGroupKey(key.to_string()))
    }

    pub fn key(&self) -> String {
        self.0
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.binary_search(&id).is_ok()
    }
}

impl FromIterator<i64> for ContactSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for ContactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ============================================
// Exact-set matching
// ============================================

/// Final decision for one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid(i64),
    Invalid(i64),
}

/// State of the conversation currently being read.
#[derive(Debug)]
enum ConversationState {
    /// Every contact so far is in the target; `seen` tracks which ones.
    Accumulating { id: i64, seen: BTreeSet<i64> },
    /// A contact outside the target was seen.
    Rejected { id: i64 },
}

impl ConversationState {
    fn id(&self) -> i64 {
        match self {
            ConversationState::Accumulating { id, .. } | ConversationState::Rejected { id } => *id,
        }
    }
}

/// Decides, per conversation, whether its contacts are exactly `target`.
///
/// Feed rows ordered by conversation id with [`push`](Self::push); a
/// verdict for a conversation is emitted when the next conversation starts,
/// and the last one by [`finish`](Self::finish).
#[derive(Debug)]
pub struct ExactSetMatcher<'a> {
    target: &'a ContactSet,
    current: Option<ConversationState>,
}

impl<'a> ExactSetMatcher<'a> {
    pub fn new(target: &'a ContactSet) -> Self {
        Self {
            target,
            current: None,
        }
    }

    pub fn push(&mut self, row: ParticipantRow) -> Option<Verdict> {
        let changed = self
            .current
            .as_ref()
            .is_some_and(|state| state.id() != row.conversation_id);
        let verdict = if changed {
            self.current.take().map(|state| self.finalize(state))
        } else {
            None
        };

        let state = match self.current.take() {
            Some(state) => state,
            None => ConversationState::Accumulating {
                id: row.conversation_id,
                seen: BTreeSet::new(),
            },
        };
        self.current = Some(self.step(state, row.contact_id));

        verdict
    }

    pub fn finish(mut self) -> Option<Verdict> {
        self.current.take().map(|s| self.finalize(s))
    }

    fn step(&self, state: ConversationState, contact_id: i64) -> ConversationState {
        match state {
            ConversationState::Accumulating { id, mut seen } => {
                if self.target.contains(contact_id) {
                    seen.insert(contact_id);
                    ConversationState::Accumulating { id, seen }
                } else {
                    ConversationState::Rejected { id }
                }
            }
            rejected @ ConversationState::Rejected { .. } => rejected,
        }
    }

    fn finalize(&self, state: ConversationState) -> Verdict {
        match state {
            ConversationState::Accumulating { id, seen } if seen.len() == self.target.len() => {
                Verdict::Valid(id)
            }
            state => Verdict::Invalid(state.id()),
        }
    }
}

/// Conversation ids whose contact set equals `target`, in row order.
pub fn matching_conversations(
    rows: impl IntoIterator<Item = ParticipantRow>,
    target: &ContactSet,
) -> Vec<i64> {
    let mut matcher = ExactSetMatcher::new(target);
    let mut matched = Vec::new();
    for row in rows {
        if let Some(Verdict::Valid(id)) = matcher.push(row) {
            matched.push(id);
        }
    }
    if let Some(Verdict::Valid(id)) = matcher.finish() {
        matched.push(id);
    }
    matched
}

// ============================================
// Group index
// ============================================

/// A group before messages and contacts are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSeed {
    pub contacts: ContactSet,
    /// Taken from the most recent conversation
    pub kind: ConversationKind,
    pub timestamp: Option<DateTime<Utc>>,
    pub last_conversation_id: i64,
    /// Most recent first
    pub conversation_ids: Vec<i64>,
}

/// Conversation being accumulated from adjacent rows.
struct PendingConversation {
    id: i64,
    kind: ConversationKind,
    timestamp: Option<DateTime<Utc>>,
    contacts: Vec<i64>,
}

/// First-seen folding of conversations into groups.
#[derive(Debug, Default)]
pub struct GroupIndex {
    groups: Vec<GroupSeed>,
    by_contacts: HashMap<ContactSet, usize>,
}

impl GroupIndex {
    /// Fold rows ordered most recent conversation first, with the rows of one
    /// conversation adjacent.
    pub fn from_rows(rows: impl IntoIterator<Item = ConversationParticipantRow>) -> Self {
        let mut index = Self::default();
        let mut pending: Option<PendingConversation> = None;

        for row in rows {
            let starts_new = pending
                .as_ref()
                .map_or(true, |p| p.id != row.conversation_id);
            if starts_new {
                if let Some(done) = pending.take() {
                    index.add(done);
                }
                pending = Some(PendingConversation {
                    id: row.conversation_id,
                    kind: row.kind,
                    timestamp: row.timestamp,
                    contacts: Vec::new(),
                });
            }
            if let (Some(p), Some(contact_id)) = (pending.as_mut(), row.contact_id) {
                p.contacts.push(contact_id);
            }
        }
        if let Some(done) = pending {
            index.add(done);
        }

        index
    }

    fn add(&mut self, conversation: PendingConversation) {
        let contacts = ContactSet::new(conversation.contacts);
        match self.by_contacts.get(&contacts) {
            Some(&i) => self.groups[i].conversation_ids.push(conversation.id),
            None => {
                self.by_contacts.insert(contacts.clone(), self.groups.len());
                self.groups.push(GroupSeed {
                    contacts,
                    kind: conversation.kind,
                    timestamp: conversation.timestamp,
                    last_conversation_id: conversation.id,
                    conversation_ids: vec![conversation.id],
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in first-seen order.
    pub fn into_groups(self) -> Vec<GroupSeed> {
        self.groups
    }
}

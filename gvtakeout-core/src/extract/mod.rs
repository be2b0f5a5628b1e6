//! Conversation extraction from a markup tree
//!
//! One export document describes one conversation. The document walk looks
//! for three markers:
//!
//! | Element | Meaning |
//! |---------|---------|
//! | `<title>` containing `" to "` | sender and recipient names, numbers unknown |
//! | `<div class="hChatLog">` | a chat log (SMS, MMS, group MMS) |
//! | `<div class="haudio">` | a call or voicemail record |
//!
//! Each marker's handler walks its own subtree with its own rule table and
//! returns a finished fragment. Fragments are then folded into a single
//! [`Conversation`] in [`assemble`].
//!
//! # Precedence
//!
//! A call record with a recognized call type overrides a chat log, whatever
//! their order in the document. When a branch appears more than once, the
//! last occurrence in document order wins. Both cases log a warning.
//!
//! # Error Handling
//!
//! - **Bad timestamps** are logged and leave the field unset.
//! - **No chat log and no typed call record** is an [`Error::Extraction`].

mod call;
mod chat;
mod rules;

use crate::error::{Error, Result};
use crate::markup::{self, Element};
use crate::types::{Conversation, ConversationKind};
use chrono::{DateTime, Utc};
use rules::Rule;
use std::collections::BTreeMap;
use std::io::Read;

pub(crate) use call::CallRecord;
pub(crate) use chat::ChatLog;

/// Separator between sender and recipient in a document title.
const TITLE_SEPARATOR: &str = " to ";

/// A display name and the phone number found next to it (possibly empty).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Participant {
    pub name: String,
    pub number: String,
}

/// Something the document walk found.
#[derive(Debug)]
pub(crate) enum DocumentFragment {
    Title { sender: String, recipient: String },
    Chat(ChatLog),
    Call(CallRecord),
}

const DOCUMENT_RULES: &[Rule<DocumentFragment>] = &[
    Rule {
        tag: Some("title"),
        class: None,
        handler: title,
    },
    Rule {
        tag: Some("div"),
        class: Some("hChatLog"),
        handler: chat::chat_log,
    },
    Rule {
        tag: Some("div"),
        class: Some("haudio"),
        handler: call::call_record,
    },
];

/// Read, parse and extract one document.
pub fn extract_document<R: Read>(reader: &mut R) -> Result<Conversation> {
    let doc = markup::parse_document(reader)?;
    extract(&doc)
}

/// Extract the conversation described by a parsed document.
///
/// `source_file` is left empty; the importer fills it in.
pub fn extract(doc: &Element) -> Result<Conversation> {
    assemble(rules::collect(doc, DOCUMENT_RULES))
}

fn title(el: &Element, _: &[&Element], out: &mut Vec<DocumentFragment>) {
    let text = el.text().replace('\n', " ");
    let parts: Vec<&str> = text.split(TITLE_SEPARATOR).collect();
    if let [sender, recipient] = parts.as_slice() {
        out.push(DocumentFragment::Title {
            sender: sender.trim().to_string(),
            recipient: recipient.trim().to_string(),
        });
    }
}

/// Fold document fragments into one conversation.
fn assemble(fragments: Vec<DocumentFragment>) -> Result<Conversation> {
    let mut title_names: Vec<String> = Vec::new();
    let mut chat: Option<ChatLog> = None;
    let mut call: Option<CallRecord> = None;
    let mut branches = 0usize;

    for fragment in fragments {
        match fragment {
            DocumentFragment::Title { sender, recipient } => {
                title_names.push(sender);
                title_names.push(recipient);
            }
            DocumentFragment::Chat(log) => {
                branches += 1;
                chat = Some(log);
            }
            DocumentFragment::Call(record) => {
                branches += 1;
                call = Some(record);
            }
        }
    }

    if branches > 1 {
        tracing::warn!(
            branches,
            has_chat = chat.is_some(),
            has_call = call.is_some(),
            "Document has several conversation markers, applying precedence"
        );
    }

    let typed_call = call.filter(|record| {
        if record.kind.is_none() {
            tracing::warn!("Call record has no recognizable call type, ignoring it");
        }
        record.kind.is_some()
    });

    let mut conversation = match (typed_call, chat) {
        (Some(record), _) => record.into_conversation()?,
        (None, Some(log)) => log.into_conversation(),
        (None, None) => {
            return Err(Error::Extraction {
                message: "no chat log or typed call record found".to_string(),
            })
        }
    };

    // Title names only fill gaps: always for chats, for calls only when the
    // record named nobody. A call title's sender half is the call type
    // ("Placed call to Dwigt"), not a person.
    let is_chat = conversation.kind == ConversationKind::Chat;
    if is_chat || conversation.participants.is_empty() {
        for name in title_names
            .into_iter()
            .filter(|n| !n.is_empty() && (is_chat || !call::is_kind_marker(n)))
        {
            conversation.participants.entry(name).or_default();
        }
    }

    Ok(conversation)
}

/// Participant for a `class="fn"` element: its text is the name, the nearest
/// ancestor with a `tel:` link supplies the number.
pub(crate) fn participant(el: &Element, ancestors: &[&Element]) -> Option<Participant> {
    let name = el.text();
    if name.is_empty() {
        return None;
    }
    let number = ancestors
        .iter()
        .rev()
        .find_map(|a| a.tel())
        .unwrap_or_default()
        .to_string();
    Some(Participant { name, number })
}

/// Add a participant; a known number is never replaced by an empty one.
pub(crate) fn merge_participant(participants: &mut BTreeMap<String, String>, p: Participant) {
    match participants.get_mut(&p.name) {
        Some(_) if p.number.is_empty() => {}
        Some(existing) => *existing = p.number,
        None => {
            participants.insert(p.name, p.number);
        }
    }
}

/// Parse the RFC 3339 `title` attribute of a timestamp element.
///
/// Failures are logged and yield `None`.
pub(crate) fn title_timestamp(el: &Element) -> Option<DateTime<Utc>> {
    let Some(raw) = el.attr("title") else {
        tracing::warn!(tag = %el.tag, "Timestamp element has no title attribute");
        return None;
    };
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(value = %raw, error = %e, "Failed to parse timestamp");
            None
        }
    }
}

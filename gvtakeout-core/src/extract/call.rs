//! Call and voicemail record (`div.haudio`) extraction

use super::rules::{self, Rule};
use super::{merge_participant, participant, title_timestamp, DocumentFragment, Participant};
use crate::error::{Error, Result};
use crate::markup::Element;
use crate::types::{Conversation, ConversationKind};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Text markers that classify a call record, in priority order within one
/// text node.
const KIND_MARKERS: &[(&str, ConversationKind)] = &[
    ("Voicemail", ConversationKind::Voicemail),
    ("Placed call", ConversationKind::PlacedCall),
    ("Received call", ConversationKind::ReceivedCall),
    ("Missed call", ConversationKind::MissedCall),
];

/// Fields of one call record. `kind` is `None` when no marker was found.
#[derive(Debug, Default)]
pub(crate) struct CallRecord {
    pub kind: Option<ConversationKind>,
    pub participants: BTreeMap<String, String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub duration: Option<String>,
    pub transcript: Option<String>,
}

impl CallRecord {
    pub fn into_conversation(self) -> Result<Conversation> {
        let kind = self.kind.ok_or_else(|| Error::Extraction {
            message: "call record has no call type".to_string(),
        })?;
        Ok(Conversation {
            kind,
            participants: self.participants,
            timestamp: self.timestamp,
            duration: self.duration,
            messages: Vec::new(),
            transcript: self.transcript,
            source_file: String::new(),
        })
    }
}

enum CallFragment {
    Participant(Participant),
    Timestamp(Option<DateTime<Utc>>),
    Duration(String),
    Transcript(String),
}

const CALL_RULES: &[Rule<CallFragment>] = &[
    Rule {
        tag: Some("div"),
        class: Some("contributor"),
        handler: contributor,
    },
    Rule {
        tag: Some("span"),
        class: Some("full-text"),
        handler: transcript,
    },
    Rule {
        tag: Some("abbr"),
        class: Some("published"),
        handler: published,
    },
    Rule {
        tag: Some("abbr"),
        class: Some("duration"),
        handler: duration,
    },
];

const CONTRIBUTOR_RULES: &[Rule<CallFragment>] = &[Rule {
    tag: None,
    class: Some("fn"),
    handler: contributor_name,
}];

pub(super) fn call_record(el: &Element, _: &[&Element], out: &mut Vec<DocumentFragment>) {
    let mut record = CallRecord {
        kind: call_kind(el),
        ..CallRecord::default()
    };

    for fragment in rules::collect(el, CALL_RULES) {
        match fragment {
            CallFragment::Participant(p) => merge_participant(&mut record.participants, p),
            CallFragment::Timestamp(ts) => record.timestamp = ts,
            CallFragment::Duration(d) => record.duration = non_empty(d),
            CallFragment::Transcript(t) => record.transcript = non_empty(t),
        }
    }

    tracing::debug!(
        kind = ?record.kind,
        participants = record.participants.len(),
        "Parsed call record"
    );
    out.push(DocumentFragment::Call(record));
}

/// The first text node carrying a marker decides the call type.
fn call_kind(el: &Element) -> Option<ConversationKind> {
    let mut kind = None;
    el.walk_text(&mut |text| {
        if kind.is_none() {
            kind = KIND_MARKERS
                .iter()
                .find(|(marker, _)| text.contains(marker))
                .map(|(_, k)| *k);
        }
    });
    kind
}

/// Whether `name` is a call type label rather than a person.
pub(super) fn is_kind_marker(name: &str) -> bool {
    KIND_MARKERS.iter().any(|(marker, _)| name.starts_with(marker))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn contributor(el: &Element, _: &[&Element], out: &mut Vec<CallFragment>) {
    out.extend(rules::collect(el, CONTRIBUTOR_RULES));
}

fn contributor_name(el: &Element, ancestors: &[&Element], out: &mut Vec<CallFragment>) {
    if let Some(p) = participant(el, ancestors) {
        out.push(CallFragment::Participant(p));
    }
}

fn transcript(el: &Element, _: &[&Element], out: &mut Vec<CallFragment>) {
    out.push(CallFragment::Transcript(el.text()));
}

fn published(el: &Element, _: &[&Element], out: &mut Vec<CallFragment>) {
    out.push(CallFragment::Timestamp(title_timestamp(el)));
}

fn duration(el: &Element, _: &[&Element], out: &mut Vec<CallFragment>) {
    let text = el.text();
    out.push(CallFragment::Duration(
        text.trim_matches(|c| c == '(' || c == ')').to_string(),
    ));
}

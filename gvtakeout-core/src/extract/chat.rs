//! Chat log (`div.hChatLog`) extraction

use super::rules::{self, Rule};
use super::{merge_participant, participant, title_timestamp, DocumentFragment, Participant};
use crate::markup::Element;
use crate::types::{Conversation, ConversationKind, Message};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Participants and messages of one chat log, in document order.
#[derive(Debug, Default)]
pub(crate) struct ChatLog {
    pub participants: BTreeMap<String, String>,
    pub messages: Vec<Message>,
}

impl ChatLog {
    pub fn into_conversation(self) -> Conversation {
        let timestamp = self.messages.iter().filter_map(|m| m.timestamp).min();
        Conversation {
            kind: ConversationKind::Chat,
            participants: self.participants,
            timestamp,
            duration: None,
            messages: self.messages,
            transcript: None,
            source_file: String::new(),
        }
    }
}

// ============================================
// Chat log walk
// ============================================

enum ChatFragment {
    Participant(Participant),
    Message(Message),
}

const CHAT_RULES: &[Rule<ChatFragment>] = &[
    Rule {
        tag: None,
        class: Some("fn"),
        handler: chat_participant,
    },
    Rule {
        tag: Some("div"),
        class: Some("message"),
        handler: message,
    },
];

pub(super) fn chat_log(el: &Element, _: &[&Element], out: &mut Vec<DocumentFragment>) {
    let mut log = ChatLog::default();
    for fragment in rules::collect(el, CHAT_RULES) {
        match fragment {
            ChatFragment::Participant(p) => merge_participant(&mut log.participants, p),
            ChatFragment::Message(m) => log.messages.push(m),
        }
    }
    tracing::debug!(
        participants = log.participants.len(),
        messages = log.messages.len(),
        "Parsed chat log"
    );
    out.push(DocumentFragment::Chat(log));
}

fn chat_participant(el: &Element, ancestors: &[&Element], out: &mut Vec<ChatFragment>) {
    if let Some(p) = participant(el, ancestors) {
        out.push(ChatFragment::Participant(p));
    }
}

// ============================================
// Message walk
// ============================================

enum MessageFragment {
    Timestamp(Option<DateTime<Utc>>),
    Sender(Sender),
    Content(String),
    Image(String),
}

const MESSAGE_RULES: &[Rule<MessageFragment>] = &[
    Rule {
        tag: Some("abbr"),
        class: Some("dt"),
        handler: message_timestamp,
    },
    Rule {
        tag: Some("cite"),
        class: None,
        handler: cite,
    },
    Rule {
        tag: Some("q"),
        class: None,
        handler: content,
    },
    Rule {
        tag: Some("img"),
        class: None,
        handler: image,
    },
];

fn message(el: &Element, _: &[&Element], out: &mut Vec<ChatFragment>) {
    let mut timestamp = None;
    let mut sender = Sender::default();
    let mut content = String::new();
    let mut images = Vec::new();

    for fragment in rules::collect(el, MESSAGE_RULES) {
        match fragment {
            MessageFragment::Timestamp(ts) => timestamp = ts,
            MessageFragment::Sender(s) => sender = s,
            MessageFragment::Content(text) => content = text,
            MessageFragment::Image(src) => images.push(src),
        }
    }

    if sender.name.is_empty() {
        tracing::warn!(content = %content, "Skipping message without a sender");
        return;
    }

    out.push(ChatFragment::Message(Message {
        timestamp,
        sender: sender.name,
        sender_number: sender.number,
        content,
        images,
    }));
}

fn message_timestamp(el: &Element, _: &[&Element], out: &mut Vec<MessageFragment>) {
    out.push(MessageFragment::Timestamp(title_timestamp(el)));
}

fn content(el: &Element, _: &[&Element], out: &mut Vec<MessageFragment>) {
    out.push(MessageFragment::Content(el.text()));
}

fn image(el: &Element, _: &[&Element], out: &mut Vec<MessageFragment>) {
    if let Some(src) = el.attr("src") {
        out.push(MessageFragment::Image(src.to_string()));
    }
}

// ============================================
// Sender walk
// ============================================

#[derive(Debug, Default)]
struct Sender {
    name: String,
    number: String,
}

enum SenderFragment {
    Name(String),
    Number(String),
}

const SENDER_RULES: &[Rule<SenderFragment>] = &[
    Rule {
        tag: Some("abbr"),
        class: Some("fn"),
        handler: sender_name,
    },
    Rule {
        tag: Some("span"),
        class: Some("fn"),
        handler: sender_name,
    },
    Rule {
        tag: Some("a"),
        class: None,
        handler: sender_number,
    },
];

fn cite(el: &Element, _: &[&Element], out: &mut Vec<MessageFragment>) {
    let mut sender = Sender::default();
    for fragment in rules::collect(el, SENDER_RULES) {
        match fragment {
            SenderFragment::Name(name) => sender.name = name,
            SenderFragment::Number(number) => sender.number = number,
        }
    }
    out.push(MessageFragment::Sender(sender));
}

fn sender_name(el: &Element, _: &[&Element], out: &mut Vec<SenderFragment>) {
    out.push(SenderFragment::Name(el.text()));
}

fn sender_number(el: &Element, _: &[&Element], out: &mut Vec<SenderFragment>) {
    if let Some(number) = el.tel() {
        out.push(SenderFragment::Number(number.to_string()));
    }
}

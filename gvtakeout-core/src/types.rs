//! Core domain types for gvtakeout
//!
//! These types are the normalized record model produced from a Google Voice
//! takeout export.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Conversation** | Everything one export document describes: a call, a voicemail, or a chat |
//! | **Participant** | A display name and phone number seen in a conversation |
//! | **Contact** | A stored (name, phone number) identity, shared across conversations |
//! | **Group** | Conversations folded together because they have the exact same contacts |
//!
//! A phone number may be the empty string. That is a legitimate value: two
//! participants named "Alex" with and without a number are different contacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Conversation
// ============================================

/// What kind of record a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Chat,
    Voicemail,
    MissedCall,
    ReceivedCall,
    PlacedCall,
}

impl ConversationKind {
    /// Returns the identifier used in JSON and database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Chat => "chat",
            ConversationKind::Voicemail => "voicemail",
            ConversationKind::MissedCall => "missed_call",
            ConversationKind::ReceivedCall => "received_call",
            ConversationKind::PlacedCall => "placed_call",
        }
    }

    /// Returns a human-friendly label
    pub fn display_name(&self) -> &'static str {
        match self {
            ConversationKind::Chat => "Chat",
            ConversationKind::Voicemail => "Voicemail",
            ConversationKind::MissedCall => "Missed call",
            ConversationKind::ReceivedCall => "Received call",
            ConversationKind::PlacedCall => "Placed call",
        }
    }
}

impl std::fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConversationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(ConversationKind::Chat),
            "voicemail" => Ok(ConversationKind::Voicemail),
            "missed_call" => Ok(ConversationKind::MissedCall),
            "received_call" => Ok(ConversationKind::ReceivedCall),
            "placed_call" => Ok(ConversationKind::PlacedCall),
            _ => Err(format!("unknown conversation type: {}", s)),
        }
    }
}

/// One conversation, extracted from one export document.
///
/// Exactly one of the call-shaped fields (`duration`, `transcript`) or
/// `messages` is populated, depending on `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    /// Display name -> phone number (possibly empty)
    pub participants: BTreeMap<String, String>,
    /// Call time, or the earliest message time for chats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Free text such as "00:00:18"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// Export file name, set by the importer
    #[serde(default)]
    pub source_file: String,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: Option<DateTime<Utc>>,
    pub sender: String,
    pub sender_number: String,
    /// May be empty for image-only messages
    pub content: String,
    /// Attachment references in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

// ============================================
// Stored entities
// ============================================

/// A stored (name, phone number) identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub phone_number: String,
}

impl Contact {
    /// "Name (+1555...)" or just the name when the number is unknown.
    pub fn label(&self) -> String {
        if self.phone_number.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.phone_number)
        }
    }
}

/// A stored conversation header (no messages).
#[derive(Debug, Clone, Serialize)]
pub struct StoredConversation {
    pub id: i64,
    pub kind: ConversationKind,
    pub timestamp: Option<DateTime<Utc>>,
    pub duration: Option<String>,
    pub transcript: Option<String>,
    pub source_file: String,
    pub participants: Vec<Contact>,
}

/// A stored message with its sender resolved to a contact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub sender: Contact,
    pub content: String,
    pub images: Vec<StoredImage>,
}

/// An image reference attached to a stored message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredImage {
    pub id: i64,
    pub image_url: String,
    /// Whether the attachment bytes were captured at import time
    pub has_media: bool,
}

/// Raw bytes of a locally resolved attachment.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub id: i64,
    pub image_id: i64,
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Search hit for the conversation browser.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub kind: ConversationKind,
    pub timestamp: Option<DateTime<Utc>>,
    pub duration: Option<String>,
    pub participants: Vec<Contact>,
    /// Voicemail transcript, or the first few chat lines
    pub preview: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            ConversationKind::Chat,
            ConversationKind::Voicemail,
            ConversationKind::MissedCall,
            ConversationKind::ReceivedCall,
            ConversationKind::PlacedCall,
        ] {
            assert_eq!(kind.as_str().parse::<ConversationKind>().unwrap(), kind);
        }
        assert!("fax".parse::<ConversationKind>().is_err());
    }

    #[test]
    fn test_call_json_omits_chat_fields() {
        let conv = Conversation {
            kind: ConversationKind::MissedCall,
            participants: BTreeMap::from([("Dwigt".to_string(), "+66666".to_string())]),
            timestamp: None,
            duration: None,
            messages: vec![],
            transcript: None,
            source_file: "missed.html".to_string(),
        };

        let json = serde_json::to_value(&conv).unwrap();
        assert_eq!(json["type"], "missed_call");
        assert_eq!(json["participants"]["Dwigt"], "+66666");
        assert!(json.get("messages").is_none());
        assert!(json.get("duration").is_none());
        assert!(json.get("transcript").is_none());
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn test_message_json_omits_empty_images() {
        let msg = Message {
            timestamp: None,
            sender: "Me".to_string(),
            sender_number: "+2222".to_string(),
            content: "hi".to_string(),
            images: vec![],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("images").is_none());
        assert_eq!(json["sender_number"], "+2222");
    }

    #[test]
    fn test_contact_label() {
        let mut contact = Contact {
            id: 1,
            name: "Tony".to_string(),
            phone_number: "+333".to_string(),
        };
        assert_eq!(contact.label(), "Tony (+333)");
        contact.phone_number.clear();
        assert_eq!(contact.label(), "Tony");
    }
}

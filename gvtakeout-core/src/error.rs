//! Error types for gvtakeout-core

use thiserror::Error;

/// Main error type for the gvtakeout-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The markup could not be turned into a tree
    #[error("markup error: {message}")]
    Markup { message: String },

    /// The tree was built but no conversation shape was recognized
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Conversation not found
    #[error("conversation not found: {0}")]
    ConversationNotFound(i64),

    /// Group key is not a comma-separated list of contact ids
    #[error("invalid group key: {0}")]
    InvalidGroupKey(String),
}

/// Result type alias for gvtakeout-core
pub type Result<T> = std::result::Result<T, Error>;

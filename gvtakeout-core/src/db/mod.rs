//! Database layer for gvtakeout
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Transactional per-conversation writes
//! - Snapshot reads for the reconciler and search

pub mod queries;
pub mod repo;
pub mod schema;

pub use queries::{ConversationParticipantRow, ParticipantRow, Snapshot};
pub use repo::{Database, DatabaseStats, SourceFileRecord};

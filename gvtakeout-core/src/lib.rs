//! # gvtakeout-core
//!
//! Core library for gvtakeout - a Google Voice takeout converter.
//!
//! This library provides:
//! - A markup tree adapter over `html5ever`
//! - Extraction of one conversation per export document
//! - Attachment resolution for image references
//! - SQLite storage of contacts, conversations, messages and media
//! - Reconciliation of split threads into groups by exact contact set
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Documents:** export HTML files on disk (never modified)
//! - **Conversations:** extracted records, written as JSON lines or into SQLite
//! - **Groups:** computed on demand from stored conversations, never stored
//!
//! ## Example
//!
//! ```rust,no_run
//! use gvtakeout_core::{Config, Database, Reconciler};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let groups = Reconciler::new(&db).list_groups().expect("failed to list groups");
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, OutputFormat};
pub use db::Database;
pub use error::{Error, Result};
pub use extract::{extract, extract_document};
pub use ingest::{ImportCoordinator, ImportResult};
pub use media::MediaResolver;
pub use reconcile::{ContactSet, Group, Reconciler};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod markup;
pub mod media;
pub mod reconcile;
pub mod types;

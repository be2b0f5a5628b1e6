//! gvtakeout-groups - browse reconciled conversation threads
//!
//! Without a key, lists every group (conversations sharing one exact contact
//! set) most recent first. With a key such as `1,2,3`, prints the merged
//! thread for exactly those contacts.

use anyhow::{Context, Result};
use clap::Parser;
use gvtakeout_core::format::{
    format_contacts, format_relative_time_opt, format_timestamp, truncate_line,
};
use gvtakeout_core::{Config, ContactSet, ConversationKind, Database, Group, Reconciler};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gvtakeout-groups")]
#[command(about = "List reconciled Google Voice threads or show one thread")]
#[command(version)]
struct Args {
    /// Comma-separated contact ids of the thread to show
    key: Option<String>,

    /// Database path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

/// One line of the group listing.
#[derive(Serialize)]
struct GroupSummary<'a> {
    key: &'a str,
    kind: ConversationKind,
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
    last_conversation_id: i64,
    conversation_ids: &'a [i64],
    participants: &'a [gvtakeout_core::Contact],
    message_count: usize,
}

impl<'a> From<&'a Group> for GroupSummary<'a> {
    fn from(group: &'a Group) -> Self {
        Self {
            key: &group.key,
            kind: group.kind,
            timestamp: group.timestamp,
            last_conversation_id: group.last_conversation_id,
            conversation_ids: &group.conversation_ids,
            participants: &group.participants,
            message_count: group.messages.len(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        gvtakeout_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = args.db.clone().unwrap_or_else(|| config.resolved_database_path());
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let reconciler = Reconciler::new(&db);

    match args.key.as_deref() {
        None => {
            let groups = reconciler.list_groups().context("failed to list groups")?;
            tracing::info!(groups = groups.len(), "Listed groups");
            if args.format == "json" {
                let summaries: Vec<GroupSummary<'_>> = groups.iter().map(Into::into).collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                print_groups(&groups);
            }
        }
        Some(key) => {
            let contacts = ContactSet::parse_key(key)?;
            let Some(group) = reconciler.group(&contacts).context("failed to load group")? else {
                anyhow::bail!("No group found for key '{}'", contacts.key());
            };
            if args.format == "json" {
                println!("{}", serde_json::to_string_pretty(&group)?);
            } else {
                print_thread(&group);
            }
        }
    }

    Ok(())
}

fn print_groups(groups: &[Group]) {
    if groups.is_empty() {
        println!("No groups found in database.");
        println!("Run 'gvtakeout-import --format sqlite' first to import an export.");
        return;
    }

    println!("{} group(s):\n", groups.len());
    println!(
        "{:<14} {:<14} {:<10} {:>6} {:>6}  PARTICIPANTS",
        "KEY", "TYPE", "LAST", "CONVS", "MSGS"
    );
    for group in groups {
        let key = if group.key.is_empty() {
            "(none)"
        } else {
            group.key.as_str()
        };
        println!(
            "{:<14} {:<14} {:<10} {:>6} {:>6}  {}",
            truncate_line(key, 14),
            group.kind.display_name(),
            format_relative_time_opt(group.timestamp),
            group.conversation_ids.len(),
            group.messages.len(),
            format_contacts(&group.participants)
        );
    }
}

fn print_thread(group: &Group) {
    println!("Thread:        {}", format_contacts(&group.participants));
    println!("Key:           {}", group.key);
    println!(
        "Latest:        {} ({})",
        format_timestamp(group.timestamp),
        group.kind.display_name()
    );
    println!("Conversations: {}", group.conversation_ids.len());
    println!("Messages:      {}", group.messages.len());

    if group.messages.is_empty() {
        println!("\nNo chat messages in this thread.");
        return;
    }

    println!();
    for message in &group.messages {
        println!(
            "[{}] {}: {}",
            format_timestamp(message.timestamp),
            message.sender.name,
            message.content
        );
        for image in &message.images {
            let captured = if image.has_media { "captured" } else { "missing" };
            println!("    [image] {} ({})", image.image_url, captured);
        }
    }
}

//! gvtakeout-search - search imported conversations
//!
//! Matches voicemail transcripts, message content and sender names. Without
//! a term, pages through every conversation newest first.

use anyhow::{Context, Result};
use clap::Parser;
use gvtakeout_core::format::{format_contacts, format_timestamp, truncate_line};
use gvtakeout_core::{Config, ConversationSummary, Database};
use serde::Serialize;
use std::path::PathBuf;

/// Preview lines are cut to this many characters in text output.
const PREVIEW_WIDTH: usize = 100;

#[derive(Parser)]
#[command(name = "gvtakeout-search")]
#[command(about = "Search imported Google Voice conversations")]
#[command(version)]
struct Args {
    /// Text to look for (case-insensitive); omit to list everything
    term: Option<String>,

    /// Maximum number of conversations to show
    #[arg(short, long, default_value = "20")]
    limit: usize,

    /// Number of matching conversations to skip
    #[arg(long, default_value = "0")]
    offset: usize,

    /// Database path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    term: Option<&'a str>,
    total: i64,
    offset: usize,
    results: &'a [ConversationSummary],
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

    let term = args.term.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let total = db
        .count_conversations(term)
        .context("failed to count conversations")?;
    let results = db
        .search_conversations(term, args.limit, args.offset)
        .context("search failed")?;

    tracing::info!(term = ?term, total, shown = results.len(), "Search complete");

    if args.format == "json" {
        let output = SearchOutput {
            term,
            total,
            offset: args.offset,
            results: &results,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match term {
        Some(term) => println!("{} conversation(s) match '{}'", total, term),
        None => println!("{} conversation(s)", total),
    }
    if results.is_empty() {
        return Ok(());
    }
    println!(
        "Showing {}-{}\n",
        args.offset + 1,
        args.offset + results.len()
    );

    for hit in &results {
        print!(
            "#{:<5} {:<14} {}",
            hit.id,
            hit.kind.display_name(),
            format_timestamp(hit.timestamp)
        );
        match &hit.duration {
            Some(duration) => println!("  ({})", duration),
            None => println!(),
        }
        println!("       {}", format_contacts(&hit.participants));
        for line in hit.preview.lines() {
            println!("       | {}", truncate_line(line, PREVIEW_WIDTH));
        }
        println!();
    }

    Ok(())
}

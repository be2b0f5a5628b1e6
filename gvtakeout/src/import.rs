//! gvtakeout-import - convert a Google Voice takeout export
//!
//! Reads every export document in a directory and either prints one JSON
//! object per conversation on stdout, or imports the conversations into the
//! SQLite database.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/gvtakeout/conversations.db
//! - Logs: $XDG_STATE_HOME/gvtakeout/gvtakeout.log
//! - Config: $XDG_CONFIG_HOME/gvtakeout/config.toml

mod process_lock;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use gvtakeout_core::ingest::{ConversationSink, JsonLinesSink, SqliteSink};
use gvtakeout_core::{Config, Database, ImportCoordinator, ImportResult, MediaResolver, OutputFormat};
use indicatif::{ProgressBar, ProgressStyle};
use process_lock::acquire_import_guard;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gvtakeout-import")]
#[command(about = "Convert a Google Voice takeout export to JSON lines or SQLite")]
#[command(version)]
struct Args {
    /// Directory holding the exported .html files (overrides config)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Glob pattern selecting documents inside the directory
    #[arg(short, long)]
    pattern: Option<String>,

    /// Output format: json (stdout) or sqlite
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Database path (sqlite format only, overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Do not store attachment bytes
    #[arg(long)]
    no_media: bool,

    /// Dry run - discover documents but don't import
    #[arg(long)]
    dry_run: bool,

    /// Verbose output (-v lists files and warnings)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let mut config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        gvtakeout_core::logging::init(&config.logging).context("failed to initialize logging")?;

    if let Some(dir) = args.dir.clone() {
        config.import.export_dir = dir;
    }
    if let Some(pattern) = args.pattern.clone() {
        config.import.pattern = pattern;
    }
    if let Some(format) = args.format {
        config.import.format = format;
    }
    if args.no_media {
        config.import.capture_media = false;
    }
    config.import.validate().context("invalid import settings")?;

    tracing::info!(
        dir = %config.import.export_dir.display(),
        format = %config.import.format,
        "gvtakeout-import starting"
    );

    let coordinator = ImportCoordinator::from_config(&config.import);

    if args.dry_run {
        let files = coordinator
            .discover_files()
            .context("failed to discover export documents")?;
        println!(
            "Discovered {} document(s) in {}",
            files.len(),
            coordinator.dir().display()
        );
        if args.verbose >= 1 {
            for file in &files {
                println!("  {}", file.display());
            }
        }
        println!("\nDry run - no import performed");
        tracing::info!(files = files.len(), "Dry run complete");
        return Ok(());
    }

    match config.import.format {
        OutputFormat::Json => run_json(&coordinator, args.verbose),
        OutputFormat::Sqlite => {
            let db_path = args.db.clone().unwrap_or_else(|| config.resolved_database_path());
            let media = config
                .import
                .capture_media
                .then(|| MediaResolver::new(coordinator.dir()));
            run_sqlite(&coordinator, &db_path, media, args.verbose)
        }
    }
}

/// Stream conversations to stdout; the summary goes to stderr.
fn run_json(coordinator: &ImportCoordinator, verbose: u8) -> Result<()> {
    let stdout = io::stdout();
    let mut sink = JsonLinesSink::new(BufWriter::new(stdout.lock()));

    let result = coordinator.import_all(&mut sink).context("import failed")?;

    if verbose >= 1 || !result.errors.is_empty() {
        eprint!("{}", render_summary(&result, verbose));
    }

    tracing::info!(
        files_processed = result.files_processed,
        errors = result.errors.len(),
        "gvtakeout-import complete"
    );
    Ok(())
}

/// Import into SQLite with a progress bar.
fn run_sqlite(
    coordinator: &ImportCoordinator,
    db_path: &Path,
    media: Option<MediaResolver>,
    verbose: u8,
) -> Result<()> {
    let _import_guard =
        acquire_import_guard(db_path).context("failed to acquire process lock")?;

    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    println!("Database: {}", db_path.display());
    if verbose >= 1 {
        println!("Logs:     {}", gvtakeout_core::logging::log_file_path().display());
    }

    let mut sink = SqliteSink::new(&db);
    if let Some(media) = media {
        sink = sink.with_media(media);
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let result = import_with_bar(coordinator, &mut sink, &pb).context("import failed")?;
    pb.finish_and_clear();

    print!("{}", render_summary(&result, verbose));

    let stats = db.stats().context("failed to read database stats")?;
    println!("\nDatabase totals:");
    println!("  Conversations: {}", stats.conversations);
    println!("  Contacts:      {}", stats.contacts);
    println!("  Messages:      {}", stats.messages);
    println!("  Images:        {} ({} captured)", stats.images, stats.media_files);

    tracing::info!(
        files_processed = result.files_processed,
        files_skipped = result.files_skipped,
        messages_written = result.messages_written,
        "gvtakeout-import complete"
    );
    Ok(())
}

fn import_with_bar<S: ConversationSink + ?Sized>(
    coordinator: &ImportCoordinator,
    sink: &mut S,
    pb: &ProgressBar,
) -> gvtakeout_core::Result<ImportResult> {
    coordinator.import_all_with_progress(sink, |current, total, path| {
        if current == 0 {
            pb.set_length(total as u64);
        }
        pb.set_position(current as u64);
        pb.set_message(
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("...")
                .to_string(),
        );
    })
}

/// Import result summary
fn render_summary(result: &ImportResult, verbose: u8) -> String {
    let mut out = String::new();
    out.push_str("\nImport complete:\n");
    out.push_str(&format!("  Files processed:       {}\n", result.files_processed));
    out.push_str(&format!("  Files skipped:         {}\n", result.files_skipped));
    out.push_str(&format!(
        "  Conversations written: {}\n",
        result.conversations_written
    ));
    out.push_str(&format!("  Messages written:      {}\n", result.messages_written));

    if verbose >= 1 && !result.warnings.is_empty() {
        out.push_str(&format!("\nWarnings ({}):\n", result.warnings.len()));
        for warning in &result.warnings {
            out.push_str(&format!("  {}\n", warning));
        }
    }

    if !result.errors.is_empty() {
        out.push_str(&format!("\nErrors ({}):\n", result.errors.len()));
        for (path, err) in &result.errors {
            out.push_str(&format!("  {}: {}\n", shorten_path(path), err));
        }
    }
    out
}

/// Shorten a path for display by abbreviating the home directory
fn shorten_path(path: &Path) -> String {
    if let Ok(home) = std::env::var("HOME") {
        if let Ok(suffix) = path.strip_prefix(&home) {
            return format!("~/{}", suffix.display());
        }
    }
    path.display().to_string()
}

use gvtakeout_core::{Database, Reconciler};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    export: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let export = base.join("Takeout/Voice/Calls");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        seed_takeout_fixture(&export);

        Self {
            _temp_dir: temp_dir,
            home,
            export,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("gvtakeout/conversations.db")
    }

    fn export_arg(&self) -> String {
        self.export.to_string_lossy().into_owned()
    }
}

/// Copy the core crate's fixture export (documents and attachments).
fn seed_takeout_fixture(target: &Path) {
    let source =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../gvtakeout-core/tests/fixtures/takeout");

    fs::create_dir_all(target).expect("failed to create export directory");
    for entry in fs::read_dir(&source).expect("missing takeout fixtures") {
        let entry = entry.expect("failed to read fixture entry");
        fs::copy(entry.path(), target.join(entry.file_name())).expect("failed to copy fixture");
    }
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Output {
    let bin_path = match bin_name {
        "gvtakeout-import" => PathBuf::from(assert_cmd::cargo::cargo_bin!("gvtakeout-import")),
        "gvtakeout-groups" => PathBuf::from(assert_cmd::cargo::cargo_bin!("gvtakeout-groups")),
        "gvtakeout-search" => PathBuf::from(assert_cmd::cargo::cargo_bin!("gvtakeout-search")),
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    let mut command = Command::new(bin_path);

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn assert_success(bin_name: &str, args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "{bin_name} {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn import_sqlite(env: &CliTestEnv) -> Output {
    let dir = env.export_arg();
    let args = ["--dir", dir.as_str(), "--format", "sqlite"];
    let output = run_bin(env, "gvtakeout-import", &args);
    assert_success("gvtakeout-import", &args, &output);
    output
}

#[test]
fn import_json_writes_one_line_per_document() {
    let env = CliTestEnv::new();
    let dir = env.export_arg();
    let args = ["--dir", dir.as_str()];

    let output = run_bin(&env, "gvtakeout-import", &args);
    assert_success("gvtakeout-import", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("stdout should be JSON lines"))
        .collect();
    assert_eq!(lines.len(), 6, "expected one object per document:\n{stdout}");

    let voicemail = lines
        .iter()
        .find(|v| v["type"] == "voicemail")
        .expect("voicemail conversation");
    assert_eq!(voicemail["source_file"], "voicemail.html");
    assert_eq!(voicemail["participants"]["Sleve Mcdichael"], "+11111111111");
    assert!(voicemail.get("messages").is_none());

    // json output never touches the database
    assert!(!env.db_path().exists());
}

#[test]
fn import_sqlite_populates_db_and_skips_unchanged() {
    let env = CliTestEnv::new();

    let output = import_sqlite(&env);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Import complete:"));
    assert!(
        stdout.contains("Files processed:       6"),
        "expected import summary in stdout, got:\n{stdout}"
    );

    let db_path = env.db_path();
    assert!(
        db_path.exists(),
        "database file should exist at {}",
        db_path.display()
    );

    let db = Database::open(&db_path).expect("failed to open db");
    db.migrate().expect("failed to migrate db");
    let stats = db.stats().expect("failed to read stats");
    assert_eq!(stats.conversations, 6);
    assert_eq!(stats.messages, 17);
    assert_eq!(stats.media_files, 4);
    drop(db);

    let again = import_sqlite(&env);
    let stdout = String::from_utf8_lossy(&again.stdout);
    assert!(
        stdout.contains("Files skipped:         6"),
        "unchanged documents should be skipped, got:\n{stdout}"
    );
}

#[test]
fn import_dry_run_lists_documents_only() {
    let env = CliTestEnv::new();
    let dir = env.export_arg();
    let args = ["--dir", dir.as_str(), "--format", "sqlite", "--dry-run"];

    let output = run_bin(&env, "gvtakeout-import", &args);
    assert_success("gvtakeout-import", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Discovered 6 document(s)"));
    assert!(stdout.contains("Dry run - no import performed"));
    assert!(!env.db_path().exists());
}

#[test]
fn groups_and_search_work_on_imported_database() {
    let env = CliTestEnv::new();
    import_sqlite(&env);

    let list = run_bin(&env, "gvtakeout-groups", &[]);
    assert_success("gvtakeout-groups", &[], &list);
    let list_stdout = String::from_utf8_lossy(&list.stdout);
    assert!(list_stdout.contains("5 group(s)"), "got:\n{list_stdout}");
    assert!(list_stdout.contains("Mike Truk (+8888)"));

    let json_args = ["--format", "json"];
    let json = run_bin(&env, "gvtakeout-groups", &json_args);
    assert_success("gvtakeout-groups", &json_args, &json);
    let groups: serde_json::Value =
        serde_json::from_slice(&json.stdout).expect("groups json should parse");
    assert_eq!(groups.as_array().map(Vec::len), Some(5));

    // show the group MMS thread by key
    let db = Database::open(&env.db_path()).expect("failed to open db");
    let trio = Reconciler::new(&db)
        .list_groups()
        .expect("failed to list groups")
        .into_iter()
        .find(|g| g.participants.len() == 3)
        .expect("group MMS thread");
    drop(db);

    let show_args = [trio.key.as_str()];
    let show = run_bin(&env, "gvtakeout-groups", &show_args);
    assert_success("gvtakeout-groups", &show_args, &show);
    let show_stdout = String::from_utf8_lossy(&show.stdout);
    assert!(show_stdout.contains("Messages:      6"));
    assert!(show_stdout.contains("Tony Smehrik: Hahaha I love all of these"));
    assert!(show_stdout.contains("[image] Group Conversation - 2024-05-23T04_48_32Z-1-1 (captured)"));

    let search_args = ["manager"];
    let search = run_bin(&env, "gvtakeout-search", &search_args);
    assert_success("gvtakeout-search", &search_args, &search);
    let search_stdout = String::from_utf8_lossy(&search.stdout);
    assert!(search_stdout.contains("1 conversation(s) match 'manager'"));
    assert!(search_stdout.contains("Voicemail"));
}

#[test]
fn groups_rejects_malformed_key() {
    let env = CliTestEnv::new();
    import_sqlite(&env);

    let output = run_bin(&env, "gvtakeout-groups", &["1,abc"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid group key"), "got:\n{stderr}");
}

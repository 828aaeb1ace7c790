// Drives the binary's non-interactive paths. HOME points at a temp dir so
// logs and settings never touch the real state directory.

use std::path::Path;
use std::process::Output;

use assert_cmd::Command;

use typecafe::metrics::FinalMetrics;
use typecafe::session::{Mode, TextSource};
use typecafe::store::ResultStore;

fn typecafe(home: &Path, args: &[&str]) -> Output {
    Command::cargo_bin("typecafe")
        .unwrap()
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .unwrap()
}

fn seed(db: &Path, email: &str, wpm: f64) {
    let store = ResultStore::open(db).unwrap();
    let user = store.find_or_register(email, "Seed").unwrap();
    store
        .insert_result(
            &user,
            &FinalMetrics {
                duration_sec: 15,
                mode: Mode::Time,
                target_value: 15,
                wpm,
                raw_wpm: wpm,
                accuracy: 1.0,
                backspaces: 0,
                errors: 0,
                chars_typed: 100,
                words_typed: 20,
                source: TextSource::Random,
                snippet_id: None,
            },
        )
        .unwrap();
}

#[test]
fn help_describes_the_tool() {
    let home = tempfile::tempdir().unwrap();
    let out = typecafe(home.path(), &["--help"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--mode"));
    assert!(stdout.contains("export"));
}

#[test]
fn export_requires_a_user() {
    let home = tempfile::tempdir().unwrap();
    let db = home.path().join("results.db");
    let out = typecafe(home.path(), &["--db", db.to_str().unwrap(), "export"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--user"));
}

#[test]
fn export_prints_saved_results() {
    let home = tempfile::tempdir().unwrap();
    let db = home.path().join("results.db");
    seed(&db, "ada@example.com", 72.5);

    let out = typecafe(
        home.path(),
        &["--db", db.to_str().unwrap(), "--user", "ada@example.com", "export"],
    );
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains(",time,15,15,72.5,"));
}

#[test]
fn history_prints_aggregates_for_new_user() {
    let home = tempfile::tempdir().unwrap();
    let db = home.path().join("results.db");

    let out = typecafe(
        home.path(),
        &["--db", db.to_str().unwrap(), "--user", "new@example.com", "history"],
    );
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("tests 0"));
    assert!(stdout.contains("page 1 of 1"));

    let store = ResultStore::open(&db).unwrap();
    let user = store.find_user_by_email("new@example.com").unwrap().unwrap();
    assert_eq!(user.name.as_deref(), Some("new"));
}

#[test]
fn remembered_user_is_used_on_later_runs() {
    let home = tempfile::tempdir().unwrap();
    let db = home.path().join("results.db");
    let config = home.path().join("settings.json");
    let db_arg = db.to_str().unwrap();
    let config_arg = config.to_str().unwrap();
    seed(&db, "ada@example.com", 64.0);

    // The first run remembers the user.
    let first = typecafe(
        home.path(),
        &["--db", db_arg, "--config", config_arg, "--user", "ada@example.com", "history"],
    );
    assert!(first.status.success());

    let second = typecafe(home.path(), &["--db", db_arg, "--config", config_arg, "history"]);
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stdout).contains("64 wpm"));
}

#[test]
fn clear_removes_saved_results() {
    let home = tempfile::tempdir().unwrap();
    let db = home.path().join("results.db");
    seed(&db, "ada@example.com", 72.5);
    seed(&db, "ada@example.com", 80.0);

    let out = typecafe(
        home.path(),
        &["--db", db.to_str().unwrap(), "--user", "ada@example.com", "clear"],
    );
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("removed 2 results"));

    let store = ResultStore::open(&db).unwrap();
    let user = store.find_user_by_email("ada@example.com").unwrap().unwrap();
    assert_eq!(store.count_results(&user).unwrap(), 0);
}

#[test]
fn unwritable_log_location_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file as HOME makes the state directory impossible to create.
    let home = dir.path().join("not-a-dir");
    std::fs::write(&home, b"").unwrap();
    let db = dir.path().join("results.db");
    let config = dir.path().join("settings.json");

    let out = typecafe(
        &home,
        &[
            "--db",
            db.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--user",
            "ada@example.com",
            "history",
        ],
    );
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("logging disabled"));
}

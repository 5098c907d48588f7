use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn cafesync(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cafesync").unwrap();
    cmd.current_dir(dir)
        .env_remove("INSTAGRAM_ACCESS_TOKEN")
        .env_remove("INSTAGRAM_USER_ID")
        .env_remove("GOOGLE_AI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn store_json(id: &str, lat: Option<f64>) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "store_name": format!("Cafe {id}"),
        "address": "東京都渋谷区神南1-1-1",
        "lat": lat,
        "lng": lat.map(|_| 139.7),
        "caption": "latte",
        "media_url": "https://cdn.example/a.jpg",
        "permalink": "https://instagram.example/p/a",
        "timestamp": "2025-01-01T00:00:00+0000",
        "username": "cafe_hunter",
        "like_count": 3,
        "comments_count": 1,
        "media_type": "IMAGE"
    })
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    cafesync(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("refresh-media"))
        .stdout(predicate::str::contains("export"));
}

#[test]
fn init_writes_config_and_empty_files() {
    let dir = tempfile::tempdir().unwrap();
    cafesync(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("cafesync.toml"));

    let config = std::fs::read_to_string(dir.path().join("cafesync.toml")).unwrap();
    assert!(config.contains("[llm]"));
    assert!(config.contains("gemini-2.5-flash"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("skipped_posts.json")).unwrap(),
        "[]"
    );
    assert!(dir.path().join("cafe_data_kv.json").exists());
}

#[test]
fn status_on_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    cafesync(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("none fetched yet"))
        .stdout(predicate::str::contains("Consistency:       ok"));
}

#[test]
fn malformed_dotenv_warns_but_runs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "THIS LINE IS BROKEN\n").unwrap();
    cafesync(dir.path())
        .arg("status")
        .assert()
        .success()
        .stderr(predicate::str::contains("Cannot load .env file"));
}

#[test]
fn status_check_fails_on_overlap() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("cafe_data_kv.json"),
        &serde_json::json!([store_json("1", Some(35.6))]),
    );
    write_json(&dir.path().join("skipped_posts.json"), &serde_json::json!(["1"]));

    cafesync(dir.path())
        .args(["status", "--check"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("- 1"));
}

#[test]
fn dry_run_reports_candidates_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("instagram_posts.json"),
        &serde_json::json!([
            {"id": "1", "caption": "a"},
            {"id": "2", "caption": "b"},
            {"id": "3"}
        ]),
    );
    write_json(&dir.path().join("skipped_posts.json"), &serde_json::json!(["2"]));

    cafesync(dir.path())
        .args(["sync", "--offline", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would process:     2"));
    assert!(!dir.path().join("cafe_data_kv.json").exists());
}

#[test]
fn sync_without_api_key_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("instagram_posts.json"),
        &serde_json::json!([{"id": "1", "caption": "a"}]),
    );

    cafesync(dir.path())
        .args(["sync", "--offline"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("GOOGLE_AI_API_KEY"));
}

#[test]
fn sync_checks_api_key_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = r#"[{"id":"1","caption":"a"}]"#;
    std::fs::write(dir.path().join("instagram_posts.json"), snapshot).unwrap();

    // No Instagram credentials either: the LLM key must be the first failure.
    cafesync(dir.path())
        .arg("sync")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("GOOGLE_AI_API_KEY"))
        .stderr(predicate::str::contains("INSTAGRAM_ACCESS_TOKEN").not());

    assert_eq!(
        std::fs::read_to_string(dir.path().join("instagram_posts.json")).unwrap(),
        snapshot
    );
    assert!(!dir.path().join("cafe_data_kv.json").exists());
}

#[test]
fn online_dry_run_leaves_snapshot_untouched() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cafesync.toml"),
        "[source]\nhost = \"127.0.0.1:9\"\nuser_id = \"1\"\n",
    )
    .unwrap();
    let snapshot = r#"[{"id":"1","caption":"a"},{"id":"2","caption":"b"}]"#;
    std::fs::write(dir.path().join("instagram_posts.json"), snapshot).unwrap();

    cafesync(dir.path())
        .env("INSTAGRAM_ACCESS_TOKEN", "dry-run-token")
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would process:     2"));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("instagram_posts.json")).unwrap(),
        snapshot
    );
    assert!(!dir.path().join("cafe_data_kv.json").exists());
    assert!(!dir.path().join("skipped_posts.json").exists());
}

#[test]
fn export_writes_both_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("cafe_data_kv.json"),
        &serde_json::json!([store_json("1", Some(35.6)), store_json("2", None)]),
    );

    cafesync(dir.path())
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 stores"))
        .stdout(predicate::str::contains("50.0%"));

    let all = std::fs::read_to_string(dir.path().join("cafe_data_all.csv")).unwrap();
    assert_eq!(all.lines().count(), 3);
    let with_coords =
        std::fs::read_to_string(dir.path().join("cafe_data_with_coords.csv")).unwrap();
    assert_eq!(with_coords.lines().count(), 2);
}

#[test]
fn export_without_store_file_is_file_error() {
    let dir = tempfile::tempdir().unwrap();
    cafesync(dir.path()).arg("export").assert().code(4);
}

#[test]
fn malformed_config_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cafesync.toml"), "[source\npage_size = ").unwrap();
    cafesync(dir.path()).arg("status").assert().code(2);
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

use tempfile::TempDir;

const SNAPSHOT: &str = r#"(
    windows: [(id: 1, focused: true)],
    tabs: [
        (id: 1, window_id: 1, last_accessed: Some(10), url: Some("https://a.example")),
        (id: 2, window_id: 1, last_accessed: Some(20)),
        (id: 3, window_id: 1, last_accessed: Some(30)),
    ],
)"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("browser.ron"), SNAPSHOT).unwrap();
        fs::write(dir.path().join("config.toml"), "[settings]\nmax_ungrouped_tabs = 2\n").unwrap();
        Workspace { dir }
    }

    fn path(&self, name: &str) -> PathBuf { self.dir.path().join(name) }

    fn run(&self, args: &[&str]) -> Output {
        let output = test_bin::get_test_bin("nulltab")
            .arg("--snapshot")
            .arg(self.path("browser.ron"))
            .arg("--storage")
            .arg(self.path("storage.json"))
            .arg("--config")
            .arg(self.path("config.toml"))
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "nulltab {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }

    fn stdout(&self, args: &[&str]) -> String {
        String::from_utf8(self.run(args).stdout).unwrap()
    }
}

fn read(path: &Path) -> String { fs::read_to_string(path).unwrap() }

#[test]
fn manage_then_switch_persists_browser_and_storage() {
    let ws = Workspace::new();

    let out = ws.stdout(&["manage"]);
    assert!(out.contains("window managed by group"), "{out}");
    assert!(read(&ws.path("storage.json")).contains("local:mainTabGroupId"));

    let status = ws.stdout(&["status"]);
    assert!(status.contains("[main] [collapsed]"), "{status}");

    let out = ws.stdout(&["switch", "1"]);
    assert!(out.contains("2 tabs kept out, 0 moved into the main group"), "{out}");

    let json: serde_json::Value = serde_json::from_str(&ws.stdout(&["status", "--json"])).unwrap();
    let tabs = json[0]["tabs"].as_array().unwrap();
    let active: Vec<i64> =
        tabs.iter().filter(|t| t["active"] == true).map(|t| t["id"].as_i64().unwrap()).collect();
    assert_eq!(active, vec![1]);
}

#[test]
fn topics_round_trip_through_the_storage_file() {
    let ws = Workspace::new();

    let id = ws.stdout(&["topics", "add", "Reading", "--color", "blue"]).trim().to_string();
    ws.run(&["topics", "assign", "https://a.example", &id]);

    let list = ws.stdout(&["topics", "list"]);
    assert!(list.contains(&format!("{id} Reading (blue)")), "{list}");
    assert!(list.contains("  https://a.example"), "{list}");

    ws.run(&["topics", "remove", &id]);
    assert_eq!(ws.stdout(&["topics", "list"]), "");
}

#[test]
fn missing_snapshot_is_reported() {
    let ws = Workspace::new();
    let output = test_bin::get_test_bin("nulltab")
        .arg("--snapshot")
        .arg(ws.path("nope.ron"))
        .arg("--storage")
        .arg(ws.path("storage.json"))
        .arg("--config")
        .arg(ws.path("config.toml"))
        .arg("status")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.ron"));
}

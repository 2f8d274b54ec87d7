//! End-to-end tests driving the `quarry` binary against a temporary
//! config, database, and collection directory.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

struct Harness {
    /// Keeps the temp tree alive for the duration of a test.
    _tmp: TempDir,
    config_path: std::path::PathBuf,
    notes_dir: std::path::PathBuf,
}

impl Harness {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let notes_dir = tmp.path().join("notes");
        fs::create_dir(&notes_dir).unwrap();

        let db_path = tmp.path().join("index.sqlite");
        let config_path = tmp.path().join("quarry.toml");
        fs::write(
            &config_path,
            format!(
                r#"
[db]
path = "{}"

[collections.notes]
root = "{}"
pattern = "**/*.md"
"#,
                db_path.display(),
                notes_dir.display()
            ),
        )
        .unwrap();

        Harness {
            _tmp: tmp,
            config_path,
            notes_dir,
        }
    }

    fn write_note(&self, name: &str, body: &str) {
        fs::write(self.notes_dir.join(name), body).unwrap();
    }

    fn remove_note(&self, name: &str) {
        fs::remove_file(self.notes_dir.join(name)).unwrap();
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_quarry"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .output()
            .unwrap()
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let out = self.run(args);
        assert!(
            out.status.success(),
            "quarry {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).to_string()
    }
}

#[test]
fn init_creates_database() {
    let h = Harness::new();
    let out = h.run_ok(&["init"]);
    assert!(out.contains("initialized"));
    assert!(Path::new(out.trim().strip_prefix("initialized ").unwrap()).exists());
}

#[test]
fn update_then_search_finds_the_right_document() {
    let h = Harness::new();
    h.write_note("banana.md", "A note all about banana bread and ripe fruit.");
    h.write_note("apple.md", "Apple pie recipes and orchard fruit notes.");

    let out = h.run_ok(&["update", "--progress", "off"]);
    assert!(
        out.contains("collection 'notes': 2 new, 0 updated, 0 removed"),
        "unexpected update output: {}",
        out
    );

    // A term unique to one file hits exactly that file.
    let out = h.run_ok(&["search", "banana"]);
    assert!(out.contains("notes/banana.md"), "missing hit: {}", out);
    assert!(!out.contains("notes/apple.md"), "false hit: {}", out);

    // A term shared by both files hits both.
    let out = h.run_ok(&["search", "fruit"]);
    assert!(out.contains("notes/banana.md"));
    assert!(out.contains("notes/apple.md"));
}

#[test]
fn second_update_is_idempotent() {
    let h = Harness::new();
    h.write_note("a.md", "stable body");
    h.run_ok(&["update", "--progress", "off"]);

    let out = h.run_ok(&["update", "--progress", "off"]);
    assert!(
        out.contains("collection 'notes': 0 new, 0 updated, 0 removed"),
        "second run should be zero churn: {}",
        out
    );
}

#[test]
fn deleted_file_disappears_from_search() {
    let h = Harness::new();
    h.write_note("doomed.md", "zanzibar is a unique token");
    h.run_ok(&["update", "--progress", "off"]);
    assert!(h.run_ok(&["search", "zanzibar"]).contains("doomed.md"));

    h.remove_note("doomed.md");
    let out = h.run_ok(&["update", "--progress", "off"]);
    assert!(out.contains("1 removed"), "unexpected: {}", out);

    let out = h.run_ok(&["search", "zanzibar"]);
    assert!(out.contains("No results."), "stale hit: {}", out);
}

#[test]
fn content_edit_shows_as_update() {
    let h = Harness::new();
    h.write_note("a.md", "first draft");
    h.run_ok(&["update", "--progress", "off"]);

    h.write_note("a.md", "second draft");
    let out = h.run_ok(&["update", "--progress", "off"]);
    assert!(
        out.contains("collection 'notes': 0 new, 1 updated, 0 removed"),
        "unexpected: {}",
        out
    );

    let out = h.run_ok(&["search", "second"]);
    assert!(out.contains("notes/a.md"));
    let out = h.run_ok(&["search", "first"]);
    assert!(out.contains("No results."));
}

#[test]
fn get_prints_body_by_path_and_vpath() {
    let h = Harness::new();
    h.write_note("memo.md", "line one\nline two\nline three");
    h.run_ok(&["update", "--progress", "off"]);

    let out = h.run_ok(&["get", "notes/memo.md"]);
    assert_eq!(out.trim_end(), "line one\nline two\nline three");

    let out = h.run_ok(&["get", "quarry://notes/memo.md"]);
    assert!(out.contains("line two"));

    // Line slicing: --from is 1-based, --lines caps the window.
    let out = h.run_ok(&["get", "notes/memo.md", "--from", "2", "--lines", "1"]);
    assert_eq!(out.trim_end(), "line two");
}

#[test]
fn get_unknown_target_fails() {
    let h = Harness::new();
    h.run_ok(&["init"]);
    let out = h.run(&["get", "notes/nope.md"]);
    assert!(!out.status.success());
}

#[test]
fn ls_and_status_reflect_the_index() {
    let h = Harness::new();
    h.write_note("a.md", "aaa");
    h.write_note("b.md", "bbb");
    h.run_ok(&["update", "--progress", "off"]);

    let out = h.run_ok(&["ls"]);
    assert!(out.contains("notes/a.md"));
    assert!(out.contains("notes/b.md"));

    let out = h.run_ok(&["status"]);
    assert!(out.contains("documents: 2"));
    assert!(out.contains("vectors: 0"));
    assert!(out.contains("pending embeddings: 2"));
    assert!(out.contains("notes: 2 active"));
}

#[test]
fn update_unknown_collection_fails() {
    let h = Harness::new();
    let out = h.run(&["update", "missing", "--progress", "off"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown collection"));
}

#[test]
fn search_with_no_match_prints_no_results() {
    let h = Harness::new();
    h.write_note("a.md", "ordinary contents");
    h.run_ok(&["update", "--progress", "off"]);
    let out = h.run_ok(&["search", "xylophonequery"]);
    assert_eq!(out.trim_end(), "No results.");
}

#[test]
fn vsearch_without_embedding_config_fails() {
    let h = Harness::new();
    h.run_ok(&["init"]);
    let out = h.run(&["vsearch", "anything"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("requires embeddings"));
}

#[test]
fn query_without_embeddings_degrades_to_lexical() {
    let h = Harness::new();
    h.write_note("banana.md", "banana bread notes");
    h.run_ok(&["update", "--progress", "off"]);

    let out = h.run_ok(&["query", "banana"]);
    assert!(out.contains("notes/banana.md"), "unexpected: {}", out);
}

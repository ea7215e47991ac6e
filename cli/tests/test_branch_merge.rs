use assert_cmd::Command;

fn trct() -> Command {
    Command::cargo_bin("trct").expect("binary builds")
}

#[test]
fn branch_create_switch_and_fast_forward_merge() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tract.sqlite3");
    let base = ["--db", db.to_str().unwrap(), "--tract", "b1"];

    trct().args(base).args(["commit", "root", "--role", "user"]).assert().success();
    trct().args(base).args(["branch", "create", "feature", "--switch"]).assert().success();
    trct().args(base).args(["commit", "feature work", "--role", "assistant"]).assert().success();

    let list = trct().args(base).args(["branch", "list"]).assert().success();
    let list_text = String::from_utf8(list.get_output().stdout.clone()).unwrap();
    assert!(list_text.contains("feature"));
    assert!(list_text.contains("main") || list_text.contains("master"));

    trct().args(base).args(["switch", "main"]).assert().success();
    trct().args(base).args(["merge", "feature"]).assert().success();

    let compiled = trct().args(base).args(["compile"]).assert().success();
    let compiled_text = String::from_utf8(compiled.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&compiled_text).unwrap();
    assert_eq!(json["commit_count"], 2);
}

#[test]
fn diff_shows_commits_unique_to_branch() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tract.sqlite3");
    let base = ["--db", db.to_str().unwrap(), "--tract", "b2"];

    trct().args(base).args(["commit", "root", "--role", "user"]).assert().success();
    trct().args(base).args(["branch", "create", "feature", "--switch"]).assert().success();
    trct().args(base).args(["commit", "unique-to-feature", "--role", "assistant"]).assert().success();

    let diff = trct().args(base).args(["diff", "main", "feature"]).assert().success();
    let diff_text = String::from_utf8(diff.get_output().stdout.clone()).unwrap();
    assert!(diff_text.contains("unique-to-feature"));
}

#[test]
fn annotate_with_invalid_priority_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tract.sqlite3");
    let base = ["--db", db.to_str().unwrap(), "--tract", "b3"];

    trct().args(base).args(["commit", "root", "--role", "user"]).assert().success();
    let placeholder_hash = "a".repeat(64);

    trct()
        .args(base)
        .args(["annotate", &placeholder_hash, "not-a-real-priority"])
        .assert()
        .failure()
        .code(1);
}

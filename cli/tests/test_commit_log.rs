use assert_cmd::Command;

fn trct() -> Command {
    Command::cargo_bin("trct").expect("binary builds")
}

#[test]
fn commit_log_compile_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tract.sqlite3");

    trct()
        .args(["--db", db.to_str().unwrap(), "--tract", "t1", "commit", "hello there", "--role", "user"])
        .assert()
        .success();

    trct()
        .args(["--db", db.to_str().unwrap(), "--tract", "t1", "commit", "hi back", "--role", "assistant"])
        .assert()
        .success();

    let log = trct()
        .args(["--db", db.to_str().unwrap(), "--tract", "t1", "log"])
        .assert()
        .success();
    let log_text = String::from_utf8(log.get_output().stdout.clone()).unwrap();
    assert!(log_text.contains("hello there"));
    assert!(log_text.contains("hi back"));

    let compiled = trct()
        .args(["--db", db.to_str().unwrap(), "--tract", "t1", "compile"])
        .assert()
        .success();
    let compiled_text = String::from_utf8(compiled.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&compiled_text).unwrap();
    assert_eq!(json["commit_count"], 2);
    assert_eq!(json["messages"][0]["text"], "hello there");
    assert_eq!(json["messages"][1]["text"], "hi back");
}

#[test]
fn status_reports_no_commits_on_empty_tract() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tract.sqlite3");

    let status = trct()
        .args(["--db", db.to_str().unwrap(), "--tract", "empty", "status"])
        .assert()
        .success();
    let text = String::from_utf8(status.get_output().stderr.clone()).unwrap();
    assert!(text.contains("No commits yet"));
}

#[test]
fn commit_with_unknown_edit_target_fails_with_user_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tract.sqlite3");

    trct()
        .args([
            "--db",
            db.to_str().unwrap(),
            "--tract",
            "t2",
            "commit",
            "bad edit",
            "--role",
            "user",
            "--edit",
            "0000000000000000000000000000000000000000000000000000000000000000",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn switch_to_missing_branch_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tract.sqlite3");

    trct()
        .args(["--db", db.to_str().unwrap(), "--tract", "t3", "commit", "seed", "--role", "user"])
        .assert()
        .success();

    trct()
        .args(["--db", db.to_str().unwrap(), "--tract", "t3", "switch", "does-not-exist"])
        .assert()
        .failure()
        .code(1);
}

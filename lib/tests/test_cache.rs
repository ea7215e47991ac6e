//! Cache properties: compiled output is a pure function of the DAG,
//! annotations, blobs, and token counter, so a warm incremental cache and
//! a cold full recompile must agree.

use tract::session::Session;
use tract::store::model::Operation;
use tract::ids::TractId;
use tract_testutils::user;

fn session_at(tract_id: TractId, db_path: &std::path::Path) -> Session {
    Session::builder()
        .tract_id(tract_id)
        .db_path(db_path)
        .open()
        .expect("session should open against a shared db file")
}

#[test]
fn incremental_append_matches_cold_recompile() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tract.sqlite3");
    let tract_id = TractId::generate();

    let warm = session_at(tract_id.clone(), &db_path);
    warm.create_commit(user("one"), Operation::Append, None, None, None, None)
        .unwrap();
    warm.compile(Default::default()).unwrap(); // populate cache
    warm.create_commit(user("two"), Operation::Append, None, None, None, None)
        .unwrap();
    let warm_compiled = warm.compile(Default::default()).unwrap();
    drop(warm);

    let cold = session_at(tract_id, &db_path);
    let cold_compiled = cold.compile(Default::default()).unwrap();

    assert_eq!(warm_compiled.commit_count, cold_compiled.commit_count);
    assert_eq!(warm_compiled.token_count, cold_compiled.token_count);
    let warm_texts: Vec<&str> = warm_compiled.messages.iter().map(|m| m.text.as_str()).collect();
    let cold_texts: Vec<&str> = cold_compiled.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(warm_texts, cold_texts);
}

#[test]
fn incremental_edit_matches_cold_recompile() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tract.sqlite3");
    let tract_id = TractId::generate();

    let warm = session_at(tract_id.clone(), &db_path);
    let c1 = warm
        .create_commit(user("one"), Operation::Append, None, None, None, None)
        .unwrap();
    warm.compile(Default::default()).unwrap(); // populate cache with c1's snapshot
    warm.create_commit(
        user("one-edited"),
        Operation::Edit,
        None,
        Some(c1.commit_hash.clone()),
        None,
        None,
    )
    .unwrap();
    let warm_compiled = warm.compile(Default::default()).unwrap();
    drop(warm);

    let cold = session_at(tract_id, &db_path);
    let cold_compiled = cold.compile(Default::default()).unwrap();

    assert_eq!(warm_compiled.commit_count, cold_compiled.commit_count);
    assert_eq!(warm_compiled.messages[0].text, "one-edited");
    assert_eq!(cold_compiled.messages[0].text, "one-edited");
    assert_eq!(warm_compiled.token_count, cold_compiled.token_count);
}

#[test]
fn annotation_skip_then_unskip_matches_cold_recompile() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tract.sqlite3");
    let tract_id = TractId::generate();

    let warm = session_at(tract_id.clone(), &db_path);
    warm.create_commit(user("one"), Operation::Append, None, None, None, None)
        .unwrap();
    let middle = warm
        .create_commit(user("two"), Operation::Append, None, None, None, None)
        .unwrap();
    warm.create_commit(user("three"), Operation::Append, None, None, None, None)
        .unwrap();
    warm.compile(Default::default()).unwrap();

    warm.annotate(&middle.commit_hash, tract::content::Priority::Skip, None, None)
        .unwrap();
    let warm_compiled = warm.compile(Default::default()).unwrap();
    drop(warm);

    let cold = session_at(tract_id, &db_path);
    let cold_compiled = cold.compile(Default::default()).unwrap();

    assert_eq!(warm_compiled.commit_count, cold_compiled.commit_count);
    assert_eq!(warm_compiled.commit_count, 2);
}

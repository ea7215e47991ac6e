//! S6: rebase replays a branch's commits onto an advanced target branch,
//! remapping EDIT targets through the replay.

use tract::rebase::RebaseDecision;
use tract::store::model::Operation;
use tract_testutils::{in_memory_session, user};

#[test]
fn rebase_replays_edit_and_append_with_remap() {
    let session = in_memory_session();
    let c0 = session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, true).unwrap();

    let c1 = session
        .create_commit(
            user("X"),
            Operation::Edit,
            None,
            Some(c0.commit_hash.clone()),
            None,
            None,
        )
        .unwrap();
    let c2 = session
        .create_commit(user("Y"), Operation::Append, None, None, None, None)
        .unwrap();

    session.switch("main").unwrap();
    session
        .create_commit(user("main-extra"), Operation::Append, None, None, None, None)
        .unwrap();

    session.switch("feat").unwrap();
    let result = session.rebase("main", None).unwrap();

    assert_eq!(result.replayed.len(), 2);
    assert!(result.warnings.is_empty());
    assert_ne!(result.new_tip, c2.commit_hash);
    assert_ne!(result.new_tip, c1.commit_hash);

    let compiled = session.compile(Default::default()).unwrap();
    // main-extra, X (edited base), Y
    assert_eq!(compiled.commit_count, 3);
    assert!(compiled.messages.iter().any(|m| m.text == "X"));
    assert!(compiled.messages.iter().any(|m| m.text == "Y"));
}

#[test]
fn rebase_onto_ancestor_is_noop() {
    let session = in_memory_session();
    session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, true).unwrap();
    let tip = session
        .create_commit(user("only"), Operation::Append, None, None, None, None)
        .unwrap();

    let result = session.rebase("main", None).unwrap();
    assert!(result.replayed.is_empty());
    assert_eq!(result.new_tip, tip.commit_hash);
}

#[test]
fn rebase_accepting_missing_edit_target_converts_it_to_append() {
    let session = in_memory_session();
    session
        .create_commit(user("root"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("other", None, false).unwrap();

    let c0 = session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, true).unwrap();
    session
        .create_commit(
            user("X"),
            Operation::Edit,
            None,
            Some(c0.commit_hash.clone()),
            None,
            None,
        )
        .unwrap();

    let accept = |_: &tract::rebase::RebaseWarning| RebaseDecision::Accept;
    let result = session.rebase("other", Some(&accept)).unwrap();
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.replayed.len(), 2);

    // The edit target ("base") no longer exists in the new ancestry, so
    // accepting the warning must have replayed it as an APPEND: both
    // "base" and "X" survive as independent messages instead of "X"
    // failing to substitute onto a missing target.
    let compiled = session.compile(Default::default()).unwrap();
    assert_eq!(compiled.commit_count, 3);
    assert!(compiled.messages.iter().any(|m| m.text == "base"));
    assert!(compiled.messages.iter().any(|m| m.text == "X"));
}

#[test]
fn cherry_pick_replays_single_commit() {
    let session = in_memory_session();
    session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, true).unwrap();
    let picked = session
        .create_commit(user("feature"), Operation::Append, None, None, None, None)
        .unwrap();

    session.switch("main").unwrap();
    let info = session.cherry_pick(&picked.commit_hash, None).unwrap();
    assert_ne!(info.commit_hash, picked.commit_hash);

    let compiled = session.compile(Default::default()).unwrap();
    assert!(compiled.messages.iter().any(|m| m.text == "feature"));
}

#[test]
fn cherry_pick_accepting_missing_edit_target_converts_it_to_append() {
    let session = in_memory_session();
    session
        .create_commit(user("root"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, true).unwrap();
    let c0 = session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    let edit = session
        .create_commit(
            user("X"),
            Operation::Edit,
            None,
            Some(c0.commit_hash.clone()),
            None,
            None,
        )
        .unwrap();

    session.switch("main").unwrap();
    let accept = |_: &tract::rebase::RebaseWarning| RebaseDecision::Accept;
    let info = session.cherry_pick(&edit.commit_hash, Some(&accept)).unwrap();
    assert_ne!(info.commit_hash, edit.commit_hash);

    // "base" never made it onto main, so the picked EDIT's target is
    // unreachable: accepting the warning must land "X" as a plain
    // APPEND rather than failing the identical ancestor check again.
    let compiled = session.compile(Default::default()).unwrap();
    assert_eq!(compiled.commit_count, 2);
    assert!(compiled.messages.iter().any(|m| m.text == "X"));
}

#[test]
fn cherry_pick_rejecting_missing_edit_target_fails() {
    let session = in_memory_session();
    session
        .create_commit(user("root"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, true).unwrap();
    let c0 = session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    let edit = session
        .create_commit(
            user("X"),
            Operation::Edit,
            None,
            Some(c0.commit_hash.clone()),
            None,
            None,
        )
        .unwrap();

    session.switch("main").unwrap();
    let result = session.cherry_pick(&edit.commit_hash, None);
    assert!(result.is_err());
}

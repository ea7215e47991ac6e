//! S4 fast-forward merge, S5 diverged merge with a both_edit conflict.

use tract::merge::{MergeClassification, Resolution, ResolutionAction};
use tract::store::model::Operation;
use tract_testutils::{assistant, in_memory_session, user};

#[test]
fn fast_forward_merge_advances_without_new_commit() {
    let session = in_memory_session();
    session
        .create_commit(user("c1"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, true).unwrap();
    session
        .create_commit(user("c2"), Operation::Append, None, None, None, None)
        .unwrap();
    session.switch("main").unwrap();

    let result = session.merge("feat", false).unwrap();
    assert_eq!(result.classification, MergeClassification::FastForward);
    assert!(result.new_commit.is_none());

    let compiled = session.compile(Default::default()).unwrap();
    assert_eq!(compiled.commit_count, 2);
}

#[test]
fn diverged_edit_conflict_resolves_manually() {
    let session = in_memory_session();
    let c0 = session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, false).unwrap();

    session
        .create_commit(
            user("A"),
            Operation::Edit,
            None,
            Some(c0.commit_hash.clone()),
            None,
            None,
        )
        .unwrap();

    session.switch("feat").unwrap();
    session
        .create_commit(
            user("B"),
            Operation::Edit,
            None,
            Some(c0.commit_hash.clone()),
            None,
            None,
        )
        .unwrap();

    session.switch("main").unwrap();
    let mut result = session.merge("feat", false).unwrap();
    assert_eq!(result.classification, MergeClassification::ThreeWay);
    assert_eq!(result.conflicts.len(), 1);

    let target = result.conflicts[0].target.clone();
    result.resolutions.insert(target, "C".to_string());
    let committed = session.commit_merge(result).unwrap();
    assert!(committed.new_commit.is_some());

    let compiled = session.compile(Default::default()).unwrap();
    // Only the substituted base commit should be visible: the merge
    // record itself must never surface as a rendered message.
    assert_eq!(compiled.messages.len(), 1);
    assert_eq!(compiled.messages[0].text, "C");
    assert!(!compiled.messages.iter().any(|m| m.text.contains("merge:")));
}

#[test]
fn non_conflicting_edit_auto_merges_instead_of_being_dropped() {
    let session = in_memory_session();
    let c0 = session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, false).unwrap();

    session
        .create_commit(assistant("unrelated"), Operation::Append, None, None, None, None)
        .unwrap();

    session.switch("feat").unwrap();
    session
        .create_commit(
            user("B"),
            Operation::Edit,
            None,
            Some(c0.commit_hash.clone()),
            None,
            None,
        )
        .unwrap();

    session.switch("main").unwrap();
    let result = session.merge("feat", false).unwrap();
    assert_eq!(result.classification, MergeClassification::ThreeWay);
    assert!(result.conflicts.is_empty());
    assert_eq!(result.auto_merged.len(), 1);

    session.commit_merge(result).unwrap();

    let compiled = session.compile(Default::default()).unwrap();
    assert_eq!(compiled.commit_count, 2);
    assert!(compiled.messages.iter().any(|m| m.text == "B"));
    assert!(compiled.messages.iter().any(|m| m.text == "unrelated"));
}

#[test]
fn resolver_abort_surfaces_error() {
    let session = in_memory_session();
    let c0 = session
        .create_commit(user("base"), Operation::Append, None, None, None, None)
        .unwrap();
    session.branch("feat", None, false).unwrap();
    session
        .create_commit(user("A"), Operation::Edit, None, Some(c0.commit_hash.clone()), None, None)
        .unwrap();
    session.switch("feat").unwrap();
    session
        .create_commit(user("B"), Operation::Edit, None, Some(c0.commit_hash.clone()), None, None)
        .unwrap();
    session.switch("main").unwrap();
    let result = session.merge("feat", false).unwrap();

    let abort = |_: &tract::merge::ConflictInfo| Resolution {
        action: ResolutionAction::Abort,
        content_text: None,
        reasoning: None,
    };
    let outcome = session.resolve_merge_with(&result, &abort);
    assert!(outcome.is_err());
}

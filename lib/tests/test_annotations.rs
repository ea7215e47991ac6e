//! S2: SKIP hides a message, NORMAL restores it.

use tract::content::Priority;
use tract::store::model::Operation;
use tract_testutils::{assistant, in_memory_session, instruction, user};

#[test]
fn skip_then_normal_round_trips() {
    let session = in_memory_session();
    session
        .create_commit(instruction("sys"), Operation::Append, None, None, None, None)
        .unwrap();
    session
        .create_commit(user("u1"), Operation::Append, None, None, None, None)
        .unwrap();
    let middle = session
        .create_commit(assistant("a1"), Operation::Append, None, None, None, None)
        .unwrap();
    session
        .create_commit(user("u2"), Operation::Append, None, None, None, None)
        .unwrap();
    session
        .create_commit(assistant("a2"), Operation::Append, None, None, None, None)
        .unwrap();

    let before = session.compile(Default::default()).unwrap();
    assert_eq!(before.commit_count, 5);
    assert!(before.messages.iter().any(|m| m.text == "a1"));

    session
        .annotate(&middle.commit_hash, Priority::Skip, None, None)
        .unwrap();
    let skipped = session.compile(Default::default()).unwrap();
    // one effective commit fewer; the two now-adjacent "user" messages
    // aggregate into one, so the rendered message count drops by two.
    assert_eq!(skipped.commit_count, 4);
    assert!(!skipped.messages.iter().any(|m| m.text.contains("a1")));

    session
        .annotate(&middle.commit_hash, Priority::Normal, None, None)
        .unwrap();
    let restored = session.compile(Default::default()).unwrap();
    assert_eq!(restored.commit_count, 5);
    assert!(restored.messages.iter().any(|m| m.text.contains("a1")));
}

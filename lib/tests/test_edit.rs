//! S3: an EDIT substitutes its target's content at compile time.

use tract::store::model::Operation;
use tract_testutils::{in_memory_session, user};

#[test]
fn edit_substitutes_target_content() {
    let session = in_memory_session();
    let old = session
        .create_commit(user("old"), Operation::Append, None, None, None, None)
        .unwrap();
    session
        .create_commit(
            user("new"),
            Operation::Edit,
            None,
            Some(old.commit_hash.clone()),
            None,
            None,
        )
        .unwrap();

    let compiled = session.compile(Default::default()).unwrap();
    assert_eq!(compiled.commit_count, 1);
    assert_eq!(compiled.messages.len(), 1);
    assert_eq!(compiled.messages[0].text, "new");

    let mut request = tract::compile::CompileRequest::default();
    request.include_edit_annotations = true;
    let annotated = session.compile(request).unwrap();
    assert!(annotated.messages[0].text.contains("[edited]"));
}

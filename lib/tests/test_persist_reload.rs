//! S1: commit three messages, compile, close and reopen against the same
//! database file and tract id, compile again, expect an identical result.

use tract::content::Content;
use tract::ids::TractId;
use tract::session::Session;
use tract::store::model::Operation;

#[test]
fn persists_and_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tract.sqlite3");
    let tract_id = TractId::generate();

    {
        let session = Session::builder()
            .tract_id(tract_id.clone())
            .db_path(&db_path)
            .open()
            .unwrap();
        session
            .create_commit(
                Content::Instruction { text: "S".into() },
                Operation::Append,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        session
            .create_commit(
                Content::Dialogue {
                    role: "user".into(),
                    text: "U".into(),
                    name: None,
                },
                Operation::Append,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        session
            .create_commit(
                Content::Dialogue {
                    role: "assistant".into(),
                    text: "A".into(),
                    name: None,
                },
                Operation::Append,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        let compiled = session.compile(Default::default()).unwrap();
        assert_eq!(compiled.messages.len(), 3);
        assert_eq!(compiled.messages[0].role, "system");
        assert_eq!(compiled.messages[0].text, "S");
        assert_eq!(compiled.messages[1].role, "user");
        assert_eq!(compiled.messages[2].role, "assistant");
    }

    let session = Session::builder()
        .tract_id(tract_id)
        .db_path(&db_path)
        .open()
        .unwrap();
    let compiled = session.compile(Default::default()).unwrap();
    assert_eq!(compiled.messages.len(), 3);
    assert_eq!(compiled.messages[0].text, "S");
    assert_eq!(compiled.messages[1].text, "U");
    assert_eq!(compiled.messages[2].text, "A");
}

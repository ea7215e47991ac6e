//! Fixtures shared by `tract`'s and `tract-cli`'s integration tests:
//! an in-memory session builder and a handful of sample content
//! constructors, mirroring the teacher's `testutils` crate.

use tract::content::Content;
use tract::session::{Session, SessionBuilder};
use tract::ids::TractId;

/// An ephemeral session backed by an in-memory SQLite database, with a
/// fresh random tract id.
pub fn in_memory_session() -> Session {
    Session::builder()
        .tract_id(TractId::generate())
        .open()
        .expect("in-memory session should always open")
}

/// Same, but with an explicit cache capacity (for cache-patching tests
/// that need to observe eviction).
pub fn in_memory_session_with_cache(cache_size: usize) -> Session {
    Session::builder()
        .tract_id(TractId::generate())
        .cache_size(cache_size)
        .open()
        .expect("in-memory session should always open")
}

pub fn builder() -> SessionBuilder {
    Session::builder().tract_id(TractId::generate())
}

pub fn instruction(text: impl Into<String>) -> Content {
    Content::Instruction { text: text.into() }
}

pub fn dialogue(role: impl Into<String>, text: impl Into<String>) -> Content {
    Content::Dialogue {
        role: role.into(),
        text: text.into(),
        name: None,
    }
}

pub fn user(text: impl Into<String>) -> Content {
    dialogue("user", text)
}

pub fn assistant(text: impl Into<String>) -> Content {
    dialogue("assistant", text)
}

pub fn tool_call(tool_name: impl Into<String>, payload: serde_json::Value) -> Content {
    Content::ToolIo {
        tool_name: tool_name.into(),
        direction: tract::content::ToolDirection::Call,
        payload,
        status: None,
    }
}

pub fn tool_result(tool_name: impl Into<String>, payload: serde_json::Value, status: impl Into<String>) -> Content {
    Content::ToolIo {
        tool_name: tool_name.into(),
        direction: tract::content::ToolDirection::Result,
        payload,
        status: Some(status.into()),
    }
}

//! Storage abstraction: a `Store` trait implemented by the concrete SQLite
//! engine ([`sqlite::SqliteStore`]) and, in `tract-testutils`, by an
//! in-memory double for fast unit tests — mirroring the teacher's split
//! between its real backend and `test_backend.rs`.

pub mod model;
pub mod sqlite;

use std::collections::HashMap;

use crate::error::TractResult;
use crate::ids::{CommitHash, ContentHash, TractId};
use model::{AnnotationRow, CommitParentRow, CommitRow, HeadState, SpawnPointerRow};

/// Everything the engine needs from a persistence backend. Every method
/// takes `&self`; implementations are responsible for their own interior
/// mutability (the SQLite engine uses a `Mutex<Connection>`, matching the
/// single-writer-per-store model in §5 of the design).
pub trait Store: Send + Sync {
    // -- transactions --

    /// Begin a transaction. Nesting is not supported; `Session` never
    /// calls this reentrantly.
    fn begin(&self) -> TractResult<()>;
    fn commit_txn(&self) -> TractResult<()>;
    fn rollback(&self) -> TractResult<()>;

    // -- blobs --

    fn put_blob_if_absent(&self, content_hash: &ContentHash, payload: &[u8]) -> TractResult<()>;
    fn get_blob(&self, content_hash: &ContentHash) -> TractResult<Option<Vec<u8>>>;

    // -- commits --

    fn put_commit(&self, commit: &CommitRow) -> TractResult<()>;
    fn get_commit(&self, tract_id: &TractId, commit_hash: &CommitHash) -> TractResult<Option<CommitRow>>;
    fn find_by_prefix(&self, tract_id: &TractId, prefix: &str) -> TractResult<Vec<CommitHash>>;
    fn put_commit_parent(&self, edge: &CommitParentRow) -> TractResult<()>;
    fn get_second_parents(&self, tract_id: &TractId, commit_hash: &CommitHash) -> TractResult<Vec<CommitHash>>;

    // -- refs / HEAD --

    fn get_ref(&self, tract_id: &TractId, ref_name: &str) -> TractResult<Option<CommitHash>>;
    fn set_ref(&self, tract_id: &TractId, ref_name: &str, commit_hash: &CommitHash) -> TractResult<()>;
    fn delete_ref(&self, tract_id: &TractId, ref_name: &str) -> TractResult<()>;
    fn list_branches(&self, tract_id: &TractId) -> TractResult<Vec<(String, CommitHash)>>;
    fn get_head_state(&self, tract_id: &TractId) -> TractResult<HeadState>;
    fn set_head_state(&self, state: &HeadState) -> TractResult<()>;

    // -- annotations --

    fn put_annotation(&self, annotation: &AnnotationRow) -> TractResult<i64>;
    /// Latest annotation per target under an optional `as_of` cutoff
    /// (inclusive of `created_at <= as_of`), in one round trip.
    fn latest_annotations(
        &self,
        tract_id: &TractId,
        target_hashes: &[CommitHash],
        as_of: Option<&str>,
    ) -> TractResult<HashMap<CommitHash, AnnotationRow>>;

    // -- spawn pointers (ambient; no engine logic consumes these) --

    fn put_spawn_pointer(&self, spawn: &SpawnPointerRow) -> TractResult<i64>;
    fn list_spawn_pointers(&self, tract_id: &TractId) -> TractResult<Vec<SpawnPointerRow>>;

    // -- schema --

    fn schema_version(&self) -> TractResult<i64>;
}

/// Run `f` inside a transaction: commits on `Ok`, rolls back on `Err`.
/// Every public mutating method on [`crate::session::Session`] goes
/// through this.
pub fn in_transaction<T>(
    store: &dyn Store,
    f: impl FnOnce() -> TractResult<T>,
) -> TractResult<T> {
    store.begin()?;
    match f() {
        Ok(value) => {
            store.commit_txn()?;
            Ok(value)
        }
        Err(err) => {
            let _ = store.rollback();
            Err(err)
        }
    }
}

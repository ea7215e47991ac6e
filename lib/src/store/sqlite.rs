//! The concrete, shippable persistence engine: SQLite via `rusqlite`'s
//! bundled build, so `tract` has no system dependency. Grounded in
//! `codegraph-storage`'s embedded-SQLite repository layer (the only pack
//! repo that persists a commit-like graph to SQL), transposed onto this
//! crate's schema (§6 of the design).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::content::Priority;
use crate::error::{TractError, TractResult};
use crate::ids::{CommitHash, ContentHash, TractId};

use super::model::{
    AnnotationRow, CommitParentRow, CommitRow, HeadState, Operation, SpawnPointerRow,
};
use super::Store;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS blobs (
    content_hash TEXT PRIMARY KEY,
    payload      BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS commits (
    commit_hash       TEXT PRIMARY KEY,
    tract_id          TEXT NOT NULL,
    parent_hash       TEXT,
    content_hash      TEXT NOT NULL,
    content_type      TEXT NOT NULL,
    operation         TEXT NOT NULL,
    response_to       TEXT,
    message           TEXT,
    token_count       INTEGER NOT NULL,
    metadata          TEXT NOT NULL,
    generation_config TEXT,
    created_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_commits_tract_created ON commits(tract_id, created_at);
CREATE INDEX IF NOT EXISTS idx_commits_parent ON commits(parent_hash);

CREATE TABLE IF NOT EXISTS commit_parents (
    commit_hash  TEXT NOT NULL,
    parent_hash  TEXT NOT NULL,
    parent_index INTEGER NOT NULL,
    PRIMARY KEY (commit_hash, parent_index)
);

CREATE TABLE IF NOT EXISTS refs (
    tract_id    TEXT NOT NULL,
    ref_name    TEXT NOT NULL,
    commit_hash TEXT NOT NULL,
    PRIMARY KEY (tract_id, ref_name)
);

CREATE TABLE IF NOT EXISTS head_state (
    tract_id       TEXT PRIMARY KEY,
    current_branch TEXT
);

CREATE TABLE IF NOT EXISTS annotations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    tract_id    TEXT NOT NULL,
    target_hash TEXT NOT NULL,
    priority    TEXT NOT NULL,
    reason      TEXT,
    retention   TEXT,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_annotations_target ON annotations(tract_id, target_hash, created_at);

CREATE TABLE IF NOT EXISTS spawn_pointers (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_tract_id   TEXT NOT NULL,
    child_tract_id    TEXT NOT NULL,
    purpose           TEXT,
    inheritance_mode  TEXT NOT NULL,
    created_at        TEXT NOT NULL
);
"#;

/// SQLite-backed [`Store`]. Cheap to clone via `Arc`; internally
/// single-threaded (one `Mutex<Connection>`), matching the one-writer-
/// per-session model.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if absent) a database file and migrate its schema.
    /// Mirrors the teacher's two-phase `init`-then-`load` repo open.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> TractResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// An ephemeral, process-local store. Used by tests and by callers
    /// that don't need durability.
    pub fn open_in_memory() -> TractResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;
        debug!(version = SCHEMA_VERSION, "schema migrated");
        Ok(())
    }
}

fn row_to_commit(row: &rusqlite::Row) -> rusqlite::Result<CommitRow> {
    let operation: String = row.get("operation")?;
    let metadata: String = row.get("metadata")?;
    let generation_config: Option<String> = row.get("generation_config")?;
    Ok(CommitRow {
        commit_hash: CommitHash::parse(&row.get::<_, String>("commit_hash")?)
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        tract_id: TractId::new(row.get::<_, String>("tract_id")?),
        parent_hash: row
            .get::<_, Option<String>>("parent_hash")?
            .map(|h| CommitHash::parse(&h))
            .transpose()
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        content_hash: ContentHash::parse(&row.get::<_, String>("content_hash")?)
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        content_type: row.get("content_type")?,
        operation: operation.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        response_to: row
            .get::<_, Option<String>>("response_to")?
            .map(|h| CommitHash::parse(&h))
            .transpose()
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        message: row.get("message")?,
        token_count: row.get::<_, i64>("token_count")? as u64,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        generation_config: generation_config
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .unwrap_or(None),
        created_at: row.get("created_at")?,
    })
}

impl Store for SqliteStore {
    fn begin(&self) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch("BEGIN DEFERRED")?;
        Ok(())
    }

    fn commit_txn(&self) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn put_blob_if_absent(&self, content_hash: &ContentHash, payload: &[u8]) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO blobs(content_hash, payload) VALUES (?1, ?2)",
            params![content_hash.as_str(), payload],
        )?;
        Ok(())
    }

    fn get_blob(&self, content_hash: &ContentHash) -> TractResult<Option<Vec<u8>>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT payload FROM blobs WHERE content_hash = ?1",
            params![content_hash.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(TractError::from)
    }

    fn put_commit(&self, commit: &CommitRow) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO commits(commit_hash, tract_id, parent_hash, content_hash, content_type,
                operation, response_to, message, token_count, metadata, generation_config, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                commit.commit_hash.as_str(),
                commit.tract_id.as_str(),
                commit.parent_hash.as_ref().map(|h| h.as_str()),
                commit.content_hash.as_str(),
                commit.content_type,
                commit.operation.as_str(),
                commit.response_to.as_ref().map(|h| h.as_str()),
                commit.message,
                commit.token_count as i64,
                serde_json::to_string(&commit.metadata).unwrap_or_default(),
                commit
                    .generation_config
                    .as_ref()
                    .map(|v| serde_json::to_string(v).unwrap_or_default()),
                commit.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_commit(&self, tract_id: &TractId, commit_hash: &CommitHash) -> TractResult<Option<CommitRow>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT * FROM commits WHERE tract_id = ?1 AND commit_hash = ?2",
            params![tract_id.as_str(), commit_hash.as_str()],
            row_to_commit,
        )
        .optional()
        .map_err(TractError::from)
    }

    fn find_by_prefix(&self, tract_id: &TractId, prefix: &str) -> TractResult<Vec<CommitHash>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT commit_hash FROM commits WHERE tract_id = ?1 AND commit_hash LIKE ?2",
        )?;
        let pattern = format!("{prefix}%");
        let rows = stmt.query_map(params![tract_id.as_str(), pattern], |row| {
            row.get::<_, String>(0)
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(CommitHash::parse(&row?)?);
        }
        Ok(out)
    }

    fn put_commit_parent(&self, edge: &CommitParentRow) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO commit_parents(commit_hash, parent_hash, parent_index) VALUES (?1, ?2, ?3)",
            params![edge.commit_hash.as_str(), edge.parent_hash.as_str(), edge.parent_index],
        )?;
        Ok(())
    }

    fn get_second_parents(&self, _tract_id: &TractId, commit_hash: &CommitHash) -> TractResult<Vec<CommitHash>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT parent_hash FROM commit_parents WHERE commit_hash = ?1 ORDER BY parent_index",
        )?;
        let rows = stmt.query_map(params![commit_hash.as_str()], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(CommitHash::parse(&row?)?);
        }
        Ok(out)
    }

    fn get_ref(&self, tract_id: &TractId, ref_name: &str) -> TractResult<Option<CommitHash>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let hash: Option<String> = conn
            .query_row(
                "SELECT commit_hash FROM refs WHERE tract_id = ?1 AND ref_name = ?2",
                params![tract_id.as_str(), ref_name],
                |row| row.get(0),
            )
            .optional()?;
        hash.map(|h| CommitHash::parse(&h)).transpose()
    }

    fn set_ref(&self, tract_id: &TractId, ref_name: &str, commit_hash: &CommitHash) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO refs(tract_id, ref_name, commit_hash) VALUES (?1, ?2, ?3)
             ON CONFLICT(tract_id, ref_name) DO UPDATE SET commit_hash = excluded.commit_hash",
            params![tract_id.as_str(), ref_name, commit_hash.as_str()],
        )?;
        Ok(())
    }

    fn delete_ref(&self, tract_id: &TractId, ref_name: &str) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "DELETE FROM refs WHERE tract_id = ?1 AND ref_name = ?2",
            params![tract_id.as_str(), ref_name],
        )?;
        Ok(())
    }

    fn list_branches(&self, tract_id: &TractId) -> TractResult<Vec<(String, CommitHash)>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT ref_name, commit_hash FROM refs WHERE tract_id = ?1 AND ref_name LIKE 'refs/heads/%'",
        )?;
        let rows = stmt.query_map(params![tract_id.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (ref_name, hash) = row?;
            let name = super::model::branch_name_from_ref(&ref_name)
                .unwrap_or(&ref_name)
                .to_string();
            out.push((name, CommitHash::parse(&hash)?));
        }
        Ok(out)
    }

    fn get_head_state(&self, tract_id: &TractId) -> TractResult<HeadState> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let branch: Option<String> = conn
            .query_row(
                "SELECT current_branch FROM head_state WHERE tract_id = ?1",
                params![tract_id.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(HeadState {
            tract_id: tract_id.clone(),
            current_branch: branch,
        })
    }

    fn set_head_state(&self, state: &HeadState) -> TractResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO head_state(tract_id, current_branch) VALUES (?1, ?2)
             ON CONFLICT(tract_id) DO UPDATE SET current_branch = excluded.current_branch",
            params![state.tract_id.as_str(), state.current_branch],
        )?;
        Ok(())
    }

    fn put_annotation(&self, annotation: &AnnotationRow) -> TractResult<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO annotations(tract_id, target_hash, priority, reason, retention, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                annotation.tract_id.as_str(),
                annotation.target_hash.as_str(),
                annotation.priority.as_str(),
                annotation.reason,
                annotation
                    .retention
                    .as_ref()
                    .map(|v| serde_json::to_string(v).unwrap_or_default()),
                annotation.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest_annotations(
        &self,
        tract_id: &TractId,
        target_hashes: &[CommitHash],
        as_of: Option<&str>,
    ) -> TractResult<HashMap<CommitHash, AnnotationRow>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut out = HashMap::new();
        if target_hashes.is_empty() {
            return Ok(out);
        }
        // One query per target rather than a dynamic IN(...) list: target
        // sets here are small (bounded by DAG depth) and this keeps the
        // statement static and cacheable.
        let mut stmt = conn.prepare(
            "SELECT id, priority, reason, retention, created_at FROM annotations
             WHERE tract_id = ?1 AND target_hash = ?2 AND (?3 IS NULL OR created_at <= ?3)
             ORDER BY created_at DESC LIMIT 1",
        )?;
        for target in target_hashes {
            let row = stmt
                .query_row(params![tract_id.as_str(), target.as_str(), as_of], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .optional()?;
            if let Some((id, priority, reason, retention, created_at)) = row {
                out.insert(
                    target.clone(),
                    AnnotationRow {
                        id,
                        tract_id: tract_id.clone(),
                        target_hash: target.clone(),
                        priority: priority.parse::<Priority>().unwrap_or(Priority::Normal),
                        reason,
                        retention: retention.and_then(|s| serde_json::from_str(&s).ok()),
                        created_at,
                    },
                );
            }
        }
        Ok(out)
    }

    fn put_spawn_pointer(&self, spawn: &SpawnPointerRow) -> TractResult<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO spawn_pointers(parent_tract_id, child_tract_id, purpose, inheritance_mode, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                spawn.parent_tract_id.as_str(),
                spawn.child_tract_id.as_str(),
                spawn.purpose,
                spawn.inheritance_mode,
                spawn.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_spawn_pointers(&self, tract_id: &TractId) -> TractResult<Vec<SpawnPointerRow>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, parent_tract_id, child_tract_id, purpose, inheritance_mode, created_at
             FROM spawn_pointers WHERE parent_tract_id = ?1 OR child_tract_id = ?1",
        )?;
        let rows = stmt.query_map(params![tract_id.as_str()], |row| {
            Ok(SpawnPointerRow {
                id: row.get(0)?,
                parent_tract_id: TractId::new(row.get::<_, String>(1)?),
                child_tract_id: TractId::new(row.get::<_, String>(2)?),
                purpose: row.get(3)?,
                inheritance_mode: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn schema_version(&self) -> TractResult<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let value: String = conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        Ok(value.parse().unwrap_or(SCHEMA_VERSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_dedup() {
        let store = SqliteStore::open_in_memory().unwrap();
        let hash = ContentHash::from_bytes(&crate::hash::hash_bytes(b"hi"));
        store.put_blob_if_absent(&hash, b"hi").unwrap();
        store.put_blob_if_absent(&hash, b"hi").unwrap();
        assert_eq!(store.get_blob(&hash).unwrap(), Some(b"hi".to_vec()));
    }

    #[test]
    fn transaction_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tract_id = TractId::generate();
        let hash = CommitHash::from_bytes(&crate::hash::hash_bytes(b"c1"));
        let result: TractResult<()> = super::super::in_transaction(&store, || {
            store.set_ref(&tract_id, "HEAD", &hash)?;
            Err(TractError::Config("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.get_ref(&tract_id, "HEAD").unwrap(), None);
    }
}

//! Row types shared by every [`super::Store`] implementation.

use serde_json::Value;

use crate::content::Priority;
use crate::ids::{CommitHash, ContentHash, TractId};

/// `APPEND` adds a new message at the end of the chain; `EDIT` substitutes
/// another commit's message at compile time without removing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Append,
    Edit,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Append => "append",
            Operation::Edit => "edit",
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = crate::error::TractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(Operation::Append),
            "edit" => Ok(Operation::Edit),
            other => Err(crate::error::TractError::ContentValidation {
                reason: format!("unknown operation {other:?}"),
            }),
        }
    }
}

/// A node in the commit DAG. `created_at` is an RFC 3339 string; commits
/// are compared by this field wherever "latest wins" semantics apply.
#[derive(Debug, Clone)]
pub struct CommitRow {
    pub commit_hash: CommitHash,
    pub tract_id: TractId,
    pub parent_hash: Option<CommitHash>,
    pub content_hash: ContentHash,
    pub content_type: String,
    pub operation: Operation,
    pub response_to: Option<CommitHash>,
    pub message: Option<String>,
    pub token_count: u64,
    pub metadata: Value,
    pub generation_config: Option<Value>,
    pub created_at: String,
}

/// A second (and only second) parent, stored out-of-line so the commit
/// table stays single-parent-shaped for the common case.
#[derive(Debug, Clone)]
pub struct CommitParentRow {
    pub commit_hash: CommitHash,
    pub parent_hash: CommitHash,
    pub parent_index: i64,
}

/// A named pointer. `ref_name` is either `"HEAD"`, `"PREV_HEAD"`, or
/// `refs/heads/<branch>`.
#[derive(Debug, Clone)]
pub struct RefRow {
    pub tract_id: TractId,
    pub ref_name: String,
    pub commit_hash: CommitHash,
}

pub const HEAD_REF: &str = "HEAD";
pub const PREV_HEAD_REF: &str = "PREV_HEAD";
pub const BRANCH_PREFIX: &str = "refs/heads/";

pub fn branch_ref_name(branch: &str) -> String {
    format!("{BRANCH_PREFIX}{branch}")
}

pub fn branch_name_from_ref(ref_name: &str) -> Option<&str> {
    ref_name.strip_prefix(BRANCH_PREFIX)
}

/// An append-only priority decision. Effective priority for a commit is
/// the annotation row with the latest `created_at`.
#[derive(Debug, Clone)]
pub struct AnnotationRow {
    pub id: i64,
    pub tract_id: TractId,
    pub target_hash: CommitHash,
    pub priority: Priority,
    pub reason: Option<String>,
    pub retention: Option<Value>,
    pub created_at: String,
}

/// Whether HEAD is attached to a branch, and if so which one. Kept as its
/// own row rather than encoded into the `refs` table, since a branch name
/// is not a commit hash.
#[derive(Debug, Clone)]
pub struct HeadState {
    pub tract_id: TractId,
    pub current_branch: Option<String>,
}

/// Record of a child tract seeded from a slice of a parent's compiled
/// context. No engine logic consumes this; it exists so a caller-level
/// orchestrator has a place to persist the relationship instead of
/// inventing its own schema.
#[derive(Debug, Clone)]
pub struct SpawnPointerRow {
    pub id: i64,
    pub parent_tract_id: TractId,
    pub child_tract_id: TractId,
    pub purpose: Option<String>,
    pub inheritance_mode: String,
    pub created_at: String,
}

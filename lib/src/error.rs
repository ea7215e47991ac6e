//! Error taxonomy for the tract engine.
//!
//! One variant per kind in the specification's error table, plus the
//! ambient `Storage`/`Io`/`Config` variants for the persistence and
//! configuration layers. Every public mutating call on [`crate::session::Session`]
//! is transactional: an `Err` returned here means the DAG was left
//! untouched.

use crate::ids::CommitHash;

/// Crate-wide result alias.
pub type TractResult<T> = Result<T, TractError>;

#[derive(Debug, thiserror::Error)]
pub enum TractError {
    #[error("content validation failed: {reason}")]
    ContentValidation { reason: String },

    #[error("commit not found: {hash}")]
    CommitNotFound { hash: String },

    #[error("blob not found: {hash}")]
    BlobNotFound { hash: String },

    #[error("edit target {target} is not an ancestor of HEAD")]
    EditTarget { target: CommitHash },

    #[error("token budget exceeded: {used} > {limit} ({policy})")]
    BudgetExceeded {
        used: usize,
        limit: usize,
        policy: String,
    },

    #[error("branch not found: {name}")]
    BranchNotFound { name: String },

    #[error("nothing to merge: {reason}")]
    NothingToMerge { reason: String },

    #[error("rebase has unresolved semantic safety warnings and no resolver was supplied")]
    SemanticSafety { warnings: usize },

    #[error("cherry-pick failed: {reason}")]
    CherryPick { reason: String },

    #[error("rebase failed: {reason}")]
    Rebase { reason: String },

    #[error("ambiguous commit prefix {prefix:?} matches {count} commits")]
    AmbiguousPrefix { prefix: String, count: usize },

    #[error("invalid hash {hash:?}: {reason}")]
    InvalidHash { hash: String, reason: String },

    #[error("refusing to operate on the current branch: {name}")]
    CurrentBranch { name: String },

    #[error("HEAD is detached; this operation requires an attached branch")]
    DetachedHead,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

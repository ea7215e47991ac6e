//! `tract`: a version-controlled store for the context of an LLM
//! conversation. Conversation turns are content-addressed commits on a
//! DAG, with branches, merges, rebases, cherry-picks, priority
//! annotations, and a context compiler that flattens a HEAD into a flat,
//! LLM-ready message list.
//!
//! [`session::Session`] is the entry point: open one per tract, issue
//! commits and queries against it, and compile when you need the
//! flattened context.

pub mod cache;
pub mod commit;
pub mod compile;
pub mod config;
pub mod content;
pub mod dag;
pub mod error;
pub mod hash;
pub mod ids;
pub mod llm;
pub mod merge;
pub mod rebase;
pub mod session;
pub mod store;
pub mod tokens;

pub mod prelude {
    pub use crate::commit::{BudgetPolicy, CommitInfo, ResetMode, TokenBudget};
    pub use crate::compile::{CompileRequest, CompiledContext, CompiledMessage};
    pub use crate::content::{Content, ContentRegistry, Priority};
    pub use crate::error::{TractError, TractResult};
    pub use crate::ids::{CommitHash, ContentHash, TractId};
    pub use crate::merge::{ConflictInfo, MergeResult, Resolution, ResolutionAction};
    pub use crate::rebase::{RebaseResult, RebaseWarning};
    pub use crate::session::{Session, SessionBuilder};
    pub use crate::store::model::Operation;
}

pub use session::{Session, SessionBuilder};

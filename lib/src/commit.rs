//! The commit engine: content-addressed commit creation, branch/HEAD
//! management, and ancestry queries.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::compile::build_message_for_commit;
use crate::content::{validate_content, Content, ContentRegistry, Priority};
use crate::dag;
use crate::error::{TractError, TractResult};
use crate::hash::{hash_bytes, hash_value};
use crate::ids::{CommitHash, ContentHash, TractId};
use crate::store::model::{
    branch_ref_name, AnnotationRow, CommitParentRow, CommitRow, HeadState, Operation, HEAD_REF,
    PREV_HEAD_REF,
};
use crate::store::Store;
use crate::tokens::TokenCounter;

/// A read-only view of a commit, returned from every mutating and
/// ancestry-query operation.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub commit_hash: CommitHash,
    pub parent_hash: Option<CommitHash>,
    pub content_type: String,
    pub operation: Operation,
    pub response_to: Option<CommitHash>,
    pub message: Option<String>,
    pub token_count: u64,
    pub created_at: String,
}

impl From<CommitRow> for CommitInfo {
    fn from(row: CommitRow) -> Self {
        Self {
            commit_hash: row.commit_hash,
            parent_hash: row.parent_hash,
            content_type: row.content_type,
            operation: row.operation,
            response_to: row.response_to,
            message: row.message,
            token_count: row.token_count,
            created_at: row.created_at,
        }
    }
}

/// What to do when a configured token budget is exceeded by the
/// projected compiled size after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetPolicy {
    /// Log and continue.
    Warn,
    /// Raise [`TractError::BudgetExceeded`] and roll back.
    Block,
    /// Raise the same error, but flagged so an external compression
    /// collaborator can act on it; compression itself is out of scope.
    AutoCompress,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub limit: usize,
    pub policy: BudgetPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Soft,
    Hard,
}

/// The commit engine. Borrows its store and token counter from the
/// owning [`crate::session::Session`]; holds no state of its own beyond
/// the injected budget policy.
pub struct CommitEngine<'a> {
    store: &'a dyn Store,
    token_counter: &'a dyn TokenCounter,
    registry: &'a ContentRegistry,
}

impl<'a> CommitEngine<'a> {
    pub fn new(store: &'a dyn Store, token_counter: &'a dyn TokenCounter) -> Self {
        Self {
            store,
            token_counter,
            registry: DEFAULT_REGISTRY.get_or_init(ContentRegistry::new),
        }
    }

    pub fn with_registry(mut self, registry: &'a ContentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Create a new commit. See §4.2 of the design for the eight-step
    /// contract; this follows it in order.
    #[instrument(skip_all, fields(tract_id = %tract_id.as_str(), operation = ?operation))]
    #[allow(clippy::too_many_arguments)]
    pub fn create_commit(
        &self,
        tract_id: &TractId,
        content: Content,
        operation: Operation,
        message: Option<String>,
        response_to: Option<CommitHash>,
        metadata: Option<Value>,
        generation_config: Option<Value>,
    ) -> TractResult<CommitInfo> {
        // 1. canonicalize + hash content, write blob if absent
        let value = content.to_value()?;
        let content_hash = ContentHash::from_bytes(&hash_value(&value)?);
        let bytes = serde_json::to_vec(&value)
            .map_err(|source| TractError::ContentValidation { reason: source.to_string() })?;
        self.store.put_blob_if_absent(&content_hash, &bytes)?;

        // 2. resolve parent as current HEAD
        let head_state = self.store.get_head_state(tract_id)?;
        let parent_hash = self.store.get_ref(tract_id, HEAD_REF)?;
        if operation == Operation::Append && head_state.current_branch.is_none() && parent_hash.is_some()
        {
            return Err(TractError::DetachedHead);
        }

        // 3. EDIT target must be an ancestor of HEAD along the primary chain
        if operation == Operation::Edit {
            let target = response_to.clone().ok_or_else(|| TractError::ContentValidation {
                reason: "EDIT commits require response_to".to_string(),
            })?;
            let ok = match &parent_hash {
                Some(head) => dag::is_ancestor(self.store, tract_id, &target, head)?,
                None => false,
            };
            if !ok {
                return Err(TractError::EditTarget { target });
            }
        }

        // 4. token count of the formatted content
        let row_stub = CommitRow {
            commit_hash: CommitHash::from_bytes(&[0u8; 32]),
            tract_id: tract_id.clone(),
            parent_hash: parent_hash.clone(),
            content_hash: content_hash.clone(),
            content_type: content.content_type().to_string(),
            operation,
            response_to: response_to.clone(),
            message: message.clone(),
            token_count: 0,
            metadata: metadata.clone().unwrap_or(Value::Null),
            generation_config: generation_config.clone(),
            created_at: String::new(),
        };
        let preview = build_message_for_commit(&row_stub, &content, &HashMap::new(), false, false);
        let token_count = self.token_counter.count_messages(std::slice::from_ref(&preview)) as u64;

        let created_at = Utc::now().to_rfc3339();

        // 5. compute commit_hash over canonical fields
        let commit_hash = compute_commit_hash(
            tract_id,
            parent_hash.as_ref(),
            &content_hash,
            operation,
            response_to.as_ref(),
            message.as_deref(),
            &created_at,
        );

        let row = CommitRow {
            commit_hash: commit_hash.clone(),
            tract_id: tract_id.clone(),
            parent_hash: parent_hash.clone(),
            content_hash,
            content_type: content.content_type().to_string(),
            operation,
            response_to: response_to.clone(),
            message,
            token_count,
            metadata: metadata.unwrap_or(Value::Null),
            generation_config,
            created_at,
        };

        // 6. insert commit row; advance branch ref (APPEND only) and HEAD
        self.store.put_commit(&row)?;
        if operation == Operation::Append {
            if let Some(branch) = &head_state.current_branch {
                self.store.set_ref(tract_id, &branch_ref_name(branch), &commit_hash)?;
            }
        } else if let Some(branch) = &head_state.current_branch {
            // EDIT also advances the attached branch; it is a normal
            // commit on the chain, just one that substitutes at compile
            // time rather than appending a message.
            self.store.set_ref(tract_id, &branch_ref_name(branch), &commit_hash)?;
        }
        self.store.set_ref(tract_id, HEAD_REF, &commit_hash)?;
        if head_state.current_branch.is_none() && self.store.list_branches(tract_id)?.is_empty() {
            // Bootstrap: first commit in a fresh tract creates and
            // attaches a default "main" branch, mirroring a fresh
            // repository's implicit initial branch.
            self.store.set_ref(tract_id, &branch_ref_name("main"), &commit_hash)?;
            self.store.set_head_state(&HeadState {
                tract_id: tract_id.clone(),
                current_branch: Some("main".to_string()),
            })?;
        }

        // 7. token-budget check: the engine itself only knows this one
        // commit's token count. The *projected compiled* total needs a
        // full walk, so `Session::create_commit` performs that check
        // (against the configured `TokenBudget`) after this call returns,
        // rolling back the surrounding transaction on `Block`/`AutoCompress`.

        debug!(commit = %commit_hash.short(), "commit created");
        Ok(CommitInfo::from(row))
    }

    #[instrument(skip_all, fields(tract_id = %tract_id.as_str()))]
    pub fn annotate(
        &self,
        tract_id: &TractId,
        target_hash: &CommitHash,
        priority: Priority,
        reason: Option<String>,
        retention: Option<Value>,
    ) -> TractResult<()> {
        if self.store.get_commit(tract_id, target_hash)?.is_none() {
            return Err(TractError::CommitNotFound {
                hash: target_hash.to_string(),
            });
        }
        let annotation = AnnotationRow {
            id: 0,
            tract_id: tract_id.clone(),
            target_hash: target_hash.clone(),
            priority,
            reason,
            retention,
            created_at: Utc::now().to_rfc3339(),
        };
        self.store.put_annotation(&annotation)?;
        Ok(())
    }

    pub fn branch(
        &self,
        tract_id: &TractId,
        name: &str,
        source: Option<&CommitHash>,
        switch: bool,
    ) -> TractResult<()> {
        let target = match source {
            Some(hash) => hash.clone(),
            None => self
                .store
                .get_ref(tract_id, HEAD_REF)?
                .ok_or_else(|| TractError::CommitNotFound {
                    hash: "HEAD".to_string(),
                })?,
        };
        self.store.set_ref(tract_id, &branch_ref_name(name), &target)?;
        if switch {
            self.store.set_ref(tract_id, HEAD_REF, &target)?;
            self.store.set_head_state(&HeadState {
                tract_id: tract_id.clone(),
                current_branch: Some(name.to_string()),
            })?;
        }
        Ok(())
    }

    pub fn switch(&self, tract_id: &TractId, name: &str) -> TractResult<()> {
        let target = self
            .store
            .get_ref(tract_id, &branch_ref_name(name))?
            .ok_or_else(|| TractError::BranchNotFound {
                name: name.to_string(),
            })?;
        self.remember_prev_head(tract_id)?;
        self.store.set_ref(tract_id, HEAD_REF, &target)?;
        self.store.set_head_state(&HeadState {
            tract_id: tract_id.clone(),
            current_branch: Some(name.to_string()),
        })?;
        Ok(())
    }

    /// Accepts a branch name, full commit hash, unique prefix (>= 4
    /// chars), or `-` for the previous HEAD.
    pub fn checkout(&self, tract_id: &TractId, target: &str) -> TractResult<CommitHash> {
        self.remember_prev_head(tract_id)?;

        if target == "-" {
            let prev = self
                .store
                .get_ref(tract_id, PREV_HEAD_REF)?
                .ok_or_else(|| TractError::CommitNotFound {
                    hash: "PREV_HEAD".to_string(),
                })?;
            self.store.set_ref(tract_id, HEAD_REF, &prev)?;
            self.store.set_head_state(&HeadState {
                tract_id: tract_id.clone(),
                current_branch: None,
            })?;
            return Ok(prev);
        }

        if let Some(branch_tip) = self.store.get_ref(tract_id, &branch_ref_name(target))? {
            self.store.set_ref(tract_id, HEAD_REF, &branch_tip)?;
            self.store.set_head_state(&HeadState {
                tract_id: tract_id.clone(),
                current_branch: Some(target.to_string()),
            })?;
            return Ok(branch_tip);
        }

        let resolved = self.resolve_commit_ref(tract_id, target)?;
        self.store.set_ref(tract_id, HEAD_REF, &resolved)?;
        self.store.set_head_state(&HeadState {
            tract_id: tract_id.clone(),
            current_branch: None,
        })?;
        Ok(resolved)
    }

    /// Resolve a full hash or an unambiguous prefix (>= 4 hex chars) to a
    /// commit hash.
    pub fn resolve_commit_ref(&self, tract_id: &TractId, reference: &str) -> TractResult<CommitHash> {
        if reference.len() >= 64 {
            if let Ok(hash) = CommitHash::parse(reference) {
                if self.store.get_commit(tract_id, &hash)?.is_some() {
                    return Ok(hash);
                }
            }
        }
        if reference.len() < 4 {
            return Err(TractError::CommitNotFound {
                hash: reference.to_string(),
            });
        }
        let matches = self.store.find_by_prefix(tract_id, reference)?;
        match matches.len() {
            0 => Err(TractError::CommitNotFound {
                hash: reference.to_string(),
            }),
            1 => Ok(matches[0].clone()),
            count => Err(TractError::AmbiguousPrefix {
                prefix: reference.to_string(),
                count,
            }),
        }
    }

    pub fn delete_branch(&self, tract_id: &TractId, name: &str, force: bool) -> TractResult<()> {
        let head_state = self.store.get_head_state(tract_id)?;
        if head_state.current_branch.as_deref() == Some(name) {
            return Err(TractError::CurrentBranch {
                name: name.to_string(),
            });
        }
        let tip = self
            .store
            .get_ref(tract_id, &branch_ref_name(name))?
            .ok_or_else(|| TractError::BranchNotFound {
                name: name.to_string(),
            })?;
        if !force {
            let branches = self.store.list_branches(tract_id)?;
            let is_ancestor_of_any = branches
                .iter()
                .filter(|(other, _)| other != name)
                .any(|(_, other_tip)| {
                    dag::is_ancestor(self.store, tract_id, &tip, other_tip).unwrap_or(false)
                });
            if !is_ancestor_of_any {
                return Err(TractError::ContentValidation {
                    reason: format!(
                        "branch {name:?} tip is not an ancestor of any other branch; use force to delete anyway"
                    ),
                });
            }
        }
        self.store.delete_ref(tract_id, &branch_ref_name(name))
    }

    /// `soft` and `hard` behave identically here (there is no working
    /// tree to reconcile); the CLI boundary is where `hard` requires an
    /// explicit force flag.
    pub fn reset(&self, tract_id: &TractId, target: &CommitHash, _mode: ResetMode) -> TractResult<()> {
        let head_state = self.store.get_head_state(tract_id)?;
        let branch = head_state
            .current_branch
            .ok_or(TractError::DetachedHead)?;
        self.store.set_ref(tract_id, &branch_ref_name(&branch), target)?;
        self.store.set_ref(tract_id, HEAD_REF, target)?;
        Ok(())
    }

    pub fn log(
        &self,
        tract_id: &TractId,
        limit: Option<usize>,
        op_filter: Option<Operation>,
    ) -> TractResult<Vec<CommitInfo>> {
        let head = match self.store.get_ref(tract_id, HEAD_REF)? {
            Some(h) => h,
            None => return Ok(Vec::new()),
        };
        let chain = dag::ancestors(self.store, tract_id, &head)?;
        let mut out = Vec::new();
        for hash in chain {
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
            if let Some(row) = self.store.get_commit(tract_id, &hash)? {
                if op_filter.map(|f| f == row.operation).unwrap_or(true) {
                    out.push(CommitInfo::from(row));
                }
            }
        }
        Ok(out)
    }

    fn remember_prev_head(&self, tract_id: &TractId) -> TractResult<()> {
        if let Some(current) = self.store.get_ref(tract_id, HEAD_REF)? {
            self.store.set_ref(tract_id, PREV_HEAD_REF, &current)?;
        }
        Ok(())
    }
}

static DEFAULT_REGISTRY: once_cell::sync::OnceCell<ContentRegistry> = once_cell::sync::OnceCell::new();

#[allow(clippy::too_many_arguments)]
fn compute_commit_hash(
    tract_id: &TractId,
    parent_hash: Option<&CommitHash>,
    content_hash: &ContentHash,
    operation: Operation,
    response_to: Option<&CommitHash>,
    message: Option<&str>,
    created_at: &str,
) -> CommitHash {
    let canonical = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        tract_id.as_str(),
        parent_hash.map(|h| h.as_str()).unwrap_or(""),
        content_hash.as_str(),
        operation.as_str(),
        response_to.map(|h| h.as_str()).unwrap_or(""),
        message.unwrap_or(""),
        created_at,
    );
    CommitHash::from_bytes(&hash_bytes(canonical.as_bytes()))
}

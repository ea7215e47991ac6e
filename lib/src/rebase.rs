//! Linear replay of a branch's commits onto a new parent (rebase) and of
//! a single commit onto HEAD (cherry-pick), with EDIT-target remapping
//! and pre-flight safety checks.

use std::collections::HashMap;

use tracing::{info, instrument, warn};

use crate::commit::{CommitEngine, CommitInfo};
use crate::content::{validate_content, ContentRegistry};
use crate::dag;
use crate::error::{TractError, TractResult};
use crate::ids::{CommitHash, TractId};
use crate::store::model::{branch_ref_name, Operation, HEAD_REF};
use crate::store::Store;
use crate::tokens::TokenCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseWarningKind {
    /// An `EDIT`'s `response_to` target is not in the new base's
    /// ancestry, so the replayed edit would target a commit the new
    /// history never saw.
    EditTargetMissing,
}

#[derive(Debug, Clone)]
pub struct RebaseWarning {
    pub kind: RebaseWarningKind,
    pub commit_hash: CommitHash,
    pub target: Option<CommitHash>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseDecision {
    Accept,
    Abort,
}

/// A synchronous rebase-warning resolver (§5).
pub type RebaseResolver<'a> = &'a dyn Fn(&RebaseWarning) -> RebaseDecision;

#[derive(Debug, Clone)]
pub struct RebaseResult {
    pub original_tip: CommitHash,
    pub new_tip: CommitHash,
    pub replayed: Vec<CommitInfo>,
    pub warnings: Vec<RebaseWarning>,
}

pub struct RebaseEngine<'a> {
    store: &'a dyn Store,
    token_counter: &'a dyn TokenCounter,
    registry: &'a ContentRegistry,
}

impl<'a> RebaseEngine<'a> {
    pub fn new(store: &'a dyn Store, token_counter: &'a dyn TokenCounter, registry: &'a ContentRegistry) -> Self {
        Self {
            store,
            token_counter,
            registry,
        }
    }

    /// Rebase the currently attached branch onto `target_branch`.
    #[instrument(skip_all, fields(tract_id = %tract_id.as_str(), target = target_branch))]
    pub fn rebase(
        &self,
        tract_id: &TractId,
        target_branch: &str,
        resolver: Option<RebaseResolver>,
    ) -> TractResult<RebaseResult> {
        let head_state = self.store.get_head_state(tract_id)?;
        let current_branch = head_state.current_branch.ok_or(TractError::DetachedHead)?;
        let current_tip = self
            .store
            .get_ref(tract_id, &branch_ref_name(&current_branch))?
            .ok_or_else(|| TractError::BranchNotFound {
                name: current_branch.clone(),
            })?;
        let new_base = self
            .store
            .get_ref(tract_id, &branch_ref_name(target_branch))?
            .ok_or_else(|| TractError::BranchNotFound {
                name: target_branch.to_string(),
            })?;

        // idempotence: rebasing onto a branch that already contains the
        // current tip is a no-op.
        if dag::is_ancestor(self.store, tract_id, &current_tip, &new_base)? {
            return Ok(RebaseResult {
                original_tip: current_tip.clone(),
                new_tip: current_tip,
                replayed: Vec::new(),
                warnings: Vec::new(),
            });
        }

        let base = dag::merge_base(self.store, tract_id, &current_tip, &new_base)?;
        let range = dag::range(self.store, tract_id, base.as_ref(), &current_tip)?;

        // pre-flight: reject any commit in range carrying a second parent
        for hash in &range {
            if !self.store.get_second_parents(tract_id, hash)?.is_empty() {
                return Err(TractError::Rebase {
                    reason: format!("cannot rebase across merge commit {}", hash.short()),
                });
            }
        }

        let mut warnings = Vec::new();
        for hash in &range {
            if let Some(row) = self.store.get_commit(tract_id, hash)? {
                if row.operation == Operation::Edit {
                    if let Some(target) = &row.response_to {
                        if !dag::is_ancestor(self.store, tract_id, target, &new_base)? {
                            warnings.push(RebaseWarning {
                                kind: RebaseWarningKind::EditTargetMissing,
                                commit_hash: hash.clone(),
                                target: Some(target.clone()),
                            });
                        }
                    }
                }
            }
        }

        // An accepted `EditTargetMissing` warning means the replayed
        // commit becomes an APPEND instead of retrying the identical
        // ancestor check inside `create_commit`.
        let mut force_append: std::collections::HashSet<CommitHash> = std::collections::HashSet::new();
        if !warnings.is_empty() {
            match resolver {
                None => {
                    return Err(TractError::SemanticSafety {
                        warnings: warnings.len(),
                    })
                }
                Some(resolve) => {
                    for warning in &warnings {
                        match resolve(warning) {
                            RebaseDecision::Accept => {
                                force_append.insert(warning.commit_hash.clone());
                            }
                            RebaseDecision::Abort => {
                                return Err(TractError::Rebase {
                                    reason: "rebase aborted by resolver".to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }

        // detach HEAD to the new base, replay, and restore on failure.
        self.store.set_ref(tract_id, HEAD_REF, &new_base)?;
        let mut remap: HashMap<CommitHash, CommitHash> = HashMap::new();
        let mut cursor = new_base.clone();
        let mut replayed = Vec::new();
        let engine = CommitEngine::new(self.store, self.token_counter).with_registry(self.registry);

        for hash in &range {
            let append = force_append.contains(hash);
            match replay_commit(self.store, tract_id, &engine, self.registry, hash, &remap, append) {
                Ok(info) => {
                    remap.insert(hash.clone(), info.commit_hash.clone());
                    cursor = info.commit_hash.clone();
                    self.store.set_ref(tract_id, HEAD_REF, &cursor)?;
                    replayed.push(info);
                }
                Err(err) => {
                    warn!(error = %err, "rebase replay failed, restoring original tip");
                    self.store
                        .set_ref(tract_id, &branch_ref_name(&current_branch), &current_tip)?;
                    self.store.set_ref(tract_id, HEAD_REF, &current_tip)?;
                    return Err(err);
                }
            }
        }

        self.store
            .set_ref(tract_id, &branch_ref_name(&current_branch), &cursor)?;
        info!(new_tip = %cursor.short(), replayed = replayed.len(), "rebase complete");
        Ok(RebaseResult {
            original_tip: current_tip,
            new_tip: cursor,
            replayed,
            warnings,
        })
    }

    /// Replay a single commit onto the current HEAD.
    #[instrument(skip_all, fields(tract_id = %tract_id.as_str()))]
    pub fn cherry_pick(
        &self,
        tract_id: &TractId,
        commit_hash: &CommitHash,
        resolver: Option<RebaseResolver>,
    ) -> TractResult<CommitInfo> {
        let head = self
            .store
            .get_ref(tract_id, HEAD_REF)?
            .ok_or_else(|| TractError::CommitNotFound {
                hash: "HEAD".to_string(),
            })?;
        let row = self
            .store
            .get_commit(tract_id, commit_hash)?
            .ok_or_else(|| TractError::CommitNotFound {
                hash: commit_hash.to_string(),
            })?;

        let mut force_append = false;
        if row.operation == Operation::Edit {
            let target = row.response_to.clone().expect("EDIT always carries response_to");
            if !dag::is_ancestor(self.store, tract_id, &target, &head)? {
                let warning = RebaseWarning {
                    kind: RebaseWarningKind::EditTargetMissing,
                    commit_hash: commit_hash.clone(),
                    target: Some(target.clone()),
                };
                match resolver {
                    Some(resolve) if resolve(&warning) == RebaseDecision::Accept => {
                        force_append = true;
                    }
                    _ => {
                        return Err(TractError::CherryPick {
                            reason: format!(
                                "edit target {} is not reachable from HEAD",
                                target.short()
                            ),
                        })
                    }
                }
            }
        }

        let engine = CommitEngine::new(self.store, self.token_counter).with_registry(self.registry);
        replay_commit(
            self.store,
            tract_id,
            &engine,
            self.registry,
            commit_hash,
            &HashMap::new(),
            force_append,
        )
    }
}

/// Load `hash`'s original content through the same validator
/// `create_commit` uses, then write it as a new commit on the current
/// HEAD. If the commit was an `EDIT`, its `response_to` is remapped
/// through `remap` when the target was itself rebased in this pass;
/// otherwise the original target hash is kept (cherry-pick path).
///
/// `force_append` is set when a resolver accepted an `EditTargetMissing`
/// warning for this commit: the replay becomes a plain `APPEND` with no
/// `response_to`, rather than retrying the ancestor check that already
/// failed once.
fn replay_commit(
    store: &dyn Store,
    tract_id: &TractId,
    engine: &CommitEngine,
    registry: &ContentRegistry,
    hash: &CommitHash,
    remap: &HashMap<CommitHash, CommitHash>,
    force_append: bool,
) -> TractResult<CommitInfo> {
    let row = store
        .get_commit(tract_id, hash)?
        .ok_or_else(|| TractError::CommitNotFound { hash: hash.to_string() })?;
    let bytes = store
        .get_blob(&row.content_hash)?
        .ok_or_else(|| TractError::BlobNotFound {
            hash: row.content_hash.to_string(),
        })?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    let content = validate_content(&value, registry)?;

    let (operation, response_to) = if force_append {
        (Operation::Append, None)
    } else if row.operation == Operation::Edit {
        let response_to = row.response_to.as_ref().map(|t| remap.get(t).cloned().unwrap_or_else(|| t.clone()));
        (row.operation, response_to)
    } else {
        (row.operation, None)
    };

    engine.create_commit(
        tract_id,
        content,
        operation,
        row.message.clone(),
        response_to,
        Some(row.metadata.clone()),
        row.generation_config.clone(),
    )
}

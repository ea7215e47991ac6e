//! Three-way merge classification, conflict enumeration, and semantic
//! resolution between two branches.

use std::collections::HashMap;

use tracing::{info, instrument};

use crate::commit::{CommitEngine, CommitInfo};
use crate::content::{validate_content, Content, ContentRegistry};
use crate::dag;
use crate::error::{TractError, TractResult};
use crate::ids::{CommitHash, TractId};
use crate::llm::{GenerationConfig, LlmClient};
use crate::store::model::{branch_ref_name, Operation};
use crate::store::Store;
use crate::tokens::TokenCounter;

/// The two conflict shapes this engine detects. `edit_plus_append` from
/// the original taxonomy is intentionally not implemented: it requires
/// structural dependency detection this engine has no signal for, so a
/// diverging edit-then-append merges clean rather than raising a
/// conflict it cannot actually characterize. The enum is still open so a
/// future variant is additive, not a breaking rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MergeConflictKind {
    BothEdit,
    SkipVsEdit,
}

#[derive(Debug, Clone)]
pub struct ConflictInfo {
    pub kind: MergeConflictKind,
    pub target: CommitHash,
    pub base_content: Option<String>,
    pub target_content: Option<String>,
    pub source_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeClassification {
    AlreadyUpToDate,
    FastForward,
    ThreeWay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Planned,
    Reviewing,
    Committed,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub classification: MergeClassification,
    pub state: MergeState,
    pub target_tip_hash: CommitHash,
    pub source_tip_hash: CommitHash,
    pub merge_base: Option<CommitHash>,
    pub conflicts: Vec<ConflictInfo>,
    pub resolutions: HashMap<CommitHash, String>,
    /// EDITs present on only one side of the merge base range (no
    /// conflict to resolve): the hash of each original EDIT commit,
    /// oldest first, replayed onto the target tip by [`MergeEngine::commit_merge`].
    pub auto_merged: Vec<CommitHash>,
    pub new_commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    Resolved,
    Skip,
    Abort,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub action: ResolutionAction,
    pub content_text: Option<String>,
    pub reasoning: Option<String>,
}

/// A synchronous conflict resolver, matching §5's "suspendable
/// operations are modeled as synchronous callables" rule.
pub type ConflictResolver<'a> = &'a dyn Fn(&ConflictInfo) -> Resolution;

pub struct MergeEngine<'a> {
    store: &'a dyn Store,
    token_counter: &'a dyn TokenCounter,
    registry: &'a ContentRegistry,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        store: &'a dyn Store,
        token_counter: &'a dyn TokenCounter,
        registry: &'a ContentRegistry,
    ) -> Self {
        Self {
            store,
            token_counter,
            registry,
        }
    }

    /// Classify and (for non-conflicting cases) perform the merge of
    /// `source_branch` into the currently attached branch.
    #[instrument(skip_all, fields(tract_id = %tract_id.as_str(), source = source_branch))]
    pub fn merge(
        &self,
        tract_id: &TractId,
        source_branch: &str,
        no_ff: bool,
    ) -> TractResult<MergeResult> {
        let head_state = self.store.get_head_state(tract_id)?;
        let target_branch = head_state.current_branch.ok_or(TractError::DetachedHead)?;
        let target_tip = self
            .store
            .get_ref(tract_id, &branch_ref_name(&target_branch))?
            .ok_or_else(|| TractError::BranchNotFound {
                name: target_branch.clone(),
            })?;
        let source_tip = self
            .store
            .get_ref(tract_id, &branch_ref_name(source_branch))?
            .ok_or_else(|| TractError::BranchNotFound {
                name: source_branch.to_string(),
            })?;

        if dag::is_ancestor(self.store, tract_id, &source_tip, &target_tip)? {
            return Ok(MergeResult {
                classification: MergeClassification::AlreadyUpToDate,
                state: MergeState::Committed,
                target_tip_hash: target_tip,
                source_tip_hash: source_tip,
                merge_base: None,
                conflicts: Vec::new(),
                resolutions: HashMap::new(),
                auto_merged: Vec::new(),
                new_commit: None,
            });
        }

        if !no_ff && dag::is_ancestor(self.store, tract_id, &target_tip, &source_tip)? {
            self.store
                .set_ref(tract_id, &branch_ref_name(&target_branch), &source_tip)?;
            self.store.set_ref(tract_id, crate::store::model::HEAD_REF, &source_tip)?;
            info!(target = %target_branch, "fast-forwarded");
            return Ok(MergeResult {
                classification: MergeClassification::FastForward,
                state: MergeState::Committed,
                target_tip_hash: source_tip.clone(),
                source_tip_hash: source_tip,
                merge_base: None,
                conflicts: Vec::new(),
                resolutions: HashMap::new(),
                auto_merged: Vec::new(),
                new_commit: None,
            });
        }

        // three-way
        let base = dag::merge_base(self.store, tract_id, &target_tip, &source_tip)?;
        let target_range = dag::range(self.store, tract_id, base.as_ref(), &target_tip)?;
        let source_range = dag::range(self.store, tract_id, base.as_ref(), &source_tip)?;

        let target_edits = self.collect_edits(tract_id, &target_range)?;
        let source_edits = self.collect_edits(tract_id, &source_range)?;

        let mut conflicts = Vec::new();
        for (target, source_row) in &source_edits {
            if let Some(target_row) = target_edits.get(target) {
                if target_row.content_hash != source_row.content_hash {
                    conflicts.push(ConflictInfo {
                        kind: MergeConflictKind::BothEdit,
                        target: target.clone(),
                        base_content: self.render_commit(tract_id, target)?,
                        target_content: self.render_commit(tract_id, &target_row.commit_hash)?,
                        source_content: self.render_commit(tract_id, &source_row.commit_hash)?,
                    });
                }
            }
        }

        // skip_vs_edit: one side edits a target the other side annotated SKIP
        for (target, _) in source_edits.iter().chain(target_edits.iter()) {
            let targets = std::slice::from_ref(target);
            let annotations = self.store.latest_annotations(tract_id, targets, None)?;
            if let Some(annotation) = annotations.get(target) {
                if annotation.priority == crate::content::Priority::Skip
                    && (source_edits.contains_key(target) != target_edits.contains_key(target))
                {
                    conflicts.push(ConflictInfo {
                        kind: MergeConflictKind::SkipVsEdit,
                        target: target.clone(),
                        base_content: self.render_commit(tract_id, target)?,
                        target_content: None,
                        source_content: None,
                    });
                }
            }
        }

        // EDITs present only on the source side (no edit of the same
        // target on the target side, so nothing to conflict with) auto-
        // merge: `commit_merge` replays them onto the target tip so
        // their content survives the merge. Edits present only on the
        // target side need no replay — they're already ancestors of
        // `target_tip`, which becomes the merge commit's primary
        // parent. Ordered by original `created_at`.
        let conflict_targets: std::collections::HashSet<&CommitHash> =
            conflicts.iter().map(|c| &c.target).collect();
        let mut auto_merged_rows: Vec<&crate::store::model::CommitRow> = source_edits
            .iter()
            .filter(|(target, _)| !target_edits.contains_key(*target) && !conflict_targets.contains(target))
            .map(|(_, row)| row)
            .collect();
        auto_merged_rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let auto_merged = auto_merged_rows.into_iter().map(|row| row.commit_hash.clone()).collect();

        Ok(MergeResult {
            classification: MergeClassification::ThreeWay,
            state: if conflicts.is_empty() {
                MergeState::Reviewing
            } else {
                MergeState::Planned
            },
            target_tip_hash: target_tip,
            source_tip_hash: source_tip,
            merge_base: base,
            conflicts,
            resolutions: HashMap::new(),
            auto_merged,
            new_commit: None,
        })
    }

    /// Resolve every conflict in `result` via `resolver`, returning the
    /// resolutions map ready for [`Self::commit_merge`]. Aborts the whole
    /// merge if the resolver returns `Abort` for any conflict.
    pub fn resolve_with(
        &self,
        result: &MergeResult,
        resolver: ConflictResolver,
    ) -> TractResult<HashMap<CommitHash, String>> {
        let mut resolutions = HashMap::new();
        for conflict in &result.conflicts {
            let resolution = resolver(conflict);
            match resolution.action {
                ResolutionAction::Resolved => {
                    let text = resolution.content_text.ok_or_else(|| TractError::NothingToMerge {
                        reason: "resolver returned Resolved with no content_text".to_string(),
                    })?;
                    resolutions.insert(conflict.target.clone(), text);
                }
                ResolutionAction::Skip => continue,
                ResolutionAction::Abort => {
                    return Err(TractError::NothingToMerge {
                        reason: "merge aborted by resolver".to_string(),
                    })
                }
            }
        }
        Ok(resolutions)
    }

    /// Semantic resolution backed by an `LlmClient`: same interface as a
    /// manual resolver, but the text comes from a model call.
    pub fn resolve_semantically(
        &self,
        result: &MergeResult,
        llm: &dyn LlmClient,
        options: &GenerationConfig,
    ) -> TractResult<HashMap<CommitHash, String>> {
        let mut resolutions = HashMap::new();
        for conflict in &result.conflicts {
            let prompt = format!(
                "Reconcile these two edits of the same message.\nbase: {}\ntarget: {}\nsource: {}",
                conflict.base_content.as_deref().unwrap_or(""),
                conflict.target_content.as_deref().unwrap_or(""),
                conflict.source_content.as_deref().unwrap_or(""),
            );
            let messages = [crate::compile::CompiledMessage {
                role: "user".to_string(),
                text: prompt,
                name: None,
                commit_hash: None,
                edited: false,
            }];
            let response = llm
                .complete(&messages, options)
                .map_err(|source| TractError::NothingToMerge {
                    reason: format!("semantic resolver failed: {source}"),
                })?;
            resolutions.insert(conflict.target.clone(), response.text);
        }
        Ok(resolutions)
    }

    /// Write the merge commit: two parents (primary = target tip,
    /// secondary = source tip), one EDIT per resolved target, advance the
    /// target branch.
    #[instrument(skip_all, fields(tract_id = %tract_id.as_str()))]
    pub fn commit_merge(
        &self,
        tract_id: &TractId,
        mut result: MergeResult,
    ) -> TractResult<MergeResult> {
        if result.classification != MergeClassification::ThreeWay {
            return Err(TractError::NothingToMerge {
                reason: "commit_merge only applies to three-way merges".to_string(),
            });
        }
        let unresolved: Vec<&CommitHash> = result
            .conflicts
            .iter()
            .map(|c| &c.target)
            .filter(|t| !result.resolutions.contains_key(*t))
            .collect();
        if !unresolved.is_empty() {
            return Err(TractError::NothingToMerge {
                reason: format!("{} conflicts remain unresolved", unresolved.len()),
            });
        }

        let head_state = self.store.get_head_state(tract_id)?;
        let target_branch = head_state.current_branch.ok_or(TractError::DetachedHead)?;

        let engine = CommitEngine::new(self.store, self.token_counter).with_registry(self.registry);
        let summary = format!("merge: {} targets resolved", result.resolutions.len());
        let merge_commit = engine.create_commit(
            tract_id,
            Content::Instruction { text: summary },
            Operation::Append,
            Some("merge".to_string()),
            None,
            None,
            None,
        )?;
        self.store.put_commit_parent(&crate::store::model::CommitParentRow {
            commit_hash: merge_commit.commit_hash.clone(),
            parent_hash: result.source_tip_hash.clone(),
            parent_index: 1,
        })?;
        // The merge record is bookkeeping, not conversation content: it
        // must never surface in a compile, so it's always SKIP.
        engine.annotate(
            tract_id,
            &merge_commit.commit_hash,
            crate::content::Priority::Skip,
            Some("merge record".to_string()),
            None,
        )?;

        let mut cursor = merge_commit.commit_hash.clone();
        for auto_hash in &result.auto_merged {
            let Some(row) = self.store.get_commit(tract_id, auto_hash)? else {
                continue;
            };
            let Some(target) = row.response_to.clone() else {
                continue;
            };
            let content = self.load_content(&row)?;
            let edit = engine.create_commit(
                tract_id,
                content,
                Operation::Edit,
                row.message.clone(),
                Some(target),
                Some(row.metadata.clone()),
                row.generation_config.clone(),
            )?;
            cursor = edit.commit_hash;
        }
        for (target, text) in &result.resolutions {
            let content = Content::Dialogue {
                role: "user".to_string(),
                text: text.clone(),
                name: None,
            };
            let edit = engine.create_commit(
                tract_id,
                content,
                Operation::Edit,
                None,
                Some(target.clone()),
                None,
                None,
            )?;
            cursor = edit.commit_hash;
        }
        self.store
            .set_ref(tract_id, &branch_ref_name(&target_branch), &cursor)?;
        self.store.set_ref(tract_id, crate::store::model::HEAD_REF, &cursor)?;

        result.state = MergeState::Committed;
        result.new_commit = Some(merge_commit);
        result.target_tip_hash = cursor;
        Ok(result)
    }

    fn collect_edits(
        &self,
        tract_id: &TractId,
        range: &[CommitHash],
    ) -> TractResult<HashMap<CommitHash, crate::store::model::CommitRow>> {
        let mut out = HashMap::new();
        for hash in range {
            if let Some(row) = self.store.get_commit(tract_id, hash)? {
                if row.operation == Operation::Edit {
                    if let Some(target) = row.response_to.clone() {
                        let replace = match out.get(&target) {
                            Some(existing) => {
                                let existing: &crate::store::model::CommitRow = existing;
                                row.created_at > existing.created_at
                            }
                            None => true,
                        };
                        if replace {
                            out.insert(target, row);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    fn render_commit(&self, tract_id: &TractId, hash: &CommitHash) -> TractResult<Option<String>> {
        let Some(row) = self.store.get_commit(tract_id, hash)? else {
            return Ok(None);
        };
        let Some(content) = self.try_load_content(&row)? else {
            return Ok(None);
        };
        let message = crate::compile::build_message_for_commit(&row, &content, &HashMap::new(), false, false);
        Ok(Some(message.text))
    }

    /// Load and validate the content a commit row points at, if its blob
    /// is present.
    fn try_load_content(&self, row: &crate::store::model::CommitRow) -> TractResult<Option<Content>> {
        let Some(bytes) = self.store.get_blob(&row.content_hash)? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        Ok(Some(validate_content(&value, self.registry)?))
    }

    /// Load and validate the content a commit row points at, for
    /// re-committing during auto-merge replay. Errors (rather than
    /// silently skipping) if the blob is missing, since replay needs the
    /// actual content to create the new commit.
    fn load_content(&self, row: &crate::store::model::CommitRow) -> TractResult<Content> {
        self.try_load_content(row)?.ok_or_else(|| TractError::BlobNotFound {
            hash: row.content_hash.to_string(),
        })
    }
}

//! The public facade: one `Session` per tract, threading the commit
//! engine, compiler, cache, and injected collaborators through a single
//! transactional handle.

use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::cache::CacheManager;
use crate::commit::{BudgetPolicy, CommitEngine, CommitInfo, ResetMode};
use crate::compile::{
    CompileRequest, CompiledContext, ContextCompiler, DefaultContextCompiler,
};
use crate::config::Config;
use crate::content::{Content, ContentRegistry, Priority};
use crate::error::{TractError, TractResult};
use crate::ids::{CommitHash, TractId};
use crate::llm::{GenerationConfig, LlmClient, NullLlmClient};
use crate::merge::{ConflictResolver, MergeEngine, MergeResult};
use crate::rebase::{RebaseEngine, RebaseResolver, RebaseResult};
use crate::store::model::Operation;
use crate::store::sqlite::SqliteStore;
use crate::store::{in_transaction, Store};
use crate::tokens::{TokenCounter, WhitespaceTokenCounter};

/// Builder for [`Session`]. Fields set here take precedence over
/// `tract.toml` and `TRACT_*` env vars (§4.9's narrowest-wins order).
pub struct SessionBuilder {
    tract_id: Option<TractId>,
    config_path: Option<std::path::PathBuf>,
    db_path: Option<std::path::PathBuf>,
    cache_size: Option<usize>,
    token_counter: Option<Box<dyn TokenCounter>>,
    llm_client: Option<Box<dyn LlmClient>>,
    registry: ContentRegistry,
    compiler: Option<Box<dyn ContextCompiler>>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            tract_id: None,
            config_path: None,
            db_path: None,
            cache_size: None,
            token_counter: None,
            llm_client: None,
            registry: ContentRegistry::new(),
            compiler: None,
        }
    }
}

impl SessionBuilder {
    pub fn tract_id(mut self, tract_id: TractId) -> Self {
        self.tract_id = Some(tract_id);
        self
    }

    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn db_path(mut self, path: impl AsRef<Path>) -> Self {
        self.db_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    pub fn token_counter(mut self, counter: Box<dyn TokenCounter>) -> Self {
        self.token_counter = Some(counter);
        self
    }

    pub fn llm_client(mut self, client: Box<dyn LlmClient>) -> Self {
        self.llm_client = Some(client);
        self
    }

    pub fn registry(mut self, registry: ContentRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn compiler(mut self, compiler: Box<dyn ContextCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn open(self) -> TractResult<Session> {
        let mut config = Config::resolve(self.config_path.as_deref())?;
        if let Some(db_path) = &self.db_path {
            config.db_path = Some(db_path.to_string_lossy().into_owned());
        }
        if let Some(cache_size) = self.cache_size {
            config.cache_size = cache_size;
        }

        let store: Arc<dyn Store> = match &config.db_path {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => Arc::new(SqliteStore::open_in_memory()?),
        };
        let tract_id = self.tract_id.unwrap_or_else(TractId::generate);
        let token_counter = self
            .token_counter
            .unwrap_or_else(|| Box::new(WhitespaceTokenCounter::new()));
        let llm_client = self.llm_client.unwrap_or_else(|| Box::new(NullLlmClient));
        let compiler = self
            .compiler
            .unwrap_or_else(|| Box::new(DefaultContextCompiler));

        Ok(Session {
            tract_id,
            store,
            cache: RefCell::new(CacheManager::new(config.cache_size)),
            token_counter,
            llm_client,
            registry: self.registry,
            compiler,
            config,
        })
    }
}

/// One DAG instance plus its store handle, cache, and injected
/// collaborators. The unit of lifecycle: open, a series of mutations and
/// queries, drop. No process-wide singletons.
pub struct Session {
    tract_id: TractId,
    store: Arc<dyn Store>,
    cache: RefCell<CacheManager>,
    token_counter: Box<dyn TokenCounter>,
    llm_client: Box<dyn LlmClient>,
    registry: ContentRegistry,
    compiler: Box<dyn ContextCompiler>,
    config: Config,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn tract_id(&self) -> &TractId {
        &self.tract_id
    }

    fn engine(&self) -> CommitEngine<'_> {
        CommitEngine::new(self.store.as_ref(), self.token_counter.as_ref()).with_registry(&self.registry)
    }

    #[instrument(skip_all, fields(tract_id = %self.tract_id.as_str()))]
    #[allow(clippy::too_many_arguments)]
    pub fn create_commit(
        &self,
        content: Content,
        operation: Operation,
        message: Option<String>,
        response_to: Option<CommitHash>,
        metadata: Option<Value>,
        generation_config: Option<Value>,
    ) -> TractResult<CommitInfo> {
        in_transaction(self.store.as_ref(), || {
            let parent_head = self.store.get_ref(&self.tract_id, crate::store::model::HEAD_REF)?;
            let info = self.engine().create_commit(
                &self.tract_id,
                content.clone(),
                operation,
                message.clone(),
                response_to.clone(),
                metadata.clone(),
                generation_config.clone(),
            )?;

            // cache maintenance (§4.3): fetch the row we just wrote rather
            // than reassembling it, so the patcher always sees exactly
            // what's in the store.
            {
                let row = self
                    .store
                    .get_commit(&self.tract_id, &info.commit_hash)?
                    .ok_or_else(|| TractError::CommitNotFound {
                        hash: info.commit_hash.to_string(),
                    })?;
                let mut cache = self.cache.borrow_mut();
                match (operation, &parent_head) {
                    (Operation::Append, Some(parent)) => {
                        let priority = self.effective_priority(&info)?;
                        cache.extend_for_append(parent, info.commit_hash.clone(), &row, &content, priority);
                    }
                    (Operation::Edit, Some(parent)) => {
                        if let Some(target) = &response_to {
                            cache.patch_for_edit(parent, info.commit_hash.clone(), &row, &content, target);
                        }
                    }
                    _ => {
                        cache.invalidate(&info.commit_hash);
                    }
                }
            }

            // token-budget check against the projected compiled total
            if let Some(budget) = self.config.token_budget {
                let compiled = self.compile_internal(&info.commit_hash, &CompileRequest::default())?;
                if compiled.token_count > budget.limit {
                    match budget.policy {
                        BudgetPolicy::Warn => {
                            warn!(
                                total = compiled.token_count,
                                limit = budget.limit,
                                "token budget exceeded"
                            );
                        }
                        BudgetPolicy::Block | BudgetPolicy::AutoCompress => {
                            return Err(TractError::BudgetExceeded {
                                used: compiled.token_count,
                                limit: budget.limit,
                                policy: if budget.policy == BudgetPolicy::Block {
                                    "block".to_string()
                                } else {
                                    "auto_compress".to_string()
                                },
                            });
                        }
                    }
                }
            }

            Ok(info)
        })
    }

    pub fn annotate(
        &self,
        target_hash: &CommitHash,
        priority: Priority,
        reason: Option<String>,
        retention: Option<Value>,
    ) -> TractResult<()> {
        in_transaction(self.store.as_ref(), || {
            self.engine()
                .annotate(&self.tract_id, target_hash, priority, reason, retention)?;
            if let Some(head) = self.store.get_ref(&self.tract_id, crate::store::model::HEAD_REF)? {
                let mut cache = self.cache.borrow_mut();
                if cache.patch_for_annotate(&head, target_hash, priority).is_none() {
                    cache.invalidate(&head);
                }
            }
            Ok(())
        })
    }

    pub fn branch(&self, name: &str, source: Option<&CommitHash>, switch: bool) -> TractResult<()> {
        in_transaction(self.store.as_ref(), || self.engine().branch(&self.tract_id, name, source, switch))
    }

    pub fn switch(&self, name: &str) -> TractResult<()> {
        in_transaction(self.store.as_ref(), || self.engine().switch(&self.tract_id, name))
    }

    pub fn checkout(&self, target: &str) -> TractResult<CommitHash> {
        in_transaction(self.store.as_ref(), || self.engine().checkout(&self.tract_id, target))
    }

    pub fn delete_branch(&self, name: &str, force: bool) -> TractResult<()> {
        in_transaction(self.store.as_ref(), || self.engine().delete_branch(&self.tract_id, name, force))
    }

    pub fn reset(&self, target: &CommitHash, mode: ResetMode) -> TractResult<()> {
        in_transaction(self.store.as_ref(), || self.engine().reset(&self.tract_id, target, mode))
    }

    pub fn log(&self, limit: Option<usize>, op_filter: Option<Operation>) -> TractResult<Vec<CommitInfo>> {
        self.engine().log(&self.tract_id, limit, op_filter)
    }

    /// Compile HEAD (or `request.up_to`) into a flat message list,
    /// consulting the cache first.
    pub fn compile(&self, request: CompileRequest) -> TractResult<CompiledContext> {
        let head = self
            .store
            .get_ref(&self.tract_id, crate::store::model::HEAD_REF)?
            .ok_or_else(|| TractError::CommitNotFound {
                hash: "HEAD".to_string(),
            })?;
        self.compile_internal(&head, &request)
    }

    fn compile_internal(&self, head: &CommitHash, request: &CompileRequest) -> TractResult<CompiledContext> {
        // The cache only ever stores the plain-default compile (no
        // up_to/as_of/overrides): anything else always forces a full
        // build, since the cached snapshot was built under default
        // request semantics.
        let cache_applicable = *request == CompileRequest::default();
        if cache_applicable {
            if let Some(snapshot) = self.cache.borrow_mut().get(head) {
                return Ok(crate::compile::finish(snapshot, self.token_counter.as_ref()));
            }
        }
        let snapshot =
            self.compiler
                .build_snapshot(self.store.as_ref(), &self.registry, &self.tract_id, head, request)?;
        if cache_applicable {
            self.cache.borrow_mut().insert(head.clone(), snapshot.clone());
        }
        Ok(crate::compile::finish(&snapshot, self.token_counter.as_ref()))
    }

    pub fn merge(&self, source_branch: &str, no_ff: bool) -> TractResult<MergeResult> {
        in_transaction(self.store.as_ref(), || {
            MergeEngine::new(self.store.as_ref(), self.token_counter.as_ref(), &self.registry)
                .merge(&self.tract_id, source_branch, no_ff)
        })
    }

    pub fn resolve_merge_with(&self, result: &MergeResult, resolver: ConflictResolver) -> TractResult<std::collections::HashMap<CommitHash, String>> {
        MergeEngine::new(self.store.as_ref(), self.token_counter.as_ref(), &self.registry)
            .resolve_with(result, resolver)
    }

    pub fn resolve_merge_semantically(
        &self,
        result: &MergeResult,
        options: &GenerationConfig,
    ) -> TractResult<std::collections::HashMap<CommitHash, String>> {
        MergeEngine::new(self.store.as_ref(), self.token_counter.as_ref(), &self.registry)
            .resolve_semantically(result, self.llm_client.as_ref(), options)
    }

    pub fn commit_merge(&self, result: MergeResult) -> TractResult<MergeResult> {
        in_transaction(self.store.as_ref(), || {
            let final_result = MergeEngine::new(self.store.as_ref(), self.token_counter.as_ref(), &self.registry)
                .commit_merge(&self.tract_id, result)?;
            self.cache.borrow_mut().invalidate(&final_result.target_tip_hash);
            Ok(final_result)
        })
    }

    pub fn rebase(&self, target_branch: &str, resolver: Option<RebaseResolver>) -> TractResult<RebaseResult> {
        in_transaction(self.store.as_ref(), || {
            RebaseEngine::new(self.store.as_ref(), self.token_counter.as_ref(), &self.registry)
                .rebase(&self.tract_id, target_branch, resolver)
        })
    }

    pub fn cherry_pick(&self, commit_hash: &CommitHash, resolver: Option<RebaseResolver>) -> TractResult<CommitInfo> {
        in_transaction(self.store.as_ref(), || {
            RebaseEngine::new(self.store.as_ref(), self.token_counter.as_ref(), &self.registry)
                .cherry_pick(&self.tract_id, commit_hash, resolver)
        })
    }

    /// The current HEAD commit, or `None` for a brand new, empty tract.
    pub fn head(&self) -> TractResult<Option<CommitHash>> {
        self.store.get_ref(&self.tract_id, crate::store::model::HEAD_REF)
    }

    /// The attached branch name, or `None` if HEAD is detached.
    pub fn current_branch(&self) -> TractResult<Option<String>> {
        Ok(self.store.get_head_state(&self.tract_id)?.current_branch)
    }

    pub fn list_branches(&self) -> TractResult<Vec<(String, CommitHash)>> {
        self.store.list_branches(&self.tract_id)
    }

    pub fn commit_info(&self, hash: &CommitHash) -> TractResult<Option<CommitInfo>> {
        Ok(self.store.get_commit(&self.tract_id, hash)?.map(CommitInfo::from))
    }

    /// Resolve a branch name, full hash, or unambiguous prefix to a
    /// commit hash without touching HEAD (unlike [`Self::checkout`]).
    pub fn resolve_ref(&self, reference: &str) -> TractResult<CommitHash> {
        if let Some(hash) = self
            .store
            .get_ref(&self.tract_id, &crate::store::model::branch_ref_name(reference))?
        {
            return Ok(hash);
        }
        self.engine().resolve_commit_ref(&self.tract_id, reference)
    }

    /// Every commit reachable from `head` along the primary-parent chain,
    /// newest first. Used by read-only tooling (e.g. `diff`) that needs
    /// ancestry without going through [`Self::compile`].
    pub fn ancestors_of(&self, head: &CommitHash) -> TractResult<Vec<CommitHash>> {
        crate::dag::ancestors(self.store.as_ref(), &self.tract_id, head)
    }

    fn effective_priority(&self, info: &CommitInfo) -> TractResult<Priority> {
        let annotations = self.store.latest_annotations(
            &self.tract_id,
            std::slice::from_ref(&info.commit_hash),
            None,
        )?;
        Ok(annotations
            .get(&info.commit_hash)
            .map(|a| a.priority)
            .or_else(|| crate::content::builtin_type_hints(&info.content_type).map(|h| h.default_priority))
            .unwrap_or(Priority::Normal))
    }
}

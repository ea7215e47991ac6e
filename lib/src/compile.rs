//! The context compiler: walks a tract's DAG from a HEAD and flattens it
//! into an LLM-ready message list.
//!
//! The pipeline runs in two stages so the cache manager (`cache.rs`) can
//! patch the expensive stage incrementally: [`build_snapshot`] produces
//! one [`CompiledMessage`] per *effective* commit (EDIT and SKIP already
//! resolved, nothing aggregated yet); [`aggregate_messages`] is then a
//! pure, cheap fold applied at `compile()` time, never itself cached.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::content::{builtin_type_hints, validate_content, Content, ContentRegistry, Priority};
use crate::error::TractResult;
use crate::ids::{CommitHash, TractId};
use crate::store::model::{CommitRow, Operation};
use crate::store::Store;
use crate::tokens::TokenCounter;

/// One flattened message, pre- or post-aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledMessage {
    pub role: String,
    pub text: String,
    pub name: Option<String>,
    /// `None` only for the synthetic "[missing content]" filler.
    pub commit_hash: Option<CommitHash>,
    pub edited: bool,
}

/// Pre-aggregation compiled output: one slot per effective commit. This
/// is exactly what [`crate::cache::CacheManager`] stores and patches.
#[derive(Debug, Clone, Default)]
pub struct CompileSnapshot {
    pub messages: Vec<CompiledMessage>,
    pub generation_configs: Vec<Option<Value>>,
    pub commit_hashes: Vec<CommitHash>,
}

impl CompileSnapshot {
    pub fn len(&self) -> usize {
        self.commit_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commit_hashes.is_empty()
    }

    pub fn position_of(&self, hash: &CommitHash) -> Option<usize> {
        self.commit_hashes.iter().position(|h| h == hash)
    }
}

/// Fully compiled, aggregated output returned to callers.
#[derive(Debug, Clone)]
pub struct CompiledContext {
    pub messages: Vec<CompiledMessage>,
    pub commit_count: usize,
    pub token_count: usize,
    pub token_source: String,
}

/// Parameters for one compile. `up_to` and `as_of` are mutually
/// exclusive (the caller is responsible for not setting both; the
/// compiler applies `up_to` first if present and ignores `as_of`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileRequest {
    pub up_to: Option<CommitHash>,
    pub as_of: Option<String>,
    pub include_edit_annotations: bool,
    pub role_overrides: HashMap<String, String>,
}

/// Pluggable compiler seam. The crate ships [`DefaultContextCompiler`];
/// callers may substitute their own, at the cost of bypassing incremental
/// cache patching (custom compilers always force a full recompile).
pub trait ContextCompiler: Send + Sync {
    fn build_snapshot(
        &self,
        store: &dyn Store,
        registry: &ContentRegistry,
        tract_id: &TractId,
        head: &CommitHash,
        request: &CompileRequest,
    ) -> TractResult<CompileSnapshot>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContextCompiler;

impl ContextCompiler for DefaultContextCompiler {
    #[instrument(skip_all, fields(tract_id = %tract_id.as_str(), head = %head.short()))]
    fn build_snapshot(
        &self,
        store: &dyn Store,
        registry: &ContentRegistry,
        tract_id: &TractId,
        head: &CommitHash,
        request: &CompileRequest,
    ) -> TractResult<CompileSnapshot> {
        // 1. walk, root -> head
        let mut chain = crate::dag::ancestors(store, tract_id, head)?;
        chain.reverse();

        // 2. up_to filter
        if let Some(up_to) = &request.up_to {
            if let Some(pos) = chain.iter().position(|h| h == up_to) {
                chain.truncate(pos + 1);
            }
        } else if let Some(as_of) = &request.as_of {
            // 3. as_of filter: drop commits strictly later than the cutoff
            let mut rows = Vec::with_capacity(chain.len());
            for hash in &chain {
                if let Some(row) = store.get_commit(tract_id, hash)? {
                    rows.push((hash.clone(), row));
                }
            }
            chain = rows
                .into_iter()
                .filter(|(_, row)| row.created_at.as_str() <= as_of.as_str())
                .map(|(hash, _)| hash)
                .collect();
        }

        let mut rows: Vec<CommitRow> = Vec::with_capacity(chain.len());
        for hash in &chain {
            if let Some(row) = store.get_commit(tract_id, hash)? {
                rows.push(row);
            }
        }

        // 4. edit map: target -> latest-by-created_at edit row
        let mut edit_map: HashMap<CommitHash, &CommitRow> = HashMap::new();
        for row in &rows {
            if row.operation == Operation::Edit {
                if let Some(target) = &row.response_to {
                    let replace = match edit_map.get(target) {
                        Some(existing) => row.created_at > existing.created_at,
                        None => true,
                    };
                    if replace {
                        edit_map.insert(target.clone(), row);
                    }
                }
            }
        }

        // 5. priority map (one round trip)
        let targets: Vec<CommitHash> = rows.iter().map(|r| r.commit_hash.clone()).collect();
        let annotations =
            store.latest_annotations(tract_id, &targets, request.as_of.as_deref())?;

        let mut snapshot = CompileSnapshot::default();
        for row in &rows {
            // 6. effective list: drop EDIT commits themselves and SKIPped commits
            if row.operation == Operation::Edit {
                continue;
            }
            let priority = annotations
                .get(&row.commit_hash)
                .map(|a| a.priority)
                .or_else(|| builtin_type_hints(&row.content_type).map(|h| h.default_priority))
                .unwrap_or(Priority::Normal);
            if priority == Priority::Skip {
                trace!(commit = %row.commit_hash.short(), "skipped by annotation");
                continue;
            }

            // 7. messages: substitute edited content if present
            let (source_row, edited) = match edit_map.get(&row.commit_hash) {
                Some(edit_row) => (*edit_row, true),
                None => (row, false),
            };
            let blob = store.get_blob(&source_row.content_hash)?;
            let message = match blob {
                None => CompiledMessage {
                    role: "system".to_string(),
                    text: "[missing content]".to_string(),
                    name: None,
                    commit_hash: Some(row.commit_hash.clone()),
                    edited,
                },
                Some(bytes) => {
                    let value: Value = serde_json::from_slice(&bytes)
                        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
                    let content = validate_content(&value, registry)?;
                    build_message_for_commit(
                        row,
                        &content,
                        &request.role_overrides,
                        request.include_edit_annotations,
                        edited,
                    )
                }
            };
            snapshot.messages.push(message);
            snapshot.generation_configs.push(row.generation_config.clone());
            snapshot.commit_hashes.push(row.commit_hash.clone());
        }

        debug!(effective = snapshot.len(), "snapshot built");
        Ok(snapshot)
    }
}

/// Build one message from a commit's validated content. Shared by the
/// full compiler and by the cache's incremental patchers so both paths
/// agree byte-for-byte.
pub fn build_message_for_commit(
    row: &CommitRow,
    content: &Content,
    role_overrides: &HashMap<String, String>,
    include_edit_annotations: bool,
    edited: bool,
) -> CompiledMessage {
    let role = resolve_role(content, role_overrides);
    let mut text = extract_message_text(content);
    if edited && include_edit_annotations {
        text.push_str("\n\n[edited]");
    }
    let name = match content {
        Content::Dialogue { name, .. } => name.clone(),
        _ => None,
    };
    CompiledMessage {
        role,
        text,
        name,
        commit_hash: Some(row.commit_hash.clone()),
        edited,
    }
}

/// Role resolution order: explicit override map -> dialogue's own role ->
/// tool_io -> "tool" -> variant default -> "assistant" fallback.
fn resolve_role(content: &Content, overrides: &HashMap<String, String>) -> String {
    if let Some(role) = overrides.get(content.content_type()) {
        return role.clone();
    }
    match content {
        Content::Dialogue { role, .. } => role.clone(),
        Content::ToolIo { .. } => "tool".to_string(),
        other => builtin_type_hints(other.content_type())
            .map(|hint| hint.default_role.to_string())
            .unwrap_or_else(|| "assistant".to_string()),
    }
}

fn extract_message_text(content: &Content) -> String {
    match content {
        Content::Instruction { text }
        | Content::Reasoning { text }
        | Content::Output { text } => text.clone(),
        Content::Dialogue { text, .. } => text.clone(),
        Content::Artifact { title, content, .. } => format!("{title}\n\n{content}"),
        Content::ToolIo {
            tool_name,
            direction,
            payload,
            status,
        } => {
            let header = match (direction, status) {
                (crate::content::ToolDirection::Call, _) => format!("tool call: {tool_name}"),
                (crate::content::ToolDirection::Result, Some(status)) => {
                    format!("tool result: {tool_name} ({status})")
                }
                (crate::content::ToolDirection::Result, None) => format!("tool result: {tool_name}"),
            };
            let body = serde_json::to_string_pretty(payload).unwrap_or_default();
            format!("{header}\n{body}")
        }
        Content::Freeform { payload } => {
            if let Some(Value::String(text)) = payload.get("text") {
                text.clone()
            } else if let Some(Value::String(text)) = payload.get("content") {
                text.clone()
            } else {
                serde_json::to_string_pretty(payload).unwrap_or_default()
            }
        }
        Content::Custom { payload, .. } => {
            if let Some(Value::String(text)) = payload.get("text") {
                text.clone()
            } else {
                serde_json::to_string_pretty(payload).unwrap_or_default()
            }
        }
    }
}

/// Same-role aggregation (pipeline step 8): concatenate consecutive
/// messages with the same role, joined by a blank line, keeping the
/// first message's `name`. Never crosses a role boundary. Pure and
/// cheap; applied at `compile()` time over a (possibly cached) snapshot.
pub fn aggregate_messages(messages: &[CompiledMessage]) -> Vec<CompiledMessage> {
    let mut out: Vec<CompiledMessage> = Vec::new();
    for message in messages {
        match out.last_mut() {
            Some(last) if last.role == message.role => {
                last.text.push_str("\n\n");
                last.text.push_str(&message.text);
                last.edited = last.edited || message.edited;
            }
            _ => out.push(message.clone()),
        }
    }
    out
}

/// Run the snapshot's aggregation + token-counting finishing steps
/// (pipeline steps 8-9), shared by both the full-compile and
/// cache-hit paths.
pub fn finish(snapshot: &CompileSnapshot, token_counter: &dyn TokenCounter) -> CompiledContext {
    let aggregated = aggregate_messages(&snapshot.messages);
    let token_count = token_counter.count_messages(&aggregated);
    CompiledContext {
        messages: aggregated,
        commit_count: snapshot.len(),
        token_count,
        token_source: token_counter.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_consecutive_same_role() {
        let messages = vec![
            CompiledMessage {
                role: "user".into(),
                text: "a".into(),
                name: None,
                commit_hash: None,
                edited: false,
            },
            CompiledMessage {
                role: "user".into(),
                text: "b".into(),
                name: None,
                commit_hash: None,
                edited: false,
            },
            CompiledMessage {
                role: "assistant".into(),
                text: "c".into(),
                name: None,
                commit_hash: None,
                edited: false,
            },
        ];
        let aggregated = aggregate_messages(&messages);
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].text, "a\n\nb");
        assert_eq!(aggregated[1].text, "c");
    }

    #[test]
    fn resolve_role_prefers_override() {
        let content = Content::Dialogue {
            role: "user".into(),
            text: "hi".into(),
            name: None,
        };
        let mut overrides = HashMap::new();
        overrides.insert("dialogue".to_string(), "narrator".to_string());
        assert_eq!(resolve_role(&content, &overrides), "narrator");
    }
}

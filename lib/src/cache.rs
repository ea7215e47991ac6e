//! LRU cache of compile snapshots, keyed by HEAD hash, with incremental
//! patch operations for append, edit, and annotate so most mutations
//! avoid a full DAG walk.

use clru::CLruCache;
use std::num::NonZeroUsize;
use tracing::{debug, trace};

use crate::compile::{build_message_for_commit, CompileSnapshot};
use crate::content::{Content, Priority};
use crate::ids::CommitHash;
use crate::store::model::CommitRow;

/// Wraps a [`clru::CLruCache`] keyed by HEAD hash. Patch methods return
/// `None` when the requested incremental update isn't possible from the
/// cached state, signaling the caller to fall back to a full recompile.
pub struct CacheManager {
    snapshots: CLruCache<CommitHash, CompileSnapshot>,
}

impl CacheManager {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            snapshots: CLruCache::new(capacity),
        }
    }

    pub fn get(&mut self, head: &CommitHash) -> Option<&CompileSnapshot> {
        self.snapshots.get(head)
    }

    pub fn insert(&mut self, head: CommitHash, snapshot: CompileSnapshot) {
        self.snapshots.put(head, snapshot);
    }

    pub fn invalidate(&mut self, head: &CommitHash) {
        self.snapshots.pop(head);
    }

    /// APPEND patch: build one message from the new commit and extend the
    /// parent snapshot's tuple. The parent's entry is left untouched (a
    /// caller may still check out the old HEAD).
    pub fn extend_for_append(
        &mut self,
        parent_head: &CommitHash,
        new_head: CommitHash,
        row: &CommitRow,
        content: &Content,
        priority: Priority,
    ) -> Option<CompileSnapshot> {
        let parent = self.snapshots.get(parent_head)?;
        if priority == Priority::Skip {
            // Still extend the key so later lookups at `new_head` hit,
            // just without adding a message slot.
            let snapshot = parent.clone();
            trace!(head = %new_head.short(), "append skipped by annotation, snapshot carried forward");
            self.snapshots.put(new_head.clone(), snapshot.clone());
            return Some(snapshot);
        }
        let mut snapshot = parent.clone();
        let message = build_message_for_commit(row, content, &Default::default(), false, false);
        snapshot.messages.push(message);
        snapshot.generation_configs.push(row.generation_config.clone());
        snapshot.commit_hashes.push(row.commit_hash.clone());
        debug!(head = %new_head.short(), len = snapshot.len(), "cache extended for append");
        self.snapshots.put(new_head, snapshot.clone());
        Some(snapshot)
    }

    /// EDIT patch: locate `response_to` in the parent snapshot and
    /// replace its message. Returns `None` if the target isn't present,
    /// forcing a full recompile.
    pub fn patch_for_edit(
        &mut self,
        parent_head: &CommitHash,
        new_head: CommitHash,
        edit_row: &CommitRow,
        content: &Content,
        target: &CommitHash,
    ) -> Option<CompileSnapshot> {
        let parent = self.snapshots.get(parent_head)?;
        let pos = parent.position_of(target)?;
        let mut snapshot = parent.clone();
        let message = build_message_for_commit(edit_row, content, &Default::default(), false, true);
        snapshot.messages[pos] = message;
        // edit inherits the original commit's generation_config unless the
        // edit itself carries one.
        if edit_row.generation_config.is_some() {
            snapshot.generation_configs[pos] = edit_row.generation_config.clone();
        }
        debug!(head = %new_head.short(), pos, "cache patched for edit");
        self.snapshots.put(new_head, snapshot.clone());
        Some(snapshot)
    }

    /// ANNOTATE patch. `new_head` is the HEAD the annotation applies
    /// under (annotations don't create commits, so this is usually the
    /// same as `parent_head`, but kept distinct for symmetry with the
    /// other patchers and to let a caller key by a synthetic marker if
    /// it ever needs to).
    pub fn patch_for_annotate(
        &mut self,
        head: &CommitHash,
        target: &CommitHash,
        new_priority: Priority,
    ) -> Option<CompileSnapshot> {
        let snapshot = self.snapshots.get(head)?;
        let pos = snapshot.position_of(target);
        match (new_priority, pos) {
            (Priority::Skip, Some(pos)) => {
                let mut patched = snapshot.clone();
                patched.messages.remove(pos);
                patched.generation_configs.remove(pos);
                patched.commit_hashes.remove(pos);
                debug!(head = %head.short(), pos, "cache patched for skip annotation");
                self.snapshots.put(head.clone(), patched.clone());
                Some(patched)
            }
            (Priority::Skip, None) => Some(snapshot.clone()),
            (_, Some(_)) => Some(snapshot.clone()),
            (_, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CompiledMessage;

    fn sample_snapshot() -> CompileSnapshot {
        CompileSnapshot {
            messages: vec![CompiledMessage {
                role: "user".into(),
                text: "hi".into(),
                name: None,
                commit_hash: Some(CommitHash::from_bytes(&crate::hash::hash_bytes(b"c1"))),
                edited: false,
            }],
            generation_configs: vec![None],
            commit_hashes: vec![CommitHash::from_bytes(&crate::hash::hash_bytes(b"c1"))],
        }
    }

    #[test]
    fn skip_annotation_removes_slot() {
        let mut cache = CacheManager::new(4);
        let head = CommitHash::from_bytes(&crate::hash::hash_bytes(b"head"));
        let target = CommitHash::from_bytes(&crate::hash::hash_bytes(b"c1"));
        cache.insert(head.clone(), sample_snapshot());
        let patched = cache.patch_for_annotate(&head, &target, Priority::Skip).unwrap();
        assert!(patched.is_empty());
    }

    #[test]
    fn unannotate_absent_target_forces_recompile() {
        let mut cache = CacheManager::new(4);
        let head = CommitHash::from_bytes(&crate::hash::hash_bytes(b"head"));
        let target = CommitHash::from_bytes(&crate::hash::hash_bytes(b"missing"));
        cache.insert(head.clone(), sample_snapshot());
        let patched = cache.patch_for_annotate(&head, &target, Priority::Normal);
        assert!(patched.is_none());
    }
}

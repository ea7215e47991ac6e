//! Ancestor walks and merge-base computation over the primary-parent chain
//! plus second-parent (merge) edges.

use std::collections::{HashSet, VecDeque};

use crate::error::TractResult;
use crate::ids::{CommitHash, TractId};
use crate::store::Store;

/// Walk from `head` following primary parents back to a root, returning
/// hashes newest-first (i.e. `head` is first).
pub fn ancestors(
    store: &dyn Store,
    tract_id: &TractId,
    head: &CommitHash,
) -> TractResult<Vec<CommitHash>> {
    let mut out = Vec::new();
    let mut cursor = Some(head.clone());
    while let Some(hash) = cursor {
        let commit = store.get_commit(tract_id, &hash)?;
        let Some(commit) = commit else { break };
        out.push(hash);
        cursor = commit.parent_hash;
    }
    Ok(out)
}

/// All ancestors of `head` reachable through *either* parent edge
/// (primary chain and second-parent merge edges), including `head`
/// itself. Used by merge-base search, where divergent history may run
/// through a prior merge commit.
pub fn all_ancestors(
    store: &dyn Store,
    tract_id: &TractId,
    head: &CommitHash,
) -> TractResult<HashSet<CommitHash>> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(head.clone());
    while let Some(hash) = queue.pop_front() {
        if !seen.insert(hash.clone()) {
            continue;
        }
        if let Some(commit) = store.get_commit(tract_id, &hash)? {
            if let Some(parent) = commit.parent_hash {
                queue.push_back(parent);
            }
            for second in store.get_second_parents(tract_id, &hash)? {
                queue.push_back(second);
            }
        }
    }
    Ok(seen)
}

/// Whether `candidate` is `target` or an ancestor of it, along the
/// primary parent chain only (the chain relevant to EDIT-target
/// resolution and rebase pre-flight checks).
pub fn is_ancestor(
    store: &dyn Store,
    tract_id: &TractId,
    candidate: &CommitHash,
    target: &CommitHash,
) -> TractResult<bool> {
    let mut cursor = Some(target.clone());
    while let Some(hash) = cursor {
        if &hash == candidate {
            return Ok(true);
        }
        cursor = store.get_commit(tract_id, &hash)?.and_then(|c| c.parent_hash);
    }
    Ok(false)
}

/// BFS depth of every commit reachable from `head` through either parent
/// edge, for minimum-by-depth tie-breaking among merge-base candidates.
fn depths(
    store: &dyn Store,
    tract_id: &TractId,
    head: &CommitHash,
) -> TractResult<std::collections::HashMap<CommitHash, usize>> {
    let mut depth = std::collections::HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back((head.clone(), 0usize));
    while let Some((hash, d)) = queue.pop_front() {
        if depth.contains_key(&hash) {
            continue;
        }
        depth.insert(hash.clone(), d);
        if let Some(commit) = store.get_commit(tract_id, &hash)? {
            if let Some(parent) = commit.parent_hash {
                queue.push_back((parent, d + 1));
            }
            for second in store.get_second_parents(tract_id, &hash)? {
                queue.push_back((second, d + 1));
            }
        }
    }
    Ok(depth)
}

/// Closest common ancestor of `a` and `b`: intersect both ancestor sets
/// (BFS over every parent edge) and pick the candidate with the smallest
/// combined depth. Returns `None` if the two commits share no ancestor.
pub fn merge_base(
    store: &dyn Store,
    tract_id: &TractId,
    a: &CommitHash,
    b: &CommitHash,
) -> TractResult<Option<CommitHash>> {
    let ancestors_a = all_ancestors(store, tract_id, a)?;
    let ancestors_b = all_ancestors(store, tract_id, b)?;
    let candidates: Vec<&CommitHash> = ancestors_a.intersection(&ancestors_b).collect();
    if candidates.is_empty() {
        return Ok(None);
    }
    let depth_a = depths(store, tract_id, a)?;
    let depth_b = depths(store, tract_id, b)?;
    let best = candidates
        .into_iter()
        .min_by_key(|hash| depth_a.get(*hash).unwrap_or(&usize::MAX) + depth_b.get(*hash).unwrap_or(&usize::MAX));
    Ok(best.cloned())
}

/// Commits on the primary-parent chain strictly between `base` (exclusive)
/// and `tip` (inclusive), oldest first — the `base..tip` range used by
/// merge and rebase.
pub fn range(
    store: &dyn Store,
    tract_id: &TractId,
    base: Option<&CommitHash>,
    tip: &CommitHash,
) -> TractResult<Vec<CommitHash>> {
    let mut chain = ancestors(store, tract_id, tip)?;
    if let Some(base) = base {
        if let Some(pos) = chain.iter().position(|h| h == base) {
            chain.truncate(pos);
        }
    }
    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;
    use crate::store::model::Operation;
    use crate::store::sqlite::SqliteStore;
    use crate::commit::CommitEngine;
    use crate::tokens::WhitespaceTokenCounter;

    fn engine() -> (SqliteStore, TractId) {
        let store = SqliteStore::open_in_memory().unwrap();
        let tract_id = TractId::generate();
        (store, tract_id)
    }

    #[test]
    fn merge_base_finds_fork_point() {
        let (store, tract_id) = engine();
        let counter = WhitespaceTokenCounter::new();
        let engine = CommitEngine::new(&store, &counter);
        let base = engine
            .create_commit(
                &tract_id,
                Content::Instruction { text: "base".into() },
                Operation::Append,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        engine.branch(&tract_id, "feat", None, true).unwrap();
        let feat_tip = engine
            .create_commit(
                &tract_id,
                Content::Dialogue {
                    role: "user".into(),
                    text: "on feat".into(),
                    name: None,
                },
                Operation::Append,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        engine.switch(&tract_id, "main").unwrap_or(());
        let main_tip = engine
            .create_commit(
                &tract_id,
                Content::Dialogue {
                    role: "user".into(),
                    text: "on main".into(),
                    name: None,
                },
                Operation::Append,
                None,
                None,
                None,
                None,
            )
            .unwrap();
        let found = merge_base(&store, &tract_id, &feat_tip.commit_hash, &main_tip.commit_hash)
            .unwrap()
            .unwrap();
        assert_eq!(found, base.commit_hash);
    }
}

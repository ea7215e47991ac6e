//! Single test binary aggregating every integration test module
//! (`autotests = false` in Cargo.toml), matching the teacher's layout.

#[path = "test_persist_reload.rs"]
mod test_persist_reload;
#[path = "test_annotations.rs"]
mod test_annotations;
#[path = "test_edit.rs"]
mod test_edit;
#[path = "test_merge.rs"]
mod test_merge;
#[path = "test_rebase.rs"]
mod test_rebase;
#[path = "test_cache.rs"]
mod test_cache;

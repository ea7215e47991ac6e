//! Single test binary aggregating every CLI integration test module
//! (`autotests = false` in Cargo.toml), matching the teacher's layout.

#[path = "test_commit_log.rs"]
mod test_commit_log;
#[path = "test_branch_merge.rs"]
mod test_branch_merge;

//! Subcommand dispatch, one module per command (mirrors the teacher's
//! `commands/` layout: one file per `cmd_*` function and its `*Args`).

mod annotate;
mod branch;
mod checkout;
mod cherry_pick;
mod commit;
mod compile;
mod diff;
mod log;
mod merge;
mod rebase;
mod reset;
mod status;
mod switch;

use crate::cli_util::{CommandHelper, Ui};
use crate::command_error::CommandError;

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Create a new commit (APPEND) or amend one in place at compile
    /// time (EDIT, via `--edit`).
    Commit(commit::CommitArgs),
    /// Show the commit history reachable from HEAD.
    Log(log::LogArgs),
    /// Show the current branch, HEAD, and token usage at a glance.
    Status(status::StatusArgs),
    /// Show commits present in one ref but not another.
    Diff(diff::DiffArgs),
    /// Move HEAD to an arbitrary commit, branch, or `-` for the previous HEAD.
    Checkout(checkout::CheckoutArgs),
    /// Attach HEAD to a branch.
    Switch(switch::SwitchArgs),
    /// Create, list, or delete branches.
    Branch(branch::BranchArgs),
    /// Move the current branch (and HEAD) to a target commit.
    Reset(reset::ResetArgs),
    /// Annotate a commit with a priority (SKIP/NORMAL/IMPORTANT/PINNED).
    Annotate(annotate::AnnotateArgs),
    /// Merge a branch into the current one.
    Merge(merge::MergeArgs),
    /// Linearly replay the current branch onto another.
    Rebase(rebase::RebaseArgs),
    /// Replay a single commit onto HEAD.
    CherryPick(cherry_pick::CherryPickArgs),
    /// Compile HEAD (or an explicit ref) into a flat message list.
    Compile(compile::CompileArgs),
}

pub fn run(ui: &mut Ui, command: &CommandHelper, cmd: Commands) -> Result<(), CommandError> {
    match cmd {
        Commands::Commit(args) => commit::cmd_commit(ui, command, &args),
        Commands::Log(args) => log::cmd_log(ui, command, &args),
        Commands::Status(args) => status::cmd_status(ui, command, &args),
        Commands::Diff(args) => diff::cmd_diff(ui, command, &args),
        Commands::Checkout(args) => checkout::cmd_checkout(ui, command, &args),
        Commands::Switch(args) => switch::cmd_switch(ui, command, &args),
        Commands::Branch(args) => branch::cmd_branch(ui, command, &args),
        Commands::Reset(args) => reset::cmd_reset(ui, command, &args),
        Commands::Annotate(args) => annotate::cmd_annotate(ui, command, &args),
        Commands::Merge(args) => merge::cmd_merge(ui, command, &args),
        Commands::Rebase(args) => rebase::cmd_rebase(ui, command, &args),
        Commands::CherryPick(args) => cherry_pick::cmd_cherry_pick(ui, command, &args),
        Commands::Compile(args) => compile::cmd_compile(ui, command, &args),
    }
}

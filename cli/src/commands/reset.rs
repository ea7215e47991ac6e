use std::io::Write;

use tracing::instrument;
use tract::commit::ResetMode;

use crate::cli_util::{parse_commit_hash, short_commit_hash, CommandHelper, Ui};
use crate::command_error::CommandError;

/// Move the current branch (and HEAD) to `target`, without touching any
/// commit (append-only: nothing is deleted, just unreferenced).
#[derive(clap::Args, Debug)]
pub struct ResetArgs {
    target: String,
    /// Reserved for parity with git/jj; `tract` has no working tree so
    /// soft and hard behave identically.
    #[arg(long)]
    hard: bool,
}

#[instrument(skip_all)]
pub fn cmd_reset(ui: &mut Ui, command: &CommandHelper, args: &ResetArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let target = match parse_commit_hash(&args.target) {
        Ok(hash) => hash,
        Err(_) => session.resolve_ref(&args.target)?,
    };
    let mode = if args.hard { ResetMode::Hard } else { ResetMode::Soft };
    session.reset(&target, mode)?;
    writeln!(ui.status(), "Reset to {}", short_commit_hash(&target))?;
    Ok(())
}

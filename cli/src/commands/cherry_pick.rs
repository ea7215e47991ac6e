use std::io::Write;

use tracing::instrument;
use tract::rebase::RebaseDecision;

use crate::cli_util::{parse_commit_hash, short_commit_hash, CommandHelper, Ui};
use crate::command_error::CommandError;

/// Replay a single commit onto HEAD.
#[derive(clap::Args, Debug)]
pub struct CherryPickArgs {
    commit: String,
    /// Accept the warning if the commit is an EDIT whose target isn't
    /// reachable from HEAD.
    #[arg(long)]
    accept_warnings: bool,
}

#[instrument(skip_all)]
pub fn cmd_cherry_pick(ui: &mut Ui, command: &CommandHelper, args: &CherryPickArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let commit = parse_commit_hash(&args.commit)?;
    let accept_all = |_: &tract::rebase::RebaseWarning| {
        if args.accept_warnings {
            RebaseDecision::Accept
        } else {
            RebaseDecision::Abort
        }
    };
    let resolver: Option<&dyn Fn(&tract::rebase::RebaseWarning) -> RebaseDecision> =
        if args.accept_warnings { Some(&accept_all) } else { None };

    let info = session.cherry_pick(&commit, resolver)?;
    writeln!(ui.status(), "Cherry-picked as {}", short_commit_hash(&info.commit_hash))?;
    Ok(())
}

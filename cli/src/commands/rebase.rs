use std::io::Write;

use tracing::instrument;
use tract::rebase::RebaseDecision;

use crate::cli_util::{short_commit_hash, CommandHelper, Ui};
use crate::command_error::CommandError;

/// Replay the current branch's commits onto `target`.
///
/// If any replayed EDIT's target would no longer be in the new
/// ancestry, the rebase refuses unless `--accept-warnings` is given.
#[derive(clap::Args, Debug)]
pub struct RebaseArgs {
    target: String,
    /// Accept every semantic-safety warning instead of aborting.
    #[arg(long)]
    accept_warnings: bool,
}

#[instrument(skip_all)]
pub fn cmd_rebase(ui: &mut Ui, command: &CommandHelper, args: &RebaseArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let accept_all = |_: &tract::rebase::RebaseWarning| {
        if args.accept_warnings {
            RebaseDecision::Accept
        } else {
            RebaseDecision::Abort
        }
    };
    let resolver: Option<&dyn Fn(&tract::rebase::RebaseWarning) -> RebaseDecision> =
        if args.accept_warnings { Some(&accept_all) } else { None };

    let result = session.rebase(&args.target, resolver)?;
    writeln!(
        ui.status(),
        "Rebased {} commit(s) onto {}, new tip {}",
        result.replayed.len(),
        args.target,
        short_commit_hash(&result.new_tip),
    )?;
    for warning in &result.warnings {
        writeln!(
            ui.status(),
            "  warning: {} has an edit target not in the new ancestry",
            short_commit_hash(&warning.commit_hash),
        )?;
    }
    Ok(())
}

use std::io::Write;

use tracing::instrument;

use crate::cli_util::{short_commit_hash, CommandHelper, Ui};
use crate::command_error::CommandError;

/// Move HEAD to a branch, commit hash/prefix, or `-` for the previous HEAD.
/// Detaches HEAD unless `target` names a branch.
#[derive(clap::Args, Debug)]
pub struct CheckoutArgs {
    target: String,
}

#[instrument(skip_all)]
pub fn cmd_checkout(ui: &mut Ui, command: &CommandHelper, args: &CheckoutArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let resolved = session.checkout(&args.target)?;
    writeln!(ui.status(), "HEAD is now at {}", short_commit_hash(&resolved))?;
    Ok(())
}

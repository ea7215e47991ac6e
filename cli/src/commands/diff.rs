use std::collections::HashSet;
use std::io::Write;

use tracing::instrument;

use crate::cli_util::{short_commit_hash, CommandHelper, Ui};
use crate::command_error::CommandError;

/// Show commits reachable from `to` but not from `from` (defaults to the
/// current branch's tip).
#[derive(clap::Args, Debug)]
pub struct DiffArgs {
    from: String,
    to: String,
}

#[instrument(skip_all)]
pub fn cmd_diff(ui: &mut Ui, command: &CommandHelper, args: &DiffArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let from = session.resolve_ref(&args.from)?;
    let to = session.resolve_ref(&args.to)?;

    let from_set: HashSet<_> = session.ancestors_of(&from)?.into_iter().collect();
    let only_in_to: Vec<_> = session
        .ancestors_of(&to)?
        .into_iter()
        .filter(|hash| !from_set.contains(hash))
        .collect();

    let mut out = ui.output();
    if only_in_to.is_empty() {
        writeln!(out, "no commits in {} not already in {}", args.to, args.from)?;
        return Ok(());
    }
    for hash in only_in_to.iter().rev() {
        if let Some(info) = session.commit_info(hash)? {
            write!(out, "+ {} {}", short_commit_hash(hash), info.content_type)?;
            if let Some(message) = &info.message {
                write!(out, " \"{message}\"")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

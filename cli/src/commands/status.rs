use std::io::Write;

use tracing::instrument;

use crate::cli_util::{short_commit_hash, CommandHelper, Ui};
use crate::command_error::CommandError;
use tract::compile::CompileRequest;

/// Show the current branch (or detached HEAD), the HEAD commit, and the
/// compiled token usage.
#[derive(clap::Args, Debug)]
pub struct StatusArgs {}

#[instrument(skip_all)]
pub fn cmd_status(ui: &mut Ui, command: &CommandHelper, _args: &StatusArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let mut out = ui.output();

    match session.current_branch()? {
        Some(branch) => writeln!(out, "On branch {branch}")?,
        None => writeln!(out, "HEAD detached")?,
    }
    match session.head()? {
        Some(head) => {
            writeln!(out, "HEAD: {}", short_commit_hash(&head))?;
            let compiled = session.compile(CompileRequest::default())?;
            writeln!(
                out,
                "{} commits, {} tokens ({})",
                compiled.commit_count, compiled.token_count, compiled.token_source
            )?;
        }
        None => writeln!(out, "No commits yet")?,
    }
    Ok(())
}

use std::io::Write;

use tracing::instrument;

use crate::cli_util::{parse_commit_hash, short_commit_hash, CommandHelper, Ui};
use crate::command_error::CommandError;

#[derive(clap::Args, Debug)]
pub struct BranchArgs {
    #[command(subcommand)]
    command: BranchCommand,
}

#[derive(clap::Subcommand, Debug)]
enum BranchCommand {
    /// Create a new branch pointing at HEAD (or `--at`).
    Create {
        name: String,
        /// Create the branch at this commit instead of HEAD.
        #[arg(long)]
        at: Option<String>,
        /// Also switch to the new branch.
        #[arg(long)]
        switch: bool,
    },
    /// List every branch and the commit it points at.
    List,
    /// Delete a branch.
    Delete {
        name: String,
        /// Delete even if the branch's tip isn't merged into another branch.
        #[arg(long)]
        force: bool,
    },
}

#[instrument(skip_all)]
pub fn cmd_branch(ui: &mut Ui, command: &CommandHelper, args: &BranchArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    match &args.command {
        BranchCommand::Create { name, at, switch } => {
            let source = at.as_deref().map(parse_commit_hash).transpose()?;
            session.branch(name, source.as_ref(), *switch)?;
            writeln!(ui.status(), "Created branch {name}")?;
        }
        BranchCommand::List => {
            let mut out = ui.output();
            let current = session.current_branch()?;
            for (name, tip) in session.list_branches()? {
                let marker = if current.as_deref() == Some(name.as_str()) { "*" } else { " " };
                writeln!(out, "{marker} {name} {}", short_commit_hash(&tip))?;
            }
        }
        BranchCommand::Delete { name, force } => {
            session.delete_branch(name, *force)?;
            writeln!(ui.status(), "Deleted branch {name}")?;
        }
    }
    Ok(())
}

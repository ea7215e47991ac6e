use std::io::Write;

use tracing::instrument;

use crate::cli_util::{CommandHelper, Ui};
use crate::command_error::CommandError;

/// Attach HEAD to an existing branch.
#[derive(clap::Args, Debug)]
pub struct SwitchArgs {
    name: String,
}

#[instrument(skip_all)]
pub fn cmd_switch(ui: &mut Ui, command: &CommandHelper, args: &SwitchArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    session.switch(&args.name)?;
    writeln!(ui.status(), "Switched to branch {}", args.name)?;
    Ok(())
}

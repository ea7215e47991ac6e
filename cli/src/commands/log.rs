use std::io::Write;

use chrono::DateTime;
use tracing::instrument;
use tract::store::model::Operation;

use crate::cli_util::{short_commit_hash, CommandHelper, Ui};
use crate::command_error::{user_error, CommandError};

/// Show the commit history reachable from HEAD, newest first.
#[derive(clap::Args, Debug)]
pub struct LogArgs {
    /// Show at most this many commits.
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Only show commits of this operation ("append" or "edit").
    #[arg(long = "op")]
    op_filter: Option<String>,
}

#[instrument(skip_all)]
pub fn cmd_log(ui: &mut Ui, command: &CommandHelper, args: &LogArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let op_filter = args
        .op_filter
        .as_deref()
        .map(|s| s.parse::<Operation>())
        .transpose()
        .map_err(|_| user_error("--op must be \"append\" or \"edit\""))?;

    let commits = session.log(args.limit, op_filter)?;
    let mut out = ui.output();
    for info in &commits {
        let marker = match info.operation {
            Operation::Append => " ",
            Operation::Edit => "~",
        };
        write!(out, "{marker} {} {}", short_commit_hash(&info.commit_hash), info.content_type)?;
        if let Some(message) = &info.message {
            write!(out, " \"{message}\"")?;
        }
        let when = DateTime::parse_from_rfc3339(&info.created_at)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| info.created_at.clone());
        writeln!(out, " ({} tok, {when})", info.token_count)?;
    }
    Ok(())
}

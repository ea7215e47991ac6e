use std::io::Write;

use tracing::instrument;
use tract::content::Priority;

use crate::cli_util::{parse_commit_hash, short_commit_hash, CommandHelper, Ui};
use crate::command_error::{user_error, CommandError};

/// Annotate a commit with a priority: `skip` hides it from compiled
/// output, `normal` is the default, `important`/`pinned` are informative
/// hints for callers that compress context (this crate never compresses
/// on their behalf).
#[derive(clap::Args, Debug)]
pub struct AnnotateArgs {
    target: String,
    priority: String,
    /// Why this priority was chosen, stored alongside the annotation.
    #[arg(long)]
    reason: Option<String>,
    /// Arbitrary JSON retention metadata (e.g. a TTL or policy id).
    #[arg(long)]
    retention: Option<String>,
}

#[instrument(skip_all)]
pub fn cmd_annotate(ui: &mut Ui, command: &CommandHelper, args: &AnnotateArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let target = parse_commit_hash(&args.target)?;
    let priority: Priority = args
        .priority
        .parse()
        .map_err(|_| user_error(format!("unknown priority {:?}", args.priority)))?;
    let retention = args
        .retention
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| user_error(format!("invalid --retention JSON: {e}")))?;

    session.annotate(&target, priority, args.reason.clone(), retention)?;
    writeln!(
        ui.status(),
        "Annotated {} as {}",
        short_commit_hash(&target),
        priority.as_str()
    )?;
    Ok(())
}

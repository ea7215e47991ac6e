use std::io::Write;

use tracing::instrument;
use tract::compile::CompileRequest;

use crate::cli_util::{CommandHelper, Ui};
use crate::command_error::CommandError;

/// Compile HEAD (or `--up-to`/`--as-of`) into a flat message list and
/// print it as JSON.
#[derive(clap::Args, Debug)]
pub struct CompileArgs {
    /// Stop the walk at this commit instead of HEAD.
    #[arg(long = "up-to")]
    up_to: Option<String>,
    /// Only include annotations and edits at or before this RFC 3339 timestamp.
    #[arg(long = "as-of")]
    as_of: Option<String>,
    /// Append "[edited]" to messages that substituted another commit's content.
    #[arg(long)]
    show_edits: bool,
}

#[instrument(skip_all)]
pub fn cmd_compile(ui: &mut Ui, command: &CommandHelper, args: &CompileArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let up_to = args
        .up_to
        .as_deref()
        .map(|r| session.resolve_ref(r))
        .transpose()?;

    let request = CompileRequest {
        up_to,
        as_of: args.as_of.clone(),
        include_edit_annotations: args.show_edits,
        role_overrides: Default::default(),
    };
    let compiled = session.compile(request)?;

    let json = serde_json::json!({
        "messages": compiled.messages.iter().map(|m| serde_json::json!({
            "role": m.role,
            "text": m.text,
            "name": m.name,
            "commit_hash": m.commit_hash.as_ref().map(|h| h.to_string()),
            "edited": m.edited,
        })).collect::<Vec<_>>(),
        "commit_count": compiled.commit_count,
        "token_count": compiled.token_count,
        "token_source": compiled.token_source,
    });
    writeln!(ui.output(), "{}", serde_json::to_string_pretty(&json)?)?;
    Ok(())
}

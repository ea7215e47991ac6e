use std::io::Write;

use tracing::instrument;
use tract::content::Content;
use tract::store::model::Operation;

use crate::cli_util::{parse_commit_hash, short_commit_hash, CommandHelper, Ui};
use crate::command_error::{user_error, CommandError};

/// Create a new commit.
///
/// By default this appends a `dialogue` message. Pass `--edit` to
/// instead record an EDIT of an existing commit (its content is
/// substituted at compile time; the original is never removed). Pass
/// `--json` to author any content type (including custom ones) as a raw
/// JSON object with a `content_type` field.
#[derive(clap::Args, Debug)]
pub struct CommitArgs {
    /// The message text. Ignored if `--json` is given.
    text: Option<String>,
    /// Role for a `dialogue` commit (default: "user").
    #[arg(long)]
    role: Option<String>,
    /// Content type: instruction, dialogue, reasoning, or output.
    #[arg(long = "type", default_value = "dialogue")]
    content_type: String,
    /// Speaker name for a `dialogue` commit.
    #[arg(long)]
    name: Option<String>,
    /// A full content JSON object (`{"content_type": "...", ...}`),
    /// bypassing `--type`/`--role`/`--name`.
    #[arg(long, conflicts_with_all = ["role", "content_type", "name"])]
    json: Option<String>,
    /// Record this commit as an EDIT of the given target commit.
    #[arg(long = "edit", value_name = "COMMIT")]
    edit_target: Option<String>,
    /// A free-text commit message (distinct from the content text).
    #[arg(short = 'm', long)]
    message: Option<String>,
    /// Arbitrary JSON metadata to attach to the commit.
    #[arg(long)]
    metadata: Option<String>,
    /// Generation config JSON (model, temperature, etc.) to attach.
    #[arg(long = "generation-config")]
    generation_config: Option<String>,
}

#[instrument(skip_all)]
pub fn cmd_commit(ui: &mut Ui, command: &CommandHelper, args: &CommitArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;

    let content = build_content(args)?;
    let operation = if args.edit_target.is_some() {
        Operation::Edit
    } else {
        Operation::Append
    };
    let response_to = args.edit_target.as_deref().map(parse_commit_hash).transpose()?;
    let metadata = args
        .metadata
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| user_error(format!("invalid --metadata JSON: {e}")))?;
    let generation_config = args
        .generation_config
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| user_error(format!("invalid --generation-config JSON: {e}")))?;

    let info = session.create_commit(
        content,
        operation,
        args.message.clone(),
        response_to,
        metadata,
        generation_config,
    )?;

    writeln!(
        ui.output(),
        "{} {} ({} tokens)",
        short_commit_hash(&info.commit_hash),
        info.content_type,
        info.token_count,
    )?;
    Ok(())
}

fn build_content(args: &CommitArgs) -> Result<Content, CommandError> {
    if let Some(json) = &args.json {
        return serde_json::from_str(json).map_err(|e| user_error(format!("invalid --json content: {e}")));
    }
    let text = args
        .text
        .clone()
        .ok_or_else(|| user_error("either TEXT or --json is required"))?;
    Ok(match args.content_type.as_str() {
        "instruction" => Content::Instruction { text },
        "dialogue" => Content::Dialogue {
            role: args.role.clone().unwrap_or_else(|| "user".to_string()),
            text,
            name: args.name.clone(),
        },
        "reasoning" => Content::Reasoning { text },
        "output" => Content::Output { text },
        other => {
            return Err(user_error(format!(
                "--type {other:?} needs --json (tool_io/artifact/freeform/custom types carry structured fields)"
            )))
        }
    })
}

use std::collections::HashMap;
use std::io::Write;

use itertools::Itertools;
use tracing::instrument;
use tract::merge::MergeClassification;

use crate::cli_util::{short_commit_hash, CommandHelper, Ui};
use crate::command_error::{user_error, CommandError};

/// Merge `source` into the current branch.
///
/// A fast-forward or already-up-to-date merge commits immediately. A
/// diverged merge with conflicting edits requires one `--resolve
/// COMMIT=TEXT` per conflicting target; rerun with the printed targets
/// filled in once you've decided what each should say.
#[derive(clap::Args, Debug)]
pub struct MergeArgs {
    source: String,
    /// Always create a merge commit, even when a fast-forward is possible.
    #[arg(long)]
    no_ff: bool,
    /// Resolve a conflicting target: `COMMIT=TEXT`. May be repeated.
    #[arg(long = "resolve", value_name = "COMMIT=TEXT")]
    resolutions: Vec<String>,
}

#[instrument(skip_all)]
pub fn cmd_merge(ui: &mut Ui, command: &CommandHelper, args: &MergeArgs) -> Result<(), CommandError> {
    let session = command.open_session()?;
    let mut result = session.merge(&args.source, args.no_ff)?;

    match result.classification {
        MergeClassification::AlreadyUpToDate => {
            writeln!(ui.status(), "Already up to date")?;
            return Ok(());
        }
        MergeClassification::FastForward => {
            writeln!(ui.status(), "Fast-forwarded to {}", short_commit_hash(&result.target_tip_hash))?;
            return Ok(());
        }
        MergeClassification::ThreeWay => {}
    }

    if result.conflicts.is_empty() {
        let committed = session.commit_merge(result)?;
        writeln!(
            ui.status(),
            "Merged, new commit {}",
            short_commit_hash(&committed.target_tip_hash)
        )?;
        return Ok(());
    }

    let mut provided: HashMap<String, String> = HashMap::new();
    for entry in &args.resolutions {
        let (hash, text) = entry
            .split_once('=')
            .ok_or_else(|| user_error(format!("--resolve must be COMMIT=TEXT, got {entry:?}")))?;
        provided.insert(hash.to_string(), text.to_string());
    }

    let mut missing = Vec::new();
    for conflict in &result.conflicts {
        match provided.get(conflict.target.as_str()) {
            Some(text) => {
                result.resolutions.insert(conflict.target.clone(), text.clone());
            }
            None => missing.push(conflict.target.clone()),
        }
    }

    if !missing.is_empty() {
        let mut out = ui.output();
        writeln!(out, "{} conflicting target(s) need --resolve:", missing.len())?;
        for conflict in &result.conflicts {
            writeln!(
                out,
                "  {} ({:?})\n    base:   {}\n    target: {}\n    source: {}",
                short_commit_hash(&conflict.target),
                conflict.kind,
                conflict.base_content.as_deref().unwrap_or("<missing>"),
                conflict.target_content.as_deref().unwrap_or("<missing>"),
                conflict.source_content.as_deref().unwrap_or("<missing>"),
            )?;
        }
        return Err(user_error("merge has unresolved conflicts").with_hint(
            "pass --resolve <commit>=<text> once per conflicting target listed above",
        ));
    }

    let committed = session.commit_merge(result)?;
    let resolved_targets = committed
        .resolutions
        .keys()
        .map(short_commit_hash)
        .sorted()
        .join(", ");
    writeln!(
        ui.status(),
        "Merged with {} resolution(s) ({resolved_targets}), new commit {}",
        committed.resolutions.len(),
        short_commit_hash(&committed.target_tip_hash)
    )?;
    Ok(())
}


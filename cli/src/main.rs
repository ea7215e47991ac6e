//! `trct`: a command-line front end for `tract`, a version-controlled
//! store for LLM conversation context.

mod cli_util;
mod command_error;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli_util::{CommandHelper, Ui};
use command_error::{CommandError, ExitCode};

/// Flags accepted before the subcommand, shared by every command.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// Path to a `tract.toml` config file (overrides `TRACT_CONFIG`).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<std::path::PathBuf>,
    /// Path to the SQLite database (overrides `tract.toml`/`TRACT_DB_PATH`).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<std::path::PathBuf>,
    /// The tract id to operate on. Defaults to a fresh random id, which
    /// is only useful combined with `--db` to reopen an existing tract.
    #[arg(long, global = true, value_name = "ID")]
    pub tract: Option<String>,
}

#[derive(clap::Parser, Debug)]
#[command(name = "trct", about = "Version control for LLM conversation context", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: commands::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("TRACT_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut ui = Ui::new();
    let helper = CommandHelper::new(cli.global);

    let result = commands::run(&mut ui, &helper, cli.command);
    match result {
        Ok(()) => std::process::exit(ExitCode::Success.as_i32()),
        Err(err) => {
            report_error(&mut ui, &err);
            std::process::exit(err.exit_code.as_i32());
        }
    }
}

fn report_error(ui: &mut Ui, err: &CommandError) {
    use std::io::Write;
    let _ = writeln!(ui.status(), "Error: {}", err.report());
}

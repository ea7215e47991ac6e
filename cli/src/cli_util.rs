//! Shared CLI plumbing: output handles and the helper that resolves a
//! `Session` from global args, config, and environment, mirroring the
//! teacher's `Ui`/`CommandHelper` split.

use std::io::Write;

use tract::ids::{CommitHash, TractId};
use tract::session::{Session, SessionBuilder};

use crate::command_error::{user_error, CommandError};
use crate::GlobalArgs;

/// Thin wrapper around stdout/stderr so commands never touch `println!`
/// directly; lets tests capture output deterministically later without
/// reaching into every command.
pub struct Ui {
    stdout: std::io::Stdout,
    stderr: std::io::Stderr,
}

impl Ui {
    pub fn new() -> Self {
        Self {
            stdout: std::io::stdout(),
            stderr: std::io::stderr(),
        }
    }

    pub fn status(&mut self) -> impl Write + '_ {
        &mut self.stderr
    }

    pub fn output(&mut self) -> impl Write + '_ {
        &mut self.stdout
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves global CLI flags into an open `Session`, once per invocation.
pub struct CommandHelper {
    global: GlobalArgs,
}

impl CommandHelper {
    pub fn new(global: GlobalArgs) -> Self {
        Self { global }
    }

    pub fn open_session(&self) -> Result<Session, CommandError> {
        let mut builder: SessionBuilder = Session::builder();
        if let Some(config_path) = &self.global.config {
            builder = builder.config_path(config_path);
        }
        if let Some(db_path) = &self.global.db {
            builder = builder.db_path(db_path);
        }
        if let Some(tract_id) = &self.global.tract {
            builder = builder.tract_id(TractId::new(tract_id.clone()));
        }
        builder.open().map_err(CommandError::from)
    }
}

pub fn parse_commit_hash(raw: &str) -> Result<CommitHash, CommandError> {
    CommitHash::parse(raw).map_err(|_| user_error(format!("not a valid commit hash: {raw:?}")))
}

pub fn short_commit_hash(hash: &CommitHash) -> String {
    hash.short().to_string()
}

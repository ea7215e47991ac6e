//! The CLI's single error type: every command returns
//! `Result<(), CommandError>`, and `main` turns that into an exit code and
//! a formatted message on stderr.

use tract::error::TractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    UserError,
    InternalError,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::UserError => 1,
            ExitCode::InternalError => 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
    pub exit_code: ExitCode,
    hint: Option<String>,
}

impl CommandError {
    pub fn new(exit_code: ExitCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// The message plus, if present, a trailing hint line. `main` prints
    /// this rather than relying on `Display` so the hint only shows up
    /// in the one place it's meant for.
    pub fn report(&self) -> String {
        match &self.hint {
            Some(hint) => format!("{}\nHint: {hint}", self.message),
            None => self.message.clone(),
        }
    }
}

pub fn user_error(message: impl Into<String>) -> CommandError {
    CommandError::new(ExitCode::UserError, message)
}

impl From<TractError> for CommandError {
    fn from(source: TractError) -> Self {
        let exit_code = match &source {
            TractError::ContentValidation { .. }
            | TractError::CommitNotFound { .. }
            | TractError::BlobNotFound { .. }
            | TractError::EditTarget { .. }
            | TractError::BudgetExceeded { .. }
            | TractError::BranchNotFound { .. }
            | TractError::NothingToMerge { .. }
            | TractError::SemanticSafety { .. }
            | TractError::CherryPick { .. }
            | TractError::Rebase { .. }
            | TractError::AmbiguousPrefix { .. }
            | TractError::InvalidHash { .. }
            | TractError::CurrentBranch { .. }
            | TractError::DetachedHead => ExitCode::UserError,
            TractError::Storage(_) | TractError::Config(_) | TractError::Io(_) => {
                ExitCode::InternalError
            }
        };
        CommandError::new(exit_code, source.to_string())
    }
}

impl From<std::io::Error> for CommandError {
    fn from(source: std::io::Error) -> Self {
        CommandError::new(ExitCode::InternalError, source.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(source: serde_json::Error) -> Self {
        CommandError::new(ExitCode::InternalError, format!("JSON error: {source}"))
    }
}

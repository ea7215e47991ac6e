//! Layered configuration: built-in defaults, an optional `tract.toml`
//! file, `TRACT_*` environment variables, and explicit builder
//! overrides — narrowest wins, grounded in the 4-level hierarchy the
//! original implementation resolves and in `jj`'s own layered `config`
//! crate usage (TOML file parsed with `toml_edit`).

use std::collections::HashMap;
use std::path::Path;

use crate::commit::{BudgetPolicy, TokenBudget};
use crate::error::{TractError, TractResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerChoice {
    Whitespace,
    #[cfg(feature = "tiktoken")]
    TiktokenCl100kBase,
}

impl Default for TokenizerChoice {
    fn default() -> Self {
        TokenizerChoice::Whitespace
    }
}

impl std::str::FromStr for TokenizerChoice {
    type Err = TractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whitespace" => Ok(TokenizerChoice::Whitespace),
            #[cfg(feature = "tiktoken")]
            "tiktoken" | "cl100k_base" => Ok(TokenizerChoice::TiktokenCl100kBase),
            other => Err(TractError::Config(format!("unknown tokenizer {other:?}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: Option<String>,
    pub cache_size: usize,
    pub token_budget: Option<TokenBudget>,
    pub tokenizer: TokenizerChoice,
    pub type_to_role_overrides: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            cache_size: 16,
            token_budget: None,
            tokenizer: TokenizerChoice::default(),
            type_to_role_overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolve defaults -> `tract.toml` (at `file_path`, or `TRACT_CONFIG`
    /// if unset) -> `TRACT_*` env vars. Builder overrides are applied by
    /// the caller after this returns (`Session::builder()` fields take
    /// precedence over anything here).
    pub fn resolve(file_path: Option<&Path>) -> TractResult<Self> {
        let mut config = Config::default();
        config.apply_file(file_path)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_file(&mut self, file_path: Option<&Path>) -> TractResult<()> {
        let path = file_path
            .map(|p| p.to_path_buf())
            .or_else(|| std::env::var("TRACT_CONFIG").ok().map(std::path::PathBuf::from));
        let Some(path) = path else { return Ok(()) };
        if !path.exists() {
            return Ok(());
        }
        let text = std::fs::read_to_string(&path)?;
        let doc = text
            .parse::<toml_edit::DocumentMut>()
            .map_err(|source| TractError::Config(format!("invalid {}: {source}", path.display())))?;

        if let Some(value) = doc.get("db_path").and_then(|v| v.as_str()) {
            self.db_path = Some(value.to_string());
        }
        if let Some(value) = doc.get("cache_size").and_then(|v| v.as_integer()) {
            self.cache_size = value.max(1) as usize;
        }
        if let Some(value) = doc.get("tokenizer").and_then(|v| v.as_str()) {
            self.tokenizer = value.parse()?;
        }
        if let Some(limit) = doc.get("token_budget_limit").and_then(|v| v.as_integer()) {
            let policy = doc
                .get("token_budget_policy")
                .and_then(|v| v.as_str())
                .map(parse_policy)
                .transpose()?
                .unwrap_or(BudgetPolicy::Warn);
            self.token_budget = Some(TokenBudget {
                limit: limit.max(0) as usize,
                policy,
            });
        }
        if let Some(table) = doc.get("type_to_role_overrides").and_then(|v| v.as_table()) {
            for (key, value) in table.iter() {
                if let Some(role) = value.as_str() {
                    self.type_to_role_overrides.insert(key.to_string(), role.to_string());
                }
            }
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("TRACT_DB_PATH") {
            self.db_path = Some(value);
        }
        if let Ok(value) = std::env::var("TRACT_CACHE_SIZE") {
            if let Ok(parsed) = value.parse::<usize>() {
                self.cache_size = parsed.max(1);
            }
        }
        if let Ok(value) = std::env::var("TRACT_TOKENIZER") {
            if let Ok(parsed) = value.parse() {
                self.tokenizer = parsed;
            }
        }
        if let Ok(value) = std::env::var("TRACT_TOKEN_BUDGET") {
            if let Ok(limit) = value.parse::<usize>() {
                let policy = self.token_budget.map(|b| b.policy).unwrap_or(BudgetPolicy::Warn);
                self.token_budget = Some(TokenBudget { limit, policy });
            }
        }
    }
}

fn parse_policy(s: &str) -> TractResult<BudgetPolicy> {
    match s {
        "warn" => Ok(BudgetPolicy::Warn),
        "block" => Ok(BudgetPolicy::Block),
        "auto_compress" => Ok(BudgetPolicy::AutoCompress),
        other => Err(TractError::Config(format!("unknown budget policy {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.cache_size, 16);
        assert!(config.token_budget.is_none());
    }
}

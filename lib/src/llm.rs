//! The language-model client seam: merge and rebase semantic resolvers
//! call through this trait. No concrete network-calling implementation
//! ships in core — that collaborator lives outside this crate's scope.

use thiserror::Error;

use crate::compile::CompiledMessage;

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "unspecified".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm client error: {0}")]
    Other(String),
}

/// A synchronous completion callable: given messages and options, return
/// text + usage. Implementations that wrap an async client are the
/// caller's responsibility (§5: LLM-bound calls are the only suspension
/// points, modeled here as plain callables).
pub trait LlmClient: Send + Sync {
    fn complete(&self, messages: &[CompiledMessage], options: &GenerationConfig) -> Result<LlmResponse, LlmError>;
}

/// A stub for callers who only use manual conflict/warning resolution
/// and never reach the semantic resolver path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLlmClient;

impl LlmClient for NullLlmClient {
    fn complete(&self, _messages: &[CompiledMessage], _options: &GenerationConfig) -> Result<LlmResponse, LlmError> {
        Err(LlmError::Other(
            "no LlmClient configured; pass one via Session::builder().llm_client(...)".to_string(),
        ))
    }
}

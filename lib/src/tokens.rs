//! Pluggable token counting. The engine never hardcodes a tokenizer: a
//! [`TokenCounter`] is injected into `Session` at construction, per the
//! "avoid global state" design note.

use crate::compile::CompiledMessage;

/// Counts tokens in a compiled message list and names the counting
/// strategy used, so compiled output can tag its `token_source`.
pub trait TokenCounter: Send + Sync {
    fn count_messages(&self, messages: &[CompiledMessage]) -> usize;
    fn name(&self) -> &str;
}

/// A dependency-light heuristic counter: splits on whitespace and
/// punctuation runs. Not tied to any real tokenizer's vocabulary, but
/// stable and fast enough for tests and offline use; ships as the
/// default so the crate has no mandatory network- or vocab-file
/// dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl WhitespaceTokenCounter {
    pub fn new() -> Self {
        Self
    }

    fn count_text(text: &str) -> usize {
        let mut count = 0;
        let mut in_word = false;
        for ch in text.chars() {
            if ch.is_whitespace() {
                in_word = false;
            } else if ch.is_alphanumeric() {
                if !in_word {
                    count += 1;
                    in_word = true;
                }
            } else {
                // punctuation: each run counts as its own token
                count += 1;
                in_word = false;
            }
        }
        count
    }
}

impl TokenCounter for WhitespaceTokenCounter {
    fn count_messages(&self, messages: &[CompiledMessage]) -> usize {
        messages.iter().map(|m| Self::count_text(&m.text)).sum()
    }

    fn name(&self) -> &str {
        "heuristic:whitespace"
    }
}

/// `tiktoken-rs`-backed counter using the `cl100k_base` encoding, for
/// callers who want GPT-family-accurate counts. Gated behind the
/// `tiktoken` feature so the default build stays dependency-light.
#[cfg(feature = "tiktoken")]
pub struct TiktokenCounter {
    encoding: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenCounter {
    pub fn cl100k_base() -> crate::error::TractResult<Self> {
        let encoding = tiktoken_rs::cl100k_base().map_err(|source| {
            crate::error::TractError::Config(format!("failed to load cl100k_base: {source}"))
        })?;
        Ok(Self { encoding })
    }
}

#[cfg(feature = "tiktoken")]
impl TokenCounter for TiktokenCounter {
    fn count_messages(&self, messages: &[CompiledMessage]) -> usize {
        messages
            .iter()
            .map(|m| self.encoding.encode_with_special_tokens(&m.text).len())
            .sum()
    }

    fn name(&self) -> &str {
        "tiktoken:cl100k_base"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_punctuation() {
        let counter = WhitespaceTokenCounter::new();
        let messages = vec![CompiledMessage {
            role: "user".to_string(),
            text: "Hello, world!".to_string(),
            name: None,
            commit_hash: None,
            edited: false,
        }];
        // "Hello" "," "world" "!" -> 4
        assert_eq!(counter.count_messages(&messages), 4);
    }
}

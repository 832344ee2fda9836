use super::{TokenId, TokenizationError};

/// A Hugging Face tokenizer.
#[derive(Debug, Clone)]
pub struct HuggingFaceTokenizer {
    tokenizer: tokenizers::Tokenizer,
}

impl HuggingFaceTokenizer {
    /// Wrap an already-constructed tokenizer.
    pub fn new(tokenizer: tokenizers::Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub(crate) fn id(&self, token: &[u8]) -> Option<TokenId> {
        std::str::from_utf8(token)
            .ok()
            .and_then(|token| self.tokenizer.token_to_id(token))
    }

    pub(crate) fn token(&self, idx: usize) -> Vec<u8> {
        self.tokenizer
            .decode(&[idx as u32], true)
            .map(|s| s.into_bytes())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    pub(crate) fn tokenize(&self, text: &str) -> Result<Vec<(Vec<u8>, TokenId)>, TokenizationError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|error| TokenizationError::TokenizationFailed { error })?;

        Ok(encoding
            .get_tokens()
            .iter()
            .map(|t| t.as_bytes().to_vec())
            .zip(encoding.get_ids().iter().copied())
            .collect())
    }

    pub(crate) fn decode(&self, tokens: &[TokenId]) -> Result<Vec<u8>, TokenizationError> {
        self.tokenizer
            .decode(tokens, true)
            .map(|s| s.into_bytes())
            .map_err(|error| TokenizationError::TokenizationFailed { error })
    }
}

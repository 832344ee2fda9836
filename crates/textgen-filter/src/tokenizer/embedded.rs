use std::collections::HashMap;

use super::{Token, TokenId, TokenScore, TokenizationError};

/// A tokenizer built from the token/score table embedded in a model file.
///
/// Tokenization picks, per position, the segmentation that maximizes the
/// squared length of the matched tokens, which prefers long vocabulary hits
/// over byte-by-byte fallbacks.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTokenizer {
    id_to_token: Vec<Token>,
    id_to_score: Vec<TokenScore>,
    token_to_id: HashMap<Token, TokenId>,
    max_token_length: usize,
}

impl EmbeddedTokenizer {
    /// Build a tokenizer from `(token bytes, score)` entries, in vocabulary
    /// order.
    pub fn new(entries: impl IntoIterator<Item = (Token, TokenScore)>) -> Self {
        let mut tokenizer = Self::default();
        for (token, score) in entries {
            tokenizer.push_token(token, score);
        }
        tokenizer
    }

    /// Append the next token to the vocabulary. Its ID is the current
    /// vocabulary size.
    pub fn push_token(&mut self, token: Token, score: TokenScore) {
        let id = self.id_to_token.len() as TokenId;
        self.max_token_length = self.max_token_length.max(token.len());
        self.id_to_token.push(token.clone());
        self.id_to_score.push(score);
        // First registration wins so duplicated vocabulary entries keep a
        // stable mapping.
        self.token_to_id.entry(token).or_insert(id);
    }

    pub(crate) fn id(&self, token: &[u8]) -> Option<TokenId> {
        self.token_to_id.get(token).copied()
    }

    pub(crate) fn token(&self, idx: usize) -> Vec<u8> {
        self.id_to_token[idx].clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub(crate) fn tokenize(&self, text: &str) -> Result<Vec<(Vec<u8>, TokenId)>, TokenizationError> {
        let bytes = text.as_bytes();
        let len = bytes.len();
        if len == 0 {
            return Ok(vec![]);
        }

        // Forward pass: best segmentation score reaching each byte offset.
        let mut best = vec![0usize; len + 1];
        let mut prev = vec![None::<TokenId>; len + 1];
        for i in 0..len {
            let max_len = (len - i).min(self.max_token_length);
            for sub_len in 1..=max_len {
                let Some(&id) = self.token_to_id.get(&bytes[i..i + sub_len]) else {
                    continue;
                };
                let candidate = best[i] + sub_len * sub_len;
                if best[i + sub_len] < candidate {
                    best[i + sub_len] = candidate;
                    prev[i + sub_len] = Some(id);
                }
            }
        }

        // Backward pass: walk the chosen tokens from the end.
        let mut result = vec![];
        let mut i = len;
        while i > 0 {
            let id = prev[i].ok_or_else(|| TokenizationError::TokenizationFailed {
                error: format!("no vocabulary entry covers byte offset {}", i - 1).into(),
            })?;
            let token = self.id_to_token[id as usize].clone();
            i -= token.len();
            result.push((token, id));
        }
        result.reverse();

        Ok(result)
    }

    pub(crate) fn decode(&self, tokens: &[TokenId]) -> Result<Vec<u8>, TokenizationError> {
        let mut out = vec![];
        for &id in tokens {
            let token = self
                .id_to_token
                .get(id as usize)
                .ok_or(TokenizationError::InvalidTokenId(id))?;
            out.extend_from_slice(token);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_vocab_with(words: &[&str]) -> EmbeddedTokenizer {
        let mut tokenizer = EmbeddedTokenizer::new(
            (0u8..=255).map(|b| (vec![b], 0.0)),
        );
        for word in words {
            tokenizer.push_token(word.as_bytes().to_vec(), 1.0);
        }
        tokenizer
    }

    #[test]
    fn prefers_longer_tokens() {
        let tokenizer = byte_vocab_with(&["he", "hello"]);
        let tokens = tokenizer.tokenize("hello!").unwrap();
        assert_eq!(
            tokens,
            vec![
                (b"hello".to_vec(), 256 + 1),
                (b"!".to_vec(), b'!' as TokenId),
            ]
        );
    }

    #[test]
    fn falls_back_to_bytes() {
        let tokenizer = byte_vocab_with(&[]);
        let tokens = tokenizer.tokenize("ab").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].1, b'a' as TokenId);
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        let tokenizer = byte_vocab_with(&["x"]);
        assert!(tokenizer.tokenize("").unwrap().is_empty());
    }

    #[test]
    fn uncoverable_text_fails() {
        let tokenizer = EmbeddedTokenizer::new([(b"a".to_vec(), 0.0)]);
        assert!(matches!(
            tokenizer.tokenize("ab"),
            Err(TokenizationError::TokenizationFailed { .. })
        ));
    }

    #[test]
    fn decode_rejects_out_of_range_ids() {
        let tokenizer = EmbeddedTokenizer::new([(b"a".to_vec(), 0.0)]);
        assert!(matches!(
            tokenizer.decode(&[7]),
            Err(TokenizationError::InvalidTokenId(7))
        ));
    }

    #[test]
    fn decode_roundtrip() {
        let tokenizer = byte_vocab_with(&["hell", "o wor"]);
        let tokens = tokenizer.tokenize("hello world").unwrap();
        let ids: Vec<TokenId> = tokens.iter().map(|(_, id)| *id).collect();
        assert_eq!(tokenizer.decode(&ids).unwrap(), b"hello world");
    }
}

//! A deterministic in-memory engine for exercising the filter contract
//! without real model weights.

use crate::model::{EvalError, Model};
use crate::tokenizer::{EmbeddedTokenizer, TokenId, TokenizationError, Tokenizer};

/// Vocabulary: one token per byte value, then the two specials.
const BOT_TOKEN: TokenId = 256;
const EOT_TOKEN: TokenId = 257;
const VOCAB_SIZE: usize = 258;

/// An engine that always steers generation towards a scripted continuation,
/// then signals end of text.
///
/// The vocabulary is byte-level. Whatever the prompt, the logits returned
/// from [Model::evaluate] overwhelmingly favor the next unplayed byte of the
/// script, so any sane sampler reproduces the script verbatim. The KV cache
/// is simulated just enough to enforce position bookkeeping and the context
/// window.
pub struct ScriptedModel {
    tokenizer: Tokenizer,
    script: Vec<TokenId>,
    cursor: usize,
    kv_depth: usize,
    context_size: usize,
}

impl ScriptedModel {
    /// Create an engine that will produce `continuation` and then stop.
    pub fn with_continuation(continuation: &str, context_size: usize) -> Self {
        let mut vocab = EmbeddedTokenizer::new((0u8..=255).map(|b| (vec![b], 0.0)));
        vocab.push_token(vec![], 0.0); // beginning of text
        vocab.push_token(vec![], 0.0); // end of text

        Self {
            tokenizer: vocab.into(),
            script: continuation.bytes().map(TokenId::from).collect(),
            cursor: 0,
            kv_depth: 0,
            context_size,
        }
    }

    /// Tokenize `text` with the beginning-of-text token prepended, the way a
    /// host-side driver prepares a prompt.
    pub fn tokenize_with_bot(&self, text: &str) -> Result<Vec<TokenId>, TokenizationError> {
        let mut tokens = vec![BOT_TOKEN];
        tokens.extend(self.tokenizer.tokenize(text)?.iter().map(|(_, id)| *id));
        Ok(tokens)
    }
}

impl Model for ScriptedModel {
    fn context_size(&self) -> usize {
        self.context_size
    }

    fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    fn bot_token_id(&self) -> Option<TokenId> {
        Some(BOT_TOKEN)
    }

    fn eot_token_id(&self) -> TokenId {
        EOT_TOKEN
    }

    fn evaluate(&mut self, tokens: &[TokenId], n_past: usize) -> Result<Vec<f32>, EvalError> {
        if n_past != self.kv_depth {
            return Err(EvalError::Backend(
                format!(
                    "cache position mismatch: submitted at {n_past}, cache holds {}",
                    self.kv_depth
                )
                .into(),
            ));
        }
        if self.kv_depth + tokens.len() > self.context_size {
            return Err(EvalError::ContextFull);
        }
        self.kv_depth += tokens.len();

        // Tokens echoed back from earlier samples advance the script.
        for &token in tokens {
            if self.script.get(self.cursor) == Some(&token) {
                self.cursor += 1;
            }
        }

        let favored = self
            .script
            .get(self.cursor)
            .copied()
            .unwrap_or(EOT_TOKEN);
        let mut logits = vec![-30.0; VOCAB_SIZE];
        logits[favored as usize] = 30.0;
        Ok(logits)
    }

    fn reset(&mut self) {
        self.kv_depth = 0;
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favors_the_next_script_token() {
        let mut model = ScriptedModel::with_continuation("ab", 64);
        let logits = model.evaluate(&[BOT_TOKEN], 0).unwrap();
        let favored = logits
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap()
            .0;
        assert_eq!(favored, b'a' as usize);

        // Feeding the sampled 'a' back moves the script forward.
        let logits = model.evaluate(&[b'a' as TokenId], 1).unwrap();
        let favored = logits
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap()
            .0;
        assert_eq!(favored, b'b' as usize);
    }

    #[test]
    fn enforces_cache_positions() {
        let mut model = ScriptedModel::with_continuation("x", 64);
        assert!(model.evaluate(&[1], 5).is_err());
        assert!(model.evaluate(&[1], 0).is_ok());
        assert!(model.evaluate(&[2], 1).is_ok());
    }

    #[test]
    fn signals_context_full() {
        let mut model = ScriptedModel::with_continuation("x", 4);
        assert!(model.evaluate(&[1, 2, 3, 4], 0).is_ok());
        assert!(matches!(
            model.evaluate(&[5], 4),
            Err(EvalError::ContextFull)
        ));
    }

    #[test]
    fn reset_clears_the_cache() {
        let mut model = ScriptedModel::with_continuation("x", 4);
        model.evaluate(&[1, 2], 0).unwrap();
        model.reset();
        assert!(model.evaluate(&[1, 2], 0).is_ok());
    }
}

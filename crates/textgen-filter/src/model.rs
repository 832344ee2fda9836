use thiserror::Error;

use crate::tokenizer::{TokenId, Tokenizer};

/// The seam between this filter and the inference engine.
///
/// An implementation owns the weights and the KV cache; the filter owns the
/// loop that drives it. `evaluate` is stateful: the engine appends the given
/// batch to its cache at position `n_past` and returns the logits for the last
/// position.
pub trait Model: Send {
    /// The context window size, in tokens.
    fn context_size(&self) -> usize;

    /// The tokenizer that belongs to this model.
    fn tokenizer(&self) -> &Tokenizer;

    /// The beginning-of-text token, if the model defines one.
    fn bot_token_id(&self) -> Option<TokenId>;

    /// The end-of-text token.
    fn eot_token_id(&self) -> TokenId;

    /// Decode one batch of tokens against the KV cache. `n_past` is the number
    /// of tokens already in the cache; the returned vector holds the logits of
    /// the last position, one per vocabulary entry.
    fn evaluate(&mut self, tokens: &[TokenId], n_past: usize) -> Result<Vec<f32>, EvalError>;

    /// Drop all cached state so the next evaluation starts from an empty
    /// context.
    fn reset(&mut self);
}

/// Errors reported by the engine when evaluating a batch.
#[derive(Error, Debug)]
pub enum EvalError {
    /// The batch does not fit in the remaining context window.
    #[error("the context window is full")]
    ContextFull,
    /// Any other engine-side failure.
    #[error("{0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

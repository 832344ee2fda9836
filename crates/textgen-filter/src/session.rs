use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::model::{EvalError, Model};
use crate::samplers::{Sampler, TopPTopK};
use crate::tokenizer::TokenId;
use crate::util::PieceBuffer;
use crate::GenerationError;

/// How many context positions are held back from a single submission. Matches
/// the prompt-handling reserve used by the reference engine frontends.
const SUBMISSION_RESERVE: usize = 4;

/// The parameters that drive one generation pass.
#[derive(Clone)]
pub struct GenerationParameters {
    /// How many prompt tokens to feed to the engine per evaluation.
    pub n_batch: usize,
    /// The sampling budget: at most this many tokens are generated.
    pub n_predict: usize,
    /// The sampler that picks each next token.
    pub sampler: Arc<dyn Sampler>,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            n_batch: 8,
            n_predict: 128,
            sampler: Arc::new(TopPTopK::default()),
        }
    }
}

/// A piece of output reported while generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResponse {
    /// Text recovered from a prompt token being fed to the engine.
    PromptPiece(String),
    /// Text produced by the model.
    GeneratedPiece(String),
    /// The model signalled the end of the text. Generation stops.
    EndOfText,
}

/// Whether generation should continue after a reported piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationFeedback {
    /// Keep generating.
    Continue,
    /// Stop generating.
    Halt,
}

/// Timings and counts for one generation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationStats {
    /// Time spent feeding the prompt.
    pub prompt_duration: Duration,
    /// Number of prompt tokens fed.
    pub prompt_tokens: usize,
    /// Time spent predicting tokens.
    pub predict_duration: Duration,
    /// Number of tokens predicted.
    pub predict_tokens: usize,
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per_token = if self.predict_tokens > 0 {
            self.predict_duration.as_millis() / self.predict_tokens as u128
        } else {
            0
        };
        write!(
            f,
            "prompt tokens: {} ({}ms), predicted tokens: {} ({}ms, {per_token}ms/token)",
            self.prompt_tokens,
            self.prompt_duration.as_millis(),
            self.predict_tokens,
            self.predict_duration.as_millis(),
        )
    }
}

/// Generation state that outlives a single invocation.
///
/// The engine's KV cache keeps everything it has seen, so the token history
/// and the cache depth have to travel together: a new pass continues where
/// the previous one left off until someone calls [GenerationSession::reset].
#[derive(Default)]
pub struct GenerationSession {
    n_past: usize,
    tokens: Vec<TokenId>,
    last_logits: Vec<f32>,
    decoder: PieceBuffer,
}

impl GenerationSession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of tokens the engine has consumed in this session.
    pub fn n_past(&self) -> usize {
        self.n_past
    }

    /// Every token fed or generated in this session, in order.
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    /// Forget all session state. The engine's cache must be reset alongside.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed `prompt` to the model and generate until the model signals the
    /// end of the text, the sampling budget runs out, the context fills up,
    /// or the callback asks to halt.
    ///
    /// Prompt tokens are reported through the callback as
    /// [GenerationResponse::PromptPiece] while they are fed (in `n_batch`
    /// chunks); generated tokens as [GenerationResponse::GeneratedPiece], one
    /// by one. The end-of-text token is never reported as text.
    pub fn generate<E>(
        &mut self,
        model: &mut dyn Model,
        prompt: &[TokenId],
        params: &GenerationParameters,
        rng: &mut dyn rand::RngCore,
        mut callback: impl FnMut(GenerationResponse) -> Result<GenerationFeedback, E>,
    ) -> Result<GenerationStats, GenerationError>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut stats = GenerationStats::default();
        let start = Instant::now();
        let mut prompt_done_at = None;

        // A fresh pass must not stitch text onto a partial character from the
        // previous one.
        self.decoder.clear();

        let n_batch = params.n_batch.max(1);
        let eot = model.eot_token_id();
        let mut pending: Vec<TokenId> = Vec::new();
        let mut consumed = 0;
        let mut remaining = params.n_predict;

        'generation: while remaining > 0 {
            // Evaluate whatever is queued before deciding on the next token.
            if !pending.is_empty() {
                let max_submission = model.context_size().saturating_sub(SUBMISSION_RESERVE);
                if pending.len() > max_submission {
                    let skipped = pending.len() - max_submission;
                    log::warn!("input too long: skipped {skipped} token(s)");
                    pending.truncate(max_submission);
                }

                for chunk in pending.chunks(n_batch) {
                    match model.evaluate(chunk, self.n_past) {
                        Ok(logits) => self.last_logits = logits,
                        Err(EvalError::ContextFull) => return Err(GenerationError::ContextFull),
                        Err(err) => return Err(GenerationError::EvalFailed(err)),
                    }
                    self.n_past += chunk.len();
                }
                pending.clear();
            }

            if consumed < prompt.len() {
                // Still feeding the prompt. These tokens go through the
                // history (the repetition penalty sees them) but never count
                // against the sampling budget.
                while consumed < prompt.len() {
                    let id = prompt[consumed];
                    pending.push(id);
                    self.tokens.push(id);
                    consumed += 1;
                    if pending.len() >= n_batch {
                        break;
                    }
                }
                stats.prompt_tokens += pending.len();

                for &id in &pending {
                    if let Some(piece) = self.decoder.push(&model.tokenizer().token(id as usize)) {
                        if self.report(GenerationResponse::PromptPiece(piece), &mut callback)? {
                            break 'generation;
                        }
                    }
                }
            } else {
                if prompt_done_at.is_none() {
                    prompt_done_at = Some(start.elapsed());
                }

                if self.last_logits.is_empty() {
                    return Err(GenerationError::EvalFailed(EvalError::Backend(
                        "no logits available to sample from".into(),
                    )));
                }

                let id = params
                    .sampler
                    .sample(&self.tokens, &self.last_logits, rng);
                self.tokens.push(id);
                remaining -= 1;
                stats.predict_tokens += 1;

                if id == eot {
                    self.report(GenerationResponse::EndOfText, &mut callback)?;
                    break;
                }

                pending.push(id);
                if let Some(piece) = self.decoder.push(&model.tokenizer().token(id as usize)) {
                    if self.report(GenerationResponse::GeneratedPiece(piece), &mut callback)? {
                        break;
                    }
                }
            }
        }

        stats.prompt_duration = prompt_done_at.unwrap_or_else(|| start.elapsed());
        stats.predict_duration = start.elapsed() - stats.prompt_duration;
        Ok(stats)
    }

    fn report<E>(
        &self,
        response: GenerationResponse,
        callback: &mut impl FnMut(GenerationResponse) -> Result<GenerationFeedback, E>,
    ) -> Result<bool, GenerationError>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        callback(response)
            .map(|feedback| feedback == GenerationFeedback::Halt)
            .map_err(|err| GenerationError::UserCallback(Box::new(err)))
    }
}

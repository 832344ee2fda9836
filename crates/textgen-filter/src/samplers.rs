//! Samplers that pick the next token from a logit vector.
//!
//! The engine computes logits; picking from them belongs to the loop that
//! drives the engine, so it lives here. Define your own [Sampler] by
//! implementing the trait.

use std::fmt::Debug;

use partial_sort::PartialSort;
use rand::{distributions::WeightedIndex, prelude::Distribution};

use crate::tokenizer::TokenId;

/// A sampler for generation.
pub trait Sampler: Debug + Send + Sync {
    /// Given the tokens generated and consumed so far, the logits of the most
    /// recent evaluation, and a source of randomness, pick the next token.
    fn sample(
        &self,
        previous_tokens: &[TokenId],
        logits: &[f32],
        rng: &mut dyn rand::RngCore,
    ) -> TokenId;
}

/// Top-K/top-P sampling with temperature and a repetition penalty.
///
/// The top K logits are kept, then truncated to the smallest set whose
/// cumulative probability reaches P, and the result is drawn from the
/// remaining distribution. Tokens seen in the last `repeat_last_n` positions
/// have their logits penalized ([CTRL](https://arxiv.org/abs/1909.05858)).
#[derive(Clone, Debug)]
pub struct TopPTopK {
    /// The top K tokens by score are kept during sampling.
    pub top_k: usize,
    /// The cumulative probability after which no more tokens are kept for sampling.
    pub top_p: f32,
    /// The penalty for repeating tokens. Higher values make the generation less
    /// likely to get into a loop, but may harm results when repetitive outputs
    /// are desired.
    pub repeat_penalty: f32,
    /// Temperature (randomness) used for sampling. A higher number is more random.
    pub temperature: f32,
    /// The number of recent tokens the repetition penalty looks at.
    pub repeat_last_n: usize,
}

impl Default for TopPTopK {
    fn default() -> Self {
        Self {
            top_k: 40,
            top_p: 0.95,
            repeat_penalty: 1.30,
            temperature: 0.80,
            repeat_last_n: 64,
        }
    }
}

impl Sampler for TopPTopK {
    fn sample(
        &self,
        previous_tokens: &[TokenId],
        logits: &[f32],
        rng: &mut dyn rand::RngCore,
    ) -> TokenId {
        let scale = 1.0 / self.temperature;
        let window = &previous_tokens[previous_tokens
            .len()
            .saturating_sub(self.repeat_last_n)..];

        let mut scored: Vec<(f32, TokenId)> = logits
            .iter()
            .enumerate()
            .map(|(i, &logit)| {
                let id = i as TokenId;
                let value = if window.contains(&id) {
                    // A negative logit must be scaled up for the penalty to
                    // reduce the token's probability.
                    if logit < 0.0 {
                        logit * scale * self.repeat_penalty
                    } else {
                        logit * scale / self.repeat_penalty
                    }
                } else {
                    logit * scale
                };
                (value, id)
            })
            .collect();

        let top_k = self.top_k.min(scored.len());
        scored.partial_sort(top_k, |a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        let max_score = scored
            .iter()
            .map(|(score, _)| *score)
            .max_by(f32::total_cmp)
            .expect("logits must not be empty");

        let mut probs: Vec<f32> = scored
            .iter()
            .map(|(score, _)| (score - max_score).exp())
            .collect();
        let sum: f32 = probs.iter().sum();
        for p in probs.iter_mut() {
            *p /= sum;
        }

        if self.top_p < 1.0 {
            let mut cumsum = 0.0;
            for i in 0..probs.len() {
                cumsum += probs[i];
                if cumsum >= self.top_p {
                    probs.truncate(i + 1);
                    scored.truncate(i + 1);
                    break;
                }
            }
            let rescale = 1.0 / cumsum;
            for p in probs.iter_mut() {
                *p *= rescale;
            }
        }

        let dist = WeightedIndex::new(&probs).expect("probabilities must be positive");
        scored[dist.sample(rng)].1
    }
}

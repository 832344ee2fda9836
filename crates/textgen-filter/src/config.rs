use std::path::PathBuf;
use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;

use crate::prompt::PromptTemplate;
use crate::samplers::TopPTopK;
use crate::session::GenerationParameters;

/// Environment variable prefix for configuration overrides. A filter loaded
/// into a pipeline host has no command line, so deployment knobs arrive
/// through the environment.
const ENV_PREFIX: &str = "TEXTGEN_FILTER_";

/// Everything configurable about the filter.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Where the engine should find its weights. Recorded here so the engine
    /// side and the filter are configured from one place.
    pub model_path: PathBuf,
    /// Text placed before the payload.
    pub prompt_prefix: String,
    /// Text placed after the payload.
    pub prompt_suffix: String,
    /// Sampling budget per invocation.
    pub n_predict: usize,
    /// Prompt ingestion chunk size.
    pub n_batch: usize,
    /// Top-K sampling cutoff.
    pub top_k: usize,
    /// Top-P (nucleus) sampling cutoff.
    pub top_p: f32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Repetition penalty.
    pub repeat_penalty: f32,
    /// How many recent tokens the repetition penalty considers.
    pub repeat_last_n: usize,
    /// RNG seed. Unset means a fresh seed per process.
    pub seed: Option<u64>,
    /// Whether prompt tokens are echoed to the console as they are fed.
    pub echo_prompt: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let template = PromptTemplate::default();
        Self {
            model_path: PathBuf::from("models/llama-68m-chat-v1.fp16.gguf"),
            prompt_prefix: template.prefix,
            prompt_suffix: template.suffix,
            n_predict: 128,
            n_batch: 8,
            top_k: 40,
            top_p: 0.95,
            temperature: 0.80,
            repeat_penalty: 1.30,
            repeat_last_n: 64,
            seed: None,
            echo_prompt: true,
        }
    }
}

impl FilterConfig {
    /// Defaults with any `TEXTGEN_FILTER_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply environment overrides to this configuration. Unparseable values
    /// are logged and skipped.
    pub fn apply_env(&mut self) {
        read_env("MODEL", &mut self.model_path);
        read_env("PROMPT_PREFIX", &mut self.prompt_prefix);
        read_env("PROMPT_SUFFIX", &mut self.prompt_suffix);
        read_env("N_PREDICT", &mut self.n_predict);
        read_env("N_BATCH", &mut self.n_batch);
        read_env("TOP_K", &mut self.top_k);
        read_env("TOP_P", &mut self.top_p);
        read_env("TEMPERATURE", &mut self.temperature);
        read_env("REPEAT_PENALTY", &mut self.repeat_penalty);
        read_env("REPEAT_LAST_N", &mut self.repeat_last_n);
        read_env("ECHO_PROMPT", &mut self.echo_prompt);

        let mut seed = 0u64;
        if read_env("SEED", &mut seed) {
            self.seed = Some(seed);
        }
    }

    /// The prompt template described by this configuration.
    pub fn template(&self) -> PromptTemplate {
        PromptTemplate {
            prefix: self.prompt_prefix.clone(),
            suffix: self.prompt_suffix.clone(),
        }
    }

    /// The generation parameters described by this configuration.
    pub fn generation_parameters(&self) -> GenerationParameters {
        GenerationParameters {
            n_batch: self.n_batch,
            n_predict: self.n_predict,
            sampler: Arc::new(TopPTopK {
                top_k: self.top_k,
                top_p: self.top_p,
                temperature: self.temperature,
                repeat_penalty: self.repeat_penalty,
                repeat_last_n: self.repeat_last_n,
            }),
        }
    }

    /// An RNG seeded per this configuration.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

fn read_env<T>(name: &str, target: &mut T) -> bool
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{name}");
    match std::env::var(&key) {
        Ok(value) => match value.parse() {
            Ok(parsed) => {
                *target = parsed;
                true
            }
            Err(err) => {
                log::warn!("ignoring {key}={value:?}: {err}");
                false
            }
        },
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_template() {
        let config = FilterConfig::default();
        assert_eq!(config.template(), PromptTemplate::default());
        assert_eq!(config.n_predict, 128);
        assert!(config.echo_prompt);
    }

    #[test]
    fn env_overrides_apply() {
        // Env access is process-global; run the whole scenario in one test.
        std::env::set_var("TEXTGEN_FILTER_N_PREDICT", "7");
        std::env::set_var("TEXTGEN_FILTER_TOP_P", "not-a-number");
        std::env::set_var("TEXTGEN_FILTER_SEED", "99");
        std::env::set_var("TEXTGEN_FILTER_ECHO_PROMPT", "false");

        let config = FilterConfig::from_env();
        assert_eq!(config.n_predict, 7);
        assert_eq!(config.top_p, FilterConfig::default().top_p);
        assert_eq!(config.seed, Some(99));
        assert!(!config.echo_prompt);

        std::env::remove_var("TEXTGEN_FILTER_N_PREDICT");
        std::env::remove_var("TEXTGEN_FILTER_TOP_P");
        std::env::remove_var("TEXTGEN_FILTER_SEED");
        std::env::remove_var("TEXTGEN_FILTER_ECHO_PROMPT");
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: FilterConfig =
            serde_json::from_str(r#"{"n_predict": 32, "temperature": 0.5}"#).unwrap();
        assert_eq!(config.n_predict, 32);
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.n_batch, FilterConfig::default().n_batch);
    }
}

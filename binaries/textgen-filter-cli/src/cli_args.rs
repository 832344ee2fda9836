use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result};
use textgen_filter::FilterConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub enum Args {
    #[command()]
    /// Push one prompt frame through the filter, the way a pipeline host
    /// would, and print the returned tensor.
    Invoke(Box<Invoke>),

    #[command()]
    /// Render the prompt template around a payload and dump the resulting
    /// token IDs.
    PromptTokens(Box<PromptTokens>),

    #[command()]
    /// List the filters registered in this process.
    Filters,
}

#[derive(Parser, Debug)]
pub struct Invoke {
    #[command(flatten)]
    pub prompt_source: PromptSource,

    #[command(flatten)]
    pub generate: Generate,

    /// The continuation the scripted engine plays back. This binary validates
    /// the plugin contract; it carries no model weights of its own.
    #[arg(long, default_value = "Nothing to report from the scripted engine.")]
    pub script: String,

    /// Hide the prompt while it is fed to the engine.
    ///
    /// By default, prompt tokens are echoed as they are consumed. This option
    /// only shows the generated tokens.
    #[arg(long, default_value_t = false)]
    pub hide_prompt: bool,

    /// Print timing statistics after the frame completes.
    #[arg(long, default_value_t = false)]
    pub stats: bool,
}

#[derive(Parser, Debug)]
pub struct PromptTokens {
    #[command(flatten)]
    pub prompt_source: PromptSource,

    #[command(flatten)]
    pub generate: Generate,

    /// Tokenize with a Hugging Face tokenizer file instead of the scripted
    /// engine's byte vocabulary.
    #[arg(long)]
    pub tokenizer_file: Option<PathBuf>,

    /// Emit the dump as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct PromptSource {
    /// The prompt payload to feed the filter.
    ///
    /// If used with `--prompt-file`, the file contents are used and
    /// `{{PROMPT}}` inside them is replaced with this value.
    #[arg(long, short = 'p')]
    pub prompt: Option<String>,

    /// A file to read the prompt payload from.
    #[arg(long, short = 'f')]
    pub prompt_file: Option<PathBuf>,
}

impl PromptSource {
    pub fn resolve(&self) -> Result<String> {
        let file_contents = self
            .prompt_file
            .as_deref()
            .map(std::fs::read_to_string)
            .transpose()?;
        Ok(match (file_contents, self.prompt.as_deref()) {
            (Some(file), None) => file,
            (None, Some(prompt)) => prompt.to_owned(),
            (Some(file), Some(prompt)) => crate::util::process_prompt(&file, prompt),
            (None, None) => bail!("no prompt or prompt file was provided, see --help"),
        })
    }
}

#[derive(Parser, Debug)]
pub struct Generate {
    /// Sets how many tokens to predict.
    #[arg(long, short = 'n')]
    pub num_predict: Option<usize>,

    /// How many prompt tokens at a time to feed the engine. Does not affect
    /// generation.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Size of the 'last N' window used by the repetition penalty, in tokens.
    #[arg(long)]
    pub repeat_last_n: Option<usize>,

    /// The penalty for repeating tokens.
    #[arg(long)]
    pub repeat_penalty: Option<f32>,

    /// Temperature.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Top-K: the top K tokens by score are kept during sampling.
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Top-P: the cumulative probability after which no more tokens are kept
    /// for sampling.
    #[arg(long)]
    pub top_p: Option<f32>,

    /// The seed to use during sampling.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Text placed before the payload in the prompt.
    #[arg(long)]
    pub prompt_prefix: Option<String>,

    /// Text placed after the payload in the prompt.
    #[arg(long)]
    pub prompt_suffix: Option<String>,
}

impl Generate {
    /// Filter configuration: environment first, then command-line overrides.
    pub fn filter_config(&self, echo_prompt: bool) -> FilterConfig {
        let mut config = FilterConfig::from_env();
        macro_rules! apply {
            ($($field:ident <- $arg:ident),* $(,)?) => {
                $(if let Some(value) = self.$arg.clone() {
                    config.$field = value;
                })*
            };
        }
        apply!(
            n_predict <- num_predict,
            n_batch <- batch_size,
            repeat_last_n <- repeat_last_n,
            repeat_penalty <- repeat_penalty,
            temperature <- temperature,
            top_k <- top_k,
            top_p <- top_p,
            prompt_prefix <- prompt_prefix,
            prompt_suffix <- prompt_suffix,
        );
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.echo_prompt = echo_prompt;
        config
    }
}

//! A text-generation filter node for tensor pipelines.
//!
//! The filter treats the raw bytes of its input tensor as a prompt, wraps them
//! in a configurable chat template, drives an autoregressive generation loop
//! against a language model, echoes the produced text to the console as it
//! appears, and returns the generated text in a fixed-size output tensor.
//!
//! The model itself lives behind the [Model] trait: weights, KV cache and
//! batched decode belong to the engine that implements it. This crate owns
//! everything between the pipeline buffer and that engine: prompt marshaling,
//! the token loop, sampling, and streaming.
//!
//! # Example
//!
//! ```no_run
//! use tensor_pipe::{Filter, TensorData};
//! use textgen_filter::{testing::ScriptedModel, FilterConfig, TextGenFilter};
//!
//! let model = ScriptedModel::with_continuation("a short scripted reply", 2048);
//! let mut filter = TextGenFilter::new(model, FilterConfig::default());
//!
//! let input_info = filter.input_info().tensors()[0].clone();
//! let mut input = TensorData::new_zeroed(input_info);
//! input.bytes_mut()[..5].copy_from_slice(b"Hello");
//!
//! let mut output = vec![TensorData::new_zeroed(
//!     filter.output_info().tensors()[0].clone(),
//! )];
//! filter.invoke(&[input], &mut output).unwrap();
//! ```
#![deny(missing_docs)]

use thiserror::Error;

mod config;
mod filter;
mod model;
mod prompt;
mod session;
mod util;

pub mod samplers;
pub mod testing;
pub mod tokenizer;

pub use config::FilterConfig;
pub use filter::{register, TextGenFilter, FILTER_NAME, PAYLOAD_BYTES};
pub use model::{EvalError, Model};
pub use prompt::{payload_text, PromptTemplate};
pub use session::{
    GenerationFeedback, GenerationParameters, GenerationResponse, GenerationSession,
    GenerationStats,
};
pub use tokenizer::{TokenId, TokenizationError, Tokenizer};
pub use util::PieceBuffer;

/// Errors encountered while generating text.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The prompt could not be tokenized.
    #[error("{0}")]
    TokenizationFailed(#[from] TokenizationError),
    /// The model's context window is full; generation cannot continue in this
    /// session.
    #[error("the context window is full")]
    ContextFull,
    /// The engine failed to evaluate a batch.
    #[error("model evaluation failed: {0}")]
    EvalFailed(#[source] EvalError),
    /// The output callback returned an error.
    #[error("the output callback returned an error")]
    UserCallback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

//! Tokenizers the filter can drive a model with.
//!
//! Models ship their vocabulary in one of two shapes: a plain token/score
//! table embedded in the model file, or a full Hugging Face tokenizer
//! definition. Both are wrapped here behind one enum so the generation loop
//! does not care which one the engine handed it.

use std::path::{Path, PathBuf};

use thiserror::Error;

mod embedded;
pub use embedded::EmbeddedTokenizer;
mod huggingface;
pub use huggingface::HuggingFaceTokenizer;

/// The identifier of a token in a tokenizer.
pub type TokenId = u32;
pub(crate) type Token = Vec<u8>;
pub(crate) type TokenScore = f32;

#[derive(Error, Debug)]
/// Errors related to tokenization.
pub enum TokenizationError {
    #[error("an invalid token was encountered during tokenization")]
    /// The tokenizer could not produce a valid token sequence for the text.
    TokenizationFailed {
        #[source]
        /// The underlying error.
        error: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("the token ID {0} is not part of this vocabulary")]
    /// A token ID outside the vocabulary was used.
    InvalidTokenId(TokenId),
}

#[derive(Error, Debug)]
/// Errors related to loading a tokenizer from disk.
#[error("error loading tokenizer from {path}: {error}")]
pub struct TokenizerLoadError {
    /// The path the tokenizer was loaded from.
    pub path: PathBuf,
    /// The error that occurred during loading.
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

/// Encapsulates the tokenizer for a model, and provides methods to tokenize text.
pub enum Tokenizer {
    /// A token/score table as embedded in model files.
    Embedded(EmbeddedTokenizer),
    /// A Hugging Face tokenizer.
    HuggingFace(HuggingFaceTokenizer),
}

impl From<EmbeddedTokenizer> for Tokenizer {
    fn from(v: EmbeddedTokenizer) -> Self {
        Self::Embedded(v)
    }
}

impl From<HuggingFaceTokenizer> for Tokenizer {
    fn from(v: HuggingFaceTokenizer) -> Self {
        Self::HuggingFace(v)
    }
}

impl Tokenizer {
    /// Load a Hugging Face tokenizer definition from a `tokenizer.json` file.
    pub fn from_huggingface_file(path: &Path) -> Result<Self, TokenizerLoadError> {
        let tokenizer =
            tokenizers::Tokenizer::from_file(path).map_err(|error| TokenizerLoadError {
                path: path.to_owned(),
                error,
            })?;
        Ok(HuggingFaceTokenizer::new(tokenizer).into())
    }

    /// Converts a token to the token ID it represents in this tokenizer.
    pub fn id(&self, token: &[u8]) -> Option<TokenId> {
        match self {
            Tokenizer::Embedded(v) => v.id(token),
            Tokenizer::HuggingFace(v) => v.id(token),
        }
    }

    /// Converts a token index to the token it represents in this tokenizer.
    pub fn token(&self, idx: usize) -> Vec<u8> {
        match self {
            Tokenizer::Embedded(v) => v.token(idx),
            Tokenizer::HuggingFace(v) => v.token(idx),
        }
    }

    /// Returns the number of tokens in the tokenizer.
    pub fn len(&self) -> usize {
        match self {
            Tokenizer::Embedded(v) => v.len(),
            Tokenizer::HuggingFace(v) => v.len(),
        }
    }

    /// Returns whether the tokenizer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tokenize `text` into `(bytes, id)` pairs. No special tokens are added;
    /// the caller decides whether a beginning-of-text token belongs in front.
    pub fn tokenize(&self, text: &str) -> Result<Vec<(Vec<u8>, TokenId)>, TokenizationError> {
        match self {
            Tokenizer::Embedded(v) => v.tokenize(text),
            Tokenizer::HuggingFace(v) => v.tokenize(text),
        }
    }

    /// Decode a list of tokens back into bytes.
    pub fn decode(&self, tokens: &[TokenId]) -> Result<Vec<u8>, TokenizationError> {
        match self {
            Tokenizer::Embedded(v) => v.decode(tokens),
            Tokenizer::HuggingFace(v) => v.decode(tokens),
        }
    }
}

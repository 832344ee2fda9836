/// The fixed text wrapped around every incoming payload.
///
/// The defaults produce a ChatML-style exchange that asks the model to
/// summarize whatever the pipeline delivers (the upstream elements of a
/// typical deployment feed subtitle text into this filter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Text placed before the payload.
    pub prefix: String,
    /// Text placed after the payload.
    pub suffix: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            prefix: "<|im_start|>system You are a helpful assistant.<|im_end|> \
                     <|im_start|>user Please, summarize the subtitle.\n"
                .to_owned(),
            suffix: "<|im_end|>".to_owned(),
        }
    }
}

impl PromptTemplate {
    /// Assemble the full prompt around a payload.
    pub fn render(&self, payload: &str) -> String {
        format!("{}{}{}", self.prefix, payload, self.suffix)
    }
}

/// Extract the prompt payload from a raw tensor buffer.
///
/// The buffer is treated as a C string: everything from the first NUL byte on
/// is padding. Invalid UTF-8 is replaced rather than rejected, since upstream
/// pipeline elements give no encoding guarantees.
pub fn payload_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

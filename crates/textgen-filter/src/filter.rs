use std::io::Write;

use rand::rngs::StdRng;

use tensor_pipe::{
    Filter, FilterError, TensorData, TensorInfo, TensorType, TensorsInfo,
};

use crate::config::FilterConfig;
use crate::model::Model;
use crate::prompt::{payload_text, PromptTemplate};
use crate::session::{
    GenerationFeedback, GenerationParameters, GenerationResponse, GenerationSession,
};
use crate::tokenizer::TokenId;
use crate::GenerationError;

/// The name this filter registers under.
pub const FILTER_NAME: &str = "textgen-llm";

/// Byte capacity of the input and output tensors. One pipeline frame carries
/// this much prompt text in and generated text out, NUL-padded.
pub const PAYLOAD_BYTES: usize = 48000;

/// The text-generation filter node.
///
/// One instance owns one engine and one generation session. The session
/// continues across invocations: successive frames extend the same model
/// context until it fills up, at which point the filter starts a fresh one.
pub struct TextGenFilter<M: Model> {
    model: M,
    template: PromptTemplate,
    params: GenerationParameters,
    echo_prompt: bool,
    session: GenerationSession,
    rng: StdRng,
}

impl<M: Model> TextGenFilter<M> {
    /// Build a filter around a loaded engine.
    pub fn new(model: M, config: FilterConfig) -> Self {
        Self {
            template: config.template(),
            params: config.generation_parameters(),
            echo_prompt: config.echo_prompt,
            rng: config.rng(),
            model,
            session: GenerationSession::new(),
        }
    }

    /// The engine this filter drives.
    pub fn model(&self) -> &M {
        &self.model
    }

    fn prompt_tokens(&self, rendered: &str) -> Result<Vec<TokenId>, GenerationError> {
        let mut tokens: Vec<TokenId> = self
            .model
            .tokenizer()
            .tokenize(rendered)?
            .iter()
            .map(|(_, id)| *id)
            .collect();

        if let Some(bot) = self.model.bot_token_id() {
            tokens.insert(0, bot);
        }
        if tokens.is_empty() {
            // Nothing survived tokenization; give the engine one token to
            // chew on rather than an empty batch.
            log::debug!("prompt tokenized to nothing, substituting the end-of-text token");
            tokens.push(self.model.eot_token_id());
        }

        Ok(tokens)
    }

    /// Run one generation pass, returning the text the model produced.
    fn generate(&mut self, rendered: &str) -> Result<String, GenerationError> {
        let prompt = self.prompt_tokens(rendered)?;

        let echo_prompt = self.echo_prompt;
        let mut transcript = String::new();
        let stdout = std::io::stdout();

        let result = self.session.generate(
            &mut self.model,
            &prompt,
            &self.params,
            &mut self.rng,
            |response| {
                let mut lock = stdout.lock();
                match response {
                    GenerationResponse::PromptPiece(piece) => {
                        if echo_prompt {
                            write!(lock, "{piece}")?;
                            lock.flush()?;
                        }
                    }
                    GenerationResponse::GeneratedPiece(piece) => {
                        write!(lock, "{piece}")?;
                        lock.flush()?;
                        transcript.push_str(&piece);
                    }
                    GenerationResponse::EndOfText => {
                        writeln!(lock, " [end of text]")?;
                    }
                }
                Ok::<_, std::io::Error>(GenerationFeedback::Continue)
            },
        );

        match result {
            Ok(stats) => log::info!("generation finished: {stats}"),
            // The window filled up mid-generation. Hand back what was
            // produced and start the next frame from an empty context.
            Err(GenerationError::ContextFull) => {
                log::warn!("context window full, stopping generation");
                self.session.reset();
                self.model.reset();
            }
            Err(err) => return Err(err),
        }

        Ok(transcript)
    }

    fn payload_info() -> TensorInfo {
        TensorInfo::new(TensorType::UInt8, &[PAYLOAD_BYTES])
    }
}

impl<M: Model> Filter for TextGenFilter<M> {
    fn input_info(&self) -> TensorsInfo {
        TensorsInfo::new(vec![Self::payload_info()])
    }

    fn output_info(&self) -> TensorsInfo {
        TensorsInfo::new(vec![Self::payload_info()])
    }

    fn set_input_info(&mut self, _info: &TensorsInfo) -> Result<TensorsInfo, FilterError> {
        Err(FilterError::FixedDimensions)
    }

    fn allocate_before_invoke(&self) -> bool {
        true
    }

    fn invoke(
        &mut self,
        input: &[TensorData],
        output: &mut [TensorData],
    ) -> Result<(), FilterError> {
        let payload = check_frame(input, "input")?;
        check_frame(output, "output")?;

        let payload = payload_text(payload.bytes());
        let rendered = self.template.render(&payload);
        log::debug!("prompt: {rendered:?}");

        let transcript = self
            .generate(&rendered)
            .map_err(|err| FilterError::Invoke(Box::new(err)))?;

        let out = output[0].bytes_mut();
        let text = transcript.as_bytes();
        let copied = text.len().min(out.len());
        if copied < text.len() {
            log::warn!(
                "generated text ({} bytes) exceeds the output tensor, truncating",
                text.len()
            );
        }
        out[..copied].copy_from_slice(&text[..copied]);
        out[copied..].fill(0);

        Ok(())
    }
}

fn check_frame<'a>(
    frame: &'a [TensorData],
    direction: &str,
) -> Result<&'a TensorData, FilterError> {
    let [tensor] = frame else {
        return Err(FilterError::TensorCountMismatch {
            expected: 1,
            actual: frame.len(),
        });
    };
    if tensor.bytes().len() != PAYLOAD_BYTES {
        log::error!("{direction} buffer does not match the negotiated layout");
        return Err(FilterError::ShapeMismatch {
            expected: PAYLOAD_BYTES,
            actual: tensor.bytes().len(),
        });
    }
    Ok(tensor)
}

/// Register a factory for this filter with the process-wide registry under
/// [FILTER_NAME]. The host instantiates the filter when a pipeline asks for
/// it by name.
pub fn register<M, F>(make: F)
where
    M: Model + 'static,
    F: Fn() -> TextGenFilter<M> + Send + 'static,
{
    tensor_pipe::registry().register(FILTER_NAME, Box::new(move || Box::new(make())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    fn test_config() -> FilterConfig {
        FilterConfig {
            prompt_prefix: "<sys>".to_owned(),
            prompt_suffix: "</sys>".to_owned(),
            echo_prompt: false,
            seed: Some(7),
            ..FilterConfig::default()
        }
    }

    fn input_frame(text: &str) -> TensorData {
        let mut input = TensorData::new_zeroed(TensorInfo::new(TensorType::UInt8, &[PAYLOAD_BYTES]));
        input.bytes_mut()[..text.len()].copy_from_slice(text.as_bytes());
        input
    }

    #[test]
    fn reports_fixed_dimensions() {
        let filter = TextGenFilter::new(
            ScriptedModel::with_continuation("x", 2048),
            test_config(),
        );
        let info = filter.input_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info.tensors()[0].ty, TensorType::UInt8);
        assert_eq!(info.tensors()[0].byte_size(), PAYLOAD_BYTES);
        assert_eq!(filter.output_info(), info);
        assert!(filter.allocate_before_invoke());
    }

    #[test]
    fn rejects_imposed_dimensions() {
        let mut filter = TextGenFilter::new(
            ScriptedModel::with_continuation("x", 2048),
            test_config(),
        );
        let info = filter.input_info();
        assert!(matches!(
            filter.set_input_info(&info),
            Err(FilterError::FixedDimensions)
        ));
    }

    #[test]
    fn invoke_writes_the_generated_text() {
        let mut filter = TextGenFilter::new(
            ScriptedModel::with_continuation("All systems nominal.", 2048),
            test_config(),
        );
        let mut output = vec![TensorData::new_zeroed(
            filter.output_info().tensors()[0].clone(),
        )];

        filter
            .invoke(&[input_frame("Status report?")], &mut output)
            .unwrap();

        let text = payload_text(output[0].bytes());
        assert_eq!(text, "All systems nominal.");
        // The rest of the buffer stays NUL padding.
        assert!(output[0].bytes()[text.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn invoke_rejects_malformed_frames() {
        let mut filter = TextGenFilter::new(
            ScriptedModel::with_continuation("x", 2048),
            test_config(),
        );
        let mut output = vec![TensorData::new_zeroed(
            filter.output_info().tensors()[0].clone(),
        )];

        assert!(matches!(
            filter.invoke(&[], &mut output),
            Err(FilterError::TensorCountMismatch { .. })
        ));

        let short = TensorData::new_zeroed(TensorInfo::new(TensorType::UInt8, &[3]));
        assert!(matches!(
            filter.invoke(&[short], &mut output),
            Err(FilterError::ShapeMismatch { .. })
        ));
    }
}

//! Drives the filter exactly the way a pipeline host does: discover it in the
//! registry, query its frame layout, allocate buffers, and invoke it per
//! frame.

use tensor_pipe::{registry, Filter, TensorData, TensorType};
use textgen_filter::{
    payload_text, register, testing::ScriptedModel, FilterConfig, FILTER_NAME, PAYLOAD_BYTES,
};

fn host_config() -> FilterConfig {
    FilterConfig {
        prompt_prefix: "<|user|>".to_owned(),
        prompt_suffix: "<|end|>".to_owned(),
        echo_prompt: false,
        seed: Some(1234),
        ..FilterConfig::default()
    }
}

#[test]
fn full_host_flow() {
    register(|| {
        textgen_filter::TextGenFilter::new(
            ScriptedModel::with_continuation("Generated downstream text.", 2048),
            host_config(),
        )
    });

    assert!(registry()
        .names()
        .contains(&FILTER_NAME.to_owned()));

    let mut filter = registry().create(FILTER_NAME).unwrap();

    // Dimension negotiation.
    let input_info = filter.input_info();
    let output_info = filter.output_info();
    assert_eq!(input_info.len(), 1);
    assert_eq!(input_info.tensors()[0].ty, TensorType::UInt8);
    assert_eq!(input_info.tensors()[0].byte_size(), PAYLOAD_BYTES);
    assert!(filter.set_input_info(&input_info).is_err());

    // Buffer allocation, host-side.
    assert!(filter.allocate_before_invoke());
    let mut input = TensorData::new_zeroed(input_info.tensors()[0].clone());
    let prompt = b"What does the pipeline say?";
    input.bytes_mut()[..prompt.len()].copy_from_slice(prompt);
    let mut output = vec![TensorData::new_zeroed(output_info.tensors()[0].clone())];

    // One frame through the node.
    filter.invoke(&[input], &mut output).unwrap();
    assert_eq!(
        payload_text(output[0].bytes()),
        "Generated downstream text."
    );
}

#[test]
fn consecutive_frames_share_the_session() {
    let mut filter = textgen_filter::TextGenFilter::new(
        ScriptedModel::with_continuation("one two three four five six", 2048),
        host_config(),
    );

    let info = filter.output_info().tensors()[0].clone();
    let mut first_in = TensorData::new_zeroed(info.clone());
    first_in.bytes_mut()[..5].copy_from_slice(b"frame");
    let mut out = vec![TensorData::new_zeroed(info.clone())];

    filter.invoke(&[first_in.clone()], &mut out).unwrap();
    let first = payload_text(out[0].bytes());
    assert_eq!(first, "one two three four five six");

    // The script is spent and the context carries over, so the next frame
    // produces an immediate end of text and an empty payload.
    let mut out2 = vec![TensorData::new_zeroed(info)];
    filter.invoke(&[first_in], &mut out2).unwrap();
    assert_eq!(payload_text(out2[0].bytes()), "");
}

#[test]
fn context_exhaustion_recovers_with_partial_output() {
    // A window this small fills before the script completes; the filter must
    // still hand back the text produced so far and accept the next frame.
    let mut filter = textgen_filter::TextGenFilter::new(
        ScriptedModel::with_continuation("abcdefghijklmnopqrstuvwxyz", 24),
        host_config(),
    );

    let info = filter.output_info().tensors()[0].clone();
    let mut input = TensorData::new_zeroed(info.clone());
    input.bytes_mut()[..2].copy_from_slice(b"go");
    let mut out = vec![TensorData::new_zeroed(info.clone())];

    filter.invoke(&[input.clone()], &mut out).unwrap();
    let first = payload_text(out[0].bytes());
    assert!(!first.is_empty());
    assert!("abcdefghijklmnopqrstuvwxyz".starts_with(&first));

    // The session was reset; a second frame works against a fresh context.
    let mut out2 = vec![TensorData::new_zeroed(info)];
    filter.invoke(&[input], &mut out2).unwrap();
}

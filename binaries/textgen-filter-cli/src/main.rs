use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use is_terminal::IsTerminal;

use tensor_pipe::{registry, Filter as _, TensorData};
use textgen_filter::{
    payload_text, register, testing::ScriptedModel, Model, TextGenFilter, Tokenizer, FILTER_NAME,
    PAYLOAD_BYTES,
};

mod cli_args;
mod util;

use cli_args::Args;

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    color_eyre::install()?;

    let args = Args::parse();
    match args {
        Args::Invoke(args) => invoke(&args),
        Args::PromptTokens(args) => prompt_tokens(&args),
        Args::Filters => filters(),
    }
}

#[tracing::instrument(skip_all)]
fn invoke(args: &cli_args::Invoke) -> eyre::Result<()> {
    let payload = args.prompt_source.resolve()?;
    let config = args.generate.filter_config(!args.hide_prompt);

    let script = args.script.clone();
    register(move || {
        TextGenFilter::new(
            ScriptedModel::with_continuation(&script, 2048),
            config.clone(),
        )
    });

    // From here on, behave like the host: look the filter up by name,
    // negotiate the frame layout, allocate, invoke.
    let mut filter = registry().create(FILTER_NAME)?;

    let input_info = filter.input_info().tensors()[0].clone();
    let payload_bytes = payload.as_bytes();
    if payload_bytes.len() >= PAYLOAD_BYTES {
        eyre::bail!(
            "the prompt payload ({} bytes) does not fit the input tensor ({} bytes including the terminator)",
            payload_bytes.len(),
            PAYLOAD_BYTES
        );
    }
    let mut input = TensorData::new_zeroed(input_info);
    input.bytes_mut()[..payload_bytes.len()].copy_from_slice(payload_bytes);

    let mut output: Vec<TensorData> = filter
        .output_info()
        .tensors()
        .iter()
        .cloned()
        .map(TensorData::new_zeroed)
        .collect();

    let start = std::time::Instant::now();
    filter
        .invoke(&[input], &mut output)
        .wrap_err("the filter failed to process the frame")?;

    println!();
    println!("=== output tensor ===");
    println!("{}", payload_text(output[0].bytes()));

    if args.stats {
        println!();
        println!("frame time: {:.2?}", start.elapsed());
    }

    Ok(())
}

fn prompt_tokens(args: &cli_args::PromptTokens) -> eyre::Result<()> {
    let payload = args.prompt_source.resolve()?;
    let config = args.generate.filter_config(true);
    let rendered = config.template().render(&payload);

    let tokens = match &args.tokenizer_file {
        Some(path) => Tokenizer::from_huggingface_file(path)?.tokenize(&rendered)?,
        None => ScriptedModel::with_continuation("", 2048)
            .tokenizer()
            .tokenize(&rendered)?,
    };

    if args.json {
        let dump: Vec<_> = tokens
            .iter()
            .map(|(bytes, id)| {
                serde_json::json!({
                    "id": id,
                    "piece": String::from_utf8_lossy(bytes),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    log::info!("=== Dumping prompt tokens:");
    log::info!(
        "{}",
        tokens
            .iter()
            .map(|(_, id)| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    log::info!(
        "{}",
        tokens
            .iter()
            .map(|(bytes, id)| format!("{:?}:{id}", String::from_utf8_lossy(bytes)))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(())
}

fn filters() -> eyre::Result<()> {
    register(|| {
        TextGenFilter::new(
            ScriptedModel::with_continuation("", 2048),
            Default::default(),
        )
    });

    for name in registry().names() {
        println!("{name}");
    }
    Ok(())
}

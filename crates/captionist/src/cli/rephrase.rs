//! The `captionist rephrase` and `captionist tones` commands.
//!
//! Rephrasing only needs the LLM provider, so no ONNX models are loaded.

use clap::Args;
use captionist_core::llm::{LlmProviderFactory, RephraseOptions, ToneRephraser};
use captionist_core::Config;

/// Arguments for the `rephrase` command.
#[derive(Args, Debug, Clone)]
pub struct RephraseArgs {
    /// Tone to rewrite in (see `captionist tones`)
    #[arg(short, long)]
    pub tone: String,

    /// Caption text to rewrite
    #[arg(required = true, num_args = 1..)]
    pub caption: Vec<String>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the rephrase command.
pub async fn execute(args: RephraseArgs, config: Config) -> anyhow::Result<()> {
    let provider = LlmProviderFactory::create_checked(&config.llm, &config.limits).await?;
    let rephraser = ToneRephraser::new(
        provider,
        config.llm.tones.clone(),
        RephraseOptions::from_config(&config),
    );

    let caption = args.caption.join(" ");
    let rephrased = rephraser.rephrase(&caption, &args.tone).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rephrased)?);
    } else {
        println!("{}", rephrased.text);
    }
    tracing::debug!(
        "Rephrased via {} in {}ms",
        rephrased.model,
        rephrased.latency_ms
    );
    Ok(())
}

/// Print the configured tones, one per line.
pub fn list_tones(config: &Config) -> anyhow::Result<()> {
    for tone in &config.llm.tones {
        println!("{tone}");
    }
    Ok(())
}

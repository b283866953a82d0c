//! Command implementations.

pub mod caption;
pub mod config;
pub mod interactive;
pub mod models;
pub mod rephrase;

use anyhow::Context;
use captionist_core::{CaptionPipeline, Config};

/// Load every model and the LLM provider, with a spinner while it happens.
///
/// Runs once per process; any failure here is fatal.
pub async fn build_pipeline(config: &Config) -> anyhow::Result<CaptionPipeline> {
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_style(
        indicatif::ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
    );
    spinner.set_message("Loading caption and hashtag models...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = CaptionPipeline::from_config(config).await;
    spinner.finish_and_clear();

    result.context("Failed to start the caption pipeline")
}

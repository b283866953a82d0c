//! The `captionist caption` command.

use std::fs::File;
use std::io::{BufWriter, IsTerminal, Write};
use std::path::PathBuf;

use clap::Args;
use captionist_core::output::{hashtag_line, CaptionRecord, OutputFormat, OutputWriter};
use captionist_core::{CaptionPipeline, Config};

/// Arguments for the `caption` command.
#[derive(Args, Debug, Clone)]
pub struct CaptionArgs {
    /// Images to caption (defaults to the configured sample image)
    pub images: Vec<PathBuf>,

    /// Also rewrite each caption in this tone
    #[arg(short, long)]
    pub tone: Option<String>,

    /// Write records to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Record format: json (object for one image, array for several) or jsonl
    #[arg(short, long, value_parser = parse_format, default_value = "json")]
    pub format: OutputFormat,
}

fn parse_format(value: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(value).ok_or_else(|| format!("unknown format '{value}' (expected json or jsonl)"))
}

/// Execute the caption command.
pub async fn execute(args: CaptionArgs, config: Config) -> anyhow::Result<()> {
    let pipeline = super::build_pipeline(&config).await?;

    if let Some(tone) = &args.tone {
        if !pipeline.tones().iter().any(|t| t.eq_ignore_ascii_case(tone)) {
            anyhow::bail!(
                "Unknown tone '{tone}'. Available tones: {}",
                pipeline.tones().join(", ")
            );
        }
    }

    let inputs = if args.images.is_empty() {
        vec![pipeline.sample_image().to_path_buf()]
    } else {
        args.images.clone()
    };

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    // Pretty JSON only when a person is reading it.
    let pretty = args.output.is_none() && std::io::stdout().is_terminal();
    let mut writer = OutputWriter::new(sink, args.format, pretty);

    let progress = (inputs.len() > 1).then(|| create_progress_bar(inputs.len() as u64));
    let mut failed = 0usize;

    for path in &inputs {
        if let Some(pb) = &progress {
            pb.set_message(path.display().to_string());
        }

        match caption_one(&pipeline, path, args.tone.as_deref()).await {
            Ok(record) => {
                tracing::info!(
                    "{}: {} [{}]",
                    record.image.file_name,
                    record.image.caption,
                    hashtag_line(&record.image.hashtags)
                );
                writer.write(record)?;
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Failed to caption {:?}: {e}", path);
            }
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let written = writer.records_written();
    writer.finish()?;

    if let Some(path) = &args.output {
        tracing::info!("Wrote {} record(s) to {:?}", written, path);
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} image(s) failed", inputs.len());
    }
    Ok(())
}

/// Caption one image; a failed rephrase is recorded, not returned.
async fn caption_one(
    pipeline: &CaptionPipeline,
    path: &std::path::Path,
    tone: Option<&str>,
) -> captionist_core::Result<CaptionRecord> {
    let image = pipeline.process(path).await?;
    let mut record = CaptionRecord::new(image);

    if let Some(tone) = tone {
        match pipeline.rephrase(&record.image.caption, tone).await {
            Ok(rephrased) => record.rephrased = Some(rephrased),
            Err(e) => {
                tracing::warn!("Rephrase failed for {}: {e}", record.image.file_name);
                record.rephrase_error = Some(e.to_string());
            }
        }
    }

    Ok(record)
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CaptionArgs,
    }

    #[test]
    fn format_flag_accepts_aliases() {
        let parsed = Harness::try_parse_from(["captionist", "-f", "JSONL", "cat.jpg"]).unwrap();
        assert_eq!(parsed.args.format, OutputFormat::JsonLines);
        assert_eq!(parsed.args.images, vec![PathBuf::from("cat.jpg")]);

        let parsed = Harness::try_parse_from(["captionist", "--format", "ndjson"]).unwrap();
        assert_eq!(parsed.args.format, OutputFormat::JsonLines);
    }

    #[test]
    fn format_defaults_to_json() {
        let parsed = Harness::try_parse_from(["captionist"]).unwrap();
        assert_eq!(parsed.args.format, OutputFormat::Json);
        assert!(parsed.args.images.is_empty());
    }

    #[test]
    fn unknown_format_rejected() {
        let err = Harness::try_parse_from(["captionist", "-f", "csv"]).err().unwrap();
        assert!(err.to_string().contains("csv"));
    }
}

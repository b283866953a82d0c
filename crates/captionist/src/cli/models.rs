//! The `captionist models` command for managing ONNX models.
//!
//! Downloads the default caption encoder-decoder and sentence encoder exports
//! from Hugging Face into `{model_dir}/{name}/`.

use std::path::Path;

use clap::{Args, Subcommand};
use captionist_core::caption::OnnxCaptioner;
use captionist_core::hashtags::hashtag_model_exists;
use captionist_core::pipeline::Hasher;
use captionist_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download the caption model and the hashtag sentence encoder
    Download,

    /// List installed models
    List,

    /// Show model directory path
    Path,
}

/// One file of a downloadable model.
struct RemoteFile {
    remote_path: &'static str,
    local_name: &'static str,
    /// Expected BLAKE3 hash, when pinned
    blake3: Option<&'static str>,
}

/// A model repository and the files Captionist needs from it.
struct ModelSource {
    /// Local directory name; matches the config's default model name
    name: &'static str,
    label: &'static str,
    repo: &'static str,
    files: &'static [RemoteFile],
}

const CAPTION_MODEL: ModelSource = ModelSource {
    name: "vit-gpt2-image-captioning",
    label: "Caption model (ViT-GPT2)",
    repo: "Xenova/vit-gpt2-image-captioning",
    files: &[
        RemoteFile {
            remote_path: "onnx/encoder_model.onnx",
            local_name: "encoder_model.onnx",
            blake3: None,
        },
        RemoteFile {
            remote_path: "onnx/decoder_model.onnx",
            local_name: "decoder_model.onnx",
            blake3: None,
        },
        RemoteFile {
            remote_path: "tokenizer.json",
            local_name: "tokenizer.json",
            blake3: None,
        },
    ],
};

const HASHTAG_MODEL: ModelSource = ModelSource {
    name: "all-MiniLM-L6-v2",
    label: "Sentence encoder (MiniLM)",
    repo: "Xenova/all-MiniLM-L6-v2",
    files: &[
        RemoteFile {
            remote_path: "onnx/model.onnx",
            local_name: "model.onnx",
            blake3: None,
        },
        RemoteFile {
            remote_path: "tokenizer.json",
            local_name: "tokenizer.json",
            blake3: None,
        },
    ],
};

/// Status of the configured models on disk.
pub struct InstalledModels {
    pub caption: bool,
    pub hashtags: bool,
}

impl InstalledModels {
    /// True when the ONNX caption backend and the hashtag encoder can both load.
    pub fn can_process(&self) -> bool {
        self.caption && self.hashtags
    }
}

/// Check which of the configured models are installed.
pub fn check_installed(config: &Config) -> InstalledModels {
    let model_dir = config.model_dir();
    InstalledModels {
        caption: OnnxCaptioner::model_exists(&config.caption, &model_dir),
        hashtags: hashtag_model_exists(&config.hashtags, &model_dir),
    }
}

/// Download both default models. Files already on disk are skipped.
pub async fn download_all(config: &Config) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let model_dir = config.model_dir();

    for source in [&CAPTION_MODEL, &HASHTAG_MODEL] {
        download_model(&client, source, &model_dir).await?;
    }

    if config.caption.model != CAPTION_MODEL.name || config.hashtags.model != HASHTAG_MODEL.name {
        tracing::warn!(
            "Config names custom models ({}, {}); only the defaults are downloadable here",
            config.caption.model,
            config.hashtags.model
        );
    }
    Ok(())
}

async fn download_model(
    client: &reqwest::Client,
    source: &ModelSource,
    model_dir: &Path,
) -> anyhow::Result<()> {
    let dir = model_dir.join(source.name);
    std::fs::create_dir_all(&dir)?;

    for file in source.files {
        let dest = dir.join(file.local_name);
        if dest.exists() {
            tracing::info!("{} already exists at {:?}", file.local_name, dest);
            continue;
        }

        let url = format!(
            "https://huggingface.co/{}/resolve/main/{}",
            source.repo, file.remote_path
        );
        tracing::info!("Downloading {} ({})...", source.label, file.local_name);
        tracing::debug!("  Source: {}", url);
        download_file(client, &url, &dest, file.blake3).await?;

        let file_size = std::fs::metadata(&dest)?.len();
        tracing::info!(
            "  {} complete ({:.1} MB)",
            file.local_name,
            file_size as f64 / (1024.0 * 1024.0)
        );
    }
    Ok(())
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download => {
            download_all(&config).await?;
            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();
            let status = check_installed(&config);
            let label = |ready: bool| if ready { "ready" } else { "not installed" };

            println!("Models in {}:\n", model_dir.display());
            println!("  {:32} {}", config.caption.model, label(status.caption));
            println!("  {:32} {}", config.hashtags.model, label(status.hashtags));

            if !status.can_process() {
                println!("\nRun `captionist models download` to fetch missing models.");
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.model_dir().display());
        }
    }

    Ok(())
}

/// Stream a file to disk with a progress bar.
///
/// A partially written file is removed on failure so the next run retries it.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_blake3: Option<&str>,
) -> anyhow::Result<()> {
    let result = stream_to_file(client, url, dest).await;
    if result.is_err() {
        let _ = std::fs::remove_file(dest);
    }
    result?;

    match expected_blake3 {
        Some(expected) => verify_blake3(dest, expected),
        None => {
            let actual = Hasher::content_hash(dest)?;
            tracing::debug!("  BLAKE3 {}", actual);
            Ok(())
        }
    }
}

async fn stream_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let pb = match response.content_length() {
        Some(total) => {
            let pb = indicatif::ProgressBar::new(total);
            pb.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("  [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        }
        None => indicatif::ProgressBar::new_spinner(),
    };

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    pb.finish_and_clear();
    Ok(())
}

/// Verify a downloaded file's BLAKE3 checksum.
///
/// On mismatch, removes the corrupt file so the next run re-downloads.
fn verify_blake3(path: &Path, expected: &str) -> anyhow::Result<()> {
    let actual = Hasher::content_hash(path)
        .map_err(|e| anyhow::anyhow!("Checksum computation failed for {}: {e}", path.display()))?;

    if actual != expected {
        let _ = std::fs::remove_file(path);
        anyhow::bail!(
            "Checksum mismatch for {}:\n  expected: {}\n  actual:   {}\n\
             Corrupt file removed, try downloading again.",
            path.display(),
            expected,
            actual
        );
    }

    tracing::debug!("  Checksum verified: {}", &actual[..16]);
    Ok(())
}

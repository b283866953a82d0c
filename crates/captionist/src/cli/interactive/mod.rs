//! Interactive session for bare `captionist` invocation on a terminal.
//!
//! Models are loaded once, then the user loads images, reads the caption and
//! hashtags, and asks for tone rewrites as often as they like. The same image
//! loaded twice is answered from the session cache.

pub mod theme;

use std::path::PathBuf;
use std::sync::Arc;

use console::Style;
use dialoguer::{Input, Select};
use captionist_core::output::hashtag_line;
use captionist_core::llm::LlmProviderFactory;
use captionist_core::{CaptionSession, Config, ProcessedImage};

use crate::cli::models::{check_installed, download_all};

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Clone, Copy)]
enum MenuItem {
    LoadImage,
    LoadSample,
    Rephrase,
    Clear,
    ShowConfig,
    Exit,
}

const MENU: &[(&str, MenuItem)] = &[
    ("Caption an image", MenuItem::LoadImage),
    ("Caption the sample image", MenuItem::LoadSample),
    ("Rephrase the caption", MenuItem::Rephrase),
    ("Clear the current image", MenuItem::Clear),
    ("Show configuration", MenuItem::ShowConfig),
    ("Exit", MenuItem::Exit),
];

/// Entry point for interactive mode.
pub async fn run(config: Config) -> anyhow::Result<()> {
    theme::print_banner();
    let theme = theme::captionist_theme();

    check_credentials(&config)?;
    if !ensure_models(&config, &theme).await? {
        return Ok(());
    }

    let pipeline = Arc::new(super::build_pipeline(&config).await?);
    let mut session = CaptionSession::new(pipeline);
    let labels: Vec<&str> = MENU.iter().map(|(label, _)| *label).collect();

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact_opt()?;

        let Some(index) = selection else { break };
        match MENU[index].1 {
            MenuItem::LoadImage => {
                let Some(raw) = handle_interrupt(
                    Input::<String>::with_theme(&theme)
                        .with_prompt("Path to image")
                        .interact_text(),
                )?
                else {
                    continue;
                };
                let path = PathBuf::from(shellexpand::tilde(raw.trim()).into_owned());
                load_and_show(&mut session, &path).await;
            }
            MenuItem::LoadSample => {
                let path = session.pipeline().sample_image().to_path_buf();
                load_and_show(&mut session, &path).await;
            }
            MenuItem::Rephrase => rephrase(&session, &theme).await?,
            MenuItem::Clear => {
                session.clear();
                let dim = Style::new().for_stderr().dim();
                eprintln!("  {}\n", dim.apply_to("Cleared."));
            }
            MenuItem::ShowConfig => show_config(&config),
            MenuItem::Exit => break,
        }
    }

    Ok(())
}

/// Resolve the LLM credential before anything is downloaded or loaded.
fn check_credentials(config: &Config) -> anyhow::Result<()> {
    LlmProviderFactory::create(&config.llm, &config.limits)?;
    Ok(())
}

/// Offer to download missing models. Returns false if the user declines.
async fn ensure_models(
    config: &Config,
    theme: &dialoguer::theme::ColorfulTheme,
) -> anyhow::Result<bool> {
    if config.caption.backend != captionist_core::config::CaptionBackend::Onnx
        || check_installed(config).can_process()
    {
        return Ok(true);
    }

    let warn = Style::new().for_stderr().yellow();
    eprintln!("  {}", warn.apply_to("Required models are not installed."));

    let install = handle_interrupt(
        dialoguer::Confirm::with_theme(theme)
            .with_prompt("Download them now?")
            .default(true)
            .interact(),
    )?;
    if install != Some(true) {
        return Ok(false);
    }
    download_all(config).await?;
    Ok(true)
}

async fn load_and_show(session: &mut CaptionSession, path: &std::path::Path) {
    let loaded = session.load_path(path).await.map(|result| result.clone());
    match loaded {
        Ok(result) => print_result(&result),
        Err(e) => {
            let err = Style::new().for_stderr().red();
            eprintln!("  {} {e}", err.apply_to("✗"));
            if let Some(current) = session.current() {
                let dim = Style::new().for_stderr().dim();
                eprintln!(
                    "  {}",
                    dim.apply_to(format!("Still showing {}", current.file_name))
                );
            }
            eprintln!();
        }
    }
}

fn print_result(result: &ProcessedImage) {
    let label = Style::new().for_stderr().bold();
    let cyan = Style::new().for_stderr().cyan();
    let dim = Style::new().for_stderr().dim();

    eprintln!();
    eprintln!(
        "  {}",
        dim.apply_to(format!(
            "{} ({}x{}, {})",
            result.file_name, result.width, result.height, result.format
        ))
    );
    eprintln!("  {:<10} {}", label.apply_to("Caption:"), result.caption);
    eprintln!(
        "  {:<10} {}",
        label.apply_to("Hashtags:"),
        cyan.apply_to(hashtag_line(&result.hashtags))
    );
    eprintln!();
}

async fn rephrase(
    session: &CaptionSession,
    theme: &dialoguer::theme::ColorfulTheme,
) -> anyhow::Result<()> {
    let warn = Style::new().for_stderr().yellow();
    if session.current().is_none() {
        eprintln!("  {}\n", warn.apply_to("Caption an image first."));
        return Ok(());
    }

    let tones = session.pipeline().tones().to_vec();
    let Some(choice) = Select::with_theme(theme)
        .with_prompt("Tone")
        .items(&tones)
        .default(0)
        .interact_opt()?
    else {
        return Ok(());
    };

    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_message(format!("Rewriting in a {} tone...", tones[choice]));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    let result = session.rephrase(&tones[choice]).await;
    spinner.finish_and_clear();

    match result {
        Ok(rephrased) => {
            let label = Style::new().for_stderr().bold();
            eprintln!();
            eprintln!(
                "  {:<10} {}",
                label.apply_to(format!("{}:", rephrased.tone)),
                rephrased.text
            );
            eprintln!();
        }
        Err(e) => {
            // The caption and hashtags stay as they were; the user can retry.
            eprintln!("  {} {e}\n", warn.apply_to("Rephrase failed:"));
        }
    }
    Ok(())
}

fn show_config(config: &Config) {
    let label = Style::new().for_stderr().bold();

    eprintln!();
    let rows = [
        ("Model dir:", config.model_dir().display().to_string()),
        (
            "Caption:",
            format!(
                "{} ({:?}, max {} tokens)",
                config.caption.model, config.caption.backend, config.caption.max_tokens
            ),
        ),
        (
            "Hashtags:",
            format!("{} (top {})", config.hashtags.model, config.hashtags.top_k),
        ),
        (
            "Rephrase:",
            format!("{} via {}", config.llm.model, config.llm.provider),
        ),
        ("Tones:", config.llm.tones.join(", ")),
        ("Sample image:", config.sample_image().display().to_string()),
    ];
    for (name, value) in rows {
        eprintln!("    {:<16} {}", label.apply_to(name), value);
    }
    eprintln!();
}

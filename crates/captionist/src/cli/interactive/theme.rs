//! Dialoguer theme and banner for interactive mode.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

/// `ColorfulTheme` with Captionist's colors. Everything renders to stderr.
pub fn captionist_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().magenta(),
        prompt_style: Style::new().for_stderr().bold(),
        prompt_suffix: style("›".to_string()).for_stderr().bright().black(),
        active_item_prefix: style("▸".to_string()).for_stderr().magenta(),
        active_item_style: Style::new().for_stderr().magenta(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        success_suffix: style("·".to_string()).for_stderr().bright().black(),
        error_prefix: style("✗".to_string()).for_stderr().red(),
        error_style: Style::new().for_stderr().red(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

/// Print the version banner to stderr.
pub fn print_banner() {
    let version_line = format!("Captionist v{}", captionist_core::VERSION);
    let tagline = "Captions, hashtags and tone rewrites";
    let inner_width = tagline.len() + 4;

    let magenta = Style::new().for_stderr().magenta();

    eprintln!();
    eprintln!("{}", magenta.apply_to(format!("  ╔{:═<inner_width$}╗", "")));
    eprintln!("{}", magenta.apply_to(format!("  ║{version_line:^inner_width$}║")));
    eprintln!("{}", magenta.apply_to(format!("  ║{tagline:^inner_width$}║")));
    eprintln!("{}", magenta.apply_to(format!("  ╚{:═<inner_width$}╝", "")));
    eprintln!();
}

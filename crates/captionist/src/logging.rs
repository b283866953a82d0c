//! Logging initialization.
//!
//! Logs go to stderr so stdout stays clean for JSON records.
//! `RUST_LOG` overrides both the config level and `--verbose`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directive for a base `level`.
///
/// `verbose` raises Captionist's own crates to DEBUG without lowering them
/// when the base level is already TRACE.
fn filter_directive(level: &str, verbose: bool) -> String {
    let level = level.to_ascii_lowercase();
    if verbose && level != "trace" {
        format!("{level},captionist=debug,captionist_core=debug")
    } else {
        level
    }
}

/// Install the global subscriber.
///
/// `json_format` switches from the human layout to one JSON object per event.
pub fn init(level: &str, verbose: bool, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level, verbose)));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Install the subscriber using the `[logging]` section, with CLI overrides.
pub fn init_from_config(
    config: &captionist_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let json_format = json_logs_override || config.logging.format == "json";
    init(&config.logging.level, verbose_override, json_format);
}

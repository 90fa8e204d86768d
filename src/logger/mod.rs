//! Logging setup on top of `tracing-subscriber`.
//!
//! Console output with optional colors and a plain file output in the
//! full, compact or JSON format. `RUST_LOG` style directives are accepted
//! as the level.

pub mod config;

pub use config::*;

use std::fs::{self, File, OpenOptions};
use std::io::IsTerminal;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Fails if called twice.
pub fn init_logger(config: LoggerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let use_ansi = config.console.colored && std::io::stdout().is_terminal();

    let console_enabled = config.console.enabled;
    // Generic over the subscriber so each match arm gets its own layer type.
    fn console_layer<S>(enabled: bool, use_ansi: bool) -> Option<fmt::Layer<S>> {
        enabled.then(|| fmt::layer().with_ansi(use_ansi).with_target(true).with_level(true))
    }

    let file = if config.file.enabled {
        Some(open_log_file(&config.file)?)
    } else {
        None
    };

    // The file layer goes first so console ANSI settings do not leak into it.
    // https://github.com/tokio-rs/tracing/issues/1817
    let registry = tracing_subscriber::registry().with(filter);
    match (file, config.file.format) {
        (Some(file), LogFormat::Full) => registry
            .with(fmt::layer().with_ansi(false).with_target(true).with_writer(Mutex::new(file)))
            .with(console_layer(console_enabled, use_ansi))
            .try_init()?,
        (Some(file), LogFormat::Compact) => registry
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .compact()
                    .with_writer(Mutex::new(file)),
            )
            .with(console_layer(console_enabled, use_ansi))
            .try_init()?,
        (Some(file), LogFormat::Json) => registry
            .with(fmt::layer().with_ansi(false).json().with_writer(Mutex::new(file)))
            .with(console_layer(console_enabled, use_ansi))
            .try_init()?,
        (None, _) => registry.with(console_layer(console_enabled, use_ansi)).try_init()?,
    }

    Ok(())
}

fn open_log_file(config: &FileConfig) -> anyhow::Result<File> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .write(true)
        .append(config.append)
        .truncate(!config.append)
        .open(&config.path)
        .with_context(|| format!("Failed to open log file {}", config.path.display()))
}

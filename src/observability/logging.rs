//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Pick the log level from `RUST_LOG`, the command line or the config
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - Human-readable fmt output; ANSI colours can be switched off

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging settings resolved from the command line and config.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Level used when `RUST_LOG` is not set.
    pub level: String,
    pub color: bool,
}

impl LogSettings {
    /// `--verbose` raises the configured level to debug.
    pub fn new(configured_level: &str, verbose: bool, color: bool) -> Self {
        let level = if verbose { "debug" } else { configured_level };
        Self {
            level: level.to_string(),
            color,
        }
    }

    /// Filter directives for this crate and the HTTP layers.
    pub fn directives(&self) -> String {
        format!("webcmd={level},tower_http={level}", level = self.level)
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_tracing(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(settings.color))
        .try_init();

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}

//! Logging setup

use lisa_core::{LisaError, LisaResult};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::LoggingConfig;

/// Used when neither `RUST_LOG` nor `[logging] filter` is set
pub const DEFAULT_LOG_FILTER: &str = "lisa_runtime=info,lisa_transport=info,lisa_bridge=info,warn";

/// Pick the filter directives: `RUST_LOG` wins, then config, then default.
pub fn log_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = config.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
        EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    })
}

/// Install the global subscriber. Output goes to stderr so stdout stays
/// free for the conversation log.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> LisaResult<()> {
    let filter = log_filter(config);

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| LisaError::Config(format!("logging: {}", e)))
}

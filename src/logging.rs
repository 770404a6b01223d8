use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once is harmless: later calls leave the first subscriber in place.
pub fn init_logging(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.use_json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_ansi(true))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

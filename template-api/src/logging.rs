use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::Config;

/// `RUST_LOG` wins when set; otherwise the configured `LOG_LEVEL` applies.
pub fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()))
}

/// Install the global subscriber: JSON lines in production, human-readable otherwise.
pub fn init(config: &Config) {
    let log_layer = {
        let base_layer = fmt::layer().with_target(true).with_level(true);

        if *config.log_json {
            base_layer
                .json()
                .flatten_event(true)
                .with_filter(env_filter(config))
                .boxed()
        } else {
            base_layer
                .with_ansi(true)
                .with_filter(env_filter(config))
                .boxed()
        }
    };

    tracing_subscriber::registry().with(log_layer).init();
}

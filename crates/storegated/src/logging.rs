//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_FILTER: &str = "storegated=info,storegate_api=info,storegate_gateway=info,\
                                  storegate_discovery=info,storegate_s3=info,tower_http=info";

fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config
            .filter
            .as_deref()
            .unwrap_or(DEFAULT_FILTER)
            .into()
    })
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(filter(config));

    match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}

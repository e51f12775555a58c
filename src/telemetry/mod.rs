use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::infrastructure::config::TelemetryConfig;

static TELEMETRY: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init(config: &TelemetryConfig) {
    TELEMETRY.get_or_init(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_filter));
        let registry = tracing_subscriber::registry().with(env_filter);
        if config.format == "pretty" {
            registry.with(tracing_subscriber::fmt::layer().pretty()).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        }
    });
}

//! Tracing setup

use studio_core::{StudioError, StudioResult};
use tracing_subscriber::EnvFilter;

use crate::LoggingConfig;

/// Environment variable holding the log filter (`EnvFilter` syntax)
pub const LOG_ENV: &str = "STUDIO_LOG";

const DEFAULT_FILTER: &str = "info";

fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> StudioResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| StudioError::Config(format!("logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_cleanly() {
        let config = LoggingConfig::default();
        // Either this test installs the subscriber or another one did first
        let _ = init_logging(&config);
        assert!(matches!(init_logging(&config), Err(StudioError::Config(_))));
    }
}

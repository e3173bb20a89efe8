//! Tracing subscriber setup for the `lb` binary.
//!
//! Log events go to stderr so stdout stays clean for JSON command output and
//! the scan progress stream. The filter comes from the resolved `log-level`
//! (`LB_LOG` > config.kdl > `warn`) and accepts any `EnvFilter` directive,
//! e.g. `logbook::scan=debug,warn`.

use crate::config::LogFormat;
use crate::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when the configured one cannot be parsed.
const FALLBACK_FILTER: &str = "warn";

/// Build the event filter for a configured level.
pub fn filter(level: &str) -> (EnvFilter, bool) {
    match EnvFilter::try_new(level) {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(FALLBACK_FILTER), false),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let (env_filter, valid) = filter(level);

    let layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to initialize logging: {}", e)))?;

    if !valid {
        tracing::warn!(level, "invalid log filter, falling back to {}", FALLBACK_FILTER);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_levels_and_directives() {
        assert!(filter("debug").1);
        assert!(filter("logbook::scan=trace,warn").1);
    }

    #[test]
    fn test_filter_falls_back_on_garbage() {
        let (_, valid) = filter("logbook=[[[");
        assert!(!valid);
    }
}

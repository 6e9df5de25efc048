//! Observability infrastructure: tracing and metrics.
//!
//! Logging goes through `tracing`; operation counters and durations go
//! through the `metrics` facade and are dropped unless the embedding
//! application installs a recorder.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `default_level` (e.g. "info")
/// applies. Safe to call more than once: later calls are ignored.
pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_level(true))
        .try_init();

    if result.is_ok() {
        metrics::register_core_metrics();
        tracing::debug!("Observability initialized (level: {})", default_level);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init("debug").is_ok());
        assert!(init("info").is_ok());
    }
}

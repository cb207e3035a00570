//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

const FALLBACK_FILTER: &str = "segue=info";

/// Install the global `fmt` subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `logging.filter` when set. A second call is a no-op.
pub fn init(settings: &LoggingSettings) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(settings))
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|e| {
            eprintln!(
                "segue: invalid log filter {:?}, using {FALLBACK_FILTER}: {e}",
                settings.filter
            );
            EnvFilter::new(FALLBACK_FILTER)
        })
}

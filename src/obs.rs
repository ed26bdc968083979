//! Logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Logs go to stderr so stdout carries only
/// the report. `RUST_LOG` wins over the defaults.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "table_probe=debug"
    } else {
        "table_probe=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

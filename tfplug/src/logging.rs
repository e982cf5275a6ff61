//! Logging setup for provider binaries
//!
//! Logs go to stderr. `RUST_LOG` controls filtering, e.g.
//! `RUST_LOG=tfplug::retry=trace,terraform_provider_aws=debug`.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber with an `info` default.
/// Does nothing if a subscriber is already installed.
pub fn init_logging() {
    let _ = try_init_logging("info");
}

/// Installs the global subscriber, using `default_level` when `RUST_LOG` is unset
pub fn try_init_logging(default_level: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

//! Logging setup for the command-line tool.
//!
//! Installs a global tracing subscriber writing to stderr, leaving stdout for
//! the JSON results.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize tracing. `RUST_LOG` takes precedence over `verbose`.
///
/// Subsequent calls are no-ops.
pub fn init(verbose: bool) -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter(verbose))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INSTALLED.set(());

    tracing::debug!("Logging initialized");
    Ok(())
}

fn build_env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "handsign=debug" } else { "handsign=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

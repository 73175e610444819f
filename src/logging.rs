//! Structured logging setup using tracing.
//!
//! `RUST_LOG` wins when set; otherwise the crate logs at `info`, or `debug`
//! in verbose mode. Logs go to stderr so that command output on stdout stays
//! machine-readable.

use crate::error::{AnonymizerError, AnonymizerResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default directive for the given verbosity.
pub fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("anonymiseur={}", level)
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(verbose: bool, json: bool) -> AnonymizerResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(verbose)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .map_err(|e| AnonymizerError::InvalidInput {
            parameter: "logging".to_string(),
            reason: format!("Failed to initialize logging: {}", e),
        })
}

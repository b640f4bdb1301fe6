//! Tracing subscriber setup for the binaries and tests.
//!
//! - WARN: retries, missed heartbeats, swallowed capture and storage errors
//! - INFO: connection established or lost, device state restored
//! - DEBUG: per-packet acknowledgments and state transitions
//! - TRACE: wire sizes and gate decisions per frame

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the output format (`json` or `text`).
pub const LOG_FORMAT_ENV: &str = "VOXLINK_LOG_FORMAT";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Human-readable output filtered by `RUST_LOG` (default `info`).
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(filter("info")).init();
}

/// JSON lines filtered by `RUST_LOG` (default `info`).
pub fn init_json() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter("info"))
        .init();
}

/// [`init_json`] when `VOXLINK_LOG_FORMAT=json`, otherwise [`init`].
pub fn init_from_env() {
    match std::env::var(LOG_FORMAT_ENV) {
        Ok(format) if format.eq_ignore_ascii_case("json") => init_json(),
        _ => init(),
    }
}

/// Capture output per test; safe to call more than once.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}

//! Core traits, constants, and error types.

pub mod constants;
mod error;
mod traits;

pub use error::*;
pub use traits::*;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in whole seconds since the Unix epoch, truncated to the
/// 32-bit wire timestamp.
pub fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

//! # Runtime Configuration Module
//!
//! Environment-driven settings for the coroutine runtime the dispatcher runs on.
//!
//! ## Environment Variables
//!
//! ### `BRRTD_STACK_SIZE`
//!
//! Stack size of every per-request worker coroutine. Accepts decimal
//! (`65536`) or hexadecimal (`0x10000`) values. Default: `0x10000` (64 KB).
//!
//! Memory cost is `stack_size × in-flight requests`; handlers with deep call
//! chains or large locals need more, simple handlers can run with `0x4000`.
//!
//! ```rust
//! use brrtdispatch::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.stack_size > 0);
//! ```

use std::env;

/// Environment variable overriding the worker coroutine stack size.
pub const STACK_SIZE_ENV: &str = "BRRTD_STACK_SIZE";

/// Default worker coroutine stack size (64 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for worker coroutines in bytes
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables, falling back to defaults
    /// for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var(STACK_SIZE_ENV)
            .ok()
            .and_then(|val| parse_size(&val))
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }
}

/// Parse a size given in decimal or `0x`-prefixed hexadecimal.
#[must_use]
pub fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

//! # Configuration Module
//!
//! [`DispatchConfig`] is what a host hands to the dispatcher: the response
//! deadline, the product name advertised in the `Server` header and the worker
//! coroutine stack size. It is read from YAML and can be overridden from the
//! environment:
//!
//! ```yaml
//! http:
//!   response_timeout_ms: 60000   # <= 0 disables the deadline
//!   server_name: BRRTDispatch
//! runtime:
//!   stack_size: 0x10000
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BRRTD_RESPONSE_TIMEOUT_MS` | `http.response_timeout_ms` |
//! | `BRRTD_SERVER_NAME` | `http.server_name` |
//! | `BRRTD_STACK_SIZE` | `runtime.stack_size` (decimal or `0x` hex) |

use crate::dispatcher::deadline;
use crate::runtime_config::{parse_size, DEFAULT_STACK_SIZE, STACK_SIZE_ENV};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const RESPONSE_TIMEOUT_ENV: &str = "BRRTD_RESPONSE_TIMEOUT_MS";
pub const SERVER_NAME_ENV: &str = "BRRTD_SERVER_NAME";

/// Default response deadline in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: i64 = 60_000;
/// Default product name of the `Server` header.
pub const DEFAULT_SERVER_NAME: &str = "BRRTDispatch";

/// Top-level dispatcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub http: HttpConfig,
    pub runtime: RuntimeSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request budget for chain + handler; non-positive disables it
    pub response_timeout_ms: i64,
    /// Product name advertised as `Server: <name>/<version>`
    pub server_name: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Worker coroutine stack size in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub stack_size: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Accept `stack_size: 65536` as well as `stack_size: 0x10000`.
fn deserialize_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(usize),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => parse_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid size `{s}`"))),
    }
}

impl DispatchConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for
    /// this structure.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), ?config, "Dispatch config loaded");
        Ok(config)
    }

    /// Parse configuration from YAML text; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML for this structure.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("invalid dispatch configuration")
    }

    /// Apply `BRRTD_*` environment overrides. Unparsable values are ignored
    /// with a warning.
    #[must_use]
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup(RESPONSE_TIMEOUT_ENV) {
            match val.trim().parse::<i64>() {
                Ok(ms) => self.http.response_timeout_ms = ms,
                Err(e) => warn!(var = RESPONSE_TIMEOUT_ENV, value = %val, error = %e, "Ignoring invalid override"),
            }
        }
        if let Some(val) = lookup(SERVER_NAME_ENV) {
            if val.trim().is_empty() {
                warn!(var = SERVER_NAME_ENV, "Ignoring empty override");
            } else {
                self.http.server_name = val.trim().to_string();
            }
        }
        if let Some(val) = lookup(STACK_SIZE_ENV) {
            match parse_size(&val) {
                Some(size) => self.runtime.stack_size = size,
                None => warn!(var = STACK_SIZE_ENV, value = %val, "Ignoring invalid override"),
            }
        }
        self
    }

    /// The response deadline, `None` when disabled.
    #[must_use]
    pub fn response_timeout(&self) -> Option<Duration> {
        deadline::normalize(self.http.response_timeout_ms)
    }

    /// Value of the `Server` response header.
    #[must_use]
    pub fn server_header(&self) -> String {
        format!("{}/{}", self.http.server_name, env!("CARGO_PKG_VERSION"))
    }
}

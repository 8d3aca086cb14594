// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process-wide operational settings handed to every UI replica at startup.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Debounce applied to persistence when none (or garbage) is configured.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;
/// Upper bound for a single request/reply round trip.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Operational settings; immutable for the lifetime of a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Quiet period before a local edit is persisted, in milliseconds.
    #[serde(default = "default_debounce", deserialize_with = "lenient_ms")]
    pub debounce: u64,
    /// Request/reply timeout in milliseconds.
    #[serde(default = "default_timeout", deserialize_with = "lenient_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_debounce() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

// Non-numeric or negative values fall back to the default instead of failing the load.
fn lenient<'de, D>(deserializer: D, fallback: u64) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_u64().unwrap_or(fallback))
}

fn lenient_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(deserializer, DEFAULT_DEBOUNCE_MS)
}

fn lenient_timeout<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(deserializer, DEFAULT_REQUEST_TIMEOUT_MS)
}

//! Digest configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default iteration budget for a single digest.
pub const DEFAULT_TTL: u32 = 10;

/// Tunables for a [`Scope`](crate::Scope).
///
/// Deserializes from a partial document; missing fields take their defaults.
/// `async_delay` is expressed in milliseconds.
///
/// ```rust,ignore
/// let config = DigestConfig::from_json(r#"{ "ttl": 20 }"#)?;
/// assert_eq!(config.async_delay, Duration::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// How many extra passes a digest may make before giving up on a
    /// non-converging watcher graph.
    pub ttl: u32,

    /// Delay handed to the scheduler for deferred digests.
    #[serde(
        rename = "async_delay_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub async_delay: Duration,
}

impl DigestConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_async_delay(mut self, delay: Duration) -> Self {
        self.async_delay = delay;
        self
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            async_delay: Duration::ZERO,
        }
    }
}

fn serialize_millis<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}

fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

//! Transport configuration and its application to the native agent config.
//!
//! # Design
//! `TransportConfig` is an immutable value; `configure` is a pure function
//! from (native builder, config) to native builder. Timeouts are applied
//! after whatever state the native builder was seeded with, so explicitly
//! configured timeouts always win.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use ureq::config::ConfigBuilder;
use ureq::typestate::AgentScope;

/// Largest timeout forwarded to the native layer (`i32::MAX` milliseconds).
pub const MAX_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Default upper bound on concurrently running streaming requests.
pub const DEFAULT_MAX_CONCURRENT_STREAMS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    #[serde(rename = "connect_timeout_ms", deserialize_with = "positive_millis")]
    pub connect_timeout: Option<Duration>,
    #[serde(rename = "read_timeout_ms", deserialize_with = "positive_millis")]
    pub read_timeout: Option<Duration>,
    pub max_concurrent_streams: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
        }
    }
}

/// Non-positive millisecond values mean "unset".
fn positive_millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<i64>::deserialize(deserializer)?;
    Ok(millis
        .filter(|ms| *ms > 0)
        .map(|ms| Duration::from_millis(ms as u64)))
}

/// The value actually handed to the native layer for a configured timeout.
///
/// `None` leaves the native default in place.
pub fn effective_timeout(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero()).map(|t| t.min(MAX_TIMEOUT))
}

/// Apply `config` on top of a (possibly pre-seeded) native config builder.
pub fn configure(
    native: ConfigBuilder<AgentScope>,
    config: &TransportConfig,
) -> ConfigBuilder<AgentScope> {
    // Status codes are interpreted by the client, never by the agent.
    let mut native = native.http_status_as_error(false);
    if let Some(timeout) = effective_timeout(config.connect_timeout) {
        native = native.timeout_connect(Some(timeout));
    }
    if let Some(timeout) = effective_timeout(config.read_timeout) {
        native = native
            .timeout_recv_response(Some(timeout))
            .timeout_recv_body(Some(timeout));
    }
    native
}

//! Builders producing configured clients.
//!
//! # Design
//! `UreqHttpClientBuilder` only accumulates a `TransportConfig` and an
//! optional pre-seeded native config builder. Nothing is applied until
//! `build`, which runs `config::configure` on top of the seeded state, so
//! timeouts set here override equivalent settings already in that state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ureq::config::ConfigBuilder;
use ureq::typestate::AgentScope;
use ureq::Agent;

use crate::client::{HttpClient, UreqHttpClient};
use crate::config::{self, TransportConfig};

/// Object-safe builder interface, as returned by a builder factory.
pub trait HttpClientBuilder: Send {
    fn connect_timeout(&self) -> Option<Duration>;

    fn read_timeout(&self) -> Option<Duration>;

    fn set_connect_timeout(&mut self, timeout: Duration) -> &mut dyn HttpClientBuilder;

    fn set_read_timeout(&mut self, timeout: Duration) -> &mut dyn HttpClientBuilder;

    fn build_client(self: Box<Self>) -> Arc<dyn HttpClient>;
}

#[derive(Default)]
pub struct UreqHttpClientBuilder {
    config: TransportConfig,
    native: Option<ConfigBuilder<AgentScope>>,
}

impl UreqHttpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: TransportConfig) -> Self {
        Self {
            config,
            native: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrent_streams(mut self, max: usize) -> Self {
        self.config.max_concurrent_streams = max;
        self
    }

    /// Seed the native agent configuration with options unknown to this
    /// builder. Timeouts configured here still take precedence.
    pub fn with_native_config(mut self, native: ConfigBuilder<AgentScope>) -> Self {
        self.native = Some(native);
        self
    }

    pub fn native_config(&self) -> Option<&ConfigBuilder<AgentScope>> {
        self.native.as_ref()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn build(self) -> UreqHttpClient {
        let base = self.native.unwrap_or_else(Agent::config_builder);
        let agent = config::configure(base, &self.config).build().new_agent();
        UreqHttpClient::new(agent, self.config.max_concurrent_streams)
    }
}

impl fmt::Debug for UreqHttpClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqHttpClientBuilder")
            .field("config", &self.config)
            .field("native", &self.native.is_some())
            .finish()
    }
}

impl HttpClientBuilder for UreqHttpClientBuilder {
    fn connect_timeout(&self) -> Option<Duration> {
        self.config.connect_timeout
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.config.read_timeout
    }

    fn set_connect_timeout(&mut self, timeout: Duration) -> &mut dyn HttpClientBuilder {
        self.config.connect_timeout = Some(timeout);
        self
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> &mut dyn HttpClientBuilder {
        self.config.read_timeout = Some(timeout);
        self
    }

    fn build_client(self: Box<Self>) -> Arc<dyn HttpClient> {
        Arc::new((*self).build())
    }
}

//! Process-wide builder factory registration.
//!
//! Callers obtain builders through `http_client_builder()` and never name the
//! concrete transport. The ureq factory is used until another one is
//! registered.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::builder::{HttpClientBuilder, UreqHttpClientBuilder};

/// Produces fresh, independent builders.
pub trait HttpClientBuilderFactory: Send + Sync {
    fn create(&self) -> Box<dyn HttpClientBuilder>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UreqHttpClientBuilderFactory;

impl HttpClientBuilderFactory for UreqHttpClientBuilderFactory {
    fn create(&self) -> Box<dyn HttpClientBuilder> {
        Box::new(UreqHttpClientBuilder::new())
    }
}

static FACTORY: RwLock<Option<Arc<dyn HttpClientBuilderFactory>>> = RwLock::new(None);

/// Replace the process-wide factory.
pub fn register_builder_factory(factory: Arc<dyn HttpClientBuilderFactory>) {
    debug!("registering HTTP client builder factory");
    *FACTORY.write() = Some(factory);
}

/// The currently registered factory.
pub fn builder_factory() -> Arc<dyn HttpClientBuilderFactory> {
    FACTORY
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(UreqHttpClientBuilderFactory))
}

/// A fresh builder from the registered factory.
pub fn http_client_builder() -> Box<dyn HttpClientBuilder> {
    builder_factory().create()
}

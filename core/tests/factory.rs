//! Process-wide factory registration.
//!
//! Kept in its own test binary: registering a factory changes global state
//! for every test in the process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use httpclient_core::{
    builder_factory, http_client_builder, register_builder_factory, HttpClientBuilder,
    HttpClientBuilderFactory, UreqHttpClientBuilder,
};

/// Counts builders and pre-sets a connect timeout on each.
struct CountingFactory {
    created: AtomicUsize,
}

impl HttpClientBuilderFactory for CountingFactory {
    fn create(&self) -> Box<dyn HttpClientBuilder> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(UreqHttpClientBuilder::new().with_connect_timeout(Duration::from_millis(1234)))
    }
}

#[test]
fn registered_factory_replaces_the_default() {
    let default_builder = http_client_builder();
    assert_eq!(default_builder.connect_timeout(), None);

    let factory = Arc::new(CountingFactory {
        created: AtomicUsize::new(0),
    });
    register_builder_factory(factory.clone());

    let mut first = http_client_builder();
    let second = builder_factory().create();
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    assert_eq!(second.connect_timeout(), Some(Duration::from_millis(1234)));

    first.set_connect_timeout(Duration::from_secs(1));
    assert_eq!(first.connect_timeout(), Some(Duration::from_secs(1)));
    assert_eq!(second.connect_timeout(), Some(Duration::from_millis(1234)));

    let _client = first.build_client();
}

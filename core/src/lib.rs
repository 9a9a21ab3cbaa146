//! Transport-agnostic HTTP client with Server-Sent Events support, backed by
//! `ureq`.
//!
//! # Overview
//! Callers describe requests with the plain-data types in `http`, obtain a
//! client through a builder (usually via the process-wide factory) and either
//! block on `HttpClient::execute` or start a background event stream with
//! `HttpClient::execute_sse`.
//!
//! # Design
//! - `translate` holds the pure conversions to and from native `http` types.
//! - `client` owns the `ureq::Agent`; streaming calls run on a lazily grown
//!   worker pool (`dispatch`).
//! - `stream` guarantees notification ordering (`Open`, events, optional
//!   `Error`, exactly one `Close`) and isolates the client from listener
//!   panics.
//! - Event framing belongs to a `ServerSentEventParser`;
//!   `DefaultServerSentEventParser` decodes standard `text/event-stream`.

pub mod builder;
pub mod client;
pub mod config;
mod dispatch;
pub mod error;
pub mod factory;
pub mod http;
pub mod sse;
mod stream;
pub mod translate;

pub use builder::{HttpClientBuilder, UreqHttpClientBuilder};
pub use client::{HttpClient, UreqHttpClient};
pub use config::TransportConfig;
pub use error::HttpError;
pub use factory::{
    builder_factory, http_client_builder, register_builder_factory, HttpClientBuilderFactory,
    UreqHttpClientBuilderFactory,
};
pub use http::{Headers, HttpMethod, HttpRequest, SuccessfulHttpResponse};
pub use sse::{
    ChannelListener, DefaultServerSentEventParser, ServerSentEvent, ServerSentEventListener,
    ServerSentEventParser, StreamEvent,
};

//! The executable client: blocking round-trips and background event streams
//! on top of a `ureq` agent.
//!
//! # Design
//! `UreqHttpClient` owns one `ureq::Agent` (and so one connection pool) and
//! one dispatcher for its whole lifetime. Both are shared by every request;
//! the client is `Send + Sync` and meant to be reused.
//!
//! A native response is owned by the call that produced it and dropped before
//! that call returns, on every path.
//!
//! The read timeout bounds how long the response head may take. Blocking
//! calls also apply it to the whole body. Event streams clear the body
//! deadline per request: ureq only offers a deadline for the complete body,
//! which would cut off a stream that is still delivering events.

use std::sync::Arc;

use tracing::debug;
use ureq::http::Response;
use ureq::{Agent, AsSendBody, Body};

use crate::dispatch::Dispatcher;
use crate::error::HttpError;
use crate::http::{HttpRequest, SuccessfulHttpResponse};
use crate::sse::{ServerSentEventListener, ServerSentEventParser};
use crate::stream;
use crate::translate::{self, NativeRequest};

/// Transport-agnostic HTTP client.
pub trait HttpClient: Send + Sync {
    /// Execute `request`, blocking until the whole body has been read.
    fn execute(&self, request: &HttpRequest) -> Result<SuccessfulHttpResponse, HttpError>;

    /// Start a streaming request and return immediately.
    ///
    /// Every outcome is delivered to `listener` on a background thread.
    fn execute_sse(
        &self,
        request: HttpRequest,
        parser: Arc<dyn ServerSentEventParser>,
        listener: Arc<dyn ServerSentEventListener>,
    );
}

/// `HttpClient` backed by a blocking `ureq` agent.
pub struct UreqHttpClient {
    agent: Agent,
    dispatcher: Dispatcher,
}

impl UreqHttpClient {
    pub(crate) fn new(agent: Agent, max_concurrent_streams: usize) -> Self {
        Self {
            agent,
            dispatcher: Dispatcher::new(max_concurrent_streams),
        }
    }

    /// Number of background threads currently serving streams.
    pub fn stream_workers(&self) -> usize {
        self.dispatcher.workers()
    }
}

/// Map a failure raised by the agent.
fn map_native_error(url: &str, err: ureq::Error) -> HttpError {
    match err {
        ureq::Error::Timeout(_) => HttpError::timeout(err),
        ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => HttpError::timeout(io),
        err => HttpError::transport(url, err),
    }
}

/// Whether the agent's body deadline applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyDeadline {
    Agent,
    Unbounded,
}

fn run<S: AsSendBody>(
    agent: &Agent,
    native: ureq::http::Request<S>,
    deadline: BodyDeadline,
) -> Result<Response<Body>, ureq::Error> {
    match deadline {
        BodyDeadline::Agent => agent.run(native),
        BodyDeadline::Unbounded => agent.run(
            agent
                .configure_request(native)
                .timeout_recv_body(None)
                .build(),
        ),
    }
}

fn send(
    agent: &Agent,
    request: &HttpRequest,
    deadline: BodyDeadline,
) -> Result<Response<Body>, HttpError> {
    let native: NativeRequest = translate::to_native_request(request)?;
    debug!(method = %request.method, url = %request.url, "dispatching request");
    let (parts, body) = native.into_parts();
    let sent = match body {
        Some(bytes) => run(agent, ureq::http::Request::from_parts(parts, bytes), deadline),
        None => run(agent, ureq::http::Request::from_parts(parts, ()), deadline),
    };
    sent.map_err(|e| map_native_error(&request.url, e))
}

fn execute_blocking(
    agent: &Agent,
    request: &HttpRequest,
) -> Result<SuccessfulHttpResponse, HttpError> {
    let mut response = send(agent, request, BodyDeadline::Agent)?;
    let status = response.status().as_u16();
    let headers = translate::headers_from_native(response.headers());

    // No size cap and no UTF-8 requirement: the caller gets whatever was sent.
    let body = if translate::has_body(request.method, status) {
        let bytes = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| map_native_error(&request.url, e))?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        None
    };
    drop(response);

    debug!(url = %request.url, status, "request completed");
    translate::into_response(status, headers, body)
}

fn execute_streaming(
    agent: &Agent,
    request: &HttpRequest,
    parser: &dyn ServerSentEventParser,
    listener: &dyn ServerSentEventListener,
) {
    let response = match send(agent, request, BodyDeadline::Unbounded) {
        Ok(response) => response,
        Err(error) => return stream::deliver_failure(error, listener),
    };

    let status = response.status().as_u16();
    let headers = translate::headers_from_native(response.headers());
    let body = translate::has_body(request.method, status)
        .then(|| response.into_body().into_reader());

    stream::deliver_response(&request.url, status, headers, body, parser, listener);
}

impl HttpClient for UreqHttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<SuccessfulHttpResponse, HttpError> {
        execute_blocking(&self.agent, request)
    }

    fn execute_sse(
        &self,
        request: HttpRequest,
        parser: Arc<dyn ServerSentEventParser>,
        listener: Arc<dyn ServerSentEventListener>,
    ) {
        let agent = self.agent.clone();
        self.dispatcher.submit(move || {
            execute_streaming(&agent, &request, parser.as_ref(), listener.as_ref());
        });
    }
}

//! Drives one streaming response through a parser and reports its lifecycle
//! to a listener.
//!
//! # Design
//! Notifications follow one of two shapes:
//! - `Error` alone, when no 2xx response was obtained;
//! - `Open`, any number of `Event`s, at most one `Error`, then exactly one
//!   `Close`.
//!
//! Every listener call goes through `GuardedListener`, which catches and
//! logs panics so a misbehaving listener can neither skip `Close` nor take
//! down the dispatcher thread. The body reader is owned here and dropped on
//! return, whichever branch was taken.

use std::any::Any;
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::{HttpError, NO_RESPONSE_BODY};
use crate::http::{Headers, SuccessfulHttpResponse};
use crate::sse::{ServerSentEvent, ServerSentEventListener, ServerSentEventParser};
use crate::translate::is_success;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Listener wrapper that discards panics raised by the wrapped listener.
pub(crate) struct GuardedListener<'a> {
    inner: &'a dyn ServerSentEventListener,
}

impl<'a> GuardedListener<'a> {
    pub(crate) fn new(inner: &'a dyn ServerSentEventListener) -> Self {
        Self { inner }
    }

    fn guard(&self, callback: &str, f: impl FnOnce()) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
            warn!(
                callback,
                panic = panic_message(payload.as_ref()),
                "listener panicked, ignoring"
            );
        }
    }
}

impl ServerSentEventListener for GuardedListener<'_> {
    fn on_open(&self, response: SuccessfulHttpResponse) {
        self.guard("on_open", || self.inner.on_open(response));
    }

    fn on_event(&self, event: ServerSentEvent) {
        self.guard("on_event", || self.inner.on_event(event));
    }

    fn on_error(&self, error: HttpError) {
        self.guard("on_error", || self.inner.on_error(error));
    }

    fn on_close(&self) {
        self.guard("on_close", || self.inner.on_close());
    }
}

/// Report a failure that happened before any response was received.
pub(crate) fn deliver_failure(error: HttpError, listener: &dyn ServerSentEventListener) {
    debug!(%error, "streaming request failed before a response");
    GuardedListener::new(listener).on_error(error);
}

/// Handle a received response: status check, open, parse, close.
///
/// `body` is `None` when the response carries no readable stream.
pub(crate) fn deliver_response<R: Read>(
    url: &str,
    status: u16,
    headers: Headers,
    body: Option<R>,
    parser: &dyn ServerSentEventParser,
    listener: &dyn ServerSentEventListener,
) {
    let listener = GuardedListener::new(listener);

    if !is_success(status) {
        let body = body
            .map(read_error_body)
            .unwrap_or_else(|| NO_RESPONSE_BODY.to_string());
        debug!(url, status, "streaming request rejected");
        listener.on_error(HttpError::HttpStatus { status, body });
        return;
    }

    listener.on_open(SuccessfulHttpResponse {
        status,
        headers,
        body: None,
    });
    debug!(url, status, "event stream opened");

    match body {
        None => listener.on_error(HttpError::MissingBody {
            url: url.to_string(),
        }),
        Some(mut body) => {
            let parsed = catch_unwind(AssertUnwindSafe(|| parser.parse(&mut body, &listener)));
            match parsed {
                Ok(Ok(())) => {}
                Ok(Err(error)) => listener.on_error(error),
                Err(payload) => listener.on_error(HttpError::Parse(format!(
                    "parser panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            }
        }
    }

    listener.on_close();
    debug!(url, "event stream closed");
}

fn read_error_body<R: Read>(mut body: R) -> String {
    let mut bytes = Vec::new();
    if let Err(err) = body.read_to_end(&mut bytes) {
        debug!(%err, "error body truncated");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

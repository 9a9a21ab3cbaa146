//! Error types for the HTTP client.
//!
//! # Design
//! `Timeout` gets a dedicated variant because callers apply their own
//! backoff/retry policy to it. A well-formed response with a non-2xx status
//! lands in `HttpStatus` with the raw status code and body. Every other
//! transport failure is wrapped in `Transport` together with the request URL.
//! The remaining variants only occur before dispatch or while an event
//! stream is being consumed.

use std::io;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Placeholder body used when a non-2xx response carries no body.
pub const NO_RESPONSE_BODY: &str = "[No response body]";

#[derive(Debug, Error)]
pub enum HttpError {
    /// A connect or read timeout elapsed.
    #[error("HTTP request timed out")]
    Timeout {
        #[source]
        source: BoxError,
    },

    /// The server answered with a status outside 200..300.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Connection refused/reset, DNS failure and any other I/O failure.
    #[error("error executing HTTP request: {url}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The request could not be expressed as a native request.
    #[error("invalid HTTP request for {url}: {reason}")]
    InvalidRequest { url: String, reason: String },

    /// A 2xx streaming response had no body to read events from.
    #[error("successful streaming response but body is absent: {url}")]
    MissingBody { url: String },

    /// Reading the event stream failed part way through.
    #[error("event stream read failed")]
    Stream(#[source] io::Error),

    /// The event stream could not be decoded.
    #[error("event stream parse failed: {0}")]
    Parse(String),
}

impl HttpError {
    pub fn timeout(source: impl Into<BoxError>) -> Self {
        HttpError::Timeout {
            source: source.into(),
        }
    }

    pub fn transport(url: &str, source: impl Into<BoxError>) -> Self {
        HttpError::Transport {
            url: url.to_string(),
            source: source.into(),
        }
    }

    /// Map a failure raised while reading a response body or event stream.
    ///
    /// The `ureq` body reader reports its own timeouts as an `io::Error`
    /// wrapping `ureq::Error::Timeout`, not as `ErrorKind::TimedOut`.
    pub fn from_stream_io(err: io::Error) -> Self {
        let native_timeout = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<ureq::Error>())
            .is_some_and(|inner| matches!(inner, ureq::Error::Timeout(_)));
        if native_timeout || err.kind() == io::ErrorKind::TimedOut {
            HttpError::timeout(err)
        } else {
            HttpError::Stream(err)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }

    /// Status code carried by `HttpStatus`.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

//! Conversion between the generic HTTP types and the native `http` types
//! used by the transport.
//!
//! # Design
//! Both directions are pure functions. The request side produces an
//! `http::Request` whose body is `None` when nothing must be sent; the
//! response side only ever sees a body that the caller already read once.

use ureq::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use ureq::http::{Method, Request};

use crate::error::{HttpError, NO_RESPONSE_BODY};
use crate::http::{Headers, HttpMethod, HttpRequest, SuccessfulHttpResponse};

/// Media type attached to a body when the request names none.
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain; charset=utf-8";

/// A request in the transport's own representation.
pub type NativeRequest = Request<Option<Vec<u8>>>;

fn native_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Options => Method::OPTIONS,
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c)
}

/// Accept `type/subtype` optionally followed by `;`-separated parameters.
pub fn parse_media_type(value: &str) -> Option<&str> {
    let value = value.trim();
    let essence = value.split(';').next().unwrap_or_default().trim();
    let (kind, subtype) = essence.split_once('/')?;
    let valid = |part: &str| !part.is_empty() && part.chars().all(is_token_char);
    if valid(kind) && valid(subtype) {
        Some(value)
    } else {
        None
    }
}

/// Build the native request for `request`.
pub fn to_native_request(request: &HttpRequest) -> Result<NativeRequest, HttpError> {
    let invalid = |reason: String| HttpError::InvalidRequest {
        url: request.url.clone(),
        reason,
    };

    if request.body.is_some() && request.method.forbids_body() {
        return Err(invalid(format!("{} must not have a request body", request.method)));
    }

    let mut builder = Request::builder()
        .method(native_method(request.method))
        .uri(request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }

    let media_type = request.headers.get("Content-Type").and_then(parse_media_type);
    let (body, body_media_type) = match &request.body {
        Some(body) => (
            Some(body.clone().into_bytes()),
            Some(media_type.unwrap_or(DEFAULT_MEDIA_TYPE)),
        ),
        None if request.method.requires_body() => (Some(Vec::new()), media_type),
        None => (None, None),
    };

    let mut native = builder.body(body).map_err(|e| invalid(e.to_string()))?;
    if let Some(media_type) = body_media_type {
        let value = HeaderValue::from_str(media_type).map_err(|e| invalid(e.to_string()))?;
        native.headers_mut().insert(CONTENT_TYPE, value);
    }
    Ok(native)
}

/// Copy native response headers, keeping every value of repeated names.
pub fn headers_from_native(native: &HeaderMap) -> Headers {
    native
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Responses that carry no body to read: HEAD requests and 204.
pub fn has_body(method: HttpMethod, status: u16) -> bool {
    method != HttpMethod::Head && status != 204
}

/// Turn an already-read response into the caller-facing result.
pub fn into_response(
    status: u16,
    headers: Headers,
    body: Option<String>,
) -> Result<SuccessfulHttpResponse, HttpError> {
    if !is_success(status) {
        return Err(HttpError::HttpStatus {
            status,
            body: body.unwrap_or_else(|| NO_RESPONSE_BODY.to_string()),
        });
    }
    Ok(SuccessfulHttpResponse {
        status,
        headers,
        body,
    })
}

use std::{collections::BTreeMap, convert::Infallible, time::Duration};

use axum::{
    body::Body,
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw of the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub body: Option<String>,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_event_count")]
    pub count: usize,
}

fn default_event_count() -> usize {
    3
}

#[derive(Deserialize)]
pub struct DripQuery {
    #[serde(default = "default_event_count")]
    pub count: usize,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    100
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/events", get(events))
        .route("/events/malformed", get(malformed_events))
        .route("/events/drip", get(drip_events))
        .route("/invalid-utf8/{code}", get(invalid_utf8))
        .route("/bytes/{len}", get(bytes))
        .route("/no-content", any(no_content))
        .route("/slow/{ms}", get(slow))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers.iter() {
        grouped
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(Echo {
        method: method.to_string(),
        headers: grouped,
        body,
    })
}

async fn status(Path(code): Path<u16>, Query(query): Query<StatusQuery>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, query.body.unwrap_or_default()).into_response()
}

/// `count` events named `tick`, carrying `event-0`, `event-1`, ...
pub fn event_stream_body(count: usize) -> String {
    (0..count)
        .map(|i| format!("event: tick\ndata: event-{i}\n\n"))
        .collect()
}

async fn events(Query(query): Query<EventsQuery>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        event_stream_body(query.count),
    )
        .into_response()
}

/// One valid event followed by a frame that is not UTF-8.
async fn malformed_events() -> Response {
    let mut body = b"data: first\n\n".to_vec();
    body.extend_from_slice(b"data: \xff\xfe\n\n");
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

/// The `/events` frames sent one at a time, `interval_ms` apart. The
/// connection stays open until the last one has been written.
async fn drip_events(Query(query): Query<DripQuery>) -> Response {
    let count = query.count;
    let interval = Duration::from_millis(query.interval_ms);
    let frames = stream::unfold(0, move |i| async move {
        if i >= count {
            return None;
        }
        if i > 0 {
            tokio::time::sleep(interval).await;
        }
        let frame = format!("event: tick\ndata: event-{i}\n\n");
        Some((Ok::<_, Infallible>(frame), i + 1))
    });
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(frames),
    )
        .into_response()
}

/// The requested status with a body that is not UTF-8.
async fn invalid_utf8(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, b"\xff\xfe".to_vec()).into_response()
}

/// `len` bytes of `a`.
async fn bytes(Path(len): Path<usize>) -> Vec<u8> {
    vec![b'a'; len]
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "done"
}

//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and drives a real
//! `UreqHttpClient` over HTTP, both through blocking `execute` and through
//! background `execute_sse` streams observed via `ChannelListener`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use httpclient_core::{
    ChannelListener, DefaultServerSentEventParser, HttpClient, HttpError, HttpMethod,
    HttpRequest, ServerSentEvent, ServerSentEventListener, StreamEvent, SuccessfulHttpResponse,
    UreqHttpClient, UreqHttpClientBuilder,
};
use mock_server::Echo;

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

/// An address nothing listens on.
fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn client() -> UreqHttpClient {
    UreqHttpClientBuilder::new()
        .with_connect_timeout(Duration::from_secs(5))
        .with_read_timeout(Duration::from_secs(10))
        .build()
}

fn echo(response: &SuccessfulHttpResponse) -> Echo {
    serde_json::from_str(response.body.as_deref().unwrap()).unwrap()
}

/// Every notification of one stream, up to the point the listener is dropped.
fn collect(receiver: &Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = receiver.recv_timeout(Duration::from_secs(10)) {
        seen.push(event);
    }
    seen
}

fn stream(client: &UreqHttpClient, request: HttpRequest) -> Vec<StreamEvent> {
    let (listener, receiver) = ChannelListener::new();
    client.execute_sse(
        request,
        Arc::new(DefaultServerSentEventParser),
        Arc::new(listener),
    );
    collect(&receiver)
}

// ---------------------------------------------------------------------------
// Blocking execution
// ---------------------------------------------------------------------------

#[test]
fn get_returns_body_and_headers() {
    let addr = start_server();
    let response = client()
        .execute(&HttpRequest::get(format!("http://{addr}/echo")))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("Content-Type"), Some("application/json"));
    let echo = echo(&response);
    assert_eq!(echo.method, "GET");
    assert!(echo.body.is_empty());
}

#[test]
fn repeated_header_values_all_reach_the_server() {
    let addr = start_server();
    let request = HttpRequest::get(format!("http://{addr}/echo"))
        .header("X", "a")
        .header("X", "b");
    let echo = echo(&client().execute(&request).unwrap());
    assert_eq!(echo.headers["x"], vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn post_without_body_sends_empty_body_with_declared_media_type() {
    let addr = start_server();
    let request =
        HttpRequest::post(format!("http://{addr}/echo")).header("Content-Type", "application/json");
    let echo = echo(&client().execute(&request).unwrap());
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, "");
    assert_eq!(echo.headers["content-type"], vec!["application/json".to_string()]);
}

#[test]
fn body_without_content_type_is_sent_as_plain_text() {
    let addr = start_server();
    let request = HttpRequest::new(HttpMethod::Put, format!("http://{addr}/echo")).body("payload");
    let echo = echo(&client().execute(&request).unwrap());
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.body, "payload");
    assert_eq!(
        echo.headers["content-type"],
        vec!["text/plain; charset=utf-8".to_string()]
    );
}

#[test]
fn service_unavailable_fails_with_status_and_body() {
    let addr = start_server();
    let err = client()
        .execute(&HttpRequest::get(format!("http://{addr}/status/503?body=overloaded")))
        .unwrap_err();
    match err {
        HttpError::HttpStatus { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn error_body_that_is_not_utf8_still_maps_to_status() {
    let addr = start_server();
    let err = client()
        .execute(&HttpRequest::get(format!("http://{addr}/invalid-utf8/503")))
        .unwrap_err();
    assert_eq!(err.status(), Some(503), "{err:?}");
    match err {
        HttpError::HttpStatus { body, .. } => assert_eq!(body, "\u{FFFD}\u{FFFD}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn body_above_ten_mebibytes_is_read_in_full() {
    let addr = start_server();
    let len = 11 * 1024 * 1024;
    let response = client()
        .execute(&HttpRequest::get(format!("http://{addr}/bytes/{len}")))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body.map(|b| b.len()), Some(len));
}

#[test]
fn status_codes_map_to_success_or_http_status() {
    let addr = start_server();
    let client = client();
    for code in [200_u16, 201, 202, 203, 206, 299] {
        let response = client
            .execute(&HttpRequest::get(format!("http://{addr}/status/{code}?body=ok")))
            .unwrap();
        assert_eq!(response.status, code);
        assert_eq!(response.body.as_deref(), Some("ok"));
    }
    for code in [400_u16, 401, 404, 418, 429, 500, 502, 599] {
        let err = client
            .execute(&HttpRequest::get(format!("http://{addr}/status/{code}?body=bad-{code}")))
            .unwrap_err();
        assert_eq!(err.status(), Some(code));
        assert!(matches!(err, HttpError::HttpStatus { ref body, .. } if *body == format!("bad-{code}")));
    }
}

#[test]
fn head_and_no_content_responses_have_no_body() {
    let addr = start_server();
    let client = client();
    let head = client
        .execute(&HttpRequest::new(HttpMethod::Head, format!("http://{addr}/echo")))
        .unwrap();
    assert_eq!(head.status, 200);
    assert!(head.body.is_none());

    let no_content = client
        .execute(&HttpRequest::get(format!("http://{addr}/no-content")))
        .unwrap();
    assert_eq!(no_content.status, 204);
    assert!(no_content.body.is_none());
}

#[test]
fn slow_response_past_read_timeout_is_a_timeout() {
    let addr = start_server();
    let client = UreqHttpClientBuilder::new()
        .with_read_timeout(Duration::from_millis(200))
        .build();
    let err = client
        .execute(&HttpRequest::get(format!("http://{addr}/slow/3000")))
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[test]
fn refused_connection_is_a_transport_error_carrying_the_url() {
    let url = format!("http://{}/echo", closed_addr());
    let err = client().execute(&HttpRequest::get(url.clone())).unwrap_err();
    match err {
        HttpError::Transport { url: failed, .. } => assert_eq!(failed, url),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn one_client_serves_concurrent_callers() {
    let addr = start_server();
    let client = Arc::new(client());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            thread::spawn(move || {
                let request = HttpRequest::post(format!("http://{addr}/echo")).body(format!("call-{i}"));
                echo(&client.execute(&request).unwrap()).body
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("call-{i}"));
    }
}

// ---------------------------------------------------------------------------
// Streaming execution
// ---------------------------------------------------------------------------

#[test]
fn stream_delivers_open_events_then_close() {
    let addr = start_server();
    let seen = stream(&client(), HttpRequest::get(format!("http://{addr}/events?count=3")));

    assert_eq!(seen.len(), 5, "{seen:?}");
    match &seen[0] {
        StreamEvent::Open(response) => {
            assert_eq!(response.status, 200);
            assert!(response.body.is_none());
            assert_eq!(response.headers.get("content-type"), Some("text/event-stream"));
        }
        other => panic!("expected open, got {other:?}"),
    }
    for (i, event) in seen[1..4].iter().enumerate() {
        match event {
            StreamEvent::Event(event) => {
                assert_eq!(*event, ServerSentEvent::new(Some("tick"), format!("event-{i}")));
            }
            other => panic!("expected event, got {other:?}"),
        }
    }
    assert!(matches!(seen[4], StreamEvent::Close));
}

#[test]
fn stream_with_error_status_is_a_single_error() {
    let addr = start_server();
    let seen = stream(
        &client(),
        HttpRequest::get(format!("http://{addr}/status/503?body=overloaded")),
    );
    assert_eq!(seen.len(), 1, "{seen:?}");
    assert!(matches!(
        &seen[0],
        StreamEvent::Error(HttpError::HttpStatus { status: 503, body }) if body == "overloaded"
    ));
}

#[test]
fn stream_timing_out_before_response_is_a_single_timeout() {
    let addr = start_server();
    let client = UreqHttpClientBuilder::new()
        .with_read_timeout(Duration::from_millis(200))
        .build();
    let seen = stream(&client, HttpRequest::get(format!("http://{addr}/slow/3000")));
    assert_eq!(seen.len(), 1, "{seen:?}");
    assert!(matches!(&seen[0], StreamEvent::Error(err) if err.is_timeout()));
}

#[test]
fn stream_to_closed_port_is_a_single_transport_error() {
    let seen = stream(
        &client(),
        HttpRequest::get(format!("http://{}/events", closed_addr())),
    );
    assert_eq!(seen.len(), 1, "{seen:?}");
    assert!(matches!(&seen[0], StreamEvent::Error(HttpError::Transport { .. })));
}

#[test]
fn malformed_stream_ends_with_error_then_close() {
    let addr = start_server();
    let seen = stream(&client(), HttpRequest::get(format!("http://{addr}/events/malformed")));
    assert_eq!(seen.len(), 4, "{seen:?}");
    assert!(matches!(seen[0], StreamEvent::Open(_)));
    assert!(matches!(&seen[1], StreamEvent::Event(e) if e.data == "first"));
    assert!(matches!(&seen[2], StreamEvent::Error(HttpError::Parse(_))));
    assert!(matches!(seen[3], StreamEvent::Close));
}

#[test]
fn stream_without_body_reports_missing_body_then_close() {
    let addr = start_server();
    let seen = stream(&client(), HttpRequest::get(format!("http://{addr}/no-content")));
    assert_eq!(seen.len(), 3, "{seen:?}");
    assert!(matches!(&seen[0], StreamEvent::Open(r) if r.status == 204));
    assert!(matches!(&seen[1], StreamEvent::Error(HttpError::MissingBody { .. })));
    assert!(matches!(seen[2], StreamEvent::Close));
}

/// Panics on every event; reports close and the callback thread.
struct PanickingListener {
    events: AtomicUsize,
    closed: Sender<thread::ThreadId>,
}

impl ServerSentEventListener for PanickingListener {
    fn on_event(&self, _event: ServerSentEvent) {
        self.events.fetch_add(1, Ordering::SeqCst);
        panic!("listener failure");
    }

    fn on_close(&self) {
        self.closed.send(thread::current().id()).unwrap();
    }
}

#[test]
fn panicking_listener_still_receives_close_off_the_calling_thread() {
    let addr = start_server();
    let client = client();
    let (closed, close_rx) = crossbeam_channel::unbounded();
    let listener = Arc::new(PanickingListener {
        events: AtomicUsize::new(0),
        closed,
    });

    client.execute_sse(
        HttpRequest::get(format!("http://{addr}/events?count=4")),
        Arc::new(DefaultServerSentEventParser),
        listener.clone(),
    );

    let close_thread = close_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_ne!(close_thread, thread::current().id());
    assert_eq!(listener.events.load(Ordering::SeqCst), 4);
    assert!(close_rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn concurrent_streams_share_one_client() {
    let addr = start_server();
    let client = UreqHttpClientBuilder::new()
        .with_max_concurrent_streams(2)
        .build();
    let receivers: Vec<_> = (0..4)
        .map(|_| {
            let (listener, receiver) = ChannelListener::new();
            client.execute_sse(
                HttpRequest::get(format!("http://{addr}/events?count=2")),
                Arc::new(DefaultServerSentEventParser),
                Arc::new(listener),
            );
            receiver
        })
        .collect();
    for receiver in &receivers {
        let seen = collect(receiver);
        assert_eq!(seen.len(), 4, "{seen:?}");
        assert!(matches!(seen[3], StreamEvent::Close));
    }
    assert!(client.stream_workers() <= 2);
}

#[test]
fn stream_outliving_read_timeout_delivers_every_event() {
    let addr = start_server();
    let client = UreqHttpClientBuilder::new()
        .with_read_timeout(Duration::from_millis(300))
        .build();
    let seen = stream(
        &client,
        HttpRequest::get(format!("http://{addr}/events/drip?count=8&interval_ms=100")),
    );
    assert_eq!(seen.len(), 10, "{seen:?}");
    assert!(matches!(seen[0], StreamEvent::Open(_)));
    assert!(seen[1..9].iter().all(|e| matches!(e, StreamEvent::Event(_))));
    assert!(matches!(seen[9], StreamEvent::Close));
}

#[test]
fn stream_past_native_deadline_ends_with_timeout_then_close() {
    let addr = start_server();
    let native = ureq::Agent::config_builder().timeout_global(Some(Duration::from_millis(350)));
    let client = UreqHttpClientBuilder::new().with_native_config(native).build();
    let seen = stream(
        &client,
        HttpRequest::get(format!("http://{addr}/events/drip?count=20&interval_ms=100")),
    );

    assert!(seen.len() >= 4, "{seen:?}");
    assert!(matches!(seen[0], StreamEvent::Open(_)));
    let tail = &seen[seen.len() - 2..];
    assert!(
        matches!(&tail[0], StreamEvent::Error(err) if err.is_timeout()),
        "{seen:?}"
    );
    assert!(matches!(tail[1], StreamEvent::Close));
    assert!(seen[1..seen.len() - 2]
        .iter()
        .all(|e| matches!(e, StreamEvent::Event(_))));
}

#[test]
fn second_stream_completes_while_first_stays_open() {
    let addr = start_server();
    let client = client();

    // Leave one finished worker idle in the pool.
    let warm = stream(&client, HttpRequest::get(format!("http://{addr}/events?count=1")));
    assert!(matches!(warm.last(), Some(StreamEvent::Close)));

    let (held, held_rx) = ChannelListener::new();
    client.execute_sse(
        HttpRequest::get(format!("http://{addr}/events/drip?count=2&interval_ms=5000")),
        Arc::new(DefaultServerSentEventParser),
        Arc::new(held),
    );
    let (second, second_rx) = ChannelListener::new();
    client.execute_sse(
        HttpRequest::get(format!("http://{addr}/events?count=2")),
        Arc::new(DefaultServerSentEventParser),
        Arc::new(second),
    );

    assert!(matches!(
        held_rx.recv_timeout(Duration::from_secs(3)),
        Ok(StreamEvent::Open(_))
    ));
    let mut second_seen = Vec::new();
    while let Ok(event) = second_rx.recv_timeout(Duration::from_secs(3)) {
        second_seen.push(event);
    }
    assert_eq!(second_seen.len(), 4, "{second_seen:?}");
    assert!(matches!(second_seen[3], StreamEvent::Close));

    let held_so_far: Vec<_> = held_rx.try_iter().collect();
    assert!(
        !held_so_far.iter().any(|e| matches!(e, StreamEvent::Close)),
        "{held_so_far:?}"
    );
    assert!(client.stream_workers() >= 2);
}

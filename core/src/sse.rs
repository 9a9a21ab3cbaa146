//! Server-Sent Events: listener and parser capabilities, plus a default
//! `text/event-stream` decoder.
//!
//! # Design
//! The client never interprets event contents. It hands the response body to
//! a `ServerSentEventParser`, which reads framed events and calls the
//! listener once per event. Lifecycle notifications (open, error, close) come
//! from the client itself.

use std::io::{BufRead, BufReader, Read};

use crossbeam_channel::{Receiver, Sender};

use crate::error::HttpError;
use crate::http::SuccessfulHttpResponse;

/// A decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSentEvent {
    /// Value of the `event:` field, if the frame had one.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl ServerSentEvent {
    pub fn new(event: Option<&str>, data: impl Into<String>) -> Self {
        Self {
            event: event.map(str::to_string),
            data: data.into(),
        }
    }
}

/// Receives the notifications of one streaming request.
///
/// Callbacks run on a dispatcher thread. A panic raised by a callback is
/// caught and discarded by the client.
pub trait ServerSentEventListener: Send + Sync {
    fn on_open(&self, _response: SuccessfulHttpResponse) {}

    fn on_event(&self, event: ServerSentEvent);

    fn on_error(&self, _error: HttpError) {}

    fn on_close(&self) {}
}

/// Decodes a byte stream into events for a listener.
pub trait ServerSentEventParser: Send + Sync {
    fn parse(
        &self,
        input: &mut dyn Read,
        listener: &dyn ServerSentEventListener,
    ) -> Result<(), HttpError>;
}

/// Decoder for the standard `text/event-stream` framing.
///
/// `id:` and `retry:` are accepted but not surfaced.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultServerSentEventParser;

#[derive(Default)]
struct PendingEvent {
    event: Option<String>,
    data: Vec<String>,
}

impl PendingEvent {
    fn feed_line(&mut self, line: &str) -> Option<ServerSentEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn take(&mut self) -> Option<ServerSentEvent> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        let pending = std::mem::take(self);
        Some(ServerSentEvent {
            event: pending.event,
            data: pending.data.join("\n"),
        })
    }
}

impl ServerSentEventParser for DefaultServerSentEventParser {
    fn parse(
        &self,
        input: &mut dyn Read,
        listener: &dyn ServerSentEventListener,
    ) -> Result<(), HttpError> {
        let mut reader = BufReader::new(input);
        let mut pending = PendingEvent::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(HttpError::from_stream_io)?;
            if read == 0 {
                break;
            }
            let line = std::str::from_utf8(&buf)
                .map_err(|e| HttpError::Parse(e.to_string()))?;
            let line = line.strip_suffix('\n').unwrap_or(line);
            if let Some(event) = pending.feed_line(line) {
                listener.on_event(event);
            }
        }

        if let Some(event) = pending.take() {
            listener.on_event(event);
        }
        Ok(())
    }
}

/// Notifications of a streaming request as a tagged value.
#[derive(Debug)]
pub enum StreamEvent {
    Open(SuccessfulHttpResponse),
    Event(ServerSentEvent),
    Error(HttpError),
    Close,
}

/// Listener that forwards every notification into a channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: Sender<StreamEvent>,
}

impl ChannelListener {
    /// Create a listener together with the receiving end of its channel.
    pub fn new() -> (Self, Receiver<StreamEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }

    // A dropped receiver only means nobody is listening any more.
    fn forward(&self, event: StreamEvent) {
        let _ = self.sender.send(event);
    }
}

impl ServerSentEventListener for ChannelListener {
    fn on_open(&self, response: SuccessfulHttpResponse) {
        self.forward(StreamEvent::Open(response));
    }

    fn on_event(&self, event: ServerSentEvent) {
        self.forward(StreamEvent::Event(event));
    }

    fn on_error(&self, error: HttpError) {
        self.forward(StreamEvent::Error(error));
    }

    fn on_close(&self) {
        self.forward(StreamEvent::Close);
    }
}

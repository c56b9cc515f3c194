//! Incremental decoding of newline-delimited JSON response streams.
//!
//! The text endpoint answers with one JSON object per line:
//! `{"content": "..."}` for each delta, then `{"done": true}`, or
//! `{"error": "..."}` if generation failed. Lines arrive split at arbitrary
//! byte offsets. [`StreamIngestor`] owns the partial trailing line between
//! reads and turns complete lines into [`StreamEvent`]s; [`drive_stream`] and
//! [`ChatStreamService`] pump a byte stream through it.

use std::fmt::Display;

use futures_util::{pin_mut, Stream, StreamExt};
use memchr::memchr;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::StreamLine;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A delta to append to the message being built.
    Content(String),
    Done,
    Error(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Content(_))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IngestState {
    #[default]
    Reading,
    Done,
    Failed,
    /// The caller abandoned the stream. No terminal event was produced.
    Cancelled,
}

/// Line reassembly and parsing for one stream.
///
/// Bytes are buffered until a `\n` arrives, so a UTF-8 sequence or JSON
/// object split across reads is decoded only once it is complete. Once a
/// terminal event has been produced, or the stream is cancelled, every
/// further call is a no-op.
#[derive(Debug, Default)]
pub struct StreamIngestor {
    state: IngestState,
    buffer: Vec<u8>,
}

impl StreamIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn is_reading(&self) -> bool {
        self.state == IngestState::Reading
    }

    /// Bytes held back waiting for a newline.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Consume one read's worth of bytes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.is_reading() {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(offset) = memchr(b'\n', &self.buffer[consumed..]) {
            let end = consumed + offset;
            let event = parse_line(&self.buffer[consumed..end]);
            consumed = end + 1;

            if let Some(event) = event {
                self.record(event, &mut events);
                if !self.is_reading() {
                    break;
                }
            }
        }

        if self.is_reading() {
            self.buffer.drain(..consumed);
        } else {
            self.buffer.clear();
        }
        events
    }

    /// The byte stream ended. Processes a final unterminated line, then
    /// completes unless the stream already did.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.is_reading() {
            return events;
        }

        let tail = std::mem::take(&mut self.buffer);
        if let Some(event) = parse_line(&tail) {
            self.record(event, &mut events);
        }
        if self.is_reading() {
            self.record(StreamEvent::Done, &mut events);
        }
        events
    }

    /// The transport failed mid-stream.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<StreamEvent> {
        if !self.is_reading() {
            return None;
        }
        self.buffer.clear();
        self.state = IngestState::Failed;
        Some(StreamEvent::Error(message.into()))
    }

    pub fn cancel(&mut self) {
        if self.is_reading() {
            self.state = IngestState::Cancelled;
        }
        self.buffer.clear();
    }

    fn record(&mut self, event: StreamEvent, events: &mut Vec<StreamEvent>) {
        match event {
            StreamEvent::Content(_) => {}
            StreamEvent::Done => self.state = IngestState::Done,
            StreamEvent::Error(_) => self.state = IngestState::Failed,
        }
        events.push(event);
    }
}

fn parse_line(raw: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, len = line.len(), "skipping malformed stream line");
            return None;
        }
    };
    let Some(parsed) = StreamLine::from_value(&value) else {
        debug!(len = line.len(), "skipping non-object stream line");
        return None;
    };

    if let Some(content) = parsed.content {
        return Some(StreamEvent::Content(content));
    }
    if let Some(error) = parsed.error {
        return Some(StreamEvent::Error(error_message(&error)));
    }
    if parsed.done {
        return Some(StreamEvent::Done);
    }
    None
}

fn error_message(error: &Value) -> String {
    let text = match error {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    };

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "The response stream reported an error".to_string()
    } else {
        collapsed
    }
}

fn describe_http_failure(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    let summary = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|value| value.get("error").map(error_message));

    match summary {
        Some(summary) => format!("Request failed ({status}): {summary}"),
        None if trimmed.is_empty() => format!("Request failed ({status})"),
        None => format!("Request failed ({status}): {trimmed}"),
    }
}

/// Pump `stream` through a fresh [`StreamIngestor`], handing each event to
/// `emit`, until a terminal event, the end of the stream, or cancellation.
///
/// The stream is dropped on return, which releases the underlying reader.
/// There is no timeout: a stalled read waits until `cancel_token` fires.
pub async fn drive_stream<S, B, E, F>(
    stream: S,
    cancel_token: &CancellationToken,
    mut emit: F,
) -> IngestState
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(StreamEvent),
{
    let mut ingestor = StreamIngestor::new();
    pin_mut!(stream);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                ingestor.cancel();
                debug!("stream cancelled by caller");
                return ingestor.state();
            }
            next = stream.next() => next,
        };

        let events = match next {
            Some(Ok(chunk)) => ingestor.feed(chunk.as_ref()),
            Some(Err(err)) => ingestor
                .fail(format!("Stream read failed: {err}"))
                .into_iter()
                .collect(),
            None => ingestor.finish(),
        };

        for event in events {
            emit(event);
        }
        if !ingestor.is_reading() {
            return ingestor.state();
        }
    }
}

pub struct StreamParams<S> {
    pub stream: S,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// Runs stream ingestion on background tasks and forwards events, tagged
/// with their stream id, to a single receiver.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamEvent, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamEvent, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream<S, B, E>(&self, params: StreamParams<S>) -> JoinHandle<IngestState>
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Display + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                stream,
                cancel_token,
                stream_id,
            } = params;

            let state = drive_stream(stream, &cancel_token, |event| {
                let _ = tx.send((event, stream_id));
            })
            .await;
            debug!(stream_id, state = ?state, "stream ingestion finished");
            state
        })
    }

    /// Ingest the body of a response from the text endpoint. A non-success
    /// status produces a single error event built from the body.
    pub fn spawn_response(
        &self,
        response: reqwest::Response,
        cancel_token: CancellationToken,
        stream_id: u64,
    ) -> JoinHandle<IngestState> {
        if response.status().is_success() {
            return self.spawn_stream(StreamParams {
                stream: response.bytes_stream(),
                cancel_token,
                stream_id,
            });
        }

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let status = response.status();
            let body = tokio::select! {
                body = response.text() => body.unwrap_or_else(|_| "<no body>".to_string()),
                _ = cancel_token.cancelled() => return IngestState::Cancelled,
            };
            debug!(stream_id, %status, "text endpoint returned an error status");
            let _ = tx.send((
                StreamEvent::Error(describe_http_failure(status, &body)),
                stream_id,
            ));
            IngestState::Failed
        })
    }
}

//! Newline-delimited JSON decoding for streaming `/api/chat` responses.
//!
//! [`StreamDecoder`] pulls bytes from a response body on demand and hands back
//! one [`StreamEvent`] per record. Records that fail to decode are skipped;
//! a failing body read ends the sequence with [`StreamError::Transport`].
//! After the `done: true` record the body is never polled again.

use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use memchr::memchr;
use reqwest::StatusCode;
use tracing::debug;

use crate::api::models::ApiError;
use crate::api::ChatChunk;
use crate::core::message::TerminalMetadata;

/// Why a session's stream ended without completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Host unreachable, timed out, or the body read failed midway.
    Transport(String),
    /// The chat request was answered with a non-2xx status.
    Status { status: StatusCode, body: String },
    /// The backend reported an error record inside the stream.
    Backend(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Transport(message) => write!(f, "connection error: {message}"),
            StreamError::Status { status, body } => {
                let body = body.trim();
                if body.is_empty() {
                    write!(f, "API returned non-200 status: {status}")
                } else {
                    write!(f, "API returned non-200 status: {status}. Body: {body}")
                }
            }
            StreamError::Backend(message) => write!(f, "backend error: {message}"),
        }
    }
}

impl StdError for StreamError {}

impl From<ApiError> for StreamError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, body } => StreamError::Status { status, body },
            ApiError::Transport(err) | ApiError::Decode(err) => {
                StreamError::Transport(err.to_string())
            }
        }
    }
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Partial assistant text; often empty on the final record.
    pub fragment: String,
    /// Present only on the record that ends the stream.
    pub terminal: Option<TerminalMetadata>,
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}

/// Splits an accumulating byte buffer on `\n`.
#[derive(Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let newline_pos = memchr(b'\n', &self.buffer)?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        line.pop();
        Some(line)
    }

    /// Whatever is left once the body has closed.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Decode one framed record. `None` means the record is skipped.
pub fn decode_record(line: &[u8]) -> Option<Result<StreamEvent, StreamError>> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(err) => {
            debug!("skipping stream record with invalid UTF-8: {err}");
            return None;
        }
    };
    if text.is_empty() {
        return None;
    }

    let chunk = match serde_json::from_str::<ChatChunk>(text) {
        Ok(chunk) => chunk,
        Err(err) => {
            debug!("skipping malformed stream record: {err} - data: {text}");
            return None;
        }
    };

    if let Some(message) = chunk.error.as_deref() {
        return Some(Err(StreamError::Backend(message.to_string())));
    }

    let fragment = chunk
        .message
        .as_ref()
        .map(|message| message.content.clone())
        .unwrap_or_default();
    let terminal = chunk.done.then(|| TerminalMetadata::from_chunk(&chunk));
    Some(Ok(StreamEvent { fragment, terminal }))
}

enum Phase {
    Reading,
    BodyClosed,
    Finished,
}

pub struct StreamDecoder<S> {
    body: Pin<Box<S>>,
    framer: LineFramer,
    phase: Phase,
}

impl<S, B, E> StreamDecoder<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    pub fn new(body: S) -> Self {
        Self {
            body: Box::pin(body),
            framer: LineFramer::default(),
            phase: Phase::Reading,
        }
    }

    /// The next event, or `None` once the sequence has ended.
    ///
    /// A body that closes without a `done` record still ends with a terminal
    /// event; its metadata is left at the defaults.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, StreamError>> {
        loop {
            match self.phase {
                Phase::Finished => return None,
                Phase::BodyClosed => {
                    if let Some(line) = self.framer.take_remainder() {
                        if let Some(item) = self.accept(&line) {
                            return Some(item);
                        }
                        continue;
                    }
                    debug!("stream closed without a done record");
                    self.phase = Phase::Finished;
                    return Some(Ok(StreamEvent {
                        fragment: String::new(),
                        terminal: Some(TerminalMetadata::default()),
                    }));
                }
                Phase::Reading => {
                    if let Some(line) = self.framer.next_line() {
                        if let Some(item) = self.accept(&line) {
                            return Some(item);
                        }
                        continue;
                    }
                    match self.body.next().await {
                        Some(Ok(bytes)) => self.framer.push(bytes.as_ref()),
                        Some(Err(err)) => {
                            self.phase = Phase::Finished;
                            return Some(Err(StreamError::Transport(err.to_string())));
                        }
                        None => self.phase = Phase::BodyClosed,
                    }
                }
            }
        }
    }

    fn accept(&mut self, line: &[u8]) -> Option<Result<StreamEvent, StreamError>> {
        let item = decode_record(line)?;
        match &item {
            Ok(event) if event.is_terminal() => self.phase = Phase::Finished,
            Err(_) => self.phase = Phase::Finished,
            Ok(_) => {}
        }
        Some(item)
    }
}

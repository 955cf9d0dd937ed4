//! Per-session streaming tasks.
//!
//! Every session stream runs on its own Tokio task and reports back through
//! one shared unbounded channel, so the owner of the orchestrator sees all
//! events in a single ordered queue. Events of one session keep their order;
//! nothing is promised across sessions.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::models::ensure_success;
use crate::api::{ChatMessage, ChatRequest};
use crate::core::message::TerminalMetadata;
use crate::core::stream_decoder::{StreamDecoder, StreamError};
use crate::utils::url::construct_api_url;

/// Stable address of a session: the index of its host in the assignment
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionIndex(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Fragment(String),
    Terminal(TerminalMetadata),
    Error(StreamError),
}

#[derive(Debug, Clone)]
pub struct SessionEnvelope {
    pub index: SessionIndex,
    pub stream_id: u64,
    pub event: SessionEvent,
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub model: String,
    pub api_messages: Vec<ChatMessage>,
    pub cancel_token: CancellationToken,
    pub index: SessionIndex,
    pub stream_id: u64,
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<SessionEnvelope>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let cancel_token = params.cancel_token.clone();
            tokio::select! {
                _ = run_stream(params, &tx) => {}
                _ = cancel_token.cancelled() => {}
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, index: SessionIndex, stream_id: u64, event: SessionEvent) {
        let _ = self.tx.send(SessionEnvelope {
            index,
            stream_id,
            event,
        });
    }
}

/// Drive one `/api/chat` stream to completion, forwarding its events.
///
/// Exactly one of `Terminal` or `Error` is sent last.
pub async fn run_stream(params: StreamParams, tx: &mpsc::UnboundedSender<SessionEnvelope>) {
    let StreamParams {
        client,
        base_url,
        model,
        api_messages,
        index,
        stream_id,
        ..
    } = params;

    let send = |event: SessionEvent| {
        let _ = tx.send(SessionEnvelope {
            index,
            stream_id,
            event,
        });
    };

    let request = ChatRequest {
        model: model.clone(),
        messages: api_messages,
        stream: true,
    };
    let chat_url = construct_api_url(&base_url, "api/chat");
    debug!(%chat_url, %model, stream_id, "starting chat stream");

    let response = match client.post(chat_url).json(&request).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(%model, "chat request failed: {err}");
            send(SessionEvent::Error(StreamError::Transport(err.to_string())));
            return;
        }
    };
    let response = match ensure_success(response).await {
        Ok(response) => response,
        Err(err) => {
            let err = StreamError::from(err);
            warn!(%model, "chat request rejected: {err}");
            send(SessionEvent::Error(err));
            return;
        }
    };

    let mut decoder = StreamDecoder::new(response.bytes_stream());
    while let Some(item) = decoder.next_event().await {
        match item {
            Ok(event) => {
                if !event.fragment.is_empty() {
                    send(SessionEvent::Fragment(event.fragment));
                }
                if let Some(metadata) = event.terminal {
                    debug!(%model, stream_id, eval_count = metadata.eval_count, "chat stream done");
                    send(SessionEvent::Terminal(metadata));
                }
            }
            Err(err) => {
                warn!(%model, "chat stream failed: {err}");
                send(SessionEvent::Error(err));
            }
        }
    }
}

//! Wire payloads for the Ollama HTTP API and the shared transport client.

pub mod models;

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

#[derive(Deserialize, Default, Debug)]
pub struct ChatChunkMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// One record of a streaming `/api/chat` response.
///
/// Intermediate records only carry `message.content`; the record with
/// `done: true` carries the timing and token counters. Durations are in
/// nanoseconds.
#[derive(Deserialize, Default, Debug)]
pub struct ChatChunk {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub message: Option<ChatChunkMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub load_duration: u64,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub prompt_eval_duration: u64,
    #[serde(default)]
    pub eval_count: u64,
    #[serde(default)]
    pub eval_duration: u64,
    /// Set instead of `message` when the backend fails mid-stream.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelEntry {
    pub name: String,
}

/// Shared shape of `/api/tags` and `/api/ps`.
#[derive(Deserialize, Debug, Default)]
pub struct ModelListResponse {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl ModelListResponse {
    pub fn into_names(self) -> Vec<String> {
        self.models.into_iter().map(|entry| entry.name).collect()
    }
}

#[derive(Serialize)]
pub struct ShowRequest<'a> {
    pub name: &'a str,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ModelDetails {
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ModelShowResponse {
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub modelfile: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub details: ModelDetails,
}

#[derive(Serialize)]
pub struct PullRequest<'a> {
    pub name: &'a str,
    pub stream: bool,
}

#[derive(Serialize)]
pub struct DeleteRequest<'a> {
    pub model: &'a str,
}

/// A chat request with no messages and `keep_alive: 0` evicts the model.
#[derive(Serialize)]
pub struct UnloadRequest<'a> {
    pub model: &'a str,
    pub keep_alive: u32,
}

/// Build the HTTP client shared by every session and management call.
///
/// Ollama speaks plain HTTP/1.1; forcing it avoids h2 upgrade attempts
/// against reverse proxies that half-support it.
pub fn build_http_client(connect_timeout: Option<Duration>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().http1_only();
    if let Some(timeout) = connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_serializes_history_in_order() {
        let request = ChatRequest {
            model: "llama3.2:1b".into(),
            messages: vec![
                ChatMessage {
                    role: "user".into(),
                    content: "hi".into(),
                },
                ChatMessage {
                    role: "assistant".into(),
                    content: "hello".into(),
                },
            ],
            stream: true,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["model"], "llama3.2:1b");
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "hello");
    }

    #[test]
    fn chat_chunk_tolerates_missing_counters() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"model":"m","message":{"role":"assistant","content":"He"},"done":false}"#,
        )
        .expect("parse");
        assert_eq!(chunk.message.expect("message").content, "He");
        assert!(!chunk.done);
        assert_eq!(chunk.eval_count, 0);
        assert!(chunk.error.is_none());
    }

    #[test]
    fn model_list_response_flattens_names() {
        let response: ModelListResponse = serde_json::from_str(
            r#"{"models":[{"name":"a","size":1},{"name":"b","digest":"x"}]}"#,
        )
        .expect("parse");
        assert_eq!(response.into_names(), vec!["a", "b"]);

        let empty: ModelListResponse = serde_json::from_str("{}").expect("parse");
        assert!(empty.into_names().is_empty());
    }
}

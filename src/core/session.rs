use std::time::Instant;

use crate::api::ChatMessage;
use crate::core::chat_stream::SessionIndex;
use crate::core::message::{ConversationTurn, Role, TerminalMetadata};
use crate::core::stream_decoder::StreamError;

/// One host/model pair and its private conversation.
///
/// A session only ever changes through its own events; siblings are never
/// consulted.
#[derive(Debug, Clone)]
pub struct Session {
    pub index: SessionIndex,
    pub host_name: String,
    pub base_url: String,
    pub model: String,
    turns: Vec<ConversationTurn>,
    streaming: bool,
    error: Option<StreamError>,
    metadata: TerminalMetadata,
    round_started: Option<Instant>,
    stream_id: u64,
    /// Turn count before the user turn of the current round.
    round_offset: usize,
}

impl Session {
    pub fn new(
        index: SessionIndex,
        host_name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            index,
            host_name: host_name.into(),
            base_url: base_url.into(),
            model: model.into(),
            turns: Vec::new(),
            streaming: false,
            error: None,
            metadata: TerminalMetadata::default(),
            round_started: None,
            stream_id: 0,
            round_offset: 0,
        }
    }

    /// Open a round: record the user turn and return the history to send.
    pub fn start(&mut self, user_text: &str, stream_id: u64) -> Vec<ChatMessage> {
        self.round_offset = self.turns.len();
        self.turns.push(ConversationTurn::user(user_text));
        self.streaming = true;
        self.error = None;
        self.metadata = TerminalMetadata::default();
        self.stream_id = stream_id;
        self.round_started = Some(Instant::now());
        self.turns.iter().map(ConversationTurn::to_api).collect()
    }

    pub fn on_fragment(&mut self, text: &str) {
        let in_progress = self.turns.len() > self.round_offset + 1;
        match self.turns.last_mut() {
            Some(turn) if in_progress && turn.role == Role::Assistant => turn.text.push_str(text),
            _ => {
                if text.is_empty() {
                    return;
                }
                self.turns.push(ConversationTurn::assistant(text));
            }
        }
    }

    pub fn on_terminal(&mut self, metadata: TerminalMetadata) {
        self.metadata = metadata;
        self.streaming = false;
    }

    /// Partial assistant text stays in the history.
    pub fn on_error(&mut self, error: StreamError) {
        self.error = Some(error);
        self.streaming = false;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    pub fn metadata(&self) -> &TerminalMetadata {
        &self.metadata
    }

    pub fn round_started(&self) -> Option<Instant> {
        self.round_started
    }

    /// Assistant text produced in the current round so far.
    pub fn round_output(&self) -> &str {
        self.turns
            .iter()
            .skip(self.round_offset + 1)
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.text.as_str())
            .unwrap_or("")
    }

    pub fn label(&self) -> String {
        format!("{} - {}", self.host_name, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionIndex(0), "Local", "http://localhost:11434", "m1")
    }

    #[test]
    fn start_returns_full_history_and_marks_streaming() {
        let mut s = session();
        let first = s.start("hello", 1);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].role, "user");
        assert!(s.is_streaming());
        assert_eq!(s.stream_id(), 1);
        assert!(s.round_started().is_some());

        s.on_fragment("hi there");
        s.on_terminal(TerminalMetadata::default());
        let second = s.start("again", 2);
        let roles: Vec<_> = second.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(s.round_output(), "");
    }

    #[test]
    fn fragments_extend_one_assistant_turn() {
        let mut s = session();
        s.start("q", 1);
        s.on_fragment("Hel");
        s.on_fragment("");
        s.on_fragment("lo");
        assert_eq!(s.turns().len(), 2);
        assert_eq!(s.round_output(), "Hello");
    }

    #[test]
    fn empty_first_fragment_does_not_open_a_turn() {
        let mut s = session();
        s.start("q", 1);
        s.on_fragment("");
        assert_eq!(s.turns().len(), 1);
        s.on_fragment("x");
        assert_eq!(s.turns().len(), 2);
    }

    #[test]
    fn error_keeps_partial_text_and_stops_streaming() {
        let mut s = session();
        s.start("q", 1);
        s.on_fragment("par");
        s.on_fragment("tial");
        s.on_error(StreamError::Transport("connection reset".into()));
        assert!(!s.is_streaming());
        assert_eq!(s.round_output(), "partial");
        assert!(s.error().is_some());

        s.start("retry", 2);
        assert!(s.error().is_none());
        assert_eq!(s.metadata(), &TerminalMetadata::default());
    }

    #[test]
    fn label_joins_host_and_model() {
        assert_eq!(session().label(), "Local - m1");
    }
}

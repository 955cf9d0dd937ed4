use chrono::{DateTime, Utc};

use crate::api::{ChatChunk, ChatMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    pub fn to_api(&self) -> ChatMessage {
        ChatMessage {
            role: self.role.as_str().to_string(),
            content: self.text.clone(),
        }
    }
}

/// Timing and token counters from the final record of a stream.
///
/// Durations are nanoseconds as reported by the backend. Every field stays at
/// its default until the terminal record has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalMetadata {
    pub model: String,
    pub done: bool,
    pub total_duration_ns: u64,
    pub load_duration_ns: u64,
    pub prompt_eval_count: u64,
    pub prompt_eval_duration_ns: u64,
    pub eval_count: u64,
    pub eval_duration_ns: u64,
    pub created_at: Option<DateTime<Utc>>,
}

fn secs(ns: u64) -> f64 {
    ns as f64 / 1e9
}

impl TerminalMetadata {
    pub fn from_chunk(chunk: &ChatChunk) -> Self {
        Self {
            model: chunk.model.clone(),
            done: chunk.done,
            total_duration_ns: chunk.total_duration,
            load_duration_ns: chunk.load_duration,
            prompt_eval_count: chunk.prompt_eval_count,
            prompt_eval_duration_ns: chunk.prompt_eval_duration,
            eval_count: chunk.eval_count,
            eval_duration_ns: chunk.eval_duration,
            created_at: Some(Utc::now()),
        }
    }

    /// Generated tokens per second, when the backend reported an eval time.
    pub fn tokens_per_second(&self) -> Option<f64> {
        (self.eval_duration_ns > 0).then(|| self.eval_count as f64 / secs(self.eval_duration_ns))
    }

    /// One-line debug rendering shown under a response.
    pub fn summary(&self) -> String {
        format!(
            ">>> [Load: {:.1}s] [Prompt: {:.1}s | {} tok] [Response: {:.1}s | {} tok] [Total: {:.1}s]",
            secs(self.load_duration_ns),
            secs(self.prompt_eval_duration_ns),
            self.prompt_eval_count,
            secs(self.eval_duration_ns),
            self.eval_count,
            secs(self.total_duration_ns),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_summary_converts_nanoseconds() {
        let meta = TerminalMetadata {
            model: "m".into(),
            done: true,
            total_duration_ns: 2_500_000_000,
            load_duration_ns: 1_000_000_000,
            prompt_eval_count: 12,
            prompt_eval_duration_ns: 200_000_000,
            eval_count: 40,
            eval_duration_ns: 1_000_000_000,
            created_at: None,
        };
        assert_eq!(
            meta.summary(),
            ">>> [Load: 1.0s] [Prompt: 0.2s | 12 tok] [Response: 1.0s | 40 tok] [Total: 2.5s]"
        );
        assert_eq!(meta.tokens_per_second(), Some(40.0));
    }

    #[test]
    fn default_metadata_is_all_zero() {
        let meta = TerminalMetadata::default();
        assert!(!meta.done);
        assert_eq!(meta.total_duration_ns, 0);
        assert_eq!(meta.eval_count, 0);
        assert!(meta.tokens_per_second().is_none());
    }

    #[test]
    fn turns_map_to_api_roles() {
        assert_eq!(ConversationTurn::user("hi").to_api().role, "user");
        assert_eq!(ConversationTurn::assistant("yo").to_api().role, "assistant");
    }
}

//! Owns every session and folds their events into one consolidated state.
//!
//! The orchestrator is driven from a single task. Streams run elsewhere and
//! only reach it as [`SessionEnvelope`]s passed to [`Orchestrator::dispatch`].

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::assignment::AssignmentRegistry;
use crate::core::chat_stream::{SessionEnvelope, SessionEvent, SessionIndex, StreamParams};
use crate::core::readiness::{ReadinessResult, ReadinessTarget};
use crate::core::session::Session;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    AwaitingSessionReady,
    ChatActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Stale stream id, unknown session, or a session that already finished.
    Ignored,
    Applied,
    /// The last streaming session finished; a merged entry was appended.
    RoundComplete,
}

/// Derived view of one finished round across all sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedEntry {
    pub prompt: String,
    pub lines: Vec<String>,
}

impl MergedEntry {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessError {
    pub host_name: String,
    pub message: String,
}

pub struct Orchestrator {
    registry: AssignmentRegistry,
    sessions: Vec<Session>,
    state: OrchestratorState,
    is_loading: bool,
    next_stream_id: u64,
    client: Client,
    cancel_token: CancellationToken,
    transcript: Vec<MergedEntry>,
    readiness_errors: Vec<ReadinessError>,
    last_prompt: String,
}

impl Orchestrator {
    pub fn new(registry: AssignmentRegistry, client: Client) -> Self {
        Self {
            registry,
            sessions: Vec::new(),
            state: OrchestratorState::Idle,
            is_loading: false,
            next_stream_id: 0,
            client,
            cancel_token: CancellationToken::new(),
            transcript: Vec::new(),
            readiness_errors: Vec::new(),
            last_prompt: String::new(),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn registry(&self) -> &AssignmentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AssignmentRegistry {
        &mut self.registry
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Sessions in assignment order.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, index: SessionIndex) -> Option<&Session> {
        self.sessions.iter().find(|s| s.index == index)
    }

    pub fn transcript(&self) -> &[MergedEntry] {
        &self.transcript
    }

    pub fn readiness_errors(&self) -> &[ReadinessError] {
        &self.readiness_errors
    }

    /// Build or reconcile sessions for the assigned hosts and ask for them to
    /// be warmed. Returns `None` when nothing is assigned.
    ///
    /// A session survives when its host keeps the same model; otherwise it is
    /// replaced with an empty one. Sessions of unassigned hosts are dropped.
    pub fn begin_chat(&mut self) -> Option<Vec<ReadinessTarget>> {
        if !self.registry.has_assignment() || self.state == OrchestratorState::AwaitingSessionReady
        {
            return None;
        }

        // A round whose every streaming session is about to be replaced still
        // ends here, while the partial outputs are around to merge.
        let still_streaming = self.registry.assigned().any(|(i, _, model)| {
            self.sessions
                .iter()
                .any(|s| s.index == SessionIndex(i) && s.model == model && s.is_streaming())
        });
        if self.is_loading && !still_streaming {
            self.finish_round();
        }

        let mut previous = std::mem::take(&mut self.sessions);
        let mut targets = Vec::new();
        for (i, host, model) in self.registry.assigned() {
            let index = SessionIndex(i);
            let kept = previous
                .iter()
                .position(|s| s.index == index && s.model == model)
                .map(|pos| previous.swap_remove(pos));
            let session =
                kept.unwrap_or_else(|| Session::new(index, &host.name, &host.url, model));
            targets.push(ReadinessTarget {
                index,
                host_name: host.name.clone(),
                base_url: host.url.clone(),
                model: model.to_string(),
            });
            self.sessions.push(session);
        }
        self.is_loading = still_streaming;
        self.readiness_errors.clear();
        self.state = OrchestratorState::AwaitingSessionReady;
        info!(sessions = targets.len(), "awaiting session readiness");
        Some(targets)
    }

    pub fn complete_readiness(&mut self, results: Vec<ReadinessResult>) {
        if self.state != OrchestratorState::AwaitingSessionReady {
            return;
        }
        self.readiness_errors = results
            .into_iter()
            .filter_map(|r| match r.outcome {
                Ok(()) => None,
                Err(message) => Some(ReadinessError {
                    host_name: r.host_name,
                    message,
                }),
            })
            .collect();
        self.state = if self.readiness_errors.is_empty() {
            OrchestratorState::ChatActive
        } else {
            OrchestratorState::Idle
        };
        info!(state = ?self.state, "readiness complete");
    }

    /// Start one round on every session. Returns the streams to spawn, or an
    /// empty list when the input is blank, chat is not active, or a round is
    /// still running.
    pub fn submit(&mut self, user_text: &str) -> Vec<StreamParams> {
        let text = user_text.trim();
        if text.is_empty() || self.state != OrchestratorState::ChatActive || self.is_loading {
            return Vec::new();
        }

        self.last_prompt = text.to_string();
        let mut params = Vec::with_capacity(self.sessions.len());
        for session in &mut self.sessions {
            self.next_stream_id += 1;
            let stream_id = self.next_stream_id;
            let api_messages = session.start(text, stream_id);
            debug!(host = %session.host_name, model = %session.model, stream_id, "round started");
            params.push(StreamParams {
                client: self.client.clone(),
                base_url: session.base_url.clone(),
                model: session.model.clone(),
                api_messages,
                cancel_token: self.cancel_token.clone(),
                index: session.index,
                stream_id,
            });
        }
        self.is_loading = !params.is_empty();
        params
    }

    pub fn dispatch(&mut self, envelope: SessionEnvelope) -> DispatchOutcome {
        let Some(session) = self
            .sessions
            .iter_mut()
            .find(|s| s.index == envelope.index)
        else {
            return DispatchOutcome::Ignored;
        };
        if !session.is_streaming() || session.stream_id() != envelope.stream_id {
            return DispatchOutcome::Ignored;
        }

        match envelope.event {
            SessionEvent::Fragment(text) => session.on_fragment(&text),
            SessionEvent::Terminal(metadata) => session.on_terminal(metadata),
            SessionEvent::Error(err) => {
                info!(host = %session.host_name, model = %session.model, "session failed: {err}");
                session.on_error(err);
            }
        }

        let was_loading = self.is_loading;
        self.is_loading = self.sessions.iter().any(Session::is_streaming);
        if was_loading && !self.is_loading {
            self.finish_round();
            return DispatchOutcome::RoundComplete;
        }
        DispatchOutcome::Applied
    }

    fn finish_round(&mut self) {
        let lines = self
            .sessions
            .iter()
            .filter(|s| !s.round_output().is_empty())
            .map(|s| format!("[{}]: {}", s.label(), s.round_output()))
            .collect();
        self.transcript.push(MergedEntry {
            prompt: self.last_prompt.clone(),
            lines,
        });
        info!(round = self.transcript.len(), "round complete");
    }

    /// Back to the assignment view. Running streams keep going.
    pub fn reassign(&mut self) {
        self.state = OrchestratorState::Idle;
    }

    /// Stop every stream task; used on application exit.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

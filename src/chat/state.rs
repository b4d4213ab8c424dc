//! Observable conversation state

use super::message::{Message, Session};
use chrono::Utc;

/// Controller lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not yet mounted
    Uninitialized,
    /// Reading persisted state
    Restoring,
    /// No saved session; bootstrapping one with the backend
    AwaitingSessionCreation,
    /// Ready for a submission
    Idle,
    /// A message exchange is in flight
    Sending,
}

/// Network activity as seen by a rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// No exchange in flight
    Idle,
    /// Session bootstrap in flight
    CreatingSession,
    /// Message exchange in flight
    Sending,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CreatingSession => write!(f, "creating session"),
            Self::Sending => write!(f, "sending"),
        }
    }
}

/// Everything a rendering surface needs to paint the conversation
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Current session, `None` until the backend assigns one
    pub session: Option<Session>,
    /// Chronological history
    pub messages: Vec<Message>,
    /// Lifecycle phase
    pub phase: Phase,
    /// Whether the chat panel is shown
    pub open: bool,
    /// Pending text in the input box
    pub input: String,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            session: None,
            messages: Vec::new(),
            phase: Phase::Uninitialized,
            open: false,
            input: String::new(),
        }
    }
}

impl ConversationState {
    /// Network activity derived from the phase
    pub fn request_status(&self) -> RequestStatus {
        match self.phase {
            Phase::AwaitingSessionCreation => RequestStatus::CreatingSession,
            Phase::Sending => RequestStatus::Sending,
            Phase::Uninitialized | Phase::Restoring | Phase::Idle => RequestStatus::Idle,
        }
    }

    /// Whether a pending indicator should be shown
    pub fn is_pending(&self) -> bool {
        self.request_status() != RequestStatus::Idle
    }

    /// Current session id, if any
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// Look up a message by id
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Mutable lookup of a message by id
    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Id derived from the current time in milliseconds, optionally prefixed
    ///
    /// Collisions with existing ids (two messages in the same millisecond,
    /// or restored history) bump the counter until the id is unused.
    pub fn next_message_id(&self, prefix: &str) -> String {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let id = if prefix.is_empty() {
                millis.to_string()
            } else {
                format!("{}-{}", prefix, millis)
            };
            if self.message(&id).is_none() {
                return id;
            }
            millis += 1;
        }
    }
}

//! Conversation data model
//!
//! These types are persisted as JSON, so their serialized shape is part of
//! the storage format: a message is
//! `{ id, role, content, timestamp, sources?, status? }` and a source is
//! `{ title, url, relevance_score }`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned identifier correlating a sequence of exchanges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session id as returned by the backend
    pub id: String,
}

impl Session {
    /// Wrap a backend-provided id
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the person using the surface
    User,
    /// Produced by the assistant service (or the local error fallback)
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Delivery outcome of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The backend answered the exchange
    Sent,
    /// The exchange failed; the message can be retried
    Failed,
}

/// A citation attached to an assistant answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Human-readable title of the cited page
    #[serde(default)]
    pub title: String,
    /// Link to the cited page
    #[serde(default)]
    pub url: String,
    /// Relevance in `[0, 1]`
    #[serde(default)]
    pub relevance_score: f64,
}

impl Source {
    /// Create a source
    pub fn new(title: impl Into<String>, url: impl Into<String>, relevance_score: f64) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            relevance_score,
        }
    }

    /// Relevance rendered as a percentage with one decimal
    ///
    /// Scores outside `[0, 1]` are clamped.
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::chat::Source;
    ///
    /// let source = Source::new("Ch.1", "/docs/intro", 0.92);
    /// assert_eq!(source.relevance_percent(), "92.0%");
    /// ```
    pub fn relevance_percent(&self) -> String {
        let score = if self.relevance_score.is_nan() {
            0.0
        } else {
            self.relevance_score.clamp(0.0, 1.0)
        };
        format!("{:.1}%", score * 100.0)
    }
}

/// One turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a conversation
    pub id: String,
    /// Who authored the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// Creation time as ISO-8601 text, kept exactly as written
    pub timestamp: String,
    /// Citations, only on assistant answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Delivery outcome, only on user messages once their exchange settles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

impl Message {
    /// Creates a user message stamped with the current time
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::chat::{Message, Role};
    ///
    /// let msg = Message::user("1700000000000", "What is a humanoid robot?");
    /// assert_eq!(msg.role, Role::User);
    /// assert!(msg.sources.is_none());
    /// ```
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            timestamp: now_iso8601(),
            sources: None,
            status: None,
        }
    }

    /// Creates an assistant message; an empty source list is stored as absent
    pub fn assistant(
        id: impl Into<String>,
        content: impl Into<String>,
        sources: Vec<Source>,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: now_iso8601(),
            sources: if sources.is_empty() {
                None
            } else {
                Some(sources)
            },
            status: None,
        }
    }

    /// Citations attached to this message, empty if none
    pub fn sources(&self) -> &[Source] {
        self.sources.as_deref().unwrap_or(&[])
    }

    /// Whether this is a user message whose exchange failed
    pub fn is_failed(&self) -> bool {
        self.role == Role::User && self.status == Some(DeliveryStatus::Failed)
    }

    /// Whether this is the local stand-in appended when an exchange failed
    ///
    /// Such messages never came from the backend.
    pub fn is_error_notice(&self) -> bool {
        self.role == Role::Assistant && self.id.starts_with("error-")
    }
}

/// Current UTC time with millisecond precision, e.g. `2024-01-15T10:30:00.000Z`
fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

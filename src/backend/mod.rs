//! Remote assistant service abstraction
//!
//! This module defines the [`BackendClient`] trait the session controller
//! talks to, along with the request and reply types of the chat protocol.
//! [`HttpBackend`] implements it over HTTP/JSON.

use crate::chat::{Session, Source};
use crate::error::{DocchatError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod http;

pub use http::HttpBackend;

/// Situational metadata forwarded verbatim with every message
///
/// `extra` entries are flattened next to `current_page` and `course` on the
/// wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    /// Path of the page the reader is on
    pub current_page: String,
    /// Course the documentation belongs to
    pub course: String,
    /// Any additional entries
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ChatContext {
    /// Create a context for a page within a course
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::backend::ChatContext;
    ///
    /// let ctx = ChatContext::new("/docs/intro", "physical-ai-humanoid-robotics");
    /// let json = serde_json::to_value(&ctx).unwrap();
    /// assert_eq!(json["current_page"], "/docs/intro");
    /// ```
    pub fn new(current_page: impl Into<String>, course: impl Into<String>) -> Self {
        Self {
            current_page: current_page.into(),
            course: course.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Add an extra entry
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Assistant answer to a submitted message
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Answer text
    pub content: String,
    /// Citations, in the order the backend ranked them
    pub sources: Vec<Source>,
    /// Session the backend recorded the exchange under
    pub session_id: String,
}

/// A message as stored by the backend for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMessage {
    /// Backend message id
    pub id: String,
    /// `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
    /// ISO-8601 time as reported by the backend
    #[serde(default)]
    pub timestamp: String,
    /// Citations, if any
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
}

/// Reader judgment of an assistant answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    /// Helpful
    Positive,
    /// Neither
    Neutral,
    /// Unhelpful
    Negative,
}

impl Rating {
    /// Wire value: `1`, `0` or `-1`
    pub fn value(self) -> i8 {
        match self {
            Self::Positive => 1,
            Self::Neutral => 0,
            Self::Negative => -1,
        }
    }

    /// Parse `up`/`down`/`neutral` (and `+`, `-`, `0`)
    ///
    /// # Errors
    ///
    /// Returns `DocchatError::Config` for anything else
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "up" | "+" | "1" | "good" | "positive" => Ok(Self::Positive),
            "neutral" | "0" => Ok(Self::Neutral),
            "down" | "-" | "-1" | "bad" | "negative" => Ok(Self::Negative),
            other => Err(DocchatError::Config(format!(
                "Invalid rating: {}. Must be one of: up, neutral, down",
                other
            ))
            .into()),
        }
    }
}

/// Feedback on one assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    /// Session the message belongs to
    pub session_id: String,
    /// Rated message id
    pub message_id: String,
    /// The judgment
    pub rating: Rating,
    /// Optional free text
    pub comment: Option<String>,
}

/// Remote assistant service
///
/// `create_session` and `send_message` are required. History and feedback
/// are optional capabilities; the defaults report them as unsupported.
/// Implementations do not retry and do not impose deadlines of their own
/// beyond transport limits; the controller owns both.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Create a session seeded with an initial message
    async fn create_session(&self, initial_message: &str) -> Result<Session>;

    /// Submit a message; `session_id` is `None` when no session exists yet
    async fn send_message(
        &self,
        session_id: Option<&str>,
        text: &str,
        context: &ChatContext,
    ) -> Result<ChatReply>;

    /// Page through the backend's record of a session
    async fn fetch_history(
        &self,
        _session_id: &str,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<RemoteMessage>> {
        Err(DocchatError::Backend("History is not supported by this backend".to_string()).into())
    }

    /// Record feedback on an assistant message
    async fn send_feedback(&self, _feedback: &Feedback) -> Result<()> {
        Err(DocchatError::Backend("Feedback is not supported by this backend".to_string()).into())
    }
}

#[async_trait]
impl<T: BackendClient + ?Sized> BackendClient for Arc<T> {
    async fn create_session(&self, initial_message: &str) -> Result<Session> {
        (**self).create_session(initial_message).await
    }

    async fn send_message(
        &self,
        session_id: Option<&str>,
        text: &str,
        context: &ChatContext,
    ) -> Result<ChatReply> {
        (**self).send_message(session_id, text, context).await
    }

    async fn fetch_history(
        &self,
        session_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RemoteMessage>> {
        (**self).fetch_history(session_id, limit, offset).await
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<()> {
        (**self).send_feedback(feedback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalBackend;

    #[async_trait]
    impl BackendClient for MinimalBackend {
        async fn create_session(&self, _initial_message: &str) -> Result<Session> {
            Ok(Session::new("s1"))
        }

        async fn send_message(
            &self,
            session_id: Option<&str>,
            text: &str,
            _context: &ChatContext,
        ) -> Result<ChatReply> {
            Ok(ChatReply {
                content: format!("echo: {}", text),
                sources: Vec::new(),
                session_id: session_id.unwrap_or("s1").to_string(),
            })
        }
    }

    #[test]
    fn test_context_flattens_extra_entries() {
        let ctx = ChatContext::new("/docs/intro", "robotics").with_entry("locale", "ur");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["current_page"], "/docs/intro");
        assert_eq!(json["course"], "robotics");
        assert_eq!(json["locale"], "ur");
    }

    #[test]
    fn test_rating_values() {
        assert_eq!(Rating::Positive.value(), 1);
        assert_eq!(Rating::Neutral.value(), 0);
        assert_eq!(Rating::Negative.value(), -1);
    }

    #[test]
    fn test_rating_parse() {
        assert_eq!(Rating::parse_str("up").unwrap(), Rating::Positive);
        assert_eq!(Rating::parse_str(" DOWN ").unwrap(), Rating::Negative);
        assert_eq!(Rating::parse_str("0").unwrap(), Rating::Neutral);
        assert!(Rating::parse_str("meh").is_err());
    }

    #[tokio::test]
    async fn test_default_optional_capabilities_error() {
        let backend = MinimalBackend;
        let history = backend.fetch_history("s1", 10, 0).await;
        assert!(history.unwrap_err().to_string().contains("not supported"));

        let feedback = Feedback {
            session_id: "s1".to_string(),
            message_id: "m1".to_string(),
            rating: Rating::Positive,
            comment: None,
        };
        assert!(backend.send_feedback(&feedback).await.is_err());
    }

    #[tokio::test]
    async fn test_arc_backend_delegates() {
        let backend = Arc::new(MinimalBackend);
        let reply = backend
            .send_message(None, "hi", &ChatContext::default())
            .await
            .unwrap();
        assert_eq!(reply.content, "echo: hi");
        assert_eq!(reply.session_id, "s1");
    }
}

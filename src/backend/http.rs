//! HTTP/JSON implementation of the assistant protocol
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `POST /api/chat/session` creates a session
//! - `POST /api/chat` submits a message
//! - `GET /api/chat/session/{id}/history` pages through a session
//! - `POST /api/feedback` rates an answer
//!
//! Any non-2xx status or undecodable body is reported as
//! `DocchatError::Backend`.

use super::{BackendClient, ChatContext, ChatReply, Feedback, RemoteMessage};
use crate::chat::{Session, Source};
use crate::config::BackendConfig;
use crate::error::{DocchatError, Result};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Assistant service client over HTTP
///
/// # Examples
///
/// ```
/// use docchat::backend::HttpBackend;
/// use docchat::config::BackendConfig;
///
/// let backend = HttpBackend::new(&BackendConfig::default()).unwrap();
/// assert_eq!(backend.base_url().as_str(), "http://localhost:8000/");
/// ```
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    initial_message: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    session_id: Option<&'a str>,
    context: &'a ChatContext,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
    #[serde(default)]
    sources: Vec<Source>,
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<RemoteMessage>,
}

#[derive(Debug, Serialize)]
struct FeedbackRequest<'a> {
    session_id: &'a str,
    message_id: &'a str,
    rating: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FeedbackResponse {
    #[serde(default)]
    status: String,
}

impl HttpBackend {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns `DocchatError::Config` if the base URL is invalid and
    /// `DocchatError::Backend` if the HTTP client cannot be built
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            DocchatError::Config(format!("Invalid backend URL {}: {}", config.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DocchatError::Backend(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized assistant backend: base_url={}", base_url);

        Ok(Self { client, base_url })
    }

    /// The configured base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve path segments against the base URL, escaping each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DocchatError::Config(format!("Backend URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            tracing::error!("{} request failed: {}", what, e);
            DocchatError::Backend(format!("{} request failed: {}", what, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("{} returned error {}: {}", what, status, error_text);
            return Err(DocchatError::Backend(format!(
                "{} returned error {}: {}",
                what, status, error_text
            ))
            .into());
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!("Failed to parse {} response: {}", what, e);
            DocchatError::Backend(format!("Failed to parse {} response: {}", what, e)).into()
        })
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn create_session(&self, initial_message: &str) -> Result<Session> {
        let url = self.endpoint(&["api", "chat", "session"])?;
        tracing::debug!("Creating chat session at {}", url);

        let body = SessionRequest { initial_message };
        let response: SessionResponse = self
            .execute("Session creation", self.client.post(url).json(&body))
            .await?;

        tracing::info!("Backend created session {}", response.session_id);
        Ok(Session::new(response.session_id))
    }

    async fn send_message(
        &self,
        session_id: Option<&str>,
        text: &str,
        context: &ChatContext,
    ) -> Result<ChatReply> {
        let url = self.endpoint(&["api", "chat"])?;
        tracing::debug!(
            "Sending chat message: session={:?}, page={}, {} chars",
            session_id,
            context.current_page,
            text.len()
        );

        let body = ChatRequest {
            message: text,
            session_id,
            context,
        };
        let response: ChatResponse = self
            .execute("Chat", self.client.post(url).json(&body))
            .await?;

        tracing::debug!(
            "Chat response: session={}, {} sources",
            response.session_id,
            response.sources.len()
        );

        Ok(ChatReply {
            content: response.response,
            sources: response.sources,
            session_id: response.session_id,
        })
    }

    async fn fetch_history(
        &self,
        session_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RemoteMessage>> {
        let url = self.endpoint(&["api", "chat", "session", session_id, "history"])?;
        let request = self
            .client
            .get(url)
            .query(&[("limit", limit), ("offset", offset)]);

        let response: HistoryResponse = self.execute("History", request).await?;
        Ok(response.messages)
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<()> {
        let url = self.endpoint(&["api", "feedback"])?;
        let body = FeedbackRequest {
            session_id: &feedback.session_id,
            message_id: &feedback.message_id,
            rating: feedback.rating.value(),
            comment: feedback.comment.as_deref(),
        };

        let response: FeedbackResponse = self
            .execute("Feedback", self.client.post(url).json(&body))
            .await?;
        tracing::debug!("Feedback accepted: {}", response.status);
        Ok(())
    }
}

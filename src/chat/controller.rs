//! Session controller: the conversation state machine
//!
//! The controller owns a [`ConversationState`] and is the only thing that
//! mutates it. Rendering surfaces read snapshots (or subscribe to a watch
//! channel) and send intents: mount, submit, clear, toggle, abort, retry,
//! rate.
//!
//! # Invariants
//!
//! - At most one exchange (session bootstrap or message send) is in flight.
//!   The phase is the lock: intents that would start a second exchange are
//!   ignored rather than queued.
//! - Messages are only ever appended; a settled user message may have its
//!   delivery status updated in place, nothing is reordered or removed
//!   except by `clear`.
//! - Every change to the history or session id is written through to the
//!   store while the state lock is held, so the persisted value always
//!   matches some in-memory state in order.
//! - A pending `mount` or `submit` whose future is dropped settles as a
//!   failure, exactly as if it had been aborted.
//! - No intent returns an error. Backend and storage failures are logged and
//!   folded into the conversation.

use super::message::{DeliveryStatus, Message, Role, Session};
use super::state::{ConversationState, Phase, RequestStatus};
use crate::backend::{BackendClient, ChatContext, ChatReply, Feedback, Rating};
use crate::config::ChatConfig;
use crate::error::{DocchatError, Result};
use crate::storage::{PersistentStore, MESSAGES_KEY, SESSION_ID_KEY};

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Result of mounting the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    /// Mount already happened (or is happening); nothing was done
    AlreadyMounted,
    /// A saved session id was found and restored
    Restored,
    /// No saved session; the backend created a new one
    SessionCreated,
    /// No saved session and the backend could not create one
    SessionUnavailable,
}

/// Result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank text, or another exchange is in flight; nothing changed
    Ignored,
    /// The assistant answered
    Delivered,
    /// The exchange failed; an error message was appended
    Failed,
}

/// Conversation state machine
///
/// Generic over the store and the backend so tests can inject in-memory
/// doubles. Methods take `&self`: share one controller behind an `Arc`
/// between the surface and any background tasks.
///
/// # Examples
///
/// ```
/// use docchat::backend::{BackendClient, ChatContext, ChatReply};
/// use docchat::chat::{Session, SessionController, SubmitOutcome};
/// use docchat::config::ChatConfig;
/// use docchat::storage::MemoryStore;
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl BackendClient for Echo {
///     async fn create_session(&self, _msg: &str) -> docchat::Result<Session> {
///         Ok(Session::new("s1"))
///     }
///     async fn send_message(
///         &self,
///         session_id: Option<&str>,
///         text: &str,
///         _ctx: &ChatContext,
///     ) -> docchat::Result<ChatReply> {
///         Ok(ChatReply {
///             content: text.to_uppercase(),
///             sources: vec![],
///             session_id: session_id.unwrap_or("s1").to_string(),
///         })
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let controller = SessionController::new(MemoryStore::new(), Echo, ChatConfig::default());
/// controller.mount().await;
/// assert_eq!(controller.submit("hello").await, SubmitOutcome::Delivered);
/// assert_eq!(controller.snapshot().messages[1].content, "HELLO");
/// # }
/// ```
pub struct SessionController<S, B> {
    store: S,
    backend: B,
    config: ChatConfig,
    request_timeout: Duration,
    state: Mutex<ConversationState>,
    context: Mutex<ChatContext>,
    inflight: Mutex<Option<CancellationToken>>,
    updates: watch::Sender<ConversationState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session id saved in `store`, if any
pub fn saved_session<S: PersistentStore + ?Sized>(store: &S) -> Option<Session> {
    store
        .get(SESSION_ID_KEY)
        .filter(|id| !id.trim().is_empty())
        .map(Session::new)
}

/// History saved in `store`
///
/// A missing or unreadable value yields an empty history.
pub fn saved_messages<S: PersistentStore + ?Sized>(store: &S) -> Vec<Message> {
    let Some(json) = store.get(MESSAGES_KEY) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<Message>>(&json) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!("Ignoring unreadable saved history: {}", e);
            Vec::new()
        }
    }
}

/// Settles an exchange as failed if the future driving it is dropped
///
/// A caller may drop `mount` or `submit` at any await (a timeout, a losing
/// `select!` branch); the phase must still return to `Idle` and the abort
/// token must be released. Disarm once the exchange has settled normally.
struct ExchangeGuard<'a, S: PersistentStore, B: BackendClient> {
    controller: &'a SessionController<S, B>,
    user_message_id: Option<String>,
    armed: bool,
}

impl<'a, S: PersistentStore, B: BackendClient> ExchangeGuard<'a, S, B> {
    fn new(controller: &'a SessionController<S, B>, user_message_id: Option<String>) -> Self {
        Self {
            controller,
            user_message_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<S: PersistentStore, B: BackendClient> Drop for ExchangeGuard<'_, S, B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        tracing::warn!("Exchange dropped before it settled");
        self.controller.end_request();
        match &self.user_message_id {
            Some(id) => self
                .controller
                .settle(id, Err(DocchatError::Aborted.into())),
            None => self.controller.update(|state| state.phase = Phase::Idle),
        }
    }
}

impl<S: PersistentStore, B: BackendClient> SessionController<S, B> {
    /// Create an unmounted controller
    pub fn new(store: S, backend: B, config: ChatConfig) -> Self {
        let context = ChatContext::new(config.default_page.clone(), config.course.clone());
        let request_timeout = Duration::from_secs(config.request_timeout_seconds);
        let (updates, _) = watch::channel(ConversationState::default());

        Self {
            store,
            backend,
            config,
            request_timeout,
            state: Mutex::new(ConversationState::default()),
            context: Mutex::new(context),
            inflight: Mutex::new(None),
            updates,
        }
    }

    /// Override the per-exchange deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The backend this controller talks to
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ConversationState {
        lock(&self.state).clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.updates.subscribe()
    }

    /// Network activity right now
    pub fn request_status(&self) -> RequestStatus {
        lock(&self.state).request_status()
    }

    /// Current session id, if any
    pub fn session_id(&self) -> Option<String> {
        lock(&self.state).session_id().map(str::to_string)
    }

    /// Context forwarded with the next message
    pub fn context(&self) -> ChatContext {
        lock(&self.context).clone()
    }

    /// Record the page the reader navigated to
    pub fn set_current_page(&self, page: impl Into<String>) {
        let page = page.into();
        tracing::debug!("Current page is now {}", page);
        lock(&self.context).current_page = page;
    }

    /// Whether `text` would be accepted by [`submit`](Self::submit) now
    pub fn can_submit(&self, text: &str) -> bool {
        !text.trim().is_empty() && lock(&self.state).phase == Phase::Idle
    }

    /// Replace the input buffer
    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|state| state.input = text);
    }

    /// Apply a mutation and publish the resulting state
    fn update<R>(&self, f: impl FnOnce(&mut ConversationState) -> R) -> R {
        let mut state = lock(&self.state);
        let result = f(&mut state);
        self.updates.send_replace(state.clone());
        result
    }

    fn save_messages(&self, messages: &[Message]) {
        if messages.is_empty() {
            return;
        }

        match serde_json::to_string(messages) {
            Ok(json) => {
                if !self.store.set(MESSAGES_KEY, &json) {
                    tracing::warn!(
                        "Could not persist {} messages; history will not survive a restart",
                        messages.len()
                    );
                }
            }
            Err(e) => tracing::warn!("Failed to serialize message history: {}", e),
        }
    }

    fn save_session(&self, session: Option<&Session>) {
        if let Some(session) = session {
            if !self.store.set(SESSION_ID_KEY, &session.id) {
                tracing::warn!("Could not persist session id {}", session.id);
            }
        }
    }

    /// Adopt a backend-provided session id; the latest one always wins
    fn adopt_session(state: &mut ConversationState, id: &str) -> bool {
        if state.session_id() == Some(id) {
            return false;
        }
        if let Some(old) = state.session_id() {
            tracing::info!("Backend switched session from {} to {}", old, id);
        }
        state.session = Some(Session::new(id));
        true
    }

    fn begin_request(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *lock(&self.inflight) = Some(token.clone());
        token
    }

    fn end_request(&self) {
        lock(&self.inflight).take();
    }

    /// Run one exchange under the deadline, stopping early if aborted
    async fn exchange<T>(
        &self,
        token: &CancellationToken,
        request: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            _ = token.cancelled() => Err(DocchatError::Aborted.into()),
            outcome = tokio::time::timeout(self.request_timeout, request) => match outcome {
                Ok(result) => result,
                Err(_) => Err(DocchatError::Timeout(self.request_timeout).into()),
            },
        }
    }

    /// Restore persisted state, bootstrapping a session if none was saved
    ///
    /// Only the first call does anything; later or concurrent calls return
    /// [`MountOutcome::AlreadyMounted`] without touching the backend.
    pub async fn mount(&self) -> MountOutcome {
        let needs_session = {
            let mut state = lock(&self.state);
            if state.phase != Phase::Uninitialized {
                return MountOutcome::AlreadyMounted;
            }
            state.phase = Phase::Restoring;

            state.session = saved_session(&self.store);
            state.messages = saved_messages(&self.store);
            tracing::info!(
                "Restored {} messages, session={:?}",
                state.messages.len(),
                state.session_id()
            );

            let needs_session = state.session.is_none();
            state.phase = if needs_session {
                Phase::AwaitingSessionCreation
            } else {
                Phase::Idle
            };
            self.updates.send_replace(state.clone());
            needs_session
        };

        if !needs_session {
            return MountOutcome::Restored;
        }

        let guard = ExchangeGuard::new(self, None);
        let token = self.begin_request();
        let created = self
            .exchange(
                &token,
                self.backend.create_session(&self.config.welcome_message),
            )
            .await;
        self.end_request();

        let outcome = match created {
            Ok(session) => {
                tracing::info!("Started session {}", session.id);
                self.update(|state| {
                    Self::adopt_session(state, &session.id);
                    self.save_session(state.session.as_ref());
                    state.phase = Phase::Idle;
                });
                MountOutcome::SessionCreated
            }
            Err(e) => {
                tracing::warn!("Could not create chat session: {:#}", e);
                self.update(|state| state.phase = Phase::Idle);
                MountOutcome::SessionUnavailable
            }
        };
        guard.disarm();
        outcome
    }

    /// Submit the current input buffer
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = lock(&self.state).input.clone();
        self.submit(&text).await
    }

    /// Append a user message and exchange it with the backend
    ///
    /// Ignored if `text` is blank or the controller is not idle. Otherwise
    /// the user message is visible immediately and exactly one assistant
    /// message follows, either the answer or the configured error text.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            tracing::debug!("Ignoring blank submission");
            return SubmitOutcome::Ignored;
        }

        let accepted = self.update(|state| {
            if state.phase != Phase::Idle {
                return None;
            }
            let id = state.next_message_id("");
            state.messages.push(Message::user(id.clone(), text));
            state.input.clear();
            state.phase = Phase::Sending;
            self.save_messages(&state.messages);
            Some((id, state.session_id().map(str::to_string)))
        });

        let Some((user_message_id, session_id)) = accepted else {
            tracing::debug!("Ignoring submission while {}", self.request_status());
            return SubmitOutcome::Ignored;
        };

        let guard = ExchangeGuard::new(self, Some(user_message_id.clone()));
        let context = self.context();
        let token = self.begin_request();
        let result = self
            .exchange(&token, self.deliver(session_id, text, &context))
            .await;
        self.end_request();

        let outcome = match result {
            Ok(reply) => {
                self.settle(&user_message_id, Ok(reply));
                SubmitOutcome::Delivered
            }
            Err(e) => {
                tracing::error!("Chat exchange failed: {:#}", e);
                self.settle(&user_message_id, Err(e));
                SubmitOutcome::Failed
            }
        };
        guard.disarm();
        outcome
    }

    /// Send a message, bootstrapping a session first if there is none
    async fn deliver(
        &self,
        mut session_id: Option<String>,
        text: &str,
        context: &ChatContext,
    ) -> Result<ChatReply> {
        if session_id.is_none() && self.config.retry_session_before_send {
            match self
                .backend
                .create_session(&self.config.welcome_message)
                .await
            {
                Ok(session) => {
                    tracing::info!("Started session {} before sending", session.id);
                    self.update(|state| {
                        if Self::adopt_session(state, &session.id) {
                            self.save_session(state.session.as_ref());
                        }
                    });
                    session_id = Some(session.id);
                }
                Err(e) => {
                    tracing::warn!("Session bootstrap failed, sending without one: {:#}", e)
                }
            }
        }

        self.backend
            .send_message(session_id.as_deref(), text, context)
            .await
    }

    /// Fold the outcome of an exchange into the conversation
    fn settle(&self, user_message_id: &str, result: Result<ChatReply>) {
        self.update(|state| {
            let delivered = result.is_ok();
            if let Some(message) = state.message_mut(user_message_id) {
                message.status = Some(if delivered {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                });
            }

            match result {
                Ok(reply) => {
                    let id = state.next_message_id("assistant");
                    state
                        .messages
                        .push(Message::assistant(id, reply.content, reply.sources));
                    if Self::adopt_session(state, &reply.session_id) {
                        self.save_session(state.session.as_ref());
                    }
                }
                Err(_) => {
                    let id = state.next_message_id("error");
                    state.messages.push(Message::assistant(
                        id,
                        self.config.error_message.clone(),
                        Vec::new(),
                    ));
                }
            }

            state.phase = Phase::Idle;
            self.save_messages(&state.messages);
        });
    }

    /// Resubmit the content of a failed user message as a new turn
    ///
    /// Ignored unless `message_id` names a failed user message and the
    /// controller is idle.
    pub async fn retry(&self, message_id: &str) -> SubmitOutcome {
        let content = lock(&self.state)
            .message(message_id)
            .filter(|m| m.is_failed())
            .map(|m| m.content.clone());
        let Some(content) = content else {
            tracing::debug!("Nothing to retry for message {}", message_id);
            return SubmitOutcome::Ignored;
        };
        self.submit(&content).await
    }

    /// Id of the most recent failed user message, if any
    pub fn last_failed_message(&self) -> Option<String> {
        lock(&self.state)
            .messages
            .iter()
            .rev()
            .find(|m| m.is_failed())
            .map(|m| m.id.clone())
    }

    /// Id of the most recent answer from the backend, if any
    ///
    /// Local error notices are skipped.
    pub fn last_assistant_message(&self) -> Option<String> {
        lock(&self.state)
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.is_error_notice())
            .map(|m| m.id.clone())
    }

    /// Empty the history and forget the persisted copy; the session stays
    pub fn clear(&self) {
        self.update(|state| {
            state.messages.clear();
            if !self.store.remove(MESSAGES_KEY) {
                tracing::warn!("Could not remove persisted history");
            }
        });
        tracing::info!("Cleared chat history");
    }

    /// Forget both the history and the session id
    ///
    /// The next mount (or submission, with lazy bootstrap) starts a fresh
    /// session. Ignored while an exchange is in flight.
    pub fn reset(&self) -> bool {
        self.update(|state| {
            if state.is_pending() {
                return false;
            }
            state.messages.clear();
            state.session = None;
            self.store.remove(MESSAGES_KEY);
            self.store.remove(SESSION_ID_KEY);
            tracing::info!("Reset chat session");
            true
        })
    }

    /// Flip the panel visibility; returns the new value
    pub fn toggle_open(&self) -> bool {
        self.update(|state| {
            state.open = !state.open;
            state.open
        })
    }

    /// Cancel the in-flight exchange, if any
    ///
    /// The exchange resolves as a failure. Returns whether anything was
    /// cancelled.
    pub fn abort(&self) -> bool {
        match lock(&self.inflight).take() {
            Some(token) => {
                tracing::info!("Aborting in-flight request");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Send feedback on an assistant message
    ///
    /// Returns `false` if the message is unknown, is not an answer from the
    /// backend, there is no session, or the backend rejected it.
    pub async fn rate(&self, message_id: &str, rating: Rating, comment: Option<String>) -> bool {
        let session_id = {
            let state = lock(&self.state);
            let is_answer = state
                .message(message_id)
                .map(|m| m.role == Role::Assistant && !m.is_error_notice())
                .unwrap_or(false);
            state
                .session_id()
                .filter(|_| is_answer)
                .map(str::to_string)
        };
        let Some(session_id) = session_id else {
            tracing::debug!("Cannot rate message {}", message_id);
            return false;
        };

        let feedback = Feedback {
            session_id,
            message_id: message_id.to_string(),
            rating,
            comment,
        };

        match tokio::time::timeout(self.request_timeout, self.backend.send_feedback(&feedback))
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!("Feedback for {} failed: {:#}", message_id, e);
                false
            }
            Err(_) => {
                tracing::warn!("Feedback for {} timed out", message_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Source;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Backend answering from fixed values and counting calls
    #[derive(Default)]
    struct ScriptedBackend {
        session_id: Option<String>,
        reply_session_id: Option<String>,
        fail_send: bool,
        send_delay: Option<Duration>,
        hang: bool,
        hang_session: bool,
        create_calls: AtomicUsize,
        send_calls: AtomicUsize,
        sent_sessions: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl BackendClient for ScriptedBackend {
        async fn create_session(&self, _initial_message: &str) -> Result<Session> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_session {
                std::future::pending::<()>().await;
            }
            match &self.session_id {
                Some(id) => Ok(Session::new(id.clone())),
                None => Err(DocchatError::Backend("connection refused".to_string()).into()),
            }
        }

        async fn send_message(
            &self,
            session_id: Option<&str>,
            text: &str,
            _context: &ChatContext,
        ) -> Result<ChatReply> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.sent_sessions).push(session_id.map(str::to_string));
            if self.hang {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.send_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_send {
                return Err(DocchatError::Backend("connection refused".to_string()).into());
            }
            Ok(ChatReply {
                content: format!("re: {}", text),
                sources: vec![Source::new("Ch.1", "/docs/intro", 0.92)],
                session_id: self
                    .reply_session_id
                    .clone()
                    .or_else(|| session_id.map(str::to_string))
                    .unwrap_or_else(|| "server-made".to_string()),
            })
        }
    }

    fn controller(
        backend: ScriptedBackend,
    ) -> (
        SessionController<Arc<MemoryStore>, Arc<ScriptedBackend>>,
        Arc<MemoryStore>,
        Arc<ScriptedBackend>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(backend);
        let controller =
            SessionController::new(Arc::clone(&store), Arc::clone(&backend), ChatConfig::default());
        (controller, store, backend)
    }

    fn online() -> ScriptedBackend {
        ScriptedBackend {
            session_id: Some("s1".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mount_without_saved_state_creates_session() {
        let (controller, store, backend) = controller(online());

        assert_eq!(controller.mount().await, MountOutcome::SessionCreated);
        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("s1"));
        assert_eq!(controller.request_status(), RequestStatus::Idle);
        assert!(store.get(MESSAGES_KEY).is_none());
    }

    #[tokio::test]
    async fn test_mount_with_saved_session_skips_backend() {
        let (controller, store, backend) = controller(online());
        store.set(SESSION_ID_KEY, "saved");

        assert_eq!(controller.mount().await, MountOutcome::Restored);
        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.session_id().as_deref(), Some("saved"));
    }

    #[tokio::test]
    async fn test_mount_failure_leaves_no_session() {
        let (controller, store, _backend) = controller(ScriptedBackend::default());

        assert_eq!(controller.mount().await, MountOutcome::SessionUnavailable);
        assert!(controller.session_id().is_none());
        assert!(store.get(SESSION_ID_KEY).is_none());
        assert_eq!(controller.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_second_mount_is_noop() {
        let (controller, _store, backend) = controller(online());
        controller.mount().await;
        assert_eq!(controller.mount().await, MountOutcome::AlreadyMounted);
        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_before_mount_is_ignored() {
        let (controller, _store, backend) = controller(online());
        assert_eq!(controller.submit("hi").await, SubmitOutcome::Ignored);
        assert_eq!(backend.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_assistant() {
        let (controller, store, _backend) = controller(online());
        controller.mount().await;
        controller.set_input("What is a humanoid robot?");

        let outcome = controller.submit_input().await;
        assert_eq!(outcome, SubmitOutcome::Delivered);

        let state = controller.snapshot();
        assert!(state.input.is_empty());
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.messages[0].status, Some(DeliveryStatus::Sent));
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert_eq!(state.messages[1].sources()[0].relevance_percent(), "92.0%");

        let persisted: Vec<Message> =
            serde_json::from_str(&store.get(MESSAGES_KEY).unwrap()).unwrap();
        assert_eq!(persisted, state.messages);
    }

    #[tokio::test]
    async fn test_failed_send_appends_error_message() {
        let (controller, _store, _backend) = controller(ScriptedBackend {
            session_id: Some("s1".to_string()),
            fail_send: true,
            ..Default::default()
        });
        controller.mount().await;

        assert_eq!(controller.submit("ping").await, SubmitOutcome::Failed);

        let state = controller.snapshot();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content, "ping");
        assert!(state.messages[0].is_failed());
        assert_eq!(state.messages[1].content, ChatConfig::default().error_message);
        assert!(state.messages[1].sources.is_none());
        assert_eq!(state.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_session_drift_is_adopted() {
        let (controller, store, _backend) = controller(ScriptedBackend {
            session_id: Some("s1".to_string()),
            reply_session_id: Some("s2".to_string()),
            ..Default::default()
        });
        controller.mount().await;
        controller.submit("hello").await;

        assert_eq!(controller.session_id().as_deref(), Some("s2"));
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn test_lazy_session_bootstrap_before_send() {
        let backend = ScriptedBackend::default();
        let (controller, store, backend) = controller(backend);
        controller.mount().await;
        assert!(controller.session_id().is_none());

        // Backend still cannot create sessions, so the send goes out without one
        controller.submit("first").await;
        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 2);
        assert_eq!(*lock(&backend.sent_sessions), vec![None::<String>]);
        assert_eq!(controller.session_id().as_deref(), Some("server-made"));
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("server-made"));
    }

    #[tokio::test]
    async fn test_lazy_bootstrap_disabled_sends_null_session() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(ScriptedBackend::default());
        let config = ChatConfig {
            retry_session_before_send: false,
            ..Default::default()
        };
        let controller = SessionController::new(Arc::clone(&store), Arc::clone(&backend), config);
        controller.mount().await;
        controller.submit("first").await;

        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*lock(&backend.sent_sessions), vec![None::<String>]);
    }

    #[tokio::test]
    async fn test_timeout_resolves_as_failure() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(ScriptedBackend {
            session_id: Some("s1".to_string()),
            hang: true,
            ..Default::default()
        });
        let controller =
            SessionController::new(Arc::clone(&store), Arc::clone(&backend), ChatConfig::default())
                .with_request_timeout(Duration::from_millis(50));
        controller.mount().await;

        assert_eq!(controller.submit("hello?").await, SubmitOutcome::Failed);
        assert_eq!(controller.request_status(), RequestStatus::Idle);
        assert_eq!(controller.snapshot().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_abort_resolves_as_failure() {
        let (controller, _store, _backend) = controller(ScriptedBackend {
            session_id: Some("s1".to_string()),
            hang: true,
            ..Default::default()
        });
        controller.mount().await;
        assert!(!controller.abort());

        let (outcome, aborted) = tokio::join!(controller.submit("stuck"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            controller.abort()
        });

        assert!(aborted);
        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(controller.snapshot().messages.len(), 2);
        assert_eq!(controller.request_status(), RequestStatus::Idle);
    }

    #[tokio::test]
    async fn test_dropped_submit_settles_as_failure() {
        let (controller, store, backend) = controller(ScriptedBackend {
            session_id: Some("s1".to_string()),
            hang: true,
            ..Default::default()
        });
        controller.mount().await;

        let dropped =
            tokio::time::timeout(Duration::from_millis(20), controller.submit("x")).await;
        assert!(dropped.is_err());

        let state = controller.snapshot();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.messages.len(), 2);
        assert!(state.messages[0].is_failed());
        assert!(state.messages[1].is_error_notice());
        assert!(!controller.abort());

        let persisted: Vec<Message> =
            serde_json::from_str(&store.get(MESSAGES_KEY).unwrap()).unwrap();
        assert_eq!(persisted, state.messages);

        // The next submission is accepted and reaches the backend
        assert!(controller.can_submit("y"));
        let again = tokio::time::timeout(Duration::from_millis(20), controller.submit("y")).await;
        assert!(again.is_err());
        assert_eq!(backend.send_calls.load(Ordering::SeqCst), 2);
        assert_eq!(controller.snapshot().messages.len(), 4);
    }

    #[tokio::test]
    async fn test_dropped_mount_returns_to_idle() {
        let (controller, _store, backend) = controller(ScriptedBackend {
            session_id: Some("s1".to_string()),
            hang_session: true,
            ..Default::default()
        });

        let dropped = tokio::time::timeout(Duration::from_millis(20), controller.mount()).await;
        assert!(dropped.is_err());

        assert_eq!(controller.snapshot().phase, Phase::Idle);
        assert_eq!(controller.request_status(), RequestStatus::Idle);
        assert!(controller.session_id().is_none());
        assert!(!controller.abort());
        assert!(controller.can_submit("hi"));
        assert_eq!(controller.mount().await, MountOutcome::AlreadyMounted);
        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_completed_submit_is_not_settled_twice() {
        let (controller, _store, _backend) = controller(online());
        controller.mount().await;
        controller.submit("ok").await;

        let state = controller.snapshot();
        assert_eq!(state.messages.len(), 2);
        assert!(!state.messages[1].is_error_notice());
    }

    #[tokio::test]
    async fn test_last_assistant_message_skips_error_notices() {
        let (controller, store, _backend) = controller(online());
        let history = vec![
            Message::user("1", "What is ROS?"),
            Message::assistant("assistant-2", "ROS is...", Vec::new()),
            Message::user("3", "And Gazebo?"),
            Message::assistant("error-4", "Sorry", Vec::new()),
        ];
        store.set(SESSION_ID_KEY, "s1");
        store.set(MESSAGES_KEY, &serde_json::to_string(&history).unwrap());
        controller.mount().await;

        assert_eq!(
            controller.last_assistant_message().as_deref(),
            Some("assistant-2")
        );
        assert!(!controller.rate("error-4", Rating::Negative, None).await);
    }

    #[tokio::test]
    async fn test_retry_resubmits_failed_message() {
        let (controller, _store, backend) = controller(ScriptedBackend {
            session_id: Some("s1".to_string()),
            fail_send: true,
            ..Default::default()
        });
        controller.mount().await;
        controller.submit("ping").await;

        let failed = controller.last_failed_message().expect("failed message");
        assert_eq!(controller.retry(&failed).await, SubmitOutcome::Failed);
        assert_eq!(backend.send_calls.load(Ordering::SeqCst), 2);

        let state = controller.snapshot();
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.messages[2].content, "ping");
    }

    #[tokio::test]
    async fn test_retry_ignores_delivered_message() {
        let (controller, _store, backend) = controller(online());
        controller.mount().await;
        controller.submit("ok").await;
        let id = controller.snapshot().messages[0].id.clone();

        assert_eq!(controller.retry(&id).await, SubmitOutcome::Ignored);
        assert_eq!(controller.retry("missing").await, SubmitOutcome::Ignored);
        assert_eq!(backend.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_session() {
        let (controller, store, _backend) = controller(online());
        controller.mount().await;
        controller.submit("hello").await;

        controller.clear();
        assert!(controller.snapshot().messages.is_empty());
        assert!(store.get(MESSAGES_KEY).is_none());
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_reset_forgets_session() {
        let (controller, store, _backend) = controller(online());
        controller.mount().await;
        controller.submit("hello").await;

        assert!(controller.reset());
        assert!(controller.session_id().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_open_is_not_persisted() {
        let (controller, store, _backend) = controller(online());
        controller.mount().await;
        let keys_before = store.len();

        assert!(controller.toggle_open());
        assert!(!controller.toggle_open());
        assert_eq!(store.len(), keys_before);
    }

    #[tokio::test]
    async fn test_subscribers_see_pending_state() {
        let (controller, _store, _backend) = controller(ScriptedBackend {
            session_id: Some("s1".to_string()),
            send_delay: Some(Duration::from_millis(30)),
            ..Default::default()
        });
        controller.mount().await;
        let mut updates = controller.subscribe();

        let (_, saw_pending) = tokio::join!(controller.submit("hi"), async {
            updates.changed().await.expect("sender alive");
            updates.borrow().is_pending()
        });

        assert!(saw_pending);
        assert!(!controller.snapshot().is_pending());
    }

    #[tokio::test]
    async fn test_context_follows_current_page() {
        let (controller, _store, _backend) = controller(online());
        assert_eq!(controller.context().current_page, "/");
        controller.set_current_page("/docs/kinematics");
        assert_eq!(controller.context().current_page, "/docs/kinematics");
        assert_eq!(controller.context().course, "physical-ai-humanoid-robotics");
    }

    #[tokio::test]
    async fn test_can_submit() {
        let (controller, _store, _backend) = controller(online());
        assert!(!controller.can_submit("hi"));
        controller.mount().await;
        assert!(controller.can_submit("hi"));
        assert!(!controller.can_submit("   "));
    }
}

//! docchat - documentation chat assistant client library
//!
//! This library keeps a conversation with a remote question-answering
//! service about a body of documentation. It tracks a server-issued session,
//! keeps the message history in local storage across restarts, and exposes a
//! small set of intents (submit, clear, toggle, abort, retry, rate) to any
//! rendering surface.
//!
//! # Architecture
//!
//! - `chat`: conversation model, state and the session controller
//! - `backend`: assistant service abstraction and its HTTP client
//! - `storage`: best-effort persistent key/value stores
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli` and `commands`: the terminal surface
//!
//! # Example
//!
//! ```no_run
//! use docchat::backend::HttpBackend;
//! use docchat::chat::SessionController;
//! use docchat::storage::open_store;
//! use docchat::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let store = open_store(&config.storage)?;
//!     let backend = HttpBackend::new(&config.backend)?;
//!     let controller = SessionController::new(store, backend, config.chat.clone());
//!
//!     controller.mount().await;
//!     controller.submit("What is a humanoid robot?").await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use backend::{BackendClient, HttpBackend};
pub use chat::{Message, SessionController};
pub use config::Config;
pub use error::{DocchatError, Result};
pub use storage::PersistentStore;

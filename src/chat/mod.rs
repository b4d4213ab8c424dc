//! Conversation model and the controller that drives it
//!
//! - [`message`]: persisted data types (messages, sources, sessions)
//! - [`state`]: the observable conversation state
//! - [`controller`]: the state machine reacting to user intents

pub mod controller;
pub mod message;
pub mod state;

pub use controller::{
    saved_messages, saved_session, MountOutcome, SessionController, SubmitOutcome,
};
pub use message::{DeliveryStatus, Message, Role, Session, Source};
pub use state::{ConversationState, Phase, RequestStatus};

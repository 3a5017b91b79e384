//! Conversational layer for Deskmate.
//!
//! Wires entity extraction, intent prediction and FAQ retrieval into a
//! per-session turn loop with follow-up handling, clarifying questions and
//! analytics logging.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod response;

pub use context::{
    ConversationContext, ConversationManager, ConversationState, FollowUp, TurnPlan,
};
pub use error::ChatError;
pub use orchestrator::{Reply, Session, SupportBot};
pub use response::ResponseComposer;

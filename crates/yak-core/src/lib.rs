//! # Yak Core
//!
//! The dialog engine of the Yak runtime.
//!
//! A bot built on Yak is a set of [`Topic`]s. Each end user gets a
//! [`Session`] holding a stack of active contexts, one per entered topic.
//! Incoming messages are routed to the hooks of the active topic first and
//! to the hooks of the `global` topic second.
//!
//! ## Layers
//!
//! - **Definitions**: [`def_topic`], [`def_pattern`], [`def_hook`] assemble
//!   the descriptors the engine runs.
//! - **Context stack**: [`DialogState::enter_topic`] and
//!   [`DialogState::exit_topic`] maintain the per-session stack with strict
//!   top-only discipline; continuations carry results back to the caller.
//! - **Dispatch**: [`process_message`] resolves the hook for a message
//!   (local first, then global, honouring allow/deny lists).
//!
//! ```text
//! ┌──────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Message  │────▶│ Local hooks    │────▶│ Global hooks │
//! └──────────┘     │ (active topic) │ no  │ (eligible)   │
//!                  └────────────────┘match└──────────────┘
//!                          │                     │
//!                          ▼                     ▼
//!                   handler replies       handler replies
//! ```
//!
//! Sessions are plain serializable values; persistence, channel formatting
//! and batching live in `yak-runtime`.

pub mod definition;
pub mod dialog;
pub mod dispatcher;
pub mod error;
pub mod hook;
pub mod message;
pub mod session;
pub mod stack;
pub mod topic;

pub use definition::{PatternMatch, def_hook, def_pattern, def_topic, match_patterns, try_def_pattern};
pub use dialog::{ContextRef, Dialog, DialogState};
pub use dispatcher::{process_message, run_hook};
pub use error::{BoxError, YakError, YakResult};
pub use hook::Hook;
pub use message::{IntoReplies, Message, Outgoing};
pub use session::{Context, ContextStack, Session};
pub use stack::active_context;
pub use topic::{
    AfterInitFn, ContinuationFn, ExternalSession, GLOBAL_TOPIC, InitFn, MAIN_TOPIC, Topic,
    TopicOptions, TopicRegistry,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::definition::{PatternMatch, def_hook, def_pattern, def_topic, try_def_pattern};
    pub use super::dialog::DialogState;
    pub use super::error::{YakError, YakResult};
    pub use super::message::{IntoReplies, Message, Outgoing};
    pub use super::topic::{GLOBAL_TOPIC, MAIN_TOPIC, Topic, TopicOptions};
}

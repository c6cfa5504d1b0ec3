//! # Yak
//!
//! Topic-stack dialog management for conversational bots.
//!
//! ## Overview
//!
//! A bot is a set of topics. Every end user gets a session holding a stack
//! of active topic contexts; each incoming message is routed to the hooks of
//! the topic on top of that stack, then to the hooks of the `global` topic.
//! Topics can nest other topics and receive their result back through a
//! named continuation.
//!
//! ```text
//! ┌──────────┐     ┌────────────┐     ┌────────────┐     ┌──────────────┐
//! │   Host   │────▶│ YakRuntime │────▶│ Dispatcher │────▶│ Hook handler │
//! │ (adapter)│◀────│ load/save  │     │local→global│     │ enter / exit │
//! └──────────┘     └────────────┘     └────────────┘     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use yak::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), YakError> {
//!     let hello = try_def_pattern(MAIN_TOPIC, "hello", ["hello"], |_, _| async { Ok("hi") })?;
//!     let main = def_topic(
//!         MAIN_TOPIC,
//!         |_, _| async { Ok(serde_json::Value::Null) },
//!         TopicOptions::new().root(true).hook(hello),
//!     );
//!
//!     let runtime = init(vec![main], YakOptions::default())?;
//!     let replies = runtime
//!         .handle(serde_json::json!({"id": "u1", "type": "text"}), "hello")
//!         .await?;
//!     assert_eq!(replies, vec![serde_json::json!("hi")]);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use yak_core as core;
pub use yak_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use yak::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use yak_runtime::{
        Incoming, MemorySessionStore, MessageFormatter, MessageOptions, SessionStore, Strategy,
        TextFormatter, YakOptions, YakRuntime, init,
    };

    // Definitions and dialog state
    pub use yak_core::prelude::*;
    pub use yak_core::{Hook, def_hook};

    // Logging
    pub use yak_runtime::logging::{LoggingBuilder, SpanEvents};
    pub use yak_runtime::tracing::{debug, error, info, trace, warn};
}

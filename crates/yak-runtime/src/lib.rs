//! Yak Runtime - session orchestration for the Yak dialog engine.
//!
//! This crate provides:
//! - The per-call orchestrator ([`YakRuntime`], built with [`init`])
//! - Session persistence contract and an in-memory store
//! - Channel formatters and batch selection strategies
//! - Configuration loading (`figment`) and logging setup (`tracing-subscriber`)
//!
//! ```ignore
//! use yak_runtime::config::load_config;
//! use yak_runtime::{YakOptions, init, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let runtime = init(topics(), YakOptions::from_config(&config)?)?;
//!     let replies = runtime
//!         .handle(serde_json::json!({"id": "u1", "type": "text"}), "hello")
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod formatter;
pub mod logging;
pub mod runtime;
pub mod store;
pub mod strategy;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, YakConfig};
pub use formatter::{Formatters, MessageFormatter, TEXT_CHANNEL, TextFormatter};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{SessionKeyFn, YakOptions, YakRuntime, field_key, init};
pub use store::{MemorySessionStore, SessionStore};
pub use strategy::{Incoming, MessageOptions, MessageParser, Strategy};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

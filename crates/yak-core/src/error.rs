//! Unified error types for the Yak dialog runtime.
//!
//! Every fallible operation in the engine and in the runtime layer returns a
//! [`YakResult`]. Errors raised by user callbacks (topic `init`, `after_init`,
//! hook parse/handler, continuations) travel through [`YakError::Callback`]
//! untouched; the engine never catches or retries them.

use thiserror::Error;

/// Boxed error type accepted from user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Message used when a topic is entered from a context that is not the top.
pub const ENTER_FROM_STALE: &str = "can only enter from the last context";

/// Message used when a context other than the top tries to exit.
pub const EXIT_FROM_STALE: &str = "can only exit from the current context";

/// Errors produced by the dialog engine and runtime.
#[derive(Debug, Error)]
pub enum YakError {
    /// A topic was entered or exited from a context that is not the top of the stack.
    #[error("stack discipline violated: {0}")]
    StackDiscipline(&'static str),

    /// A topic name could not be resolved against the registry.
    #[error("topic '{0}' is not registered")]
    UnknownTopic(String),

    /// Two topics with the same name were registered.
    #[error("topic '{0}' is registered more than once")]
    DuplicateTopic(String),

    /// A continuation tag could not be resolved on its owning topic.
    #[error("topic '{topic}' has no continuation named '{name}'")]
    UnknownContinuation {
        /// Topic the continuation was looked up on.
        topic: String,
        /// The missing continuation tag.
        name: String,
    },

    /// An operation needed an active context but the stack is empty.
    #[error("no active context")]
    NoActiveContext,

    /// A pattern string failed to compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// Unrecognized message batching strategy.
    #[error("unknown message strategy '{0}'")]
    UnknownStrategy(String),

    /// The `single` strategy received a batch with other than one message.
    #[error("strategy 'single' expects exactly one message, got {0}")]
    BatchNotSingle(usize),

    /// No message formatter registered for a channel type.
    #[error("no formatter registered for channel type '{0}'")]
    UnknownChannel(String),

    /// The external session lacks a field needed to derive the session key.
    #[error("external session has no usable '{0}' field")]
    MissingSessionField(String),

    /// A raw inbound payload could not be turned into a message.
    #[error("failed to format incoming message: {0}")]
    Format(String),

    /// Session persistence failed.
    #[error("session store error: {0}")]
    Store(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid runtime configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error raised by a user callback.
    #[error(transparent)]
    Callback(BoxError),
}

impl YakError {
    /// Wraps an arbitrary callback error.
    pub fn callback(err: impl Into<BoxError>) -> Self {
        Self::Callback(err.into())
    }

    /// Creates a callback error from a message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Callback(msg.into().into())
    }

    /// Creates a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Creates a formatting error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns `true` for stack discipline violations.
    pub fn is_stack_discipline(&self) -> bool {
        matches!(self, Self::StackDiscipline(_))
    }
}

impl From<serde_json::Error> for YakError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type used throughout Yak.
pub type YakResult<T> = Result<T, YakError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_error_is_transparent() {
        let err = YakError::custom("backend unavailable");
        assert_eq!(err.to_string(), "backend unavailable");
    }

    #[test]
    fn test_stack_discipline_message() {
        let err = YakError::StackDiscipline(ENTER_FROM_STALE);
        assert!(err.is_stack_discipline());
        assert_eq!(
            err.to_string(),
            "stack discipline violated: can only enter from the last context"
        );
    }
}

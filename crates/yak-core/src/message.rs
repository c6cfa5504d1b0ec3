//! Normalized inbound messages and outgoing replies.
//!
//! Channel formatters turn raw platform payloads into a [`Message`]; the
//! dispatcher only ever looks at its text. Handlers answer with anything that
//! implements [`IntoReplies`], which the engine normalizes into a sequence of
//! [`Outgoing`] values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single outgoing message. Rendering is left to the host.
pub type Outgoing = Value;

/// A normalized inbound message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Plain text content, if the message carries any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Channel-specific remainder of the payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Message {
    /// Creates a text message.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            payload: Value::Null,
        }
    }

    /// Creates a message without text.
    pub fn from_payload(payload: Value) -> Self {
        Self {
            text: None,
            payload,
        }
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Returns the text content, if any.
    pub fn as_text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Returns `true` if the message carries text.
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::from_text(text)
    }
}

// ============================================================================
// IntoReplies - normalize handler results
// ============================================================================

/// Types that a hook handler or continuation may return.
///
/// A single value becomes a one-element sequence; `()` and `None` become an
/// empty sequence; vectors are flattened in order.
pub trait IntoReplies {
    /// Converts this value into outgoing messages.
    fn into_replies(self) -> Vec<Outgoing>;
}

impl IntoReplies for () {
    fn into_replies(self) -> Vec<Outgoing> {
        Vec::new()
    }
}

impl IntoReplies for Value {
    fn into_replies(self) -> Vec<Outgoing> {
        vec![self]
    }
}

impl IntoReplies for String {
    fn into_replies(self) -> Vec<Outgoing> {
        vec![Value::String(self)]
    }
}

impl IntoReplies for &'static str {
    fn into_replies(self) -> Vec<Outgoing> {
        vec![Value::String(self.to_owned())]
    }
}

impl<T: IntoReplies> IntoReplies for Option<T> {
    fn into_replies(self) -> Vec<Outgoing> {
        self.map(IntoReplies::into_replies).unwrap_or_default()
    }
}

impl<T: IntoReplies> IntoReplies for Vec<T> {
    fn into_replies(self) -> Vec<Outgoing> {
        self.into_iter().flat_map(IntoReplies::into_replies).collect()
    }
}

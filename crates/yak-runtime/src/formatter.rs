//! Channel formatters and the channel-type registry.
//!
//! A formatter turns a channel's raw inbound payload into a normalized
//! [`Message`]. The runtime picks one per call by session type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use yak_core::{Message, YakError, YakResult};

/// Channel type served by [`TextFormatter`] in [`Formatters::default`].
pub const TEXT_CHANNEL: &str = "text";

/// Per-channel parsing of raw inbound payloads.
pub trait MessageFormatter: Send + Sync {
    /// Parses one raw payload.
    fn parse_incoming(&self, raw: &Value) -> YakResult<Message>;

    /// Merges a batch of raw payloads into one message.
    ///
    /// The default parses each payload and joins their texts with newlines.
    /// Payloads of the first message are kept.
    fn merge_incoming(&self, raws: &[Value]) -> YakResult<Message> {
        let parsed = raws
            .iter()
            .map(|raw| self.parse_incoming(raw))
            .collect::<YakResult<Vec<_>>>()?;

        let texts: Vec<&str> = parsed.iter().filter_map(Message::as_text).collect();
        let text = (!texts.is_empty()).then(|| texts.join("\n"));
        let payload = parsed
            .first()
            .map(|m| m.payload.clone())
            .unwrap_or_default();
        Ok(Message { text, payload })
    }
}

/// Plain-text channel.
///
/// Accepts a JSON string, or an object whose `text` field is a string. Other
/// object fields are kept as the message payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl MessageFormatter for TextFormatter {
    fn parse_incoming(&self, raw: &Value) -> YakResult<Message> {
        match raw {
            Value::String(text) => Ok(Message::from_text(text.clone())),
            Value::Object(fields) => {
                let text = match fields.get("text") {
                    Some(Value::String(text)) => Some(text.clone()),
                    None | Some(Value::Null) => None,
                    Some(other) => {
                        return Err(YakError::format(format!(
                            "'text' must be a string, got {other}"
                        )));
                    }
                };
                let mut rest = fields.clone();
                rest.remove("text");
                let payload = if rest.is_empty() {
                    Value::Null
                } else {
                    Value::Object(rest)
                };
                Ok(Message { text, payload })
            }
            other => Err(YakError::format(format!(
                "expected a string or an object, got {other}"
            ))),
        }
    }
}

/// Formatters by channel type.
#[derive(Clone)]
pub struct Formatters {
    by_channel: HashMap<String, Arc<dyn MessageFormatter>>,
}

impl Formatters {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            by_channel: HashMap::new(),
        }
    }

    /// Registers `formatter` for `channel`, replacing any previous one.
    pub fn with(mut self, channel: impl Into<String>, formatter: impl MessageFormatter + 'static) -> Self {
        self.insert(channel, formatter);
        self
    }

    pub fn insert(&mut self, channel: impl Into<String>, formatter: impl MessageFormatter + 'static) {
        self.by_channel.insert(channel.into(), Arc::new(formatter));
    }

    /// # Errors
    ///
    /// [`YakError::UnknownChannel`] if nothing is registered for `channel`.
    pub fn get(&self, channel: &str) -> YakResult<&Arc<dyn MessageFormatter>> {
        self.by_channel
            .get(channel)
            .ok_or_else(|| YakError::UnknownChannel(channel.to_owned()))
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.by_channel.contains_key(channel)
    }
}

impl Default for Formatters {
    fn default() -> Self {
        Self::empty().with(TEXT_CHANNEL, TextFormatter)
    }
}

impl fmt::Debug for Formatters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut channels: Vec<_> = self.by_channel.keys().collect();
        channels.sort();
        f.debug_struct("Formatters").field("channels", &channels).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_formatter_accepts_string_and_object() {
        assert_eq!(
            TextFormatter.parse_incoming(&json!("hi")).unwrap(),
            Message::from_text("hi")
        );

        let message = TextFormatter
            .parse_incoming(&json!({"text": "hi", "chat": 7}))
            .unwrap();
        assert_eq!(message.as_text(), Some("hi"));
        assert_eq!(message.payload, json!({"chat": 7}));
    }

    #[test]
    fn test_text_formatter_rejects_other_shapes() {
        assert!(matches!(
            TextFormatter.parse_incoming(&json!(42)),
            Err(YakError::Format(_))
        ));
        assert!(matches!(
            TextFormatter.parse_incoming(&json!({"text": 1})),
            Err(YakError::Format(_))
        ));
    }

    #[test]
    fn test_merge_skips_textless_payloads() {
        let merged = TextFormatter
            .merge_incoming(&[json!("a"), json!({"sticker": 1}), json!("b")])
            .unwrap();
        assert_eq!(merged.as_text(), Some("a\nb"));
    }

    #[test]
    fn test_registry_lookup() {
        let formatters = Formatters::default();
        assert!(formatters.get(TEXT_CHANNEL).is_ok());
        assert!(matches!(
            formatters.get("fax"),
            Err(YakError::UnknownChannel(c)) if c == "fax"
        ));
        assert!(!Formatters::empty().contains(TEXT_CHANNEL));
    }
}

//! Batch selection: collapsing raw inbound payloads into one message.
//!
//! Hosts may deliver several raw payloads at once (a user typing quickly,
//! a webhook retry queue). [`MessageOptions::select`] turns such a batch into
//! the single [`Message`] that gets dispatched.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;
use yak_core::{Message, YakError, YakResult};

use crate::formatter::MessageFormatter;

/// What the host hands to the runtime: one raw payload or a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Single(Value),
    Batch(Vec<Value>),
}

impl Incoming {
    /// The raw payloads, a single payload counting as a batch of one.
    pub fn into_batch(self) -> Vec<Value> {
        match self {
            Self::Single(raw) => vec![raw],
            Self::Batch(raws) => raws,
        }
    }
}

impl From<Value> for Incoming {
    fn from(raw: Value) -> Self {
        Self::Single(raw)
    }
}

impl From<Vec<Value>> for Incoming {
    fn from(raws: Vec<Value>) -> Self {
        Self::Batch(raws)
    }
}

impl From<&str> for Incoming {
    fn from(text: &str) -> Self {
        Self::Single(Value::String(text.to_owned()))
    }
}

impl From<String> for Incoming {
    fn from(text: String) -> Self {
        Self::Single(Value::String(text))
    }
}

/// How a batch collapses into one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Exactly one payload is expected.
    Single,
    /// The channel formatter merges all payloads.
    Merge,
    First,
    #[default]
    Last,
    /// A user-supplied [`MessageParser`] combines the parsed messages.
    Custom,
}

impl Strategy {
    /// Accepted configuration names.
    pub const NAMES: [&'static str; 5] = ["single", "merge", "first", "last", "custom"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Merge => "merge",
            Self::First => "first",
            Self::Last => "last",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for Strategy {
    type Err = YakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "merge" => Ok(Self::Merge),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "custom" => Ok(Self::Custom),
            other => Err(YakError::UnknownStrategy(other.to_owned())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combines the parsed messages of a batch for [`Strategy::Custom`].
pub type MessageParser = Arc<dyn Fn(Vec<Message>) -> YakResult<Message> + Send + Sync>;

/// Message handling options.
#[derive(Clone, Default)]
pub struct MessageOptions {
    pub strategy: Strategy,
    pub message_parser: Option<MessageParser>,
}

impl MessageOptions {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            message_parser: None,
        }
    }

    /// Uses `parser` with [`Strategy::Custom`].
    pub fn custom<F>(parser: F) -> Self
    where
        F: Fn(Vec<Message>) -> YakResult<Message> + Send + Sync + 'static,
    {
        Self {
            strategy: Strategy::Custom,
            message_parser: Some(Arc::new(parser)),
        }
    }

    /// Fails for `custom` without a parser.
    pub fn validate(&self) -> YakResult<()> {
        if self.strategy == Strategy::Custom && self.message_parser.is_none() {
            return Err(YakError::config(
                "strategy 'custom' requires a message parser",
            ));
        }
        Ok(())
    }

    /// Selects the message to dispatch from `input`.
    ///
    /// Returns `None` for an empty batch.
    pub fn select(
        &self,
        formatter: &dyn MessageFormatter,
        input: Incoming,
    ) -> YakResult<Option<Message>> {
        let batch = input.into_batch();
        trace!(strategy = %self.strategy, size = batch.len(), "Selecting message");

        if batch.is_empty() {
            return Ok(None);
        }

        let message = match self.strategy {
            Strategy::Single => {
                if batch.len() != 1 {
                    return Err(YakError::BatchNotSingle(batch.len()));
                }
                formatter.parse_incoming(&batch[0])?
            }
            Strategy::Merge => formatter.merge_incoming(&batch)?,
            Strategy::First => formatter.parse_incoming(&batch[0])?,
            Strategy::Last => formatter.parse_incoming(&batch[batch.len() - 1])?,
            Strategy::Custom => {
                let parser = self.message_parser.as_ref().ok_or_else(|| {
                    YakError::config("strategy 'custom' requires a message parser")
                })?;
                let parsed = batch
                    .iter()
                    .map(|raw| formatter.parse_incoming(raw))
                    .collect::<YakResult<Vec<_>>>()?;
                parser(parsed)?
            }
        };
        Ok(Some(message))
    }
}

impl fmt::Debug for MessageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageOptions")
            .field("strategy", &self.strategy)
            .field("message_parser", &self.message_parser.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::TextFormatter;
    use serde_json::json;

    fn batch(texts: &[&str]) -> Incoming {
        Incoming::Batch(texts.iter().map(|t| json!(t)).collect())
    }

    fn select(options: &MessageOptions, input: Incoming) -> YakResult<Option<Message>> {
        options.select(&TextFormatter, input)
    }

    #[test]
    fn test_last_picks_final_payload() {
        let selected = select(&MessageOptions::new(Strategy::Last), batch(&["a", "b", "c"]));
        assert_eq!(selected.unwrap(), Some(Message::from_text("c")));
    }

    #[test]
    fn test_first_picks_initial_payload() {
        let selected = select(&MessageOptions::new(Strategy::First), batch(&["a", "b", "c"]));
        assert_eq!(selected.unwrap(), Some(Message::from_text("a")));
    }

    #[test]
    fn test_merge_joins_texts() {
        let selected = select(&MessageOptions::new(Strategy::Merge), batch(&["a", "b"]));
        assert_eq!(selected.unwrap(), Some(Message::from_text("a\nb")));
    }

    #[test]
    fn test_single_rejects_larger_batch() {
        let options = MessageOptions::new(Strategy::Single);
        assert!(matches!(
            select(&options, batch(&["a", "b"])),
            Err(YakError::BatchNotSingle(2))
        ));
        assert_eq!(
            select(&options, Incoming::from("a")).unwrap(),
            Some(Message::from_text("a"))
        );
    }

    #[test]
    fn test_custom_parser_receives_parsed_batch() {
        let options = MessageOptions::custom(|messages| {
            Ok(Message::from_text(messages.len().to_string()))
        });
        let selected = select(&options, batch(&["a", "b", "c"]));
        assert_eq!(selected.unwrap(), Some(Message::from_text("3")));
    }

    #[test]
    fn test_custom_without_parser_is_invalid() {
        let options = MessageOptions::new(Strategy::Custom);
        assert!(matches!(options.validate(), Err(YakError::Config(_))));
    }

    #[test]
    fn test_empty_batch_selects_nothing() {
        for strategy in [Strategy::Single, Strategy::Merge, Strategy::Last] {
            let selected = select(&MessageOptions::new(strategy), Incoming::Batch(Vec::new()));
            assert_eq!(selected.unwrap(), None);
        }
    }

    #[test]
    fn test_strategy_names_round_trip() {
        for name in Strategy::NAMES {
            assert_eq!(name.parse::<Strategy>().unwrap().as_str(), name);
        }
        assert!(matches!(
            "newest".parse::<Strategy>(),
            Err(YakError::UnknownStrategy(s)) if s == "newest"
        ));
    }
}

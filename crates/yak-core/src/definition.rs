//! Builder functions for topics and hooks.
//!
//! These are pure factories: they assemble descriptors and run nothing.
//!
//! ```rust,ignore
//! use yak_core::{def_pattern, def_topic, TopicOptions};
//! use regex::Regex;
//!
//! let hello = def_pattern(
//!     "main",
//!     "hello",
//!     vec![Regex::new("hello")?],
//!     |_state, _m| async { Ok("hi") },
//! );
//!
//! let main = def_topic(
//!     "main",
//!     |_args, _external| async { Ok(serde_json::Value::Null) },
//!     TopicOptions::new().root(true).hook(hello),
//! );
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use regex::Regex;
use serde_json::Value;

use crate::dialog::DialogState;
use crate::error::{YakError, YakResult};
use crate::hook::Hook;
use crate::message::{IntoReplies, Message};
use crate::topic::{ExternalSession, Topic, TopicOptions};

/// Creates a topic descriptor.
///
/// `init` runs each time the topic is entered and produces the new
/// context's data.
pub fn def_topic<F, Fut>(name: impl Into<String>, init: F, options: TopicOptions) -> Topic
where
    F: Fn(Value, ExternalSession) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = YakResult<Value>> + Send + 'static,
{
    Topic::from_parts(
        name.into(),
        Arc::new(move |args, external| init(args, external).boxed()),
        options,
    )
}

/// The parse result of a pattern hook.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    /// The message that matched.
    pub message: Message,
    /// Position of the matching pattern in the hook's pattern list.
    pub index: usize,
    /// Capture groups; element 0 is the whole match, unmatched groups are `None`.
    pub captures: Vec<Option<String>>,
}

impl PatternMatch {
    /// Returns capture group `i`, if it participated in the match.
    pub fn group(&self, i: usize) -> Option<&str> {
        self.captures.get(i).and_then(Option::as_deref)
    }
}

/// Matches `patterns` against the message text.
///
/// Every pattern is tried in list order. The match starting earliest in the
/// text wins; at equal start offsets the pattern listed first wins. Returns
/// `None` when the message has no text or nothing matches.
pub fn match_patterns(patterns: &[Regex], message: &Message) -> Option<PatternMatch> {
    let text = message.as_text()?;

    let mut best: Option<(usize, usize, regex::Captures<'_>)> = None;
    for (index, pattern) in patterns.iter().enumerate() {
        let Some(captures) = pattern.captures(text) else {
            continue;
        };
        let start = captures.get(0).map_or(0, |m| m.start());
        if best.as_ref().is_none_or(|(s, _, _)| start < *s) {
            best = Some((start, index, captures));
        }
    }

    best.map(|(_, index, captures)| PatternMatch {
        message: message.clone(),
        index,
        captures: captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_owned()))
            .collect(),
    })
}

/// Creates a hook matching the message text against a list of patterns.
pub fn def_pattern<H, Fut, R>(
    topic: impl Into<String>,
    name: impl Into<String>,
    patterns: Vec<Regex>,
    handler: H,
) -> Hook
where
    H: Fn(DialogState, PatternMatch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = YakResult<R>> + Send + 'static,
    R: IntoReplies + 'static,
{
    let patterns = Arc::new(patterns);
    Hook::new(
        topic,
        name,
        move |_state, message: Message| {
            let found = match_patterns(&patterns, &message);
            async move { Ok(found) }
        },
        handler,
    )
}

/// Like [`def_pattern`], compiling the patterns from strings.
///
/// # Errors
///
/// Returns [`YakError::InvalidPattern`] for the first pattern that fails to
/// compile.
pub fn try_def_pattern<I, S, H, Fut, R>(
    topic: impl Into<String>,
    name: impl Into<String>,
    patterns: I,
    handler: H,
) -> YakResult<Hook>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    H: Fn(DialogState, PatternMatch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = YakResult<R>> + Send + 'static,
    R: IntoReplies + 'static,
{
    let compiled = patterns
        .into_iter()
        .map(|p| {
            Regex::new(p.as_ref()).map_err(|source| YakError::InvalidPattern {
                pattern: p.as_ref().to_owned(),
                source,
            })
        })
        .collect::<YakResult<Vec<_>>>()?;
    Ok(def_pattern(topic, name, compiled, handler))
}

/// Creates a hook from an arbitrary parse function and a handler.
pub fn def_hook<T, P, PFut, H, HFut, R>(
    topic: impl Into<String>,
    name: impl Into<String>,
    parse: P,
    handler: H,
) -> Hook
where
    T: Send + 'static,
    P: Fn(DialogState, Message) -> PFut + Send + Sync + 'static,
    PFut: Future<Output = YakResult<Option<T>>> + Send + 'static,
    H: Fn(DialogState, T) -> HFut + Send + Sync + 'static,
    HFut: Future<Output = YakResult<R>> + Send + 'static,
    R: IntoReplies + 'static,
{
    Hook::new(topic, name, parse, handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regexes(sources: &[&str]) -> Vec<Regex> {
        sources.iter().map(|s| Regex::new(s).unwrap()).collect()
    }

    #[test]
    fn test_earliest_match_wins() {
        let found = match_patterns(&regexes(&["foo", "bar"]), &Message::from_text("barfoo")).unwrap();
        assert_eq!(found.index, 1);
        assert_eq!(found.group(0), Some("bar"));
    }

    #[test]
    fn test_list_order_breaks_ties() {
        let found = match_patterns(&regexes(&["ba", "bar"]), &Message::from_text("bar")).unwrap();
        assert_eq!(found.index, 0);
    }

    #[test]
    fn test_captures_and_original_message() {
        let message = Message::from_text("order 3 pizza");
        let found = match_patterns(&regexes(&[r"order (\d+) (\w+)( now)?"]), &message).unwrap();
        assert_eq!(found.message, message);
        assert_eq!(found.group(1), Some("3"));
        assert_eq!(found.group(2), Some("pizza"));
        assert_eq!(found.captures[3], None);
    }

    #[test]
    fn test_no_text_or_no_match() {
        let patterns = regexes(&["hello"]);
        assert!(match_patterns(&patterns, &Message::from_payload(serde_json::json!({}))).is_none());
        assert!(match_patterns(&patterns, &Message::from_text("goodbye")).is_none());
    }

    #[test]
    fn test_try_def_pattern_rejects_invalid() {
        let result = try_def_pattern("main", "broken", ["ok", "("], |_, _| async { Ok(()) });
        assert!(matches!(
            result,
            Err(YakError::InvalidPattern { pattern, .. }) if pattern == "("
        ));
    }

    #[test]
    fn test_builders_record_names() {
        let hook = def_hook(
            "main",
            "always",
            |_, _| async { Ok(Some(())) },
            |_, ()| async { Ok("yes") },
        );
        assert_eq!(hook.name(), "always");
        assert_eq!(hook.topic(), "main");

        let topic = def_topic(
            "main",
            |_, _| async { Ok(Value::Null) },
            TopicOptions::new().root(true).hook(hook),
        );
        assert!(topic.is_root());
        assert_eq!(topic.hooks().len(), 1);
    }
}

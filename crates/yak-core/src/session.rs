//! Persisted session state: the context stack and its contexts.
//!
//! A [`Session`] is a plain value. It is loaded from a store at the start of
//! a call, mutated in place through the stack operations in
//! [`stack`](crate::stack), and handed back to the store at the end.
//!
//! The topic registry is never stored here; contexts refer to their topic by
//! name so a changed registry applies to existing sessions after a restart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Context
// =============================================================================

/// One activation of a topic within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    id: u64,
    topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_topic: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    active_hooks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    disabled_hooks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    continuation: Option<String>,
}

impl Context {
    pub(crate) fn new(
        id: u64,
        topic: impl Into<String>,
        parent_topic: Option<String>,
        data: Value,
        continuation: Option<String>,
    ) -> Self {
        Self {
            id,
            topic: topic.into(),
            parent_topic,
            data,
            active_hooks: Vec::new(),
            disabled_hooks: Vec::new(),
            continuation,
        }
    }

    /// Session-unique identifier of this activation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the topic this context activates.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Name of the topic this context was entered from.
    pub fn parent_topic(&self) -> Option<&str> {
        self.parent_topic.as_deref()
    }

    /// The data returned by the topic's `init`.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Value {
        &mut self.data
    }

    /// Allow-list of global hook names.
    pub fn active_hooks(&self) -> &[String] {
        &self.active_hooks
    }

    /// Deny-list of global hook names.
    pub fn disabled_hooks(&self) -> &[String] {
        &self.disabled_hooks
    }

    /// Continuation tag resolved on the parent topic at exit.
    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    pub(crate) fn set_active_hooks(&mut self, names: Vec<String>) {
        self.active_hooks = names;
    }

    pub(crate) fn set_disabled_hooks(&mut self, names: Vec<String>) {
        self.disabled_hooks = names;
    }

    /// Returns whether the global hook `name` may run while this context is active.
    ///
    /// A non-empty allow-list wins; the deny-list is only consulted when the
    /// allow-list is empty.
    pub fn allows_global_hook(&self, name: &str) -> bool {
        if !self.active_hooks.is_empty() {
            self.active_hooks.iter().any(|n| n == name)
        } else if !self.disabled_hooks.is_empty() {
            !self.disabled_hooks.iter().any(|n| n == name)
        } else {
            true
        }
    }
}

// =============================================================================
// ContextStack
// =============================================================================

/// LIFO stack of contexts. The last element is the active context.
///
/// Mutation is crate-private; callers go through the checked operations on
/// [`DialogState`](crate::DialogState).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextStack(Vec<Context>);

impl ContextStack {
    /// Returns the active context.
    pub fn top(&self) -> Option<&Context> {
        self.0.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut Context> {
        self.0.last_mut()
    }

    pub(crate) fn push(&mut self, context: Context) {
        self.0.push(context);
    }

    pub(crate) fn pop(&mut self) -> Option<Context> {
        self.0.pop()
    }

    /// Replaces the whole stack with one context.
    pub(crate) fn reset(&mut self, context: Context) {
        self.0.clear();
        self.0.push(context);
    }

    pub(crate) fn find_mut(&mut self, id: u64) -> Option<&mut Context> {
        self.0.iter_mut().find(|c| c.id == id)
    }

    /// Looks up a context by id.
    pub fn find(&self, id: u64) -> Option<&Context> {
        self.0.iter().find(|c| c.id == id)
    }

    /// Number of contexts on the stack.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no context is active.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates from bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.0.iter()
    }
}

// =============================================================================
// Session
// =============================================================================

/// The persisted unit of dialog state for one end user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    contexts: ContextStack,
    #[serde(default)]
    virgin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    global: Option<Context>,
    #[serde(default)]
    next_context_id: u64,
}

impl Session {
    /// Creates a fresh session that has never processed a message.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            contexts: ContextStack::default(),
            virgin: true,
            global: None,
            next_context_id: 0,
        }
    }

    /// External session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Channel type of the session.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The context stack.
    pub fn contexts(&self) -> &ContextStack {
        &self.contexts
    }

    pub(crate) fn contexts_mut(&mut self) -> &mut ContextStack {
        &mut self.contexts
    }

    /// The active (top) context, if any.
    pub fn active_context(&self) -> Option<&Context> {
        self.contexts.top()
    }

    /// The global topic's context, if it has been initialized.
    pub fn global_context(&self) -> Option<&Context> {
        self.global.as_ref()
    }

    pub(crate) fn global_context_mut(&mut self) -> Option<&mut Context> {
        self.global.as_mut()
    }

    pub(crate) fn set_global_context(&mut self, context: Context) {
        self.global = Some(context);
    }

    /// Returns `true` before the first message was processed.
    pub fn is_virgin(&self) -> bool {
        self.virgin
    }

    /// Clears the virgin flag, returning its previous value.
    pub fn take_virgin(&mut self) -> bool {
        std::mem::replace(&mut self.virgin, false)
    }

    pub(crate) fn allocate_context_id(&mut self) -> u64 {
        self.next_context_id += 1;
        self.next_context_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(id: u64, topic: &str) -> Context {
        Context::new(id, topic, None, Value::Null, None)
    }

    #[test]
    fn test_stack_is_lifo() {
        let mut stack = ContextStack::default();
        stack.push(context(1, "a"));
        stack.push(context(2, "b"));
        assert_eq!(stack.top().map(Context::topic), Some("b"));
        assert_eq!(stack.pop().map(|c| c.id()), Some(2));
        assert_eq!(stack.top().map(Context::topic), Some("a"));
    }

    #[test]
    fn test_reset_leaves_single_context() {
        let mut stack = ContextStack::default();
        stack.push(context(1, "a"));
        stack.push(context(2, "b"));
        stack.reset(context(3, "main"));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.top().map(Context::id), Some(3));
    }

    #[test]
    fn test_hook_eligibility() {
        let mut ctx = context(1, "a");
        assert!(ctx.allows_global_hook("anything"));

        ctx.set_disabled_hooks(vec!["b".into()]);
        assert!(ctx.allows_global_hook("a"));
        assert!(!ctx.allows_global_hook("b"));

        // allow-list takes precedence over the deny-list
        ctx.set_active_hooks(vec!["b".into()]);
        assert!(ctx.allows_global_hook("b"));
        assert!(!ctx.allows_global_hook("a"));
    }

    #[test]
    fn test_take_virgin() {
        let mut session = Session::new("u1", "text");
        assert!(session.take_virgin());
        assert!(!session.take_virgin());
        assert!(!session.is_virgin());
    }

    #[test]
    fn test_session_roundtrip_keeps_stack() {
        let mut session = Session::new("u1", "text");
        let id = session.allocate_context_id();
        session
            .contexts_mut()
            .push(Context::new(id, "main", None, json!({"n": 1}), None));

        let encoded = serde_json::to_value(&session).unwrap();
        assert_eq!(encoded["type"], "text");

        let decoded: Session = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, session);
        assert_eq!(decoded.active_context().map(Context::data), Some(&json!({"n": 1})));
    }
}

//! Per-call dialog handle and the state handed to hooks.
//!
//! This module provides two types that together model one message cycle:
//!
//! - [`Dialog`]: the shared handle for one call. It owns the session being
//!   processed, the topic registry in effect and the host's external session.
//!   It is cloned into every [`DialogState`] created during the call.
//!
//! - [`DialogState`]: what hooks, initializer callbacks and continuations
//!   receive. It pairs the dialog with a reference to one context and with
//!   the topic whose code is running. The stack operations in
//!   [`stack`](crate::stack) check that reference against the live stack to
//!   reject stale callers.
//!
//! The session sits behind a mutex that is only held for short, synchronous
//! sections, never across an await point.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::{YakError, YakResult};
use crate::session::{Context, Session};
use crate::topic::{ExternalSession, GLOBAL_TOPIC, TopicRegistry};

/// Which context a [`DialogState`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRef {
    /// A context on the stack, by id.
    Stack(u64),
    /// The session's global context.
    Global,
    /// No context at all.
    Empty,
}

// =============================================================================
// Dialog
// =============================================================================

struct DialogInner {
    session: Mutex<Session>,
    registry: TopicRegistry,
    external: ExternalSession,
}

/// Shared handle for one message-processing call.
#[derive(Clone)]
pub struct Dialog {
    inner: Arc<DialogInner>,
}

impl Dialog {
    /// Wraps a session for processing.
    pub fn new(session: Session, registry: TopicRegistry, external: ExternalSession) -> Self {
        Self {
            inner: Arc::new(DialogInner {
                session: Mutex::new(session),
                registry,
                external,
            }),
        }
    }

    /// The topic registry in effect for this call.
    pub fn registry(&self) -> &TopicRegistry {
        &self.inner.registry
    }

    /// The host's external session.
    pub fn external(&self) -> &ExternalSession {
        &self.inner.external
    }

    /// Identifier of the session being processed.
    pub fn session_id(&self) -> String {
        self.inner.session.lock().id().to_owned()
    }

    /// Runs `f` with shared access to the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.inner.session.lock())
    }

    pub(crate) fn with_session_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.inner.session.lock())
    }

    /// Returns a copy of the session in its current state.
    pub fn snapshot(&self) -> Session {
        self.inner.session.lock().clone()
    }

    /// The active context, cloned.
    pub fn active_context(&self) -> Option<Context> {
        self.with_session(|s| s.active_context().cloned())
    }

    /// Clears the session's virgin flag, returning its previous value.
    pub fn take_virgin(&self) -> bool {
        self.with_session_mut(Session::take_virgin)
    }

    /// Reference to the active context, falling back to the global context.
    pub fn current_ref(&self) -> ContextRef {
        self.with_session(|s| match s.active_context() {
            Some(top) => ContextRef::Stack(top.id()),
            None if s.global_context().is_some() => ContextRef::Global,
            None => ContextRef::Empty,
        })
    }

    /// A state pointing at the current context and not owned by any topic.
    ///
    /// Used by the host to bootstrap topics outside of any hook.
    pub fn root_state(&self) -> DialogState {
        DialogState::new(self.clone(), self.current_ref(), None)
    }

    /// Initializes the global topic's context once per session.
    ///
    /// Does nothing if no global topic is registered or the session already
    /// carries a global context.
    pub async fn ensure_global_context(&self) -> YakResult<()> {
        let Some(global) = self.registry().global().cloned() else {
            return Ok(());
        };
        if self.with_session(|s| s.global_context().is_some()) {
            return Ok(());
        }

        let data = global
            .init(Value::Null, Arc::clone(self.external()))
            .await?;
        self.with_session_mut(|s| {
            let id = s.allocate_context_id();
            s.set_global_context(Context::new(id, GLOBAL_TOPIC, None, data, None));
        });
        debug!("Initialized global context");
        Ok(())
    }
}

impl fmt::Debug for Dialog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialog")
            .field("session", &*self.inner.session.lock())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// DialogState
// =============================================================================

/// The state passed to hooks, `after_init` callbacks and continuations.
#[derive(Clone)]
pub struct DialogState {
    pub(crate) dialog: Dialog,
    pub(crate) context: ContextRef,
    pub(crate) topic: Option<String>,
}

impl DialogState {
    pub(crate) fn new(dialog: Dialog, context: ContextRef, topic: Option<String>) -> Self {
        Self {
            dialog,
            context,
            topic,
        }
    }

    /// The call's dialog handle.
    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    /// The context this state refers to.
    pub fn context_ref(&self) -> ContextRef {
        self.context
    }

    /// The topic whose code is running, if any.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// The host's external session.
    pub fn external(&self) -> &Value {
        self.dialog.external()
    }

    /// A copy of the referenced context, if it still exists.
    pub fn context(&self) -> Option<Context> {
        let context = self.context;
        self.dialog.with_session(|s| match context {
            ContextRef::Stack(id) => s.contexts().find(id).cloned(),
            ContextRef::Global => s.global_context().cloned(),
            ContextRef::Empty => None,
        })
    }

    /// A copy of the referenced context's data.
    pub fn data(&self) -> Option<Value> {
        self.context().map(|c| c.data().clone())
    }

    /// Mutates a copy of the referenced context's data and stores it back.
    ///
    /// `f` runs without the session lock held, so it may read this state.
    /// Data written through other calls while `f` runs is overwritten.
    pub fn update_data<R>(&self, f: impl FnOnce(&mut Value) -> R) -> YakResult<R> {
        let mut data = self.data().ok_or(YakError::NoActiveContext)?;
        let out = f(&mut data);
        self.set_data(data)?;
        Ok(out)
    }

    /// Replaces the referenced context's data.
    pub fn set_data(&self, value: Value) -> YakResult<()> {
        let context = self.context;
        self.dialog.with_session_mut(|s| {
            let target = match context {
                ContextRef::Stack(id) => s.contexts_mut().find_mut(id),
                ContextRef::Global => s.global_context_mut(),
                ContextRef::Empty => None,
            };
            target
                .map(|c| *c.data_mut() = value)
                .ok_or(YakError::NoActiveContext)
        })
    }

    /// Returns `true` if this state refers to the top of the stack.
    pub fn is_top(&self) -> bool {
        let context = self.context;
        self.dialog.with_session(|s| is_top(s, context))
    }
}

pub(crate) fn is_top(session: &Session, context: ContextRef) -> bool {
    match (session.active_context(), context) {
        (Some(top), ContextRef::Stack(id)) => top.id() == id,
        _ => false,
    }
}

impl fmt::Debug for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogState")
            .field("context", &self.context)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::def_topic;
    use crate::topic::TopicOptions;
    use serde_json::json;

    fn dialog_with(topics: Vec<crate::Topic>) -> Dialog {
        Dialog::new(
            Session::new("u1", "text"),
            TopicRegistry::new(topics).unwrap(),
            Arc::new(json!({"id": "u1"})),
        )
    }

    #[tokio::test]
    async fn test_global_context_initialized_once() {
        let global = def_topic(
            GLOBAL_TOPIC,
            |_, _| async { Ok(json!({"count": 0})) },
            TopicOptions::new(),
        );
        let dialog = dialog_with(vec![global]);
        assert_eq!(dialog.current_ref(), ContextRef::Empty);

        dialog.ensure_global_context().await.unwrap();
        let state = dialog.root_state();
        assert_eq!(state.context_ref(), ContextRef::Global);
        state.set_data(json!({"count": 5})).unwrap();

        // a second call must not re-run init
        dialog.ensure_global_context().await.unwrap();
        assert_eq!(dialog.root_state().data(), Some(json!({"count": 5})));
    }

    #[tokio::test]
    async fn test_no_global_topic_leaves_state_empty() {
        let dialog = dialog_with(Vec::new());
        dialog.ensure_global_context().await.unwrap();

        let state = dialog.root_state();
        assert_eq!(state.context_ref(), ContextRef::Empty);
        assert!(state.data().is_none());
        assert!(matches!(
            state.set_data(json!(1)),
            Err(YakError::NoActiveContext)
        ));
        assert!(matches!(
            state.update_data(|d| d.take()),
            Err(YakError::NoActiveContext)
        ));
    }

    #[tokio::test]
    async fn test_update_data_closure_can_read_state() {
        let global = def_topic(
            GLOBAL_TOPIC,
            |_, _| async { Ok(json!({"count": 1})) },
            TopicOptions::new(),
        );
        let dialog = dialog_with(vec![global]);
        dialog.ensure_global_context().await.unwrap();
        let state = dialog.root_state();

        let before = state
            .update_data(|d| {
                let seen = state.data();
                d["count"] = json!(2);
                seen
            })
            .unwrap();

        assert_eq!(before, Some(json!({"count": 1})));
        assert_eq!(state.data(), Some(json!({"count": 2})));
        assert_eq!(dialog.snapshot().global_context().unwrap().data(), &json!({"count": 2}));
    }
}

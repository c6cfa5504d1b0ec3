//! Topic descriptors and the topic registry.
//!
//! A [`Topic`] is created once at registration time and never changes. It
//! bundles the initializer that produces a context's data, the hooks scoped
//! to the topic, an optional `after_init` callback and the named
//! continuations that nested topics may return into.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::dialog::DialogState;
use crate::error::{YakError, YakResult};
use crate::hook::Hook;
use crate::message::{IntoReplies, Outgoing};

/// Name of the topic whose hooks act as the session-wide fallback.
pub const GLOBAL_TOPIC: &str = "global";

/// Name of the root topic entered on a session's first message.
pub const MAIN_TOPIC: &str = "main";

/// The host's view of the end user session, shared with initializers.
pub type ExternalSession = Arc<Value>;

/// Type-erased topic initializer.
pub type InitFn =
    Arc<dyn Fn(Value, ExternalSession) -> BoxFuture<'static, YakResult<Value>> + Send + Sync>;

/// Type-erased `after_init` callback.
pub type AfterInitFn = Arc<dyn Fn(DialogState) -> BoxFuture<'static, YakResult<()>> + Send + Sync>;

/// Type-erased continuation, run with the parent state and the exit result.
pub type ContinuationFn =
    Arc<dyn Fn(DialogState, Value) -> BoxFuture<'static, YakResult<Vec<Outgoing>>> + Send + Sync>;

// =============================================================================
// Topic
// =============================================================================

/// A named, reusable conversation unit.
#[derive(Clone)]
pub struct Topic {
    name: String,
    is_root: bool,
    init: InitFn,
    hooks: Vec<Hook>,
    after_init: Option<AfterInitFn>,
    continuations: HashMap<String, ContinuationFn>,
}

impl Topic {
    pub(crate) fn from_parts(name: String, init: InitFn, options: TopicOptions) -> Self {
        Self {
            name,
            is_root: options.is_root,
            init,
            hooks: options.hooks,
            after_init: options.after_init,
            continuations: options.continuations,
        }
    }

    /// The topic's registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether entering this topic resets the stack.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Hooks in declaration order.
    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    /// Runs the initializer.
    pub async fn init(&self, args: Value, external: ExternalSession) -> YakResult<Value> {
        (self.init)(args, external).await
    }

    pub(crate) fn after_init(&self) -> Option<&AfterInitFn> {
        self.after_init.as_ref()
    }

    /// Looks up a continuation by tag.
    pub fn continuation(&self, name: &str) -> Option<&ContinuationFn> {
        self.continuations.get(name)
    }

    /// Returns `true` if the topic owns a continuation with this tag.
    pub fn has_continuation(&self, name: &str) -> bool {
        self.continuations.contains_key(name)
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("is_root", &self.is_root)
            .field("hooks", &self.hooks)
            .field("after_init", &self.after_init.is_some())
            .field("continuations", &self.continuations.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// TopicOptions
// =============================================================================

/// Optional parts of a topic definition.
///
/// Defaults: not root, no hooks, no `after_init`, no continuations.
///
/// ```rust,ignore
/// let options = TopicOptions::new()
///     .root(true)
///     .hook(greet)
///     .continuation("ordered", |state, result| async move {
///         Ok(format!("got {result}"))
///     });
/// ```
#[derive(Clone, Default)]
pub struct TopicOptions {
    is_root: bool,
    hooks: Vec<Hook>,
    after_init: Option<AfterInitFn>,
    continuations: HashMap<String, ContinuationFn>,
}

impl TopicOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the topic as a root topic.
    pub fn root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Appends a hook. Hooks run in the order they are added.
    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Appends several hooks.
    pub fn hooks(mut self, hooks: impl IntoIterator<Item = Hook>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Sets the callback run right after the topic's context is installed.
    pub fn after_init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(DialogState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = YakResult<()>> + Send + 'static,
    {
        self.after_init = Some(Arc::new(move |state| f(state).boxed()));
        self
    }

    /// Registers a named continuation.
    ///
    /// A context entered from this topic with `continuation = Some(name)`
    /// runs `f` when it exits, receiving this topic's state and the result.
    pub fn continuation<F, Fut, R>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(DialogState, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = YakResult<R>> + Send + 'static,
        R: IntoReplies + 'static,
    {
        let f = Arc::new(f);
        let erased: ContinuationFn = Arc::new(move |state, result| {
            let f = Arc::clone(&f);
            async move { f(state, result).await.map(IntoReplies::into_replies) }.boxed()
        });
        self.continuations.insert(name.into(), erased);
        self
    }
}

// =============================================================================
// TopicRegistry
// =============================================================================

/// The set of topics in effect for a runtime, keyed by name.
///
/// Cheap to clone.
#[derive(Clone, Default)]
pub struct TopicRegistry {
    topics: Arc<HashMap<String, Arc<Topic>>>,
}

impl TopicRegistry {
    /// Builds a registry, rejecting duplicate names.
    pub fn new(topics: impl IntoIterator<Item = Topic>) -> YakResult<Self> {
        let mut map = HashMap::new();
        for topic in topics {
            let name = topic.name().to_owned();
            if map.insert(name.clone(), Arc::new(topic)).is_some() {
                return Err(YakError::DuplicateTopic(name));
            }
        }
        Ok(Self {
            topics: Arc::new(map),
        })
    }

    /// Looks up a topic by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Topic>> {
        self.topics.get(name)
    }

    /// Looks up a topic by name, failing with [`YakError::UnknownTopic`].
    pub fn require(&self, name: &str) -> YakResult<&Arc<Topic>> {
        self.get(name)
            .ok_or_else(|| YakError::UnknownTopic(name.to_owned()))
    }

    /// The global fallback topic, if registered.
    pub fn global(&self) -> Option<&Arc<Topic>> {
        self.get(GLOBAL_TOPIC)
    }

    /// Returns `true` if a topic with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.topics.contains_key(name)
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if no topic is registered.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Registered topic names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }
}

impl fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("topic_count", &self.topics.len())
            .finish()
    }
}

//! Hooks: named (parse, handle) pairs scoped to a topic.
//!
//! A [`Hook`] keeps its parse step and its handler apart so that "did not
//! match" (`parse` returned `None`) is distinct from "matched and produced no
//! replies" (handler returned an empty sequence). The parse result type is
//! erased once the hook is built, letting hooks with different parse results
//! sit in the same topic.
//!
//! `Hook` uses an internal `Arc` and is cheap to clone.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::trace;

use crate::dialog::DialogState;
use crate::error::YakResult;
use crate::message::{IntoReplies, Message, Outgoing};

/// Type-erased parse step.
pub type ParseFn<T> =
    Arc<dyn Fn(DialogState, Message) -> BoxFuture<'static, YakResult<Option<T>>> + Send + Sync>;

/// Type-erased handler step.
pub type HandlerFn<T> =
    Arc<dyn Fn(DialogState, T) -> BoxFuture<'static, YakResult<Vec<Outgoing>>> + Send + Sync>;

/// Object-safe view over a parse/handler pair with a concrete parse result.
#[async_trait]
trait HookBody: Send + Sync {
    async fn run(&self, state: DialogState, message: &Message) -> YakResult<Option<Vec<Outgoing>>>;
}

struct FnHook<T> {
    parse: ParseFn<T>,
    handler: HandlerFn<T>,
}

#[async_trait]
impl<T: Send + 'static> HookBody for FnHook<T> {
    async fn run(&self, state: DialogState, message: &Message) -> YakResult<Option<Vec<Outgoing>>> {
        let Some(parsed) = (self.parse)(state.clone(), message.clone()).await? else {
            return Ok(None);
        };
        let replies = (self.handler)(state, parsed).await?;
        Ok(Some(replies))
    }
}

struct HookInner {
    name: String,
    topic: String,
    body: Box<dyn HookBody>,
}

/// A named (parse, handle) pair owned by a topic.
#[derive(Clone)]
pub struct Hook {
    inner: Arc<HookInner>,
}

impl Hook {
    /// Builds a hook from a parse function and a handler.
    ///
    /// `parse` returns `Ok(None)` when the message does not concern this
    /// hook. The handler receives the parse result and may return anything
    /// implementing [`IntoReplies`].
    pub fn new<T, P, PFut, H, HFut, R>(
        topic: impl Into<String>,
        name: impl Into<String>,
        parse: P,
        handler: H,
    ) -> Self
    where
        T: Send + 'static,
        P: Fn(DialogState, Message) -> PFut + Send + Sync + 'static,
        PFut: Future<Output = YakResult<Option<T>>> + Send + 'static,
        H: Fn(DialogState, T) -> HFut + Send + Sync + 'static,
        HFut: Future<Output = YakResult<R>> + Send + 'static,
        R: IntoReplies + 'static,
    {
        let handler = Arc::new(handler);
        let body = FnHook {
            parse: Arc::new(move |state, message| parse(state, message).boxed()),
            handler: Arc::new(move |state, parsed| {
                let handler = Arc::clone(&handler);
                async move { handler(state, parsed).await.map(IntoReplies::into_replies) }.boxed()
            }),
        };

        Self {
            inner: Arc::new(HookInner {
                name: name.into(),
                topic: topic.into(),
                body: Box::new(body),
            }),
        }
    }

    /// The hook's name, used by allow/deny lists.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name of the topic owning this hook.
    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Parses the message and, on a match, runs the handler.
    ///
    /// Returns `Ok(None)` if the parse step did not match.
    pub async fn run(
        &self,
        state: DialogState,
        message: &Message,
    ) -> YakResult<Option<Vec<Outgoing>>> {
        trace!(hook = self.name(), topic = self.topic(), "Running hook");
        self.inner.body.run(state, message).await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.inner.name)
            .field("topic", &self.inner.topic)
            .finish_non_exhaustive()
    }
}

//! Hook dispatcher.
//!
//! Resolves which hook handles an incoming message. Resolution runs in two
//! phases and the first matching hook wins:
//!
//! 1. **Local**: hooks of the active context's topic, in declaration order.
//! 2. **Global**: hooks of the `global` topic, in declaration order, limited
//!    to those the active context allows (see
//!    [`Context::allows_global_hook`](crate::Context::allows_global_hook)).
//!    Without an active context every global hook is eligible and runs
//!    against the global context.
//!
//! Hooks run strictly one after another. Errors from parse steps or
//! handlers abort the dispatch and propagate unchanged.

use std::sync::Arc;

use tracing::{Instrument, debug, debug_span, trace};

use crate::dialog::{ContextRef, Dialog, DialogState};
use crate::error::YakResult;
use crate::hook::Hook;
use crate::message::{Message, Outgoing};

/// Runs a single hook.
///
/// Returns `Some(replies)` if the hook's parse step matched and its handler
/// ran, `None` otherwise.
pub async fn run_hook(
    hook: &Hook,
    state: DialogState,
    message: &Message,
) -> YakResult<Option<Vec<Outgoing>>> {
    hook.run(state, message).await
}

/// Dispatches `message` against the session held by `dialog`.
///
/// Returns the matched handler's replies, or an empty sequence if no hook
/// matched.
pub async fn process_message(dialog: &Dialog, message: &Message) -> YakResult<Vec<Outgoing>> {
    let span = debug_span!("dispatch", session = %dialog.session_id());
    async move {
        if let Some(active) = dialog.active_context() {
            let topic = Arc::clone(dialog.registry().require(active.topic())?);
            for hook in topic.hooks() {
                let state = DialogState::new(
                    dialog.clone(),
                    ContextRef::Stack(active.id()),
                    Some(topic.name().to_owned()),
                );
                if let Some(replies) = run_hook(hook, state, message).await? {
                    debug!(hook = hook.name(), topic = hook.topic(), "Local hook matched");
                    return Ok(replies);
                }
            }
        }

        let Some(global) = dialog.registry().global().cloned() else {
            trace!("No local hook matched and no global topic registered");
            return Ok(Vec::new());
        };

        // Local hooks may have changed the stack or its hook scoping.
        let active = dialog.active_context();
        let context = match &active {
            Some(ctx) => ContextRef::Stack(ctx.id()),
            None => dialog.current_ref(),
        };

        for hook in global.hooks() {
            if let Some(ctx) = &active
                && !ctx.allows_global_hook(hook.name())
            {
                trace!(hook = hook.name(), topic = ctx.topic(), "Global hook not eligible");
                continue;
            }
            let state = DialogState::new(dialog.clone(), context, Some(global.name().to_owned()));
            if let Some(replies) = run_hook(hook, state, message).await? {
                debug!(hook = hook.name(), "Global hook matched");
                return Ok(replies);
            }
        }

        trace!("No hook matched");
        Ok(Vec::new())
    }
    .instrument(span)
    .await
}

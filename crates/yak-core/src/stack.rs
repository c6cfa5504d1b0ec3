//! Context stack manager.
//!
//! All changes to a session's context stack go through the operations
//! defined here:
//!
//! - [`DialogState::enter_topic`] pushes a new context (or resets the stack
//!   for root topics) after running the topic's initializer.
//! - [`DialogState::exit_topic`] pops the top context and runs its
//!   continuation, if any.
//! - [`DialogState::disable_hooks_except`], [`DialogState::disable_hooks`] and
//!   [`DialogState::enable_all_hooks`] scope the global hooks for the active
//!   context.
//!
//! Entering and exiting are only allowed from the top of the stack. A caller
//! holding a state for any other context is rejected with
//! [`YakError::StackDiscipline`] and the stack is left untouched.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::dialog::{ContextRef, DialogState, is_top};
use crate::error::{ENTER_FROM_STALE, EXIT_FROM_STALE, YakError, YakResult};
use crate::message::Outgoing;
use crate::session::{Context, Session};
use crate::topic::GLOBAL_TOPIC;

/// Returns the active context of a session.
pub fn active_context(session: &Session) -> Option<&Context> {
    session.active_context()
}

impl DialogState {
    /// Enters `topic` from this state's context.
    ///
    /// Runs the topic's `init` with `init_args`, then installs the new
    /// context: root topics replace the whole stack (discarded contexts never
    /// run their continuations), other topics are pushed on top. If the topic
    /// defines `after_init`, it runs with the new context active; an error
    /// there propagates and leaves the new context installed.
    ///
    /// `continuation` names a continuation registered on the topic running
    /// this state. It is run when the entered context exits.
    ///
    /// # Errors
    ///
    /// - [`YakError::StackDiscipline`] if the stack is non-empty and this
    ///   state does not refer to its top.
    /// - [`YakError::UnknownTopic`] / [`YakError::UnknownContinuation`] for
    ///   unresolvable names.
    /// - Any error raised by `init` or `after_init`.
    pub async fn enter_topic(
        &self,
        topic: &str,
        init_args: Value,
        continuation: Option<&str>,
    ) -> YakResult<()> {
        let target = Arc::clone(self.dialog.registry().require(topic)?);

        let context = self.context;
        self.dialog.with_session(|s| {
            if s.contexts().is_empty() || is_top(s, context) {
                Ok(())
            } else {
                Err(YakError::StackDiscipline(ENTER_FROM_STALE))
            }
        })?;

        if let Some(name) = continuation {
            let owner = self.topic.as_deref().unwrap_or(GLOBAL_TOPIC);
            let known = self
                .dialog
                .registry()
                .get(owner)
                .is_some_and(|t| t.has_continuation(name));
            if !known {
                return Err(YakError::UnknownContinuation {
                    topic: owner.to_owned(),
                    name: name.to_owned(),
                });
            }
        }

        let data = target
            .init(init_args, Arc::clone(self.dialog.external()))
            .await?;

        let id = self.dialog.with_session_mut(|s| {
            let id = s.allocate_context_id();
            let context = Context::new(
                id,
                target.name(),
                self.topic.clone(),
                data,
                continuation.map(str::to_owned),
            );
            if target.is_root() {
                s.contexts_mut().reset(context);
            } else {
                s.contexts_mut().push(context);
            }
            id
        });

        debug!(
            topic = target.name(),
            from = self.topic.as_deref().unwrap_or("-"),
            root = target.is_root(),
            context_id = id,
            "Entered topic"
        );

        if let Some(after_init) = target.after_init() {
            let state = DialogState::new(
                self.dialog.clone(),
                ContextRef::Stack(id),
                Some(target.name().to_owned()),
            );
            after_init(state).await?;
        }

        Ok(())
    }

    /// Exits this state's context, which must be the top of the stack.
    ///
    /// After the pop, this state refers to the new top (or to the global
    /// context when the stack is empty). If the exited context carries a
    /// continuation, it runs with a state for the new top and `result`, and
    /// its replies are returned. Without a continuation no replies are
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`YakError::StackDiscipline`] if this state does not refer to the top.
    /// - [`YakError::UnknownContinuation`] if the continuation tag no longer
    ///   resolves on the parent topic.
    /// - Any error raised by the continuation.
    pub async fn exit_topic(&mut self, result: Value) -> YakResult<Vec<Outgoing>> {
        let context = self.context;
        let exited = self.dialog.with_session_mut(|s| {
            if is_top(s, context) {
                s.contexts_mut()
                    .pop()
                    .ok_or(YakError::StackDiscipline(EXIT_FROM_STALE))
            } else {
                Err(YakError::StackDiscipline(EXIT_FROM_STALE))
            }
        })?;

        let next = self.dialog.current_ref();
        self.context = next;
        self.topic = self.dialog.with_session(|s| match next {
            ContextRef::Stack(_) => s.active_context().map(|c| c.topic().to_owned()),
            ContextRef::Global => Some(GLOBAL_TOPIC.to_owned()),
            ContextRef::Empty => None,
        });

        debug!(
            topic = exited.topic(),
            context_id = exited.id(),
            continuation = exited.continuation().unwrap_or("-"),
            "Exited topic"
        );

        let Some(tag) = exited.continuation() else {
            return Ok(Vec::new());
        };

        let owner = exited.parent_topic().unwrap_or(GLOBAL_TOPIC);
        let continuation = self
            .dialog
            .registry()
            .get(owner)
            .and_then(|t| t.continuation(tag))
            .cloned()
            .ok_or_else(|| YakError::UnknownContinuation {
                topic: owner.to_owned(),
                name: tag.to_owned(),
            })?;

        let state = DialogState::new(self.dialog.clone(), next, Some(owner.to_owned()));
        continuation(state, result).await
    }

    /// Restricts the global hooks for the active context to `names`.
    pub fn disable_hooks_except<I, S>(&self, names: I) -> YakResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.with_active_context(|c| c.set_active_hooks(names))
    }

    /// Excludes the global hooks in `names` for the active context.
    ///
    /// Only consulted while the allow-list is empty.
    pub fn disable_hooks<I, S>(&self, names: I) -> YakResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.with_active_context(|c| c.set_disabled_hooks(names))
    }

    /// Clears both the allow-list and the deny-list of the active context.
    pub fn enable_all_hooks(&self) -> YakResult<()> {
        self.with_active_context(|c| {
            c.set_active_hooks(Vec::new());
            c.set_disabled_hooks(Vec::new());
        })
    }

    fn with_active_context(&self, f: impl FnOnce(&mut Context)) -> YakResult<()> {
        self.dialog.with_session_mut(|s| {
            let top = s.contexts_mut().top_mut().ok_or(YakError::NoActiveContext)?;
            f(top);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::def_topic;
    use crate::dialog::Dialog;
    use crate::topic::{Topic, TopicOptions, TopicRegistry};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn topic(name: &str, options: TopicOptions) -> Topic {
        let owned = name.to_owned();
        def_topic(
            name,
            move |args, _| {
                let owned = owned.clone();
                async move { Ok(json!({"topic": owned, "args": args})) }
            },
            options,
        )
    }

    fn dialog(topics: Vec<Topic>) -> Dialog {
        Dialog::new(
            Session::new("u1", "text"),
            TopicRegistry::new(topics).unwrap(),
            Arc::new(json!({"id": "u1"})),
        )
    }

    fn stack_topics(dialog: &Dialog) -> Vec<String> {
        dialog.with_session(|s| s.contexts().iter().map(|c| c.topic().to_owned()).collect())
    }

    /// State for the current top, as a hook of that topic would see it.
    fn top_state(dialog: &Dialog) -> DialogState {
        let top = dialog.active_context().expect("stack is empty");
        DialogState::new(
            dialog.clone(),
            ContextRef::Stack(top.id()),
            Some(top.topic().to_owned()),
        )
    }

    #[tokio::test]
    async fn test_non_root_entries_push_one_each() {
        let dialog = dialog(vec![
            topic("a", TopicOptions::new()),
            topic("b", TopicOptions::new()),
            topic("c", TopicOptions::new()),
        ]);

        dialog.root_state().enter_topic("a", json!(1), None).await.unwrap();
        for (expected_len, name) in [(2, "b"), (3, "c")] {
            top_state(&dialog).enter_topic(name, json!(null), None).await.unwrap();
            assert_eq!(dialog.with_session(|s| s.contexts().len()), expected_len);
            assert_eq!(dialog.active_context().unwrap().topic(), name);
        }

        let top = dialog.active_context().unwrap();
        assert_eq!(top.parent_topic(), Some("b"));
        assert_eq!(top.data(), &json!({"topic": "c", "args": null}));
        assert!(top.active_hooks().is_empty());
        assert!(top.disabled_hooks().is_empty());
    }

    #[tokio::test]
    async fn test_root_entry_resets_and_drops_continuations() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let dialog = dialog(vec![
            topic(
                "a",
                TopicOptions::new().continuation("back", move |_, _| {
                    let fired = Arc::clone(&fired_clone);
                    async move {
                        fired.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            ),
            topic("b", TopicOptions::new()),
            topic("main", TopicOptions::new().root(true)),
        ]);

        dialog.root_state().enter_topic("a", json!(null), None).await.unwrap();
        top_state(&dialog)
            .enter_topic("b", json!(null), Some("back"))
            .await
            .unwrap();
        top_state(&dialog).enter_topic("main", json!(null), None).await.unwrap();

        assert_eq!(stack_topics(&dialog), vec!["main"]);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(dialog.active_context().unwrap().continuation(), None);

        let mut state = top_state(&dialog);
        let replies = state.exit_topic(json!("done")).await.unwrap();
        assert!(replies.is_empty());
        assert!(stack_topics(&dialog).is_empty());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exit_pops_and_runs_continuation() {
        let dialog = dialog(vec![
            topic(
                "a",
                TopicOptions::new().continuation("back", |state: DialogState, result| async move {
                    state.update_data(|d| d["returned"] = result.clone())?;
                    Ok(format!("got {result}"))
                }),
            ),
            topic("b", TopicOptions::new()),
        ]);

        dialog.root_state().enter_topic("a", json!(null), None).await.unwrap();
        top_state(&dialog)
            .enter_topic("b", json!(null), Some("back"))
            .await
            .unwrap();

        let mut state = top_state(&dialog);
        let replies = state.exit_topic(json!(42)).await.unwrap();

        assert_eq!(replies, vec![json!("got 42")]);
        assert_eq!(stack_topics(&dialog), vec!["a"]);
        assert_eq!(state.topic(), Some("a"));
        assert!(state.is_top());
        assert_eq!(state.data().unwrap()["returned"], json!(42));
    }

    #[tokio::test]
    async fn test_exit_without_continuation_returns_nothing() {
        let dialog = dialog(vec![topic("a", TopicOptions::new())]);
        dialog.root_state().enter_topic("a", json!(null), None).await.unwrap();

        let mut state = top_state(&dialog);
        assert!(state.exit_topic(json!("ignored")).await.unwrap().is_empty());
        assert!(dialog.active_context().is_none());
        assert_eq!(state.context_ref(), ContextRef::Empty);
    }

    #[tokio::test]
    async fn test_stale_state_is_rejected() {
        let dialog = dialog(vec![topic("a", TopicOptions::new()), topic("b", TopicOptions::new())]);
        dialog.root_state().enter_topic("a", json!(null), None).await.unwrap();
        let stale = top_state(&dialog);
        stale.enter_topic("b", json!(null), None).await.unwrap();
        let before = dialog.snapshot();

        let err = stale.enter_topic("b", json!(null), None).await.unwrap_err();
        assert!(matches!(err, YakError::StackDiscipline(msg) if msg == ENTER_FROM_STALE));

        let mut stale_exit = stale.clone();
        let err = stale_exit.exit_topic(json!(null)).await.unwrap_err();
        assert!(matches!(err, YakError::StackDiscipline(msg) if msg == EXIT_FROM_STALE));

        assert_eq!(dialog.snapshot(), before);
    }

    #[tokio::test]
    async fn test_stale_enter_does_not_run_init() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let counted = def_topic(
            "counted",
            move |_, _| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            },
            TopicOptions::new(),
        );
        let dialog = dialog(vec![topic("a", TopicOptions::new()), counted]);
        dialog.root_state().enter_topic("a", json!(null), None).await.unwrap();

        let detached = DialogState::new(dialog.clone(), ContextRef::Global, None);
        assert!(detached.enter_topic("counted", json!(null), None).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_after_init_sees_new_context_and_errors_keep_it() {
        let dialog = dialog(vec![
            topic(
                "greeting",
                TopicOptions::new().after_init(|state: DialogState| async move {
                    assert!(state.is_top());
                    assert_eq!(state.topic(), Some("greeting"));
                    Err(YakError::custom("after_init failed"))
                }),
            ),
        ]);

        let err = dialog
            .root_state()
            .enter_topic("greeting", json!(null), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "after_init failed");
        assert_eq!(stack_topics(&dialog), vec!["greeting"]);
    }

    #[tokio::test]
    async fn test_unknown_names_fail_before_mutation() {
        let dialog = dialog(vec![topic("a", TopicOptions::new())]);
        let state = dialog.root_state();

        assert!(matches!(
            state.enter_topic("missing", json!(null), None).await,
            Err(YakError::UnknownTopic(_))
        ));
        assert!(matches!(
            state.enter_topic("a", json!(null), Some("nope")).await,
            Err(YakError::UnknownContinuation { .. })
        ));
        assert!(dialog.active_context().is_none());
    }

    #[tokio::test]
    async fn test_hook_scope_setters() {
        let dialog = dialog(vec![topic("a", TopicOptions::new())]);
        assert!(matches!(
            dialog.root_state().disable_hooks(["x"]),
            Err(YakError::NoActiveContext)
        ));

        dialog.root_state().enter_topic("a", json!(null), None).await.unwrap();
        let state = top_state(&dialog);
        state.disable_hooks_except(["help"]).unwrap();
        state.disable_hooks(vec!["cancel".to_string()]).unwrap();

        let top = dialog.active_context().unwrap();
        assert_eq!(top.active_hooks(), ["help"]);
        assert_eq!(top.disabled_hooks(), ["cancel"]);
        assert!(active_context(&dialog.snapshot()).is_some());

        state.enable_all_hooks().unwrap();
        let top = dialog.active_context().unwrap();
        assert!(top.active_hooks().is_empty());
        assert!(top.disabled_hooks().is_empty());
    }
}

//! Session orchestration.
//!
//! [`YakRuntime::handle`] runs one cycle from raw inbound payloads to
//! outgoing replies:
//!
//! 1. derive the session id and channel type from the host's external session
//! 2. load the session from the store, or create a virgin one
//! 3. initialize the global context on first use
//! 4. on the very first call, enter the `main` topic as the root
//! 5. select one message from the input using the channel formatter and the
//!    configured [`Strategy`]
//! 6. dispatch it and save the session
//!
//! Any error aborts the cycle before the save, so the stored session keeps
//! its previous state.
//!
//! ```rust,ignore
//! use yak_runtime::{YakOptions, init};
//!
//! let runtime = init(vec![main_topic, global_topic], YakOptions::default())?;
//! let replies = runtime
//!     .handle(serde_json::json!({"id": "u1", "type": "text"}), "hello")
//!     .await?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{Instrument, debug, info, info_span};
use yak_core::{
    Dialog, MAIN_TOPIC, Outgoing, Session, Topic, TopicRegistry, YakError, YakResult,
    process_message,
};

use crate::config::YakConfig;
use crate::formatter::{Formatters, MessageFormatter};
use crate::store::{MemorySessionStore, SessionStore};
use crate::strategy::{Incoming, MessageOptions, MessageParser, Strategy};

/// Derives a session key from the external session.
pub type SessionKeyFn = Arc<dyn Fn(&Value) -> YakResult<String> + Send + Sync>;

/// Reads a string or number field of the external session.
pub fn field_key(field: &'static str) -> SessionKeyFn {
    Arc::new(move |external: &Value| match external.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(YakError::MissingSessionField(field.to_owned())),
    })
}

/// Runtime options.
#[derive(Clone)]
pub struct YakOptions {
    /// Session id extractor; reads `id` by default.
    pub session_id: SessionKeyFn,
    /// Channel type extractor; reads `type` by default.
    pub session_type: SessionKeyFn,
    pub messages: MessageOptions,
    pub formatters: Formatters,
    pub store: Arc<dyn SessionStore>,
}

impl Default for YakOptions {
    fn default() -> Self {
        Self {
            session_id: field_key("id"),
            session_type: field_key("type"),
            messages: MessageOptions::default(),
            formatters: Formatters::default(),
            store: Arc::new(MemorySessionStore::new()),
        }
    }
}

impl YakOptions {
    /// Options with the message section of `config` applied.
    pub fn from_config(config: &YakConfig) -> YakResult<Self> {
        let strategy: Strategy = config.messages.strategy.parse()?;
        Ok(Self::default().with_strategy(strategy))
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.messages.strategy = strategy;
        self
    }

    /// Uses the custom strategy with `parser`.
    pub fn with_message_parser(mut self, parser: MessageParser) -> Self {
        self.messages = MessageOptions {
            strategy: Strategy::Custom,
            message_parser: Some(parser),
        };
        self
    }

    pub fn with_formatter(
        mut self,
        channel: impl Into<String>,
        formatter: impl MessageFormatter + 'static,
    ) -> Self {
        self.formatters.insert(channel, formatter);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_session_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> YakResult<String> + Send + Sync + 'static,
    {
        self.session_id = Arc::new(f);
        self
    }

    pub fn with_session_type<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> YakResult<String> + Send + Sync + 'static,
    {
        self.session_type = Arc::new(f);
        self
    }
}

impl fmt::Debug for YakOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YakOptions")
            .field("messages", &self.messages)
            .field("formatters", &self.formatters)
            .finish_non_exhaustive()
    }
}

/// Builds a runtime for `topics`.
///
/// # Errors
///
/// - [`YakError::DuplicateTopic`] if two topics share a name.
/// - [`YakError::Config`] for the custom strategy without a parser.
pub fn init(topics: impl IntoIterator<Item = Topic>, options: YakOptions) -> YakResult<YakRuntime> {
    options.messages.validate()?;
    let registry = TopicRegistry::new(topics)?;
    info!(
        topics = registry.len(),
        strategy = %options.messages.strategy,
        "Yak runtime initialized"
    );
    Ok(YakRuntime { registry, options })
}

/// The entry point hosts call for every inbound payload or batch.
#[derive(Clone)]
pub struct YakRuntime {
    registry: TopicRegistry,
    options: YakOptions,
}

impl YakRuntime {
    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn options(&self) -> &YakOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.options.store
    }

    /// Processes `input` for the session described by `external`.
    ///
    /// Calls for the same session must not overlap; serializing them is up
    /// to the host.
    pub async fn handle(
        &self,
        external: Value,
        input: impl Into<Incoming>,
    ) -> YakResult<Vec<Outgoing>> {
        let id = (self.options.session_id)(&external)?;
        let kind = (self.options.session_type)(&external)?;
        let input = input.into();

        let span = info_span!("handle", session = %id, channel = %kind);
        self.handle_session(id, kind, external, input)
            .instrument(span)
            .await
    }

    async fn handle_session(
        &self,
        id: String,
        kind: String,
        external: Value,
        input: Incoming,
    ) -> YakResult<Vec<Outgoing>> {
        let session = match self.options.store.get(&id).await? {
            Some(session) => session,
            None => {
                debug!("Creating new session");
                Session::new(id.as_str(), kind.as_str())
            }
        };

        let dialog = Dialog::new(session, self.registry.clone(), Arc::new(external));
        dialog.ensure_global_context().await?;

        if dialog.take_virgin() && self.registry.contains(MAIN_TOPIC) {
            info!("First contact, entering main topic");
            dialog
                .root_state()
                .enter_topic(MAIN_TOPIC, Value::Null, None)
                .await?;
        }

        let formatter = self.options.formatters.get(&kind)?;
        let replies = match self.options.messages.select(formatter.as_ref(), input)? {
            Some(message) => process_message(&dialog, &message).await?,
            None => {
                debug!("Empty batch, nothing to dispatch");
                Vec::new()
            }
        };

        self.options.store.save(&dialog.snapshot()).await?;
        debug!(replies = replies.len(), "Session saved");
        Ok(replies)
    }
}

impl fmt::Debug for YakRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YakRuntime")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish()
    }
}

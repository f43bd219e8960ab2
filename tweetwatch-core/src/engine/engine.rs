//! Protocol engine: validation, dispatch and history recording

use super::adapter::{Invocation, ToolAdapter};
use super::builtins;
use super::config::EngineConfig;
use super::reply::{AcknowledgePolicy, ReplyPolicy};
use crate::clock::{SharedClock, SystemClock};
use crate::config::{MonitorConfig, ServiceSettings};
use crate::conversation::{ContextHandle, ConversationStore, ConversationSummary, StoreResult};
use crate::protocol::{
    Message, MessageBody, ProtocolError, Request, Response, WireRequest, DELIVERED,
};
use crate::rate_limit::{RateLimitStatus, RateLimiter};
use crate::registry::{FunctionRegistry, RegisteredFunction, RegistryResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What an admitted request turned out to be
enum Admission {
    Text,
    Call(Arc<RegisteredFunction>),
}

/// A function call handed to a background task
struct AdapterTask {
    conversation_id: String,
    inbound: Message,
    function: String,
    adapter: Arc<dyn ToolAdapter>,
    invocation: Invocation,
}

/// Entry point for every protocol request
///
/// Cloning is cheap; clones share the registry, store, limiter and shutdown
/// token.
#[derive(Clone)]
pub struct ProtocolEngine {
    registry: Arc<FunctionRegistry>,
    store: Arc<ConversationStore>,
    limiter: RateLimiter,
    settings: Arc<ServiceSettings>,
    reply_policy: Arc<dyn ReplyPolicy>,
    config: Arc<EngineConfig>,
    shutdown: CancellationToken,
}

impl ProtocolEngine {
    /// Start building an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Engine with default collaborators for `config`
    pub fn new(config: EngineConfig) -> StoreResult<Self> {
        EngineBuilder::new().config(config).build()
    }

    /// Engine set up from a loaded monitor configuration
    pub fn from_monitor_config(config: &MonitorConfig) -> StoreResult<Self> {
        let limiter = RateLimiter::new(config.api.tier);
        EngineBuilder::new()
            .config(EngineConfig::from(config))
            .settings(Arc::new(ServiceSettings::from_config(config, limiter)))
            .build()
    }

    /// Handle a request; the caller waits at most the adapter timeout
    pub async fn handle(&self, request: Request) -> Response {
        self.handle_with_cancellation(request, CancellationToken::new()).await
    }

    /// Handle a request, giving up the wait when `cancel` fires
    ///
    /// Cancelling only ends the caller's wait. A function call that already
    /// reached its adapter still completes and is recorded.
    pub async fn handle_with_cancellation(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Response {
        let Request {
            conversation_id,
            message,
        } = request;
        debug!(
            conversation_id = %conversation_id,
            role = %message.role,
            message_type = %message.message_type(),
            "Handling request"
        );

        match self.admit(&conversation_id, &message) {
            Ok(Admission::Text) => self.answer_text(conversation_id, message, cancel).await,
            Ok(Admission::Call(entry)) => self.dispatch(conversation_id, message, entry, cancel).await,
            Err(err) => self.reject(conversation_id, message, err),
        }
    }

    /// Decode a JSON envelope and handle it
    ///
    /// Envelopes that cannot be decoded are answered without touching any
    /// conversation.
    pub async fn handle_json(&self, text: &str) -> Response {
        let wire = match WireRequest::from_json(text) {
            Ok(wire) => wire,
            Err(err) => return self.unrecorded(String::new(), None, err),
        };
        if wire.conversation_id.trim().is_empty() {
            let err = ProtocolError::MalformedRequest {
                reason: "conversation_id must not be empty".to_string(),
            };
            return self.unrecorded(String::new(), None, err);
        }

        let inbound_id = wire.message.id;
        match wire.into_request() {
            Ok(request) => self.handle(request).await,
            Err((conversation_id, err)) => self.unrecorded(conversation_id, Some(inbound_id), err),
        }
    }

    /// Role/type discipline, function resolution, conversation and quota checks
    fn admit(&self, conversation_id: &str, message: &Message) -> Result<Admission, ProtocolError> {
        if !message.role.is_inbound() {
            return Err(ProtocolError::InvalidRole {
                role: message.role.to_string(),
            });
        }

        let entry = match &message.body {
            MessageBody::Text => None,
            MessageBody::FunctionCall { name, arguments } => {
                let entry = self.registry.resolve_entry(name)?;
                entry.descriptor.validate_arguments(arguments)?;
                Some(entry)
            }
            MessageBody::FunctionResult { .. } | MessageBody::Error(_) => {
                return Err(ProtocolError::InvalidMessageType {
                    message_type: message.message_type().to_string(),
                    reason: "only the engine produces this message type".to_string(),
                });
            }
        };

        if self.config.strict && !self.store.contains(conversation_id) {
            return Err(ProtocolError::ConversationNotFound {
                conversation_id: conversation_id.to_string(),
            });
        }

        let Some(entry) = entry else {
            return Ok(Admission::Text);
        };

        if entry.adapter.is_none() {
            return Err(ProtocolError::AdapterExecution {
                function: entry.descriptor.name.clone(),
                message: "no adapter is bound to this function".to_string(),
                retryable: false,
            });
        }

        if entry.descriptor.rate_limited {
            let outcome = self.limiter.try_consume(1);
            if !outcome.accepted {
                return Err(ProtocolError::RateLimitExceeded {
                    next_reset: outcome.next_reset,
                });
            }
            debug!(
                function = %entry.descriptor.name,
                remaining = outcome.remaining,
                next_reset = %outcome.next_reset,
                "Consumed rate limit unit"
            );
        }

        Ok(Admission::Call(entry))
    }

    /// Record a rejected request with its error and answer the caller
    fn reject(&self, conversation_id: String, inbound: Message, err: ProtocolError) -> Response {
        warn!(
            conversation_id = %conversation_id,
            kind = %err.kind(),
            error = %err,
            "Request rejected"
        );
        let reply = Message::error_record(err.to_descriptor())
            .replying_to(inbound.id)
            .at(self.store.now());
        self.commit(&conversation_id, inbound, reply.clone());
        Response::from_reply(conversation_id, reply)
    }

    /// Answer without recording anything
    fn unrecorded(
        &self,
        conversation_id: String,
        in_reply_to: Option<Uuid>,
        err: ProtocolError,
    ) -> Response {
        warn!(
            conversation_id = %conversation_id,
            kind = %err.kind(),
            error = %err,
            "Request answered without recording"
        );
        let mut reply = Message::error_record(err.to_descriptor()).at(self.store.now());
        if let Some(id) = in_reply_to {
            reply = reply.replying_to(id);
        }
        Response::from_reply(conversation_id, reply)
    }

    /// Append an inbound message and its reply as one exchange
    fn commit(&self, conversation_id: &str, inbound: Message, reply: Message) {
        let recorded = if self.config.strict {
            self.store.try_append_exchange(conversation_id, inbound, reply)
        } else {
            Some(self.store.append_exchange(conversation_id, inbound, reply))
        };

        match recorded {
            Some(history_len) => debug!(
                conversation_id = %conversation_id,
                history_len,
                "Recorded exchange"
            ),
            None => debug!(
                conversation_id = %conversation_id,
                "Conversation is not open, exchange not recorded"
            ),
        }
    }

    async fn answer_text(
        &self,
        conversation_id: String,
        inbound: Message,
        cancel: CancellationToken,
    ) -> Response {
        let history = self.store.transcript(&conversation_id).unwrap_or_default();
        let timeout = self.config.adapter_timeout;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
            result = tokio::time::timeout(
                timeout,
                self.reply_policy.reply(&conversation_id, &inbound, &history),
            ) => match result {
                Ok(Ok(content)) => Ok(content),
                Ok(Err(e)) => Err(ProtocolError::AdapterExecution {
                    function: "reply".to_string(),
                    message: e.message,
                    retryable: e.retryable,
                }),
                Err(_) => Err(ProtocolError::Timeout {
                    after_ms: millis(timeout),
                }),
            },
        };

        let reply = match outcome {
            Ok(content) => Message::assistant(content),
            Err(err) => {
                warn!(
                    conversation_id = %conversation_id,
                    kind = %err.kind(),
                    error = %err,
                    "Text reply failed"
                );
                Message::error_record(err.to_descriptor())
            }
        }
        .replying_to(inbound.id)
        .at(self.store.now());

        self.commit(&conversation_id, inbound, reply.clone());
        Response::from_reply(conversation_id, reply)
    }

    async fn dispatch(
        &self,
        conversation_id: String,
        inbound: Message,
        entry: Arc<RegisteredFunction>,
        cancel: CancellationToken,
    ) -> Response {
        let function = entry.descriptor.name.clone();
        let Some(adapter) = entry.adapter.clone() else {
            let err = ProtocolError::AdapterExecution {
                function,
                message: "no adapter is bound to this function".to_string(),
                retryable: false,
            };
            return self.reject(conversation_id, inbound, err);
        };

        let inbound_id = inbound.id;
        let invocation = Invocation {
            conversation_id: conversation_id.clone(),
            function: function.clone(),
            arguments: inbound.arguments().cloned().unwrap_or_default(),
            context: self.context(&conversation_id),
            cancel: self.shutdown.child_token(),
        };
        let task = AdapterTask {
            conversation_id: conversation_id.clone(),
            inbound,
            function: function.clone(),
            adapter,
            invocation,
        };

        let (tx, rx) = oneshot::channel();
        tokio::spawn(self.clone().run_adapter(task, tx));

        let timeout = self.config.adapter_timeout;
        let outcome = tokio::select! {
            reply = rx => reply.map_err(|_| ProtocolError::AdapterExecution {
                function: function.clone(),
                message: "adapter task ended without a result".to_string(),
                retryable: true,
            }),
            _ = tokio::time::sleep(timeout) => Err(ProtocolError::Timeout {
                after_ms: millis(timeout),
            }),
            _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
        };

        match outcome {
            Ok(reply) => Response::from_reply(conversation_id, reply),
            Err(err) => {
                warn!(
                    conversation_id = %conversation_id,
                    function = %function,
                    kind = %err.kind(),
                    "Caller stopped waiting, adapter result will be recorded when it arrives"
                );
                let reply = Message::error_record(err.to_descriptor())
                    .replying_to(inbound_id)
                    .at(self.store.now());
                Response::from_reply(conversation_id, reply)
            }
        }
    }

    /// Run one adapter call to completion and record the exchange
    ///
    /// The adapter runs in its own task so a panic surfaces as a join error
    /// instead of unwinding through the engine.
    async fn run_adapter(self, task: AdapterTask, tx: oneshot::Sender<Message>) {
        let AdapterTask {
            conversation_id,
            inbound,
            function,
            adapter,
            invocation,
        } = task;
        let token = invocation.cancel.clone();
        let mut handle = tokio::spawn(async move { adapter.invoke(invocation).await });

        let outcome = tokio::select! {
            joined = &mut handle => match joined {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(ProtocolError::AdapterExecution {
                    function: function.clone(),
                    message: e.message,
                    retryable: e.retryable,
                }),
                Err(join_err) => Err(ProtocolError::AdapterExecution {
                    function: function.clone(),
                    message: if join_err.is_panic() {
                        "adapter panicked".to_string()
                    } else {
                        "adapter task was aborted".to_string()
                    },
                    retryable: false,
                }),
            },
            _ = token.cancelled() => {
                handle.abort();
                Err(ProtocolError::AdapterExecution {
                    function: function.clone(),
                    message: "engine shut down before the adapter finished".to_string(),
                    retryable: true,
                })
            }
        };

        let reply = match outcome {
            Ok(value) => {
                debug!(
                    conversation_id = %conversation_id,
                    function = %function,
                    "Adapter completed"
                );
                Message::function_result(function.as_str(), value)
            }
            Err(err) => {
                error!(
                    conversation_id = %conversation_id,
                    function = %function,
                    error = %err,
                    "Adapter failed"
                );
                Message::error_record(err.to_descriptor())
            }
        };

        let mut reply = reply.replying_to(inbound.id).at(self.store.now());
        if tx.is_closed() {
            reply.metadata.insert(DELIVERED.to_string(), Value::Bool(false));
        }
        self.commit(&conversation_id, inbound, reply.clone());
        let _ = tx.send(reply);
    }

    /// Bind `get_api_limits` and `update_config`
    pub fn register_builtin_tools(&self) -> RegistryResult<()> {
        builtins::register(
            &self.registry,
            self.limiter.clone(),
            Arc::clone(&self.settings),
        )
    }

    /// Explicitly open a conversation; returns `true` if it was new
    pub fn open_conversation(&self, conversation_id: &str) -> bool {
        self.store.create(conversation_id)
    }

    /// Rate limiter status for status endpoints and the scheduler
    pub fn status(&self) -> RateLimitStatus {
        self.limiter.status()
    }

    /// Copy of a conversation's history
    pub fn transcript(&self, conversation_id: &str) -> Option<Vec<Message>> {
        self.store.transcript(conversation_id)
    }

    /// Summary of a conversation
    pub fn summary(&self, conversation_id: &str) -> Option<ConversationSummary> {
        self.store.summary(conversation_id)
    }

    /// Context access scoped to one conversation
    pub fn context(&self, conversation_id: &str) -> ContextHandle {
        ContextHandle::new(Arc::clone(&self.store), conversation_id)
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn settings(&self) -> &Arc<ServiceSettings> {
        &self.settings
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evict idle conversations every `eviction_interval` until shutdown
    pub fn spawn_eviction_task(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let shutdown = self.shutdown.clone();
        let every = self.config.eviction_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        store.evict_expired(store.now());
                    }
                }
            }
            debug!("Eviction task stopped");
        })
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop background work and flush conversations if configured
    pub fn shutdown(&self) -> StoreResult<()> {
        info!("Shutting down protocol engine");
        self.shutdown.cancel();

        if self.config.flush_on_shutdown {
            if let Some(path) = &self.config.persistence_path {
                self.store.save_to_path(path)?;
            }
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Builder for [`ProtocolEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<SharedClock>,
    registry: Option<Arc<FunctionRegistry>>,
    limiter: Option<RateLimiter>,
    settings: Option<Arc<ServiceSettings>>,
    reply_policy: Option<Arc<dyn ReplyPolicy>>,
}

impl EngineBuilder {
    /// Create a new engine builder
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            clock: None,
            registry: None,
            limiter: None,
            settings: None,
            reply_policy: None,
        }
    }

    /// Set the runtime configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Drive the store and limiter from `clock`
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share an existing registry
    pub fn registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing limiter
    pub fn limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Share existing service settings
    ///
    /// Without an explicit limiter the engine uses the one the settings are
    /// bound to.
    pub fn settings(mut self, settings: Arc<ServiceSettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replace the default text reply policy
    pub fn reply_policy(mut self, policy: Arc<dyn ReplyPolicy>) -> Self {
        self.reply_policy = Some(policy);
        self
    }

    /// Build the engine, restoring persisted conversations if present
    pub fn build(self) -> StoreResult<ProtocolEngine> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let store = match &self.config.persistence_path {
            Some(path) if path.exists() => {
                ConversationStore::load_from_path(path, self.config.retention, Arc::clone(&clock))?
            }
            _ => ConversationStore::with_clock(self.config.retention, Arc::clone(&clock)),
        };

        let limiter = self
            .limiter
            .or_else(|| self.settings.as_ref().map(|s| s.limiter().clone()))
            .unwrap_or_else(|| RateLimiter::with_clock(self.config.tier, Arc::clone(&clock)));
        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(ServiceSettings::new(limiter.clone())));

        info!(
            tier = %limiter.tier(),
            strict = self.config.strict,
            adapter_timeout_ms = millis(self.config.adapter_timeout),
            "Protocol engine ready"
        );

        Ok(ProtocolEngine {
            registry: self.registry.unwrap_or_default(),
            store: Arc::new(store),
            limiter,
            settings,
            reply_policy: self
                .reply_policy
                .unwrap_or_else(|| Arc::new(AcknowledgePolicy)),
            config: Arc::new(self.config),
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

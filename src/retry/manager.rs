//! # Retry Queue Manager
//!
//! Owns the poller task and the worker pool. The pool is a semaphore with
//! `thread_count` permits. A poll leases no more envelopes than there are
//! free permits, so a saturated pool leaves envelopes visible for the next
//! poll cycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{watch, OnceCell, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn, Instrument};

use super::envelope::RetryEnvelope;
use crate::config::RetryQueueConfig;
use crate::error::{Result, TaskerError};
use crate::events::{ActionRegistry, EventContext};
use crate::logging::log_error;
use crate::messaging::{MessageId, PgmqQueue, QueueProvider, QueuedMessage};
use crate::models::{Action, ActionKind};

pub struct RetryQueueManager {
    provider: Option<QueueProvider>,
    config: RetryQueueConfig,
    queue_name: String,
    registry: Arc<ActionRegistry>,
    workers: Arc<Semaphore>,
    queue_ready: OnceCell<()>,
    shutdown_tx: watch::Sender<bool>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RetryQueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryQueueManager")
            .field("queue_name", &self.queue_name)
            .field("enabled", &self.is_enabled())
            .field("thread_count", &self.config.thread_count)
            .finish()
    }
}

impl RetryQueueManager {
    /// Build a manager over an existing provider. With the flag off or no
    /// provider the manager is disabled: `enqueue` does nothing and `start`
    /// spawns no poller.
    pub fn new(
        config: RetryQueueConfig,
        provider: Option<QueueProvider>,
        registry: Arc<ActionRegistry>,
    ) -> Self {
        let provider = match (config.enabled, provider) {
            (true, Some(provider)) => Some(provider),
            (true, None) => {
                warn!("⚠️ RETRY_QUEUE: enabled but no queue connectivity; retries disabled");
                None
            }
            (false, _) => {
                info!("RETRY_QUEUE: disabled by configuration");
                None
            }
        };
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            provider,
            queue_name: config.qualified_queue_name(),
            workers: Arc::new(Semaphore::new(config.thread_count)),
            config,
            registry,
            queue_ready: OnceCell::new(),
            shutdown_tx,
            poller: Mutex::new(None),
        }
    }

    /// Build from configuration, connecting to pgmq when a connection URL is set.
    pub async fn from_config(
        config: RetryQueueConfig,
        registry: Arc<ActionRegistry>,
    ) -> Result<Self> {
        let provider = match (config.enabled, config.connection_url.as_deref()) {
            (true, Some(url)) => {
                let max_connections = u32::try_from(config.thread_count + 1).unwrap_or(u32::MAX);
                Some(QueueProvider::Pgmq(
                    PgmqQueue::connect(url, max_connections).await?,
                ))
            }
            _ => None,
        };
        Ok(Self::new(config, provider, registry))
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Action kinds a queued envelope can execute. Handlers route every other
    /// kind straight to the registry.
    pub fn supports(kind: ActionKind) -> bool {
        kind == ActionKind::FindUpdate
    }

    async fn ready_provider(&self) -> Result<Option<&QueueProvider>> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(None);
        };
        self.queue_ready
            .get_or_try_init(|| provider.ensure_queue(&self.queue_name))
            .await?;
        Ok(Some(provider))
    }

    /// Publish a fresh envelope with the action's delay. Returns `None` when disabled.
    #[instrument(skip(self, action, payload), fields(action = %action.action, event = %event))]
    pub async fn enqueue(
        &self,
        action: &Action,
        payload: &Value,
        event: &str,
        event_id: &str,
    ) -> Result<Option<MessageId>> {
        let Some(provider) = self.ready_provider().await? else {
            debug!("Retry queue disabled; enqueue skipped");
            return Ok(None);
        };
        let envelope = RetryEnvelope::new(action.clone(), payload.clone(), event, event_id);
        let ids = provider
            .publish(
                &self.queue_name,
                &[envelope],
                Duration::from_secs(action.retry_delay_seconds),
            )
            .await?;
        Ok(ids.into_iter().next())
    }

    /// Spawn the poller. A no-op when disabled or already started.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.ready_provider().await?.is_none() {
            warn!("⚠️ RETRY_QUEUE: not started; retries disabled");
            return Ok(());
        }

        let mut poller = self.poller.lock();
        if poller.is_some() {
            return Ok(());
        }

        let manager = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let initial_delay = self.config.initial_delay();
        let poll_interval = self.config.poll_interval();

        *poller = Some(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(initial_delay) => {}
                _ = shutdown_rx.changed() => return,
            }

            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = manager.poll_once().await {
                            error!(error = %e, "Retry queue poll failed");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("Retry queue poller stopped");
        }));

        info!(
            queue = %self.queue_name,
            thread_count = self.config.thread_count,
            "🔁 RETRY_QUEUE: poller started"
        );
        Ok(())
    }

    /// Lease one envelope per free worker and dispatch each. Returns the
    /// number dispatched; a saturated pool leases nothing.
    pub async fn poll_once(self: &Arc<Self>) -> Result<usize> {
        let Some(provider) = self.ready_provider().await? else {
            return Ok(0);
        };

        let free = self.workers.available_permits().min(self.config.thread_count);
        if free == 0 {
            debug!(queue = %self.queue_name, "Worker pool saturated; poll skipped");
            return Ok(0);
        }

        let leased: Vec<QueuedMessage<RetryEnvelope>> = provider
            .receive(&self.queue_name, free, self.config.visibility_timeout())
            .await?;

        let mut dispatched = 0;
        for message in leased {
            let Ok(permit) = Arc::clone(&self.workers).try_acquire_owned() else {
                warn!(
                    message_id = %message.message_id,
                    "Worker permit unavailable; envelope left for redelivery"
                );
                continue;
            };

            let manager = Arc::clone(self);
            tokio::spawn(async move {
                let message_id = message.message_id.clone();
                if let Err(e) = manager.process_envelope(message).await {
                    log_error(
                        "retry_queue",
                        "process_envelope",
                        &e.to_string(),
                        Some(message_id.as_str()),
                    );
                }
                drop(permit);
            });
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Run one leased envelope. Success deletes it and publishes the next
    /// delivery while `retried + 1 < retry_count`; failure leaves it leased.
    pub async fn process_envelope(&self, message: QueuedMessage<RetryEnvelope>) -> Result<()> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| TaskerError::Internal("retry queue is disabled".to_string()))?;

        let mut envelope = message.message;
        envelope.message_id = message.message_id.to_string();
        envelope.receipt_handle = message.receipt_handle.to_string();

        let ctx = EventContext::new(&envelope.event, &envelope.event_id);
        let span = ctx.span();

        async {
            if !Self::supports(envelope.action.action) {
                // never executable; drop it instead of redelivering forever
                provider
                    .delete(&self.queue_name, &[message.receipt_handle.clone()])
                    .await?;
                return Err(TaskerError::unsupported(envelope.action.action));
            }

            self.registry
                .execute(&envelope.action, &envelope.payload, &ctx)
                .await?;

            provider
                .delete(&self.queue_name, &[message.receipt_handle.clone()])
                .await?;

            if envelope.has_deliveries_remaining() {
                let next = envelope.next_delivery();
                provider
                    .publish(
                        &self.queue_name,
                        &[next],
                        Duration::from_secs(envelope.action.retry_delay_seconds),
                    )
                    .await?;
                debug!(retried = envelope.retried + 1, "Published follow-up delivery");
            }

            info!(
                message_id = %envelope.message_id,
                retried = envelope.retried,
                "🔁 RETRY_QUEUE: envelope processed"
            );
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Wait until no worker is running.
    pub async fn wait_idle(&self) -> Result<()> {
        let permits = u32::try_from(self.config.thread_count).unwrap_or(u32::MAX);
        let _all = self
            .workers
            .acquire_many(permits)
            .await
            .map_err(|e| TaskerError::Internal(format!("worker pool closed: {e}")))?;
        Ok(())
    }

    /// Stop the poller and wait for in-flight workers.
    pub async fn shutdown(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        let handle = self.poller.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Retry queue poller ended abnormally");
            }
        }
        self.wait_idle().await?;
        info!(queue = %self.queue_name, "🛑 RETRY_QUEUE: shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindUpdate;
    use serde_json::json;

    fn enabled_config() -> RetryQueueConfig {
        RetryQueueConfig {
            enabled: true,
            ..RetryQueueConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_manager_ignores_enqueue() {
        let manager = RetryQueueManager::new(
            RetryQueueConfig::default(),
            None,
            Arc::new(ActionRegistry::new()),
        );
        assert!(!manager.is_enabled());
        let action = Action::find_update(FindUpdate::new("wf"));
        let id = manager.enqueue(&action, &json!({}), "e", "m").await.unwrap();
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn test_enabled_without_provider_is_disabled() {
        let manager =
            RetryQueueManager::new(enabled_config(), None, Arc::new(ActionRegistry::new()));
        assert!(!manager.is_enabled());
        let manager = Arc::new(manager);
        manager.start().await.unwrap();
        assert_eq!(manager.poll_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_uses_action_delay() {
        let (provider, queue) = QueueProvider::in_memory();
        let manager =
            RetryQueueManager::new(enabled_config(), Some(provider), Arc::new(ActionRegistry::new()));
        let action = Action::find_update(FindUpdate::new("wf")).with_retry(1, 30);
        manager
            .enqueue(&action, &json!({"a": 1}), "sqs:orders", "m-1")
            .await
            .unwrap();

        assert_eq!(queue.queue_length(manager.queue_name()).await, 1);
        assert_eq!(queue.visible_count(manager.queue_name()).await, 0);
        let pending = queue
            .pending::<RetryEnvelope>(manager.queue_name())
            .await
            .unwrap();
        assert_eq!(pending[0].message.retried, 0);
        assert_eq!(pending[0].message.event_id, "m-1");
    }
}

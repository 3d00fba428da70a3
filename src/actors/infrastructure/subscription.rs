use actix::prelude::*;
use chrono::Utc;
use futures_util::future::join_all;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::user::UserEvent;
use crate::event_sourcing::store::{EventStore, OutboxEntry};
use crate::metrics::Metrics;
use crate::saga::SagaRouter;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};
use super::dlq::{AddToDlq, DlqActor, ResolveDlqMessage};

// ============================================================================
// User Events Subscription - Outbox → Saga Router
// ============================================================================
//
// Polls the user outbox after a persisted checkpoint and feeds every event to
// the saga router. At-least-once:
//
// 1. Read a batch of outbox entries after the checkpoint
// 2. Group the batch by user; groups are delivered concurrently, events of
//    one user strictly in order
// 3. Retry transient failures with exponential backoff
// 4. An event that still fails is recorded in the dead letter queue and
//    stops its group: later events of that user wait behind it
// 5. Advance the checkpoint to just before the earliest failed offset (or to
//    the end of the batch) and redeliver from there on the next poll
//
// Events of other users past a stuck offset are redelivered too, which the
// router tolerates. A crash between 3 and 5 replays the batch the same way.
//
// ============================================================================

/// Checkpoint key of the saga router's subscription
pub const SAGA_ROUTER_CONSUMER_ID: &str = "saga-router";

const ROUTE_OPERATION: &str = "route_user_event";

#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    pub consumer_id: String,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub retry: RetryConfig,
}

pub struct UserEventsSubscription {
    event_store: Arc<EventStore<UserEvent>>,
    router: SagaRouter,
    dlq: Addr<DlqActor>,
    settings: SubscriptionSettings,
    metrics: Arc<Metrics>,
}

impl UserEventsSubscription {
    pub fn new(
        event_store: Arc<EventStore<UserEvent>>,
        router: SagaRouter,
        dlq: Addr<DlqActor>,
        settings: SubscriptionSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { event_store, router, dlq, settings, metrics }
    }
}

impl Actor for UserEventsSubscription {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            consumer_id = %self.settings.consumer_id,
            batch_size = self.settings.batch_size,
            "UserEventsSubscription started"
        );

        let worker = SubscriptionWorker {
            event_store: self.event_store.clone(),
            router: self.router.clone(),
            dlq: self.dlq.clone(),
            settings: self.settings.clone(),
            metrics: self.metrics.clone(),
            parked: RefCell::new(HashSet::new()),
        };

        // Runs for the lifetime of the actor
        ctx.spawn(async move { worker.run().await }.into_actor(self));
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!(consumer_id = %self.settings.consumer_id, "UserEventsSubscription stopped");
    }
}

struct SubscriptionWorker {
    event_store: Arc<EventStore<UserEvent>>,
    router: SagaRouter,
    dlq: Addr<DlqActor>,
    settings: SubscriptionSettings,
    metrics: Arc<Metrics>,
    /// Events currently recorded in the DLQ by this worker
    parked: RefCell<HashSet<Uuid>>,
}

impl SubscriptionWorker {
    async fn run(self) {
        let consumer_id = self.settings.consumer_id.as_str();
        let mut position = self.event_store.load_checkpoint(consumer_id).await;

        tracing::info!(consumer_id = %consumer_id, position = position, "Resuming subscription from checkpoint");

        loop {
            let entries = match self.event_store.read_outbox(position, self.settings.batch_size).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!(error = %e, position = position, "Failed to read outbox");
                    actix::clock::sleep(self.settings.poll_interval).await;
                    continue;
                }
            };

            let Some(last_offset) = entries.last().map(|entry| entry.offset) else {
                self.event_store
                    .wait_for_events(position, self.settings.poll_interval)
                    .await;
                continue;
            };

            tracing::debug!(
                consumer_id = %consumer_id,
                event_count = entries.len(),
                from = position + 1,
                to = last_offset,
                "📬 Delivering outbox batch"
            );

            let delivered = self.deliver_batch(entries, last_offset).await;

            if delivered > position {
                if let Err(e) = self.event_store.save_checkpoint(consumer_id, delivered).await {
                    tracing::error!(error = %e, offset = delivered, "Failed to save checkpoint");
                }
                position = delivered;
            }

            if delivered < last_offset {
                tracing::warn!(
                    consumer_id = %consumer_id,
                    stuck_at = delivered + 1,
                    "Batch stalled on an undeliverable event, redelivering after poll interval"
                );
                actix::clock::sleep(self.settings.poll_interval).await;
            }
        }
    }

    /// Deliver one batch; returns the offset up to which every event went through
    async fn deliver_batch(&self, entries: Vec<OutboxEntry<UserEvent>>, last_offset: u64) -> u64 {
        let mut groups: HashMap<String, Vec<OutboxEntry<UserEvent>>> = HashMap::new();
        for entry in entries {
            groups
                .entry(entry.envelope.aggregate_id.clone())
                .or_default()
                .push(entry);
        }

        let results = join_all(groups.into_values().map(|group| self.deliver_group(group))).await;

        match results.into_iter().filter_map(Result::err).min() {
            Some(stuck) => stuck.saturating_sub(1),
            None => last_offset,
        }
    }

    /// Deliver one user's events in order; on failure returns the stuck offset
    async fn deliver_group(&self, group: Vec<OutboxEntry<UserEvent>>) -> Result<(), u64> {
        for (index, entry) in group.iter().enumerate() {
            if let Err(e) = self.deliver(entry).await {
                tracing::warn!(
                    offset = entry.offset,
                    user_id = %entry.envelope.aggregate_id,
                    held_back = group.len() - index - 1,
                    error = %e,
                    "Holding back later events of this user"
                );
                return Err(entry.offset);
            }
        }
        Ok(())
    }

    /// Route one event with retries. On exhausted retries the event is
    /// recorded in the DLQ and the failure is returned.
    async fn deliver(&self, entry: &OutboxEntry<UserEvent>) -> anyhow::Result<()> {
        let envelope = &entry.envelope;
        let router = &self.router;
        let metrics = &self.metrics;
        let attempts = Cell::new(0);
        let attempts_ref = &attempts;
        let first_attempt_at = Utc::now();

        let result = retry_on_transient(self.settings.retry.clone(), move |attempt| {
            attempts_ref.set(attempt);
            if attempt > 1 {
                metrics.record_retry_attempt(ROUTE_OPERATION, attempt);
            }
            router.handle(envelope)
        })
        .await;

        match result {
            RetryResult::Success(_) => {
                if attempts.get() > 1 {
                    self.metrics.record_retry_outcome(ROUTE_OPERATION, true);
                }
                tracing::debug!(
                    offset = entry.offset,
                    event_id = %envelope.event_id,
                    event_type = %envelope.event_type,
                    "✅ Routed user event"
                );

                let was_parked = self.parked.borrow_mut().remove(&envelope.event_id);
                if was_parked {
                    if let Err(e) = self.dlq.send(ResolveDlqMessage { id: envelope.event_id }).await {
                        tracing::error!(event_id = %envelope.event_id, error = %e, "Failed to resolve DLQ entry");
                    }
                }
                Ok(())
            }
            RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => {
                self.metrics.record_retry_outcome(ROUTE_OPERATION, false);
                tracing::error!(
                    offset = entry.offset,
                    event_id = %envelope.event_id,
                    event_type = %envelope.event_type,
                    error = %e,
                    "❌ Failed to route user event, recording in DLQ"
                );

                let parked = AddToDlq {
                    id: envelope.event_id,
                    aggregate_id: envelope.aggregate_id.clone(),
                    event_type: envelope.event_type.clone(),
                    payload: serde_json::to_string(envelope)?,
                    error_message: e.to_string(),
                    failure_count: attempts.get(),
                    first_failed_at: first_attempt_at,
                };
                match self.dlq.send(parked).await {
                    Ok(()) => {
                        self.parked.borrow_mut().insert(envelope.event_id);
                    }
                    Err(mailbox) => {
                        tracing::error!(event_id = %envelope.event_id, error = %mailbox, "Failed to record event in DLQ");
                    }
                }

                Err(anyhow::anyhow!("event {} undeliverable: {}", envelope.event_id, e))
            }
        }
    }
}

use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;
use anyhow::{Result, bail};
use tokio::sync::{Notify, RwLock};

use crate::event_sourcing::core::{DomainEvent, EventEnvelope, Aggregate, serialize_event, deserialize_event};

// ============================================================================
// Generic Event Store - Repository for Events
// ============================================================================
//
// In-process event store that works with ANY event type.
//
// Responsibilities:
// 1. Append events to per-aggregate logs (append-only)
// 2. Load event history for aggregates
// 3. Ensure optimistic concurrency control
// 4. Write to the outbox in the same atomic step, for subscribers
// 5. Track subscriber checkpoints (outbox offsets)
//
// Records are kept in their serialized JSON form, exactly what a durable
// backend would hold, so everything appended must round-trip through serde.
//
// ============================================================================

/// One delivered outbox record: its global offset plus the event envelope.
#[derive(Debug, Clone)]
pub struct OutboxEntry<E> {
    pub offset: u64,
    pub envelope: EventEnvelope<E>,
}

struct OutboxRecord {
    aggregate_id: String,
    payload: String,
}

#[derive(Default)]
struct StoreInner {
    streams: HashMap<String, Vec<String>>,
    outbox: Vec<OutboxRecord>,
    checkpoints: HashMap<String, u64>,
}

pub struct EventStore<E: DomainEvent> {
    aggregate_type_name: String,
    inner: RwLock<StoreInner>,
    appended: Notify,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> EventStore<E> {
    pub fn new(aggregate_type_name: &str) -> Self {
        Self {
            aggregate_type_name: aggregate_type_name.to_string(),
            inner: RwLock::new(StoreInner::default()),
            appended: Notify::new(),
            _phantom: PhantomData,
        }
    }

    pub fn aggregate_type_name(&self) -> &str {
        &self.aggregate_type_name
    }

    /// Append events to the event store.
    /// All events land or none do. Returns the new version.
    pub async fn append_events(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
        publish_to_outbox: bool,
    ) -> Result<i64> {
        if events.is_empty() {
            bail!("Cannot append empty event list");
        }

        // Serialize everything up front so a bad event cannot leave a partial append
        let mut serialized = Vec::with_capacity(events.len());
        for (i, envelope) in events.iter().enumerate() {
            let expected_seq = expected_version + i as i64 + 1;
            if envelope.aggregate_id != aggregate_id || envelope.sequence_number != expected_seq {
                bail!(
                    "Envelope mismatch: expected {}#{}, got {}#{}",
                    aggregate_id,
                    expected_seq,
                    envelope.aggregate_id,
                    envelope.sequence_number
                );
            }
            serialized.push(serialize_event(envelope)?);
        }

        let new_version = {
            let mut inner = self.inner.write().await;

            let current_version = inner
                .streams
                .get(aggregate_id)
                .map(|stream| stream.len() as i64)
                .unwrap_or(0);

            if current_version != expected_version {
                bail!(
                    "Concurrency conflict: expected version {}, but current is {}",
                    expected_version,
                    current_version
                );
            }

            if publish_to_outbox {
                for payload in &serialized {
                    inner.outbox.push(OutboxRecord {
                        aggregate_id: aggregate_id.to_string(),
                        payload: payload.clone(),
                    });
                }
            }

            let stream = inner.streams.entry(aggregate_id.to_string()).or_default();
            stream.extend(serialized);
            stream.len() as i64
        };

        self.appended.notify_waiters();

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type_name,
            new_version = new_version,
            event_count = events.len(),
            "Appended events to event store"
        );

        Ok(new_version)
    }

    /// Load all events for an aggregate, in sequence order
    pub async fn load_events(&self, aggregate_id: &str) -> Result<Vec<EventEnvelope<E>>> {
        let inner = self.inner.read().await;

        let Some(stream) = inner.streams.get(aggregate_id) else {
            return Ok(Vec::new());
        };

        let events = stream
            .iter()
            .map(|json| deserialize_event::<EventEnvelope<E>>(json))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Loaded {} events for aggregate {}", events.len(), aggregate_id);
        Ok(events)
    }

    /// Get current version of aggregate (0 = no events)
    pub async fn get_current_version(&self, aggregate_id: &str) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner.streams.get(aggregate_id).map(|s| s.len() as i64).unwrap_or(0))
    }

    /// Load aggregate from events; `None` when the aggregate has no events
    pub async fn load_aggregate<A>(&self, aggregate_id: &str) -> Result<Option<A>>
    where
        A: Aggregate<Event = E>,
        <A as Aggregate>::Error: std::fmt::Display,
    {
        let events = self.load_events(aggregate_id).await?;

        if events.is_empty() {
            return Ok(None);
        }

        A::load_from_events(events).map(Some)
    }

    pub async fn aggregate_exists(&self, aggregate_id: &str) -> Result<bool> {
        let version = self.get_current_version(aggregate_id).await?;
        Ok(version > 0)
    }

    // ------------------------------------------------------------------------
    // Outbox & checkpoints
    // ------------------------------------------------------------------------

    /// Offset of the newest outbox record (0 = empty outbox)
    pub async fn outbox_head(&self) -> u64 {
        self.inner.read().await.outbox.len() as u64
    }

    /// Read up to `limit` outbox records with offset > `after`, in offset order
    pub async fn read_outbox(&self, after: u64, limit: usize) -> Result<Vec<OutboxEntry<E>>> {
        let inner = self.inner.read().await;

        inner
            .outbox
            .iter()
            .enumerate()
            .skip(after as usize)
            .take(limit)
            .map(|(index, record)| -> Result<OutboxEntry<E>> {
                let envelope = deserialize_event::<EventEnvelope<E>>(&record.payload)
                    .map_err(|e| anyhow::anyhow!("Corrupt outbox record for {}: {}", record.aggregate_id, e))?;
                Ok(OutboxEntry {
                    offset: index as u64 + 1,
                    envelope,
                })
            })
            .collect()
    }

    /// Wait until the outbox grows past `after`, or `timeout` elapses
    pub async fn wait_for_events(&self, after: u64, timeout: Duration) {
        let notified = self.appended.notified();
        if self.outbox_head().await > after {
            return;
        }
        let _ = tokio::time::timeout(timeout, notified).await;
    }

    pub async fn load_checkpoint(&self, consumer_id: &str) -> u64 {
        self.inner
            .read()
            .await
            .checkpoints
            .get(consumer_id)
            .copied()
            .unwrap_or(0)
    }

    /// Persist a consumer's position. Checkpoints never move backwards.
    pub async fn save_checkpoint(&self, consumer_id: &str, offset: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let head = inner.outbox.len() as u64;
        if offset > head {
            bail!("Checkpoint {} for {} is past the outbox head {}", offset, consumer_id, head);
        }

        let checkpoint = inner.checkpoints.entry(consumer_id.to_string()).or_insert(0);
        if offset > *checkpoint {
            *checkpoint = offset;
        }

        tracing::debug!(consumer_id = %consumer_id, offset = offset, "Saved subscription checkpoint");
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

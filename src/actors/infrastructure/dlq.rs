use actix::prelude::*;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::Metrics;

// ============================================================================
// Dead Letter Queue Actor
// ============================================================================
//
// Records user events the saga router could not deliver after all retry
// attempts. A parked event is still owned by the subscription: it stays
// behind the checkpoint and is redelivered until it goes through, at which
// point it is resolved here. The queue is what operators look at while an
// event is stuck.
//
// Bounded: past `capacity` the oldest entry is evicted.
//
// ============================================================================

const DEFAULT_CAPACITY: usize = 10_000;

pub struct DlqActor {
    messages: VecDeque<DlqMessage>,
    capacity: usize,
    metrics: Arc<Metrics>,
}

impl DlqActor {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, metrics)
    }

    pub fn with_capacity(capacity: usize, metrics: Arc<Metrics>) -> Self {
        Self { messages: VecDeque::new(), capacity: capacity.max(1), metrics }
    }
}

impl Actor for DlqActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("DlqActor started - Dead Letter Queue ready");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct AddToDlq {
    pub id: Uuid,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub error_message: String,
    pub failure_count: u32,
    pub first_failed_at: DateTime<Utc>,
}

/// The event finally went through; returns whether it was parked
#[derive(Message, Debug, Clone)]
#[rtype(result = "bool")]
pub struct ResolveDlqMessage {
    pub id: Uuid,
}

#[derive(Message)]
#[rtype(result = "Vec<DlqMessage>")]
pub struct GetDlqMessages {
    pub limit: usize,
}

#[derive(Message)]
#[rtype(result = "DlqStats")]
pub struct GetDlqStats;

#[derive(Debug, Clone, PartialEq)]
pub struct DlqMessage {
    pub id: Uuid,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub error_message: String,
    pub failure_count: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DlqStats {
    pub total_messages: usize,
    pub by_event_type: HashMap<String, usize>,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<AddToDlq> for DlqActor {
    type Result = ();

    fn handle(&mut self, msg: AddToDlq, _: &mut Self::Context) {
        tracing::error!(
            event_id = %msg.id,
            event_type = %msg.event_type,
            aggregate_id = %msg.aggregate_id,
            error = %msg.error_message,
            failure_count = msg.failure_count,
            "💀 Adding message to Dead Letter Queue"
        );

        // Same event failing again on redelivery: update in place
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == msg.id) {
            existing.failure_count += msg.failure_count;
            existing.error_message = msg.error_message;
            existing.last_failed_at = Utc::now();
            return;
        }

        self.metrics.record_dlq_message(&msg.event_type);

        if self.messages.len() >= self.capacity {
            if let Some(evicted) = self.messages.pop_front() {
                self.metrics.record_dlq_removed();
                tracing::warn!(
                    event_id = %evicted.id,
                    event_type = %evicted.event_type,
                    capacity = self.capacity,
                    "DLQ full, evicting oldest entry"
                );
            }
        }

        self.messages.push_back(DlqMessage {
            id: msg.id,
            aggregate_id: msg.aggregate_id,
            event_type: msg.event_type,
            payload: msg.payload,
            error_message: msg.error_message,
            failure_count: msg.failure_count,
            first_failed_at: msg.first_failed_at,
            last_failed_at: Utc::now(),
        });
    }
}

impl Handler<ResolveDlqMessage> for DlqActor {
    type Result = bool;

    fn handle(&mut self, msg: ResolveDlqMessage, _: &mut Self::Context) -> bool {
        let Some(index) = self.messages.iter().position(|m| m.id == msg.id) else {
            return false;
        };

        if let Some(resolved) = self.messages.remove(index) {
            self.metrics.record_dlq_removed();
            tracing::info!(
                event_id = %resolved.id,
                event_type = %resolved.event_type,
                failure_count = resolved.failure_count,
                "✅ Parked event delivered, removed from DLQ"
            );
        }
        true
    }
}

impl Handler<GetDlqMessages> for DlqActor {
    type Result = MessageResult<GetDlqMessages>;

    fn handle(&mut self, msg: GetDlqMessages, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.messages.iter().take(msg.limit).cloned().collect())
    }
}

impl Handler<GetDlqStats> for DlqActor {
    type Result = MessageResult<GetDlqStats>;

    fn handle(&mut self, _msg: GetDlqStats, _: &mut Self::Context) -> Self::Result {
        let mut by_event_type = HashMap::new();
        for message in &self.messages {
            *by_event_type.entry(message.event_type.clone()).or_insert(0) += 1;
        }

        MessageResult(DlqStats {
            total_messages: self.messages.len(),
            by_event_type,
        })
    }
}

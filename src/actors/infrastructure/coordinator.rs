use actix::prelude::*;
use std::sync::Arc;

use crate::actors::entities::{UniqueEmails, Users};
use crate::config::SagaConfig;
use crate::domain::unique_email::{UniqueEmail, UniqueEmailCommandHandler};
use crate::domain::user::{UserCommandHandler, UserEvent};
use crate::event_sourcing::store::{EventStore, StateStore};
use crate::metrics::Metrics;
use crate::saga::{SagaRouter, UserRegistryService};
use super::compensation_timer::{CompensationTimer, CompensationTimerActor, PendingCompensation};
use super::dlq::{DlqActor, DlqStats, GetDlqStats};
use super::subscription::{SubscriptionSettings, UserEventsSubscription, SAGA_ROUTER_CONSUMER_ID};

// ============================================================================
// Coordinator Actor - Orchestrates all system actors
// ============================================================================
//
// Responsibilities:
// - Wires the aggregates, the saga router and the compensation timer
// - Manages lifecycle of child actors
// - Coordinates graceful shutdown
//
// Actor Hierarchy:
//   CoordinatorActor
//   ├── DlqActor
//   ├── CompensationTimerActor
//   ├── UserEventsSubscription → SagaRouter
//   └── (entity actors, started on demand per address / user)
//
// The stores outlive the coordinator: a new coordinator over the same stores
// resumes from the subscription checkpoint and re-arms pending timers.
//
// ============================================================================

#[derive(Clone)]
pub struct RegistryStores {
    pub user_events: Arc<EventStore<UserEvent>>,
    pub unique_emails: Arc<StateStore<UniqueEmail>>,
    pub compensations: Arc<StateStore<PendingCompensation>>,
}

impl RegistryStores {
    pub fn in_memory() -> Self {
        Self {
            user_events: Arc::new(EventStore::new("user")),
            unique_emails: Arc::new(StateStore::new("unique_email")),
            compensations: Arc::new(StateStore::new("compensation_timer")),
        }
    }
}

struct Children {
    dlq: Addr<DlqActor>,
    timer: Addr<CompensationTimerActor>,
    subscription: Addr<UserEventsSubscription>,
    service: UserRegistryService,
}

pub struct CoordinatorActor {
    config: SagaConfig,
    stores: RegistryStores,
    metrics: Arc<Metrics>,
    children: Option<Children>,
}

impl CoordinatorActor {
    pub fn new(config: SagaConfig, stores: RegistryStores, metrics: Arc<Metrics>) -> Self {
        Self { config, stores, metrics, children: None }
    }

    fn start_child_actors(&mut self) {
        tracing::info!("Starting child actors");

        let idle_timeout = self.config.entity_idle_timeout();
        let emails = UniqueEmails::with_idle_timeout(
            UniqueEmailCommandHandler::new(self.stores.unique_emails.clone(), self.metrics.clone()),
            idle_timeout,
        );
        let users = Users::with_idle_timeout(
            UserCommandHandler::new(self.stores.user_events.clone(), self.metrics.clone()),
            idle_timeout,
        );

        // Start DLQ actor
        let dlq = DlqActor::with_capacity(self.config.dlq_capacity, self.metrics.clone()).start();

        // Start compensation timer; re-arms whatever a previous run left behind
        let timer = CompensationTimerActor::new(
            self.stores.compensations.clone(),
            emails.clone(),
            self.config.timer_retry_delay(),
            self.metrics.clone(),
        )
        .start();

        // Start the saga router's subscription with DLQ support
        let settings = SubscriptionSettings {
            consumer_id: SAGA_ROUTER_CONSUMER_ID.to_string(),
            poll_interval: self.config.poll_interval(),
            batch_size: self.config.subscription_batch_size,
            retry: self.config.delivery_retry(),
        };
        let subscription = UserEventsSubscription::new(
            self.stores.user_events.clone(),
            SagaRouter::new(emails.clone(), self.metrics.clone()),
            dlq.clone(),
            settings,
            self.metrics.clone(),
        )
        .start();

        let service = UserRegistryService::new(
            emails,
            users,
            CompensationTimer::new(timer.clone(), self.config.compensation_delay()),
        );

        self.children = Some(Children { dlq, timer, subscription, service });

        tracing::info!(
            compensation_delay_ms = self.config.compensation_delay_ms,
            "✅ All child actors started successfully"
        );
    }
}

impl Actor for CoordinatorActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("🎯 CoordinatorActor started - Unique Email Saga");
        self.start_child_actors();
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        tracing::info!("🛑 CoordinatorActor stopping - initiating graceful shutdown");
        Running::Stop
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("🛑 CoordinatorActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "anyhow::Result<UserRegistryService>")]
pub struct GetUserRegistry;

impl Handler<GetUserRegistry> for CoordinatorActor {
    type Result = anyhow::Result<UserRegistryService>;

    fn handle(&mut self, _msg: GetUserRegistry, _: &mut Self::Context) -> Self::Result {
        self.children
            .as_ref()
            .map(|children| children.service.clone())
            .ok_or_else(|| anyhow::anyhow!("Coordinator has no running children"))
    }
}

impl Handler<GetDlqStats> for CoordinatorActor {
    type Result = ResponseFuture<DlqStats>;

    fn handle(&mut self, msg: GetDlqStats, _: &mut Self::Context) -> Self::Result {
        let dlq = self.children.as_ref().map(|children| children.dlq.clone());

        Box::pin(async move {
            match dlq {
                Some(dlq) => dlq.send(msg).await.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "Failed to query DLQ");
                    DlqStats::default()
                }),
                None => DlqStats::default(),
            }
        })
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

impl Handler<Shutdown> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        tracing::info!("Received shutdown signal");

        // Stop child actors gracefully
        if let Some(children) = self.children.take() {
            children.subscription.do_send(StopActor);
            children.timer.do_send(StopActor);
            children.dlq.do_send(StopActor);
        }

        // Stop coordinator
        ctx.stop();
    }
}

/// Message to gracefully stop an actor
#[derive(Message)]
#[rtype(result = "()")]
struct StopActor;

impl Handler<StopActor> for UserEventsSubscription {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("UserEventsSubscription received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for CompensationTimerActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("CompensationTimerActor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for DlqActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("DlqActor received stop signal");
        ctx.stop();
    }
}

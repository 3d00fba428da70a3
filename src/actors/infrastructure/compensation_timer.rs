use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::actors::entities::UniqueEmails;
use crate::domain::unique_email::Email;
use crate::domain::user::UserId;
use crate::event_sourcing::store::StateStore;
use crate::metrics::Metrics;

// ============================================================================
// Compensation Timer Actor
// ============================================================================
//
// Every successful Reserve is followed by one timer that sends Release to the
// reservation once the delay has passed. There is no cancellation: if the
// saga confirmed the address in the meantime, Release is a no-op.
//
// Pending timers live in a state store and are re-armed with their remaining
// delay when the actor starts. An entry is removed only once its Release
// succeeded; a failed Release is retried after `retry_delay`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCompensation {
    pub timer_id: Uuid,
    pub address: Email,
    pub owner_id: UserId,
    pub fire_at: DateTime<Utc>,
}

impl PendingCompensation {
    /// Time left until the timer is due; zero once overdue
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.fire_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

pub struct CompensationTimerActor {
    store: Arc<StateStore<PendingCompensation>>,
    emails: UniqueEmails,
    retry_delay: Duration,
    metrics: Arc<Metrics>,
}

impl CompensationTimerActor {
    pub fn new(
        store: Arc<StateStore<PendingCompensation>>,
        emails: UniqueEmails,
        retry_delay: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { store, emails, retry_delay, metrics }
    }

    fn arm(&self, ctx: &mut Context<Self>, pending: PendingCompensation, delay: Duration) {
        tracing::debug!(
            timer_id = %pending.timer_id,
            address = %pending.address,
            delay_ms = delay.as_millis() as u64,
            "Arming compensation timer"
        );
        ctx.run_later(delay, move |act, ctx| act.fire(ctx, pending));
    }

    fn fire(&mut self, ctx: &mut Context<Self>, pending: PendingCompensation) {
        let emails = self.emails.clone();
        let store = self.store.clone();
        let address = pending.address.clone();
        let key = pending.timer_id.to_string();

        let release = async move {
            emails
                .release(&address)
                .await
                .map_err(|e| anyhow::anyhow!("Release of {} failed: {}", address, e))?;
            store.delete(&key).await?;
            Ok::<_, anyhow::Error>(())
        };

        ctx.spawn(release.into_actor(self).map(move |result, act, ctx| match result {
            Ok(()) => {
                tracing::info!(
                    timer_id = %pending.timer_id,
                    address = %pending.address,
                    owner_id = %pending.owner_id,
                    "⏰ Compensation timer fired"
                );
                act.metrics.record_timer_fired(true);
            }
            Err(e) => {
                tracing::warn!(
                    timer_id = %pending.timer_id,
                    error = %e,
                    retry_in_ms = act.retry_delay.as_millis() as u64,
                    "Compensation timer failed, retrying"
                );
                act.metrics.record_timer_fired(false);
                let retry_delay = act.retry_delay;
                act.arm(ctx, pending, retry_delay);
            }
        }));
    }
}

impl Actor for CompensationTimerActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let store = self.store.clone();

        // Re-arm persisted timers before accepting new ones
        ctx.wait(async move { store.load_all().await }.into_actor(self).map(
            |result, act, ctx| match result {
                Ok(entries) => {
                    let now = Utc::now();
                    act.metrics.set_timers_pending(entries.len());
                    tracing::info!(pending = entries.len(), "CompensationTimerActor started");
                    for (_, pending) in entries {
                        let delay = pending.remaining(now);
                        act.arm(ctx, pending, delay);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load pending compensations");
                }
            },
        ));
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "anyhow::Result<Uuid>")]
pub struct ScheduleCompensation {
    pub address: Email,
    pub owner_id: UserId,
    pub delay: Duration,
}

#[derive(Message)]
#[rtype(result = "anyhow::Result<Vec<PendingCompensation>>")]
pub struct GetPendingCompensations;

// ============================================================================
// Handlers
// ============================================================================

impl Handler<ScheduleCompensation> for CompensationTimerActor {
    type Result = ResponseActFuture<Self, anyhow::Result<Uuid>>;

    fn handle(&mut self, msg: ScheduleCompensation, _: &mut Self::Context) -> Self::Result {
        let delay = msg.delay;
        let pending = PendingCompensation {
            timer_id: Uuid::new_v4(),
            address: msg.address,
            owner_id: msg.owner_id,
            fire_at: Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero()),
        };

        let store = self.store.clone();
        let to_save = pending.clone();

        Box::pin(
            async move { store.save(&to_save.timer_id.to_string(), &to_save).await }
                .into_actor(self)
                .map(move |result, act, ctx| -> anyhow::Result<Uuid> {
                    result?;
                    let timer_id = pending.timer_id;
                    act.metrics.record_timer_scheduled();
                    act.arm(ctx, pending, delay);
                    Ok(timer_id)
                }),
        )
    }
}

impl Handler<GetPendingCompensations> for CompensationTimerActor {
    type Result = ResponseFuture<anyhow::Result<Vec<PendingCompensation>>>;

    fn handle(&mut self, _msg: GetPendingCompensations, _: &mut Self::Context) -> Self::Result {
        let store = self.store.clone();

        Box::pin(async move {
            let mut pending: Vec<_> = store.load_all().await?.into_iter().map(|(_, p)| p).collect();
            pending.sort_by_key(|p| p.fire_at);
            Ok(pending)
        })
    }
}

// ============================================================================
// Compensation Timer - Client with the configured delay
// ============================================================================

#[derive(Clone)]
pub struct CompensationTimer {
    addr: Addr<CompensationTimerActor>,
    delay: Duration,
}

impl CompensationTimer {
    pub fn new(addr: Addr<CompensationTimerActor>, delay: Duration) -> Self {
        Self { addr, delay }
    }

    /// Schedule a Release of `address` after the configured delay
    pub async fn schedule(&self, address: &Email, owner_id: &UserId) -> anyhow::Result<Uuid> {
        self.addr
            .send(ScheduleCompensation {
                address: address.clone(),
                owner_id: owner_id.clone(),
                delay: self.delay,
            })
            .await?
    }

    pub async fn pending(&self) -> anyhow::Result<Vec<PendingCompensation>> {
        self.addr.send(GetPendingCompensations).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::unique_email::{EmailStatus, UniqueEmailCommandHandler};

    struct Fixture {
        emails: UniqueEmails,
        store: Arc<StateStore<PendingCompensation>>,
        metrics: Arc<Metrics>,
    }

    impl Fixture {
        fn new() -> Self {
            let metrics = Arc::new(Metrics::new().unwrap());
            let emails = UniqueEmails::new(UniqueEmailCommandHandler::new(
                Arc::new(StateStore::new("unique_email")),
                metrics.clone(),
            ));
            Self { emails, store: Arc::new(StateStore::new("compensation_timer")), metrics }
        }

        fn start_timer(&self, delay: Duration) -> CompensationTimer {
            let addr = CompensationTimerActor::new(
                self.store.clone(),
                self.emails.clone(),
                Duration::from_millis(10),
                self.metrics.clone(),
            )
            .start();
            CompensationTimer::new(addr, delay)
        }
    }

    async fn wait_until_free(emails: &UniqueEmails, address: &Email) -> bool {
        for _ in 0..100 {
            if emails.get_state(address).await.unwrap().status() == EmailStatus::Free {
                return true;
            }
            actix::clock::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn test_remaining_delay_is_never_negative() {
        let now = Utc::now();
        let pending = PendingCompensation {
            timer_id: Uuid::new_v4(),
            address: Email::new("a@x.com"),
            owner_id: UserId::new("001"),
            fire_at: now - chrono::Duration::seconds(5),
        };

        assert_eq!(pending.remaining(now), Duration::ZERO);
        assert_eq!(
            pending.remaining(now - chrono::Duration::seconds(7)),
            Duration::from_secs(2)
        );
    }

    #[actix::test]
    async fn test_timer_releases_stale_reservation() {
        let fixture = Fixture::new();
        let timer = fixture.start_timer(Duration::from_millis(30));
        let address = Email::new("invalid@acme.com");

        fixture.emails.reserve(&address, &UserId::new("001")).await.unwrap();
        timer.schedule(&address, &UserId::new("001")).await.unwrap();
        assert_eq!(timer.pending().await.unwrap().len(), 1);

        assert!(wait_until_free(&fixture.emails, &address).await);

        // Entry is removed right after the Release
        actix::clock::sleep(Duration::from_millis(20)).await;
        assert!(timer.pending().await.unwrap().is_empty());
        assert_eq!(fixture.metrics.timers_fired.with_label_values(&["released"]).get(), 1);
    }

    #[actix::test]
    async fn test_late_timer_after_confirm_is_noop() {
        let fixture = Fixture::new();
        let timer = fixture.start_timer(Duration::from_millis(20));
        let address = Email::new("doe@acme.com");
        let owner = UserId::new("001");

        fixture.emails.reserve(&address, &owner).await.unwrap();
        timer.schedule(&address, &owner).await.unwrap();
        fixture.emails.confirm(&address).await.unwrap();

        actix::clock::sleep(Duration::from_millis(100)).await;

        let state = fixture.emails.get_state(&address).await.unwrap();
        assert_eq!(state.status(), EmailStatus::Confirmed);
        assert_eq!(state.owner_id(), Some(&owner));
        assert!(timer.pending().await.unwrap().is_empty());
    }

    #[actix::test]
    async fn test_persisted_timers_are_rearmed_on_start() {
        let fixture = Fixture::new();
        let address = Email::new("a@x.com");
        let owner = UserId::new("001");
        fixture.emails.reserve(&address, &owner).await.unwrap();

        // Left behind by a previous run that stopped before firing
        let overdue = PendingCompensation {
            timer_id: Uuid::new_v4(),
            address: address.clone(),
            owner_id: owner,
            fire_at: Utc::now() - chrono::Duration::seconds(1),
        };
        fixture.store.save(&overdue.timer_id.to_string(), &overdue).await.unwrap();

        let _timer = fixture.start_timer(Duration::from_secs(60));

        assert!(wait_until_free(&fixture.emails, &address).await);
    }
}

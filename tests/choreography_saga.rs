use actix::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use user_registry::actors::{
    CoordinatorActor, DlqActor, GetUserRegistry, RegistryStores, Shutdown, SubscriptionSettings,
    UniqueEmails, UserEventsSubscription, SAGA_ROUTER_CONSUMER_ID,
};
use user_registry::config::SagaConfig;
use user_registry::domain::unique_email::{Email, EmailStatus, UniqueEmailCommandHandler, UniqueEmailError};
use user_registry::domain::user::{UserError, UserId};
use user_registry::metrics::Metrics;
use user_registry::saga::{SagaRouter, UserRegistryService};

// ============================================================================
// Scenario tests: the whole saga through the coordinator
// ============================================================================

fn config(compensation_delay_ms: u64) -> SagaConfig {
    SagaConfig {
        compensation_delay_ms,
        subscription_poll_interval_ms: 20,
        delivery_initial_backoff_ms: 5,
        delivery_max_backoff_ms: 20,
        timer_retry_delay_ms: 20,
        ..SagaConfig::default()
    }
}

struct Harness {
    coordinator: Addr<CoordinatorActor>,
    registry: UserRegistryService,
    stores: RegistryStores,
    metrics: Arc<Metrics>,
}

impl Harness {
    async fn start(config: SagaConfig, stores: RegistryStores) -> Self {
        let metrics = Arc::new(Metrics::new().unwrap());
        let coordinator = CoordinatorActor::new(config, stores.clone(), metrics.clone()).start();
        let registry = coordinator.send(GetUserRegistry).await.unwrap().unwrap();
        Self { coordinator, registry, stores, metrics }
    }

    async fn status(&self, address: &Email) -> EmailStatus {
        self.registry.get_email_info(address).await.unwrap().status()
    }

    /// Poll until the address reaches `expected`; false after ~2s
    async fn wait_for_status(&self, address: &Email, expected: EmailStatus) -> bool {
        for _ in 0..200 {
            if self.status(address).await == expected {
                return true;
            }
            actix::clock::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn wait_for_checkpoint(&self, offset: u64) -> bool {
        for _ in 0..200 {
            if self.stores.user_events.load_checkpoint(SAGA_ROUTER_CONSUMER_ID).await >= offset {
                return true;
            }
            actix::clock::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

#[actix::test]
async fn test_full_saga_confirms_reservation() {
    let h = Harness::start(config(60_000), RegistryStores::in_memory()).await;
    let id = UserId::new("001");
    let doe = Email::new("doe@acme.com");

    h.registry.create_user(&id, "John", "US", &doe).await.unwrap();

    assert!(h.wait_for_status(&doe, EmailStatus::Confirmed).await);
    let info = h.registry.get_email_info(&doe).await.unwrap();
    assert_eq!(info.owner_id(), Some(&id));

    let user = h.registry.get_user(&id).await.unwrap();
    assert_eq!(user.name, "John");
    assert_eq!(user.country, "US");
    assert_eq!(user.email, doe);
}

#[actix::test]
async fn test_failed_creation_is_compensated() {
    let h = Harness::start(config(250), RegistryStores::in_memory()).await;
    let id = UserId::new("001");
    let invalid = Email::new("invalid@acme.com");

    let err = h.registry.create_user(&id, "", "US", &invalid).await.unwrap_err();
    assert!(matches!(err.user_rejection(), Some(UserError::Validation(_))));

    // Held until the timer fires
    assert_eq!(h.status(&invalid).await, EmailStatus::Reserved);
    assert!(h.wait_for_status(&invalid, EmailStatus::Free).await);

    let err = h.registry.get_user(&id).await.unwrap_err();
    assert_eq!(err.user_rejection(), Some(&UserError::NotFound));

    // The address is usable again
    h.registry.create_user(&UserId::new("002"), "Jane", "FR", &invalid).await.unwrap();
    assert!(h.wait_for_status(&invalid, EmailStatus::Confirmed).await);
}

#[actix::test]
async fn test_conflicting_creation_is_rejected_without_timer() {
    let h = Harness::start(config(60_000), RegistryStores::in_memory()).await;
    let doe = Email::new("doe@acme.com");

    h.registry.create_user(&UserId::new("001"), "John", "US", &doe).await.unwrap();
    let err = h
        .registry
        .create_user(&UserId::new("002"), "Jane", "FR", &doe)
        .await
        .unwrap_err();

    assert_eq!(err.email_rejection(), Some(&UniqueEmailError::Conflict(doe.clone())));
    assert!(h.registry.get_user(&UserId::new("002")).await.is_err());
    assert_eq!(h.stores.compensations.load_all().await.unwrap().len(), 1);
}

#[actix::test]
async fn test_change_email_confirms_new_and_frees_old() {
    let h = Harness::start(config(60_000), RegistryStores::in_memory()).await;
    let id = UserId::new("001");
    let a = Email::new("a@x.com");
    let b = Email::new("b@x.com");

    h.registry.create_user(&id, "John", "US", &a).await.unwrap();
    assert!(h.wait_for_status(&a, EmailStatus::Confirmed).await);

    h.registry.change_email(&id, &b).await.unwrap();

    let events = h.stores.user_events.load_events(id.as_str()).await.unwrap();
    let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, ["UserCreated", "EmailAssigned", "EmailUnassigned"]);

    assert!(h.wait_for_status(&b, EmailStatus::Confirmed).await);
    assert!(h.wait_for_status(&a, EmailStatus::Free).await);
    assert_eq!(h.registry.get_user(&id).await.unwrap().email, b);
}

#[actix::test]
async fn test_change_to_same_email_appends_nothing() {
    let h = Harness::start(config(60_000), RegistryStores::in_memory()).await;
    let id = UserId::new("001");
    let a = Email::new("a@x.com");

    h.registry.create_user(&id, "John", "US", &a).await.unwrap();
    assert!(h.wait_for_checkpoint(1).await);

    h.registry.change_email(&id, &a).await.unwrap();

    assert_eq!(h.stores.user_events.outbox_head().await, 1);
    assert_eq!(h.registry.get_user(&id).await.unwrap().version, 1);
    assert_eq!(h.status(&a).await, EmailStatus::Confirmed);
}

#[actix::test]
async fn test_change_email_of_unknown_user_is_compensated() {
    let h = Harness::start(config(100), RegistryStores::in_memory()).await;
    let b = Email::new("b@x.com");

    let err = h.registry.change_email(&UserId::new("404"), &b).await.unwrap_err();
    assert_eq!(err.user_rejection(), Some(&UserError::NotFound));

    assert!(h.wait_for_status(&b, EmailStatus::Free).await);
}

#[actix::test]
async fn test_late_timer_after_confirmation_is_harmless() {
    let h = Harness::start(config(200), RegistryStores::in_memory()).await;
    let id = UserId::new("001");
    let doe = Email::new("doe@acme.com");

    h.registry.create_user(&id, "John", "US", &doe).await.unwrap();
    assert!(h.wait_for_status(&doe, EmailStatus::Confirmed).await);

    // Well past the compensation delay
    actix::clock::sleep(Duration::from_millis(400)).await;

    assert_eq!(h.status(&doe).await, EmailStatus::Confirmed);
    assert!(h.stores.compensations.load_all().await.unwrap().is_empty());
}

#[actix::test]
async fn test_redelivered_history_is_harmless() {
    let h = Harness::start(config(60_000), RegistryStores::in_memory()).await;
    let id = UserId::new("001");
    let a = Email::new("a@x.com");
    let b = Email::new("b@x.com");

    h.registry.create_user(&id, "John", "US", &a).await.unwrap();
    h.registry.change_email(&id, &b).await.unwrap();
    assert!(h.wait_for_checkpoint(3).await);
    assert!(h.wait_for_status(&a, EmailStatus::Free).await);

    // A second consumer replays the whole outbox from offset 0
    let replay_metrics = Arc::new(Metrics::new().unwrap());
    let emails = UniqueEmails::new(UniqueEmailCommandHandler::new(
        h.stores.unique_emails.clone(),
        replay_metrics.clone(),
    ));
    let settings = SubscriptionSettings {
        consumer_id: "replay".to_string(),
        poll_interval: Duration::from_millis(20),
        batch_size: 10,
        retry: config(0).delivery_retry(),
    };
    let _replay = UserEventsSubscription::new(
        h.stores.user_events.clone(),
        SagaRouter::new(emails, replay_metrics.clone()),
        DlqActor::new(replay_metrics.clone()).start(),
        settings,
        replay_metrics,
    )
    .start();

    let mut replayed = false;
    for _ in 0..200 {
        if h.stores.user_events.load_checkpoint("replay").await == 3 {
            replayed = true;
            break;
        }
        actix::clock::sleep(Duration::from_millis(10)).await;
    }
    assert!(replayed);

    // UserCreated(a) replayed after a was released: Confirm on FREE is a no-op
    assert_eq!(h.status(&a).await, EmailStatus::Free);
    assert_eq!(h.status(&b).await, EmailStatus::Confirmed);
}

#[actix::test]
async fn test_restart_resumes_timers_and_subscription() {
    let stores = RegistryStores::in_memory();
    let first = Harness::start(config(500), stores.clone()).await;
    let done = Email::new("done@acme.com");
    let stuck = Email::new("stuck@acme.com");

    first.registry.create_user(&UserId::new("001"), "John", "US", &done).await.unwrap();
    assert!(first.wait_for_checkpoint(1).await);
    assert!(first.registry.create_user(&UserId::new("002"), "", "US", &stuck).await.is_err());
    assert_eq!(first.status(&stuck).await, EmailStatus::Reserved);

    first.coordinator.send(Shutdown).await.unwrap();
    drop(first);

    // The pending timer survived the shutdown
    let pending = stores.compensations.load_all().await.unwrap();
    assert!(pending.iter().any(|(_, timer)| timer.address == stuck));

    let second = Harness::start(config(500), stores.clone()).await;
    assert!(second.wait_for_status(&stuck, EmailStatus::Free).await);

    second.registry.create_user(&UserId::new("003"), "Jane", "FR", &stuck).await.unwrap();
    assert!(second.wait_for_status(&stuck, EmailStatus::Confirmed).await);

    // Only the new UserCreated went through the second router
    let routed = second
        .metrics
        .router_events_processed
        .with_label_values(&["UserCreated"])
        .get();
    assert_eq!(routed, 1);
    assert_eq!(second.status(&done).await, EmailStatus::Confirmed);
}

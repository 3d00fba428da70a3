use std::sync::Arc;
use std::time::Instant;

use crate::actors::UniqueEmails;
use crate::domain::unique_email::{Email, UniqueEmailCommand, UniqueEmailError};
use crate::domain::user::UserEvent;
use crate::event_sourcing::core::{Ack, CommandError, EventEnvelope};
use crate::metrics::Metrics;

// ============================================================================
// Saga Router - User events → Email reservation commands
// ============================================================================
//
//   UserCreated(.., email)    → Confirm      on email
//   EmailAssigned(new_email)  → Confirm      on new_email
//   EmailUnassigned(old_email) → ForceRelease on old_email
//
// Stateless. Every target command is idempotent, so a redelivered event is
// harmless. A failed delivery is returned to the subscription, which retries.
//
// ============================================================================

/// Reservation command a user event translates to
pub fn route(event: &UserEvent) -> (Email, UniqueEmailCommand) {
    match event {
        UserEvent::Created(e) => (e.email.clone(), UniqueEmailCommand::Confirm),
        UserEvent::EmailAssigned(e) => (e.new_email.clone(), UniqueEmailCommand::Confirm),
        UserEvent::EmailUnassigned(e) => (e.old_email.clone(), UniqueEmailCommand::ForceRelease),
    }
}

#[derive(Clone)]
pub struct SagaRouter {
    emails: UniqueEmails,
    metrics: Arc<Metrics>,
}

impl SagaRouter {
    pub fn new(emails: UniqueEmails, metrics: Arc<Metrics>) -> Self {
        Self { emails, metrics }
    }

    pub async fn handle(
        &self,
        envelope: &EventEnvelope<UserEvent>,
    ) -> Result<Ack, CommandError<UniqueEmailError>> {
        let started = Instant::now();
        let (address, command) = route(&envelope.event_data);

        tracing::debug!(
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            user_id = %envelope.aggregate_id,
            address = %address,
            command = command.name(),
            "Routing user event"
        );

        let result = self.emails.execute(&address, command).await;

        self.metrics.record_router_event(
            &envelope.event_type,
            started.elapsed().as_secs_f64(),
            result.is_ok(),
        );

        if let Err(e) = &result {
            tracing::warn!(
                event_id = %envelope.event_id,
                event_type = %envelope.event_type,
                address = %address,
                error = %e,
                "Failed to route user event"
            );
        }

        result
    }
}

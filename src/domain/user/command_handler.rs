use std::sync::Arc;
use uuid::Uuid;

use crate::event_sourcing::core::{Ack, Aggregate, CommandError, DomainEvent, EventEnvelope};
use crate::event_sourcing::store::EventStore;
use crate::metrics::{CommandOutcome, Metrics};

use super::aggregate::UserAggregate;
use super::commands::UserCommand;
use super::errors::UserError;
use super::events::UserEvent;
use super::value_objects::UserId;

// ============================================================================
// User Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store
//
// Not safe to call concurrently for the same user: two callers may both pass
// the decision step, and the loser hits the optimistic concurrency check.
// The user actor serializes calls per id.
//
// ============================================================================

#[derive(Clone)]
pub struct UserCommandHandler {
    event_store: Arc<EventStore<UserEvent>>,
    metrics: Arc<Metrics>,
}

impl UserCommandHandler {
    pub fn new(event_store: Arc<EventStore<UserEvent>>, metrics: Arc<Metrics>) -> Self {
        Self { event_store, metrics }
    }

    /// Handle a command and persist resulting events
    pub async fn handle(
        &self,
        user_id: &UserId,
        command: UserCommand,
        correlation_id: Uuid,
    ) -> Result<Ack, CommandError<UserError>> {
        let command_name = command.name();
        let result = self.execute(user_id, &command, correlation_id).await;

        let outcome = match &result {
            Ok(0) => CommandOutcome::NoOp,
            Ok(_) => CommandOutcome::Applied,
            Err(CommandError::Rejected(_)) => CommandOutcome::Rejected,
            Err(CommandError::Infrastructure(_)) => CommandOutcome::Failed,
        };
        self.metrics.record_command("user", command_name, outcome);

        result.map(|_| Ack)
    }

    /// Returns the number of events appended
    async fn execute(
        &self,
        user_id: &UserId,
        command: &UserCommand,
        correlation_id: Uuid,
    ) -> Result<usize, CommandError<UserError>> {
        let state = self
            .event_store
            .load_aggregate::<UserAggregate>(user_id.as_str())
            .await?;
        let expected_version = state.as_ref().map(|user| user.version()).unwrap_or(0);

        let domain_events = UserAggregate::handle_command(state.as_ref(), command)
            .map_err(|e| {
                tracing::info!(user_id = %user_id, command = command.name(), error = %e, "User command rejected");
                CommandError::Rejected(e)
            })?;

        if domain_events.is_empty() {
            tracing::debug!(user_id = %user_id, command = command.name(), "User command is a no-op");
            return Ok(0);
        }

        // Wrap in envelopes
        let event_count = domain_events.len();
        let mut envelopes = Vec::with_capacity(event_count);
        let mut seq = expected_version;

        for domain_event in domain_events {
            seq += 1;
            let event_type = domain_event.event_name();
            envelopes.push(EventEnvelope::new(
                user_id.as_str(),
                seq,
                event_type,
                domain_event,
                correlation_id,
            ));
        }

        for envelope in &envelopes {
            self.metrics.record_events_appended(&envelope.event_type);
        }

        // Append to event store
        self.event_store
            .append_events(user_id.as_str(), expected_version, envelopes, true)
            .await?;

        Ok(event_count)
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<UserAggregate, CommandError<UserError>> {
        self.event_store
            .load_aggregate::<UserAggregate>(user_id.as_str())
            .await?
            .ok_or(CommandError::Rejected(UserError::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::unique_email::Email;

    fn handler() -> (UserCommandHandler, Arc<EventStore<UserEvent>>) {
        let store = Arc::new(EventStore::new("user"));
        let metrics = Arc::new(Metrics::new().unwrap());
        (UserCommandHandler::new(store.clone(), metrics), store)
    }

    fn create(name: &str) -> UserCommand {
        UserCommand::CreateUser {
            name: name.to_string(),
            country: "US".to_string(),
            email: Email::new("a@x.com"),
        }
    }

    #[tokio::test]
    async fn test_create_then_change_email() {
        let (handler, store) = handler();
        let id = UserId::new("001");

        handler.handle(&id, create("John"), Uuid::new_v4()).await.unwrap();
        handler
            .handle(&id, UserCommand::ChangeEmail { new_email: Email::new("b@x.com") }, Uuid::new_v4())
            .await
            .unwrap();

        let events = store.load_events("001").await.unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, ["UserCreated", "EmailAssigned", "EmailUnassigned"]);
        assert_eq!(store.outbox_head().await, 3);

        let user = handler.get_user(&id).await.unwrap();
        assert_eq!(user.email, Email::new("b@x.com"));
        assert_eq!(user.version, 3);
    }

    #[tokio::test]
    async fn test_noop_commands_append_nothing() {
        let (handler, store) = handler();
        let id = UserId::new("001");

        handler.handle(&id, create("John"), Uuid::new_v4()).await.unwrap();
        handler.handle(&id, create("John"), Uuid::new_v4()).await.unwrap();
        handler
            .handle(&id, UserCommand::ChangeEmail { new_email: Email::new("a@x.com") }, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(store.get_current_version("001").await.unwrap(), 1);
        assert_eq!(store.outbox_head().await, 1);
    }

    #[tokio::test]
    async fn test_rejections_are_not_persisted() {
        let (handler, store) = handler();
        let id = UserId::new("001");

        let err = handler.handle(&id, create(""), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err.rejection(), Some(UserError::Validation(_))));

        let err = handler
            .handle(&id, UserCommand::ChangeEmail { new_email: Email::new("b@x.com") }, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.rejection(), Some(&UserError::NotFound));

        assert!(!store.aggregate_exists("001").await.unwrap());
        assert!(matches!(handler.get_user(&id).await, Err(CommandError::Rejected(UserError::NotFound))));
    }
}

use std::sync::Arc;

use crate::event_sourcing::core::{Ack, CommandError};
use crate::event_sourcing::store::StateStore;
use crate::metrics::{CommandOutcome, Metrics};

use super::aggregate::Transition;
use super::commands::UniqueEmailCommand;
use super::errors::UniqueEmailError;
use super::value_objects::{Email, UniqueEmail};

// ============================================================================
// Unique Email Command Handler
// ============================================================================
//
// Orchestrates: Load snapshot → Decide → Save snapshot
//
// A missing snapshot is a free address. Calls for the same address must be
// serialized by the caller (the reservation actor does this).
//
// ============================================================================

#[derive(Clone)]
pub struct UniqueEmailCommandHandler {
    state_store: Arc<StateStore<UniqueEmail>>,
    metrics: Arc<Metrics>,
}

impl UniqueEmailCommandHandler {
    pub fn new(state_store: Arc<StateStore<UniqueEmail>>, metrics: Arc<Metrics>) -> Self {
        Self { state_store, metrics }
    }

    pub async fn handle(
        &self,
        address: &Email,
        command: UniqueEmailCommand,
    ) -> Result<Ack, CommandError<UniqueEmailError>> {
        let result = self.execute(address, &command).await;

        let outcome = match &result {
            Ok(true) => CommandOutcome::Applied,
            Ok(false) => CommandOutcome::NoOp,
            Err(CommandError::Rejected(_)) => CommandOutcome::Rejected,
            Err(CommandError::Infrastructure(_)) => CommandOutcome::Failed,
        };
        self.metrics.record_command("unique_email", command.name(), outcome);

        result.map(|_| Ack)
    }

    /// Returns whether a new snapshot was written
    async fn execute(
        &self,
        address: &Email,
        command: &UniqueEmailCommand,
    ) -> Result<bool, CommandError<UniqueEmailError>> {
        let current = self.get_state(address).await?;

        let transition = current.handle_command(command).map_err(|e| {
            tracing::info!(address = %address, command = command.name(), error = %e, "Email command rejected");
            CommandError::Rejected(e)
        })?;

        match transition {
            Transition::Apply(next) => {
                self.state_store.save(address.as_str(), &next).await?;
                tracing::info!(
                    address = %address,
                    command = command.name(),
                    status = ?next.status(),
                    owner_id = ?next.owner_id(),
                    "Email reservation updated"
                );
                Ok(true)
            }
            Transition::Unchanged => {
                tracing::debug!(
                    address = %address,
                    command = command.name(),
                    status = ?current.status(),
                    "Email command is a no-op"
                );
                Ok(false)
            }
        }
    }

    /// Current state; never-seen addresses are free
    pub async fn get_state(&self, address: &Email) -> anyhow::Result<UniqueEmail> {
        Ok(self
            .state_store
            .load(address.as_str())
            .await?
            .unwrap_or_else(|| UniqueEmail::not_in_use(address.clone())))
    }
}

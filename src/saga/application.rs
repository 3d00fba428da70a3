use uuid::Uuid;

use crate::actors::{CompensationTimer, UniqueEmails, Users};
use crate::domain::unique_email::{Email, UniqueEmail, UniqueEmailError};
use crate::domain::user::{UserAggregate, UserError, UserId};
use crate::event_sourcing::core::{Ack, CommandError};

// ============================================================================
// User Registry Service - Saga entry point
// ============================================================================
//
//   Reserve(email, user) → schedule compensation → CreateUser / ChangeEmail
//
// The user command is only sent once the reservation holds. If it then
// fails, nothing is undone here: the compensation timer releases the address.
// On success the saga router confirms it.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Email(#[from] CommandError<UniqueEmailError>),

    #[error(transparent)]
    User(#[from] CommandError<UserError>),

    #[error("Failed to schedule compensation: {0}")]
    Scheduling(anyhow::Error),
}

impl RegistryError {
    pub fn email_rejection(&self) -> Option<&UniqueEmailError> {
        match self {
            RegistryError::Email(e) => e.rejection(),
            _ => None,
        }
    }

    pub fn user_rejection(&self) -> Option<&UserError> {
        match self {
            RegistryError::User(e) => e.rejection(),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct UserRegistryService {
    emails: UniqueEmails,
    users: Users,
    timer: CompensationTimer,
}

impl UserRegistryService {
    pub fn new(emails: UniqueEmails, users: Users, timer: CompensationTimer) -> Self {
        Self { emails, users, timer }
    }

    pub async fn create_user(
        &self,
        user_id: &UserId,
        name: &str,
        country: &str,
        email: &Email,
    ) -> Result<Ack, RegistryError> {
        let correlation_id = Uuid::new_v4();
        tracing::info!(
            user_id = %user_id,
            email = %email,
            correlation_id = %correlation_id,
            "Creating user"
        );

        self.reserve(email, user_id).await?;
        self.users
            .create_user(user_id, name, country, email, correlation_id)
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id = %user_id, email = %email, error = %e, "User creation failed, reservation left to the compensation timer");
            })?;

        Ok(Ack)
    }

    pub async fn change_email(&self, user_id: &UserId, new_email: &Email) -> Result<Ack, RegistryError> {
        let correlation_id = Uuid::new_v4();
        tracing::info!(
            user_id = %user_id,
            new_email = %new_email,
            correlation_id = %correlation_id,
            "Changing user email"
        );

        self.reserve(new_email, user_id).await?;
        self.users
            .change_email(user_id, new_email, correlation_id)
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id = %user_id, new_email = %new_email, error = %e, "Email change failed, reservation left to the compensation timer");
            })?;

        Ok(Ack)
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<UserAggregate, RegistryError> {
        Ok(self.users.get_user(user_id).await?)
    }

    pub async fn get_email_info(&self, address: &Email) -> Result<UniqueEmail, RegistryError> {
        self.emails
            .get_state(address)
            .await
            .map_err(|e| RegistryError::Email(CommandError::Infrastructure(e)))
    }

    /// Reserve, then arm the compensation timer. No timer on conflict.
    async fn reserve(&self, address: &Email, owner_id: &UserId) -> Result<(), RegistryError> {
        self.emails.reserve(address, owner_id).await?;

        let timer_id = self
            .timer
            .schedule(address, owner_id)
            .await
            .map_err(RegistryError::Scheduling)?;

        tracing::debug!(address = %address, owner_id = %owner_id, timer_id = %timer_id, "Email reserved");
        Ok(())
    }
}

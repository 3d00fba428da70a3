use crate::event_sourcing::core::Aggregate;
use crate::domain::unique_email::Email;
use super::commands::UserCommand;
use super::events::*;
use super::errors::UserError;

// ============================================================================
// User Aggregate - Business Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct UserAggregate {
    pub name: String,
    pub country: String,
    pub email: Email,
    pub version: i64,
}

impl Aggregate for UserAggregate {
    type Event = UserEvent;
    type Command = UserCommand;
    type Error = UserError;

    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            UserEvent::Created(e) => Ok(Self {
                name: e.name.clone(),
                country: e.country.clone(),
                email: e.email.clone(),
                version: 0,
            }),
            _ => Err(UserError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            UserEvent::Created(_) => {
                // Only valid as the first event
                return Err(UserError::NotInitialized);
            }
            UserEvent::EmailAssigned(e) => {
                self.email = e.new_email.clone();
            }
            UserEvent::EmailUnassigned(_) => {
                // The reservation side cares, the projection does not
            }
        }

        self.version += 1;
        Ok(())
    }

    fn handle_command(
        state: Option<&Self>,
        command: &Self::Command,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::CreateUser { name, country, email } => {
                if name.is_empty() {
                    return Err(UserError::Validation("name must not be empty".to_string()));
                }

                if state.is_some() {
                    return Ok(vec![]);
                }

                Ok(vec![UserEvent::Created(UserCreated {
                    name: name.clone(),
                    country: country.clone(),
                    email: email.clone(),
                })])
            }

            UserCommand::ChangeEmail { new_email } => {
                let user = state.ok_or(UserError::NotFound)?;

                if &user.email == new_email {
                    return Ok(vec![]);
                }

                Ok(vec![
                    UserEvent::EmailAssigned(EmailAssigned { new_email: new_email.clone() }),
                    UserEvent::EmailUnassigned(EmailUnassigned { old_email: user.email.clone() }),
                ])
            }
        }
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

use super::commands::UniqueEmailCommand;
use super::errors::UniqueEmailError;
use super::value_objects::UniqueEmail;

// ============================================================================
// Unique Email Aggregate - Business Logic
// ============================================================================
//
// A value entity acting as a barrier: an address can only be used once.
// While a user is being created the address is reserved. If creation fails
// the compensation timer releases it, otherwise the saga router confirms it.
//
// Only `Reserve` can be rejected. Every other command degrades to a no-op
// outside its expected source state, which is what makes redelivery and the
// router/timer race harmless.
//
// ============================================================================

/// Result of deciding on a command
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Persist this new state
    Apply(UniqueEmail),
    /// Nothing to write; reply success
    Unchanged,
}

impl UniqueEmail {
    pub fn handle_command(&self, command: &UniqueEmailCommand) -> Result<Transition, UniqueEmailError> {
        match command {
            UniqueEmailCommand::Reserve { owner_id } => {
                if self.is_in_use() && !self.same_owner(owner_id) {
                    return Err(UniqueEmailError::Conflict(self.address().clone()));
                }

                // Same owner retrying, whatever the status: accept without touching state
                if self.same_owner(owner_id) {
                    return Ok(Transition::Unchanged);
                }

                Ok(Transition::Apply(UniqueEmail::reserved_by(
                    self.address().clone(),
                    owner_id.clone(),
                )))
            }

            UniqueEmailCommand::Confirm => {
                if self.is_reserved() {
                    Ok(Transition::Apply(self.as_confirmed()))
                } else {
                    Ok(Transition::Unchanged)
                }
            }

            UniqueEmailCommand::Release => {
                if self.is_reserved() {
                    Ok(Transition::Apply(UniqueEmail::not_in_use(self.address().clone())))
                } else {
                    Ok(Transition::Unchanged)
                }
            }

            UniqueEmailCommand::ForceRelease => {
                if self.is_in_use() {
                    Ok(Transition::Apply(UniqueEmail::not_in_use(self.address().clone())))
                } else {
                    Ok(Transition::Unchanged)
                }
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

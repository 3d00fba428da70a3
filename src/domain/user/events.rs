use serde::{Deserialize, Serialize};
use crate::event_sourcing::core::DomainEvent;
use crate::domain::unique_email::Email;

// ============================================================================
// User Domain Events
// ============================================================================

/// Union type for all user events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UserEvent {
    Created(UserCreated),
    EmailAssigned(EmailAssigned),
    EmailUnassigned(EmailUnassigned),
}

impl DomainEvent for UserEvent {
    fn event_name(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "UserCreated",
            UserEvent::EmailAssigned(_) => "EmailAssigned",
            UserEvent::EmailUnassigned(_) => "EmailUnassigned",
        }
    }
}

// Individual event types

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub name: String,
    pub country: String,
    pub email: Email,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAssigned {
    pub new_email: Email,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailUnassigned {
    pub old_email: Email,
}

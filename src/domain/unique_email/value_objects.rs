use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::user::UserId;

// ============================================================================
// Unique Email Value Objects
// ============================================================================

/// Email address. Doubles as the key of its reservation entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a reserved address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailStatus {
    Free,
    Reserved,
    Confirmed,
}

/// Full state of one address. `owner_id` is set iff the status is not `Free`;
/// the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueEmail {
    address: Email,
    status: EmailStatus,
    owner_id: Option<UserId>,
}

impl UniqueEmail {
    /// Initial state, and the state every release returns to
    pub fn not_in_use(address: Email) -> Self {
        Self { address, status: EmailStatus::Free, owner_id: None }
    }

    pub fn reserved_by(address: Email, owner_id: UserId) -> Self {
        Self { address, status: EmailStatus::Reserved, owner_id: Some(owner_id) }
    }

    pub fn as_confirmed(&self) -> Self {
        Self { status: EmailStatus::Confirmed, ..self.clone() }
    }

    pub fn address(&self) -> &Email {
        &self.address
    }

    pub fn status(&self) -> EmailStatus {
        self.status
    }

    pub fn owner_id(&self) -> Option<&UserId> {
        self.owner_id.as_ref()
    }

    pub fn same_owner(&self, owner_id: &UserId) -> bool {
        self.owner_id.as_ref() == Some(owner_id)
    }

    pub fn is_in_use(&self) -> bool {
        self.status != EmailStatus::Free
    }

    pub fn is_reserved(&self) -> bool {
        self.status == EmailStatus::Reserved
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == EmailStatus::Confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_a_plain_string_on_the_wire() {
        let address = Email::new("doe@acme.com");

        assert_eq!(serde_json::to_string(&address).unwrap(), r#""doe@acme.com""#);
        assert_eq!(serde_json::from_str::<Email>(r#""doe@acme.com""#).unwrap(), address);
        assert_eq!(address.as_str(), "doe@acme.com");
    }

    #[test]
    fn test_owner_present_iff_in_use() {
        let address = Email::new("doe@acme.com");
        let owner = UserId::new("001");

        let free = UniqueEmail::not_in_use(address.clone());
        assert!(!free.is_in_use());
        assert!(free.owner_id().is_none());

        let reserved = UniqueEmail::reserved_by(address, owner.clone());
        assert!(reserved.is_reserved());
        assert_eq!(reserved.owner_id(), Some(&owner));

        let confirmed = reserved.as_confirmed();
        assert!(confirmed.is_confirmed());
        assert!(confirmed.same_owner(&owner));
        assert!(!confirmed.same_owner(&UserId::new("002")));
    }

    #[test]
    fn test_snapshot_layout() {
        let state = UniqueEmail::reserved_by(Email::new("doe@acme.com"), UserId::new("001"));
        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["address"], "doe@acme.com");
        assert_eq!(json["status"], "RESERVED");
        assert_eq!(json["owner_id"], "001");

        let back: UniqueEmail = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}

use crate::domain::user::UserId;

// ============================================================================
// Unique Email Commands
// ============================================================================
//
// The address itself is the entity key and travels with the envelope, not
// the command.
//

#[derive(Debug, Clone, PartialEq)]
pub enum UniqueEmailCommand {
    /// Claim the address for `owner_id`
    Reserve { owner_id: UserId },
    /// Saga succeeded: RESERVED -> CONFIRMED
    Confirm,
    /// Compensation timer: RESERVED -> FREE
    Release,
    /// Owner stopped using the address: any -> FREE
    ForceRelease,
}

impl UniqueEmailCommand {
    pub fn name(&self) -> &'static str {
        match self {
            UniqueEmailCommand::Reserve { .. } => "reserve",
            UniqueEmailCommand::Confirm => "confirm",
            UniqueEmailCommand::Release => "release",
            UniqueEmailCommand::ForceRelease => "force_release",
        }
    }
}

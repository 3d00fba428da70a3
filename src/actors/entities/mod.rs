// ============================================================================
// Entity Actors
// ============================================================================
//
// One actor per aggregate instance, started on demand. The clients
// (`UniqueEmails`, `Users`) are the only way the rest of the crate talks to
// aggregates.
//
// ============================================================================

mod unique_email_actor;
mod user_actor;

pub use unique_email_actor::{UniqueEmailActor, UniqueEmails};
pub use user_actor::{UserActor, Users};

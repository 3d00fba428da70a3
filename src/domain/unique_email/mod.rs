// ============================================================================
// Unique Email Domain - One Address, One Owner
// ============================================================================
//
// - Value objects (Email, EmailStatus, UniqueEmail state)
// - Commands (Reserve, Confirm, Release, ForceRelease)
// - Errors (UniqueEmailError enum)
// - Aggregate (transition table on UniqueEmail)
// - Command Handler (UniqueEmailCommandHandler)
//
// Snapshot-backed rather than event-sourced: only the latest state matters.
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;

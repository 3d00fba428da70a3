// ============================================================================
// User Domain - Event-Sourced User Aggregate
// ============================================================================
//
// - Value objects (UserId)
// - Events (UserCreated, EmailAssigned, EmailUnassigned)
// - Commands (CreateUser, ChangeEmail)
// - Errors (UserError enum)
// - Aggregate (UserAggregate with business logic)
// - Command Handler (UserCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;

// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Value objects
// - Events (event-sourced aggregates only)
// - Commands
// - Errors
// - Aggregate implementation
// - Command handler
//
// This layer is completely separate from the actor infrastructure.
//
// ============================================================================

pub mod unique_email;
pub mod user;

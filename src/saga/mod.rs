// ============================================================================
// Unique Email Saga
// ============================================================================
//
// Choreography between the user and email reservation aggregates:
// - application/ - entry point reserving addresses before user commands
// - router/      - turns user events into reservation commands
//
// The compensation timer lives with the other infrastructure actors.
//
// ============================================================================

mod application;
mod router;

pub use application::{RegistryError, UserRegistryService};
pub use router::{route, SagaRouter};

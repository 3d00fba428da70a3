// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// Generic, reusable event sourcing infrastructure that works with ANY
// aggregate. No domain-specific code lives here.
//
// ============================================================================

pub mod aggregate;
pub mod command;
pub mod event;

// Re-export core types for convenience
pub use aggregate::Aggregate;
pub use command::{Ack, CommandError};
pub use event::{DomainEvent, EventEnvelope, serialize_event, deserialize_event};

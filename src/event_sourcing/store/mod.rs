// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// - EventStore: append-only per-aggregate logs + ordered outbox + checkpoints
// - StateStore: latest-snapshot-per-key storage for value entities
//
// ============================================================================

pub mod event_store;
pub mod state_store;

pub use event_store::{EventStore, OutboxEntry};
pub use state_store::StateStore;

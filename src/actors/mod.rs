// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for asynchronous, concurrent operations.
//
// Structure:
// - core/           - Generic building blocks (EntityRegistry)
// - entities/       - One actor per aggregate instance (email address, user)
// - infrastructure/ - Subscription, compensation timer, DLQ, coordinator
//
// Domain logic stays in the command handlers; entity actors only serialize
// access to them per key.
//
// ============================================================================

// Private module declarations
mod core;
mod entities;
mod infrastructure;

// Re-export what's needed in the public API
pub use self::core::{EntityRegistry, Passivation, DEFAULT_IDLE_TIMEOUT};
pub use entities::{UniqueEmailActor, UniqueEmails, UserActor, Users};
pub use infrastructure::{
    AddToDlq, CompensationTimer, CompensationTimerActor, CoordinatorActor, DlqActor, DlqMessage,
    DlqStats, GetDlqMessages, GetDlqStats, GetPendingCompensations, GetUserRegistry,
    PendingCompensation, RegistryStores, ScheduleCompensation, Shutdown, SubscriptionSettings,
    UserEventsSubscription, SAGA_ROUTER_CONSUMER_ID,
};

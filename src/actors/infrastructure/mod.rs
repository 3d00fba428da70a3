// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// Actors for system concerns:
// - Outbox subscription feeding the saga router
// - Compensation timers
// - Dead letter queue
// - Coordination and shutdown
//
// ============================================================================

// Private module declarations
mod compensation_timer;
mod coordinator;
mod dlq;
mod subscription;

// Re-export for public API
pub use compensation_timer::{
    CompensationTimer, CompensationTimerActor, GetPendingCompensations, PendingCompensation,
    ScheduleCompensation,
};
pub use coordinator::{CoordinatorActor, GetUserRegistry, RegistryStores, Shutdown};
pub use dlq::{AddToDlq, DlqActor, DlqMessage, DlqStats, GetDlqMessages, GetDlqStats, ResolveDlqMessage};
pub use subscription::{SubscriptionSettings, UserEventsSubscription, SAGA_ROUTER_CONSUMER_ID};

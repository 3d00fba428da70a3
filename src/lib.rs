// ============================================================================
// User Registry - Unique Email Choreography Saga
// ============================================================================
//
// Keeps one email address bound to at most one user across two independent
// aggregates, without locks or distributed transactions:
//
//   UserRegistryService ──Reserve──▶ UniqueEmail (RESERVED)
//          │                               ▲
//          └──CreateUser──▶ User ──events──┤ SagaRouter: Confirm / ForceRelease
//                                          │
//                     CompensationTimer ───┘ Release after the delay
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod saga;
pub mod utils;

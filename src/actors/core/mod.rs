// ============================================================================
// Core Actor Abstractions
// ============================================================================
//
// Generic, reusable actor building blocks.
//
// ============================================================================

pub mod registry;

// Re-export core types
pub use registry::*;

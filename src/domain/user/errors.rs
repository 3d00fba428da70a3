// ============================================================================
// User Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UserError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("User not found")]
    NotFound,

    #[error("User history must start with UserCreated")]
    NotInitialized,
}

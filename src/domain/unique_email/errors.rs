use super::value_objects::Email;

// ============================================================================
// Unique Email Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniqueEmailError {
    #[error("Email {0} is already reserved")]
    Conflict(Email),
}

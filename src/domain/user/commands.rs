use crate::domain::unique_email::Email;

// ============================================================================
// User Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    CreateUser {
        name: String,
        country: String,
        email: Email,
    },
    ChangeEmail {
        new_email: Email,
    },
}

impl UserCommand {
    pub fn name(&self) -> &'static str {
        match self {
            UserCommand::CreateUser { .. } => "create_user",
            UserCommand::ChangeEmail { .. } => "change_email",
        }
    }
}

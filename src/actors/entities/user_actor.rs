use actix::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use std::time::Duration;

use crate::actors::core::{EntityRegistry, Passivation, DEFAULT_IDLE_TIMEOUT};
use crate::domain::unique_email::Email;
use crate::domain::user::{UserAggregate, UserCommand, UserCommandHandler, UserError, UserId};
use crate::event_sourcing::core::{Ack, CommandError};

// ============================================================================
// Actor Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<Ack, CommandError<UserError>>")]
pub struct ExecuteUserCommand {
    pub command: UserCommand,
    pub correlation_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "Result<UserAggregate, CommandError<UserError>>")]
pub struct GetUser;

// ============================================================================
// User Actor - Single writer for one user's event log
// ============================================================================

pub struct UserActor {
    user_id: UserId,
    handler: UserCommandHandler,
    passivation: Passivation<Self>,
}

impl UserActor {
    pub fn new(user_id: UserId, handler: UserCommandHandler, passivation: Passivation<Self>) -> Self {
        Self { user_id, handler, passivation }
    }
}

impl Actor for UserActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!(user_id = %self.user_id, "UserActor started");
        self.passivation.schedule(ctx, |actor| &actor.passivation);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.passivation.evict(ctx);
    }
}

impl Handler<ExecuteUserCommand> for UserActor {
    type Result = AtomicResponse<Self, Result<Ack, CommandError<UserError>>>;

    fn handle(&mut self, msg: ExecuteUserCommand, _: &mut Self::Context) -> Self::Result {
        self.passivation.touch();
        let handler = self.handler.clone();
        let user_id = self.user_id.clone();

        AtomicResponse::new(Box::pin(
            async move { handler.handle(&user_id, msg.command, msg.correlation_id).await }
                .into_actor(self),
        ))
    }
}

impl Handler<GetUser> for UserActor {
    type Result = ResponseFuture<Result<UserAggregate, CommandError<UserError>>>;

    fn handle(&mut self, _msg: GetUser, _: &mut Self::Context) -> Self::Result {
        self.passivation.touch();
        let handler = self.handler.clone();
        let user_id = self.user_id.clone();

        Box::pin(async move { handler.get_user(&user_id).await })
    }
}

// ============================================================================
// Users - Client for all user actors
// ============================================================================

#[derive(Clone)]
pub struct Users {
    registry: Arc<EntityRegistry<UserActor>>,
}

impl Users {
    pub fn new(handler: UserCommandHandler) -> Self {
        Self::with_idle_timeout(handler, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(handler: UserCommandHandler, idle_timeout: Duration) -> Self {
        let registry = EntityRegistry::new("user", idle_timeout, move |key, passivation| {
            UserActor::new(UserId::new(key), handler.clone(), passivation)
        });
        Self { registry: Arc::new(registry) }
    }

    pub async fn execute(
        &self,
        user_id: &UserId,
        command: UserCommand,
        correlation_id: Uuid,
    ) -> Result<Ack, CommandError<UserError>> {
        self.registry
            .get(user_id.as_str())
            .send(ExecuteUserCommand { command, correlation_id })
            .await
            .map_err(anyhow::Error::from)?
    }

    pub async fn create_user(
        &self,
        user_id: &UserId,
        name: &str,
        country: &str,
        email: &Email,
        correlation_id: Uuid,
    ) -> Result<Ack, CommandError<UserError>> {
        let command = UserCommand::CreateUser {
            name: name.to_string(),
            country: country.to_string(),
            email: email.clone(),
        };
        self.execute(user_id, command, correlation_id).await
    }

    pub async fn change_email(
        &self,
        user_id: &UserId,
        new_email: &Email,
        correlation_id: Uuid,
    ) -> Result<Ack, CommandError<UserError>> {
        let command = UserCommand::ChangeEmail { new_email: new_email.clone() };
        self.execute(user_id, command, correlation_id).await
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<UserAggregate, CommandError<UserError>> {
        self.registry
            .get(user_id.as_str())
            .send(GetUser)
            .await
            .map_err(anyhow::Error::from)?
    }
}

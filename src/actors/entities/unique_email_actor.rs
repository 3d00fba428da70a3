use actix::prelude::*;
use std::sync::Arc;

use std::time::Duration;

use crate::actors::core::{EntityRegistry, Passivation, DEFAULT_IDLE_TIMEOUT};
use crate::domain::unique_email::{
    Email, UniqueEmail, UniqueEmailCommand, UniqueEmailCommandHandler, UniqueEmailError,
};
use crate::domain::user::UserId;
use crate::event_sourcing::core::{Ack, CommandError};

// ============================================================================
// Actor Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<Ack, CommandError<UniqueEmailError>>")]
pub struct ExecuteUniqueEmailCommand {
    pub command: UniqueEmailCommand,
}

#[derive(Message)]
#[rtype(result = "anyhow::Result<UniqueEmail>")]
pub struct GetUniqueEmail;

// ============================================================================
// Unique Email Actor - Single writer for one address
// ============================================================================

pub struct UniqueEmailActor {
    address: Email,
    handler: UniqueEmailCommandHandler,
    passivation: Passivation<Self>,
}

impl UniqueEmailActor {
    pub fn new(address: Email, handler: UniqueEmailCommandHandler, passivation: Passivation<Self>) -> Self {
        Self { address, handler, passivation }
    }
}

impl Actor for UniqueEmailActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!(address = %self.address, "UniqueEmailActor started");
        self.passivation.schedule(ctx, |actor| &actor.passivation);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.passivation.evict(ctx);
    }
}

impl Handler<ExecuteUniqueEmailCommand> for UniqueEmailActor {
    // Atomic: the next command for this address waits until the snapshot is saved
    type Result = AtomicResponse<Self, Result<Ack, CommandError<UniqueEmailError>>>;

    fn handle(&mut self, msg: ExecuteUniqueEmailCommand, _: &mut Self::Context) -> Self::Result {
        self.passivation.touch();
        let handler = self.handler.clone();
        let address = self.address.clone();

        AtomicResponse::new(Box::pin(
            async move { handler.handle(&address, msg.command).await }.into_actor(self),
        ))
    }
}

impl Handler<GetUniqueEmail> for UniqueEmailActor {
    type Result = ResponseFuture<anyhow::Result<UniqueEmail>>;

    fn handle(&mut self, _msg: GetUniqueEmail, _: &mut Self::Context) -> Self::Result {
        self.passivation.touch();
        let handler = self.handler.clone();
        let address = self.address.clone();

        Box::pin(async move { handler.get_state(&address).await })
    }
}

// ============================================================================
// Unique Emails - Client for all reservation actors
// ============================================================================

#[derive(Clone)]
pub struct UniqueEmails {
    registry: Arc<EntityRegistry<UniqueEmailActor>>,
}

impl UniqueEmails {
    pub fn new(handler: UniqueEmailCommandHandler) -> Self {
        Self::with_idle_timeout(handler, DEFAULT_IDLE_TIMEOUT)
    }

    /// Reservation actors stop after `idle_timeout` without a message
    pub fn with_idle_timeout(handler: UniqueEmailCommandHandler, idle_timeout: Duration) -> Self {
        let registry = EntityRegistry::new("unique_email", idle_timeout, move |key, passivation| {
            UniqueEmailActor::new(Email::new(key), handler.clone(), passivation)
        });
        Self { registry: Arc::new(registry) }
    }

    /// Reservation actors currently running
    pub fn active_actors(&self) -> usize {
        self.registry.len()
    }

    pub async fn execute(
        &self,
        address: &Email,
        command: UniqueEmailCommand,
    ) -> Result<Ack, CommandError<UniqueEmailError>> {
        self.registry
            .get(address.as_str())
            .send(ExecuteUniqueEmailCommand { command })
            .await
            .map_err(anyhow::Error::from)?
    }

    pub async fn reserve(&self, address: &Email, owner_id: &UserId) -> Result<Ack, CommandError<UniqueEmailError>> {
        self.execute(address, UniqueEmailCommand::Reserve { owner_id: owner_id.clone() }).await
    }

    pub async fn confirm(&self, address: &Email) -> Result<Ack, CommandError<UniqueEmailError>> {
        self.execute(address, UniqueEmailCommand::Confirm).await
    }

    pub async fn release(&self, address: &Email) -> Result<Ack, CommandError<UniqueEmailError>> {
        self.execute(address, UniqueEmailCommand::Release).await
    }

    pub async fn force_release(&self, address: &Email) -> Result<Ack, CommandError<UniqueEmailError>> {
        self.execute(address, UniqueEmailCommand::ForceRelease).await
    }

    pub async fn get_state(&self, address: &Email) -> anyhow::Result<UniqueEmail> {
        self.registry.get(address.as_str()).send(GetUniqueEmail).await?
    }
}

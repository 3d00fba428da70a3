use actix::clock::Instant;
use actix::prelude::*;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

// ============================================================================
// Entity Registry - One Actor per Key
// ============================================================================
//
// Lazily starts one actor per entity key (an email address, a user id) and
// hands out its address. Every command for a key goes through that actor's
// mailbox, so writes to one entity are serialized while different entities
// run in parallel.
//
// Entity actors passivate: once idle for `idle_timeout` they stop and drop
// their registry entry. State lives in the stores, so the next lookup simply
// starts a fresh actor. An actor that stopped for any other reason is
// replaced on the next lookup as well.
//
// ============================================================================

/// Idle period after which an entity actor stops, unless configured otherwise
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

type Actors<A> = DashMap<String, Addr<A>>;
type Factory<A> = Arc<dyn Fn(&str, Passivation<A>) -> A + Send + Sync>;

pub struct EntityRegistry<A>
where
    A: Actor<Context = Context<A>>,
{
    kind: &'static str,
    idle_timeout: Duration,
    actors: Arc<Actors<A>>,
    factory: Factory<A>,
}

impl<A> EntityRegistry<A>
where
    A: Actor<Context = Context<A>>,
{
    pub fn new(
        kind: &'static str,
        idle_timeout: Duration,
        factory: impl Fn(&str, Passivation<A>) -> A + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            idle_timeout,
            actors: Arc::new(DashMap::new()),
            factory: Arc::new(factory),
        }
    }

    /// Address of the actor owning `key`, starting it if needed.
    /// Must be called from within a running actix system.
    pub fn get(&self, key: &str) -> Addr<A> {
        if let Some(addr) = self.actors.get(key) {
            if addr.connected() {
                return addr.value().clone();
            }
        }

        let mut entry = self
            .actors
            .entry(key.to_string())
            .or_insert_with(|| self.spawn(key));

        if !entry.connected() {
            tracing::warn!(kind = self.kind, key = %key, "Entity actor stopped, restarting");
            *entry = self.spawn(key);
        }

        entry.value().clone()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    fn spawn(&self, key: &str) -> Addr<A> {
        tracing::debug!(kind = self.kind, key = %key, "Starting entity actor");
        let passivation = Passivation {
            kind: self.kind,
            key: key.to_string(),
            idle_timeout: self.idle_timeout,
            last_active: Instant::now(),
            actors: Arc::downgrade(&self.actors),
        };
        (self.factory)(key, passivation).start()
    }
}

// ============================================================================
// Passivation - idle tracking handed to every entity actor
// ============================================================================

pub struct Passivation<A>
where
    A: Actor<Context = Context<A>>,
{
    kind: &'static str,
    key: String,
    idle_timeout: Duration,
    last_active: Instant,
    actors: Weak<Actors<A>>,
}

impl<A> Passivation<A>
where
    A: Actor<Context = Context<A>>,
{
    /// Call from every message handler
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn is_idle(&self) -> bool {
        self.last_active.elapsed() >= self.idle_timeout
    }

    /// Stop the actor once it has been idle for the timeout. Call from `started`.
    pub fn schedule(&self, ctx: &mut Context<A>, passivation: fn(&A) -> &Passivation<A>) {
        ctx.run_interval(self.idle_timeout, move |act, ctx| {
            let passivation = passivation(act);
            if passivation.is_idle() {
                tracing::debug!(kind = passivation.kind, key = %passivation.key, "Passivating idle entity actor");
                ctx.stop();
            }
        });
    }

    /// Drop the registry entry. Call from `stopped`.
    pub fn evict(&self, ctx: &mut Context<A>) {
        let Some(actors) = self.actors.upgrade() else {
            return;
        };
        let addr = ctx.address();
        // A replacement may already own the key
        actors.remove_if(&self.key, |_, current| *current == addr);
    }
}

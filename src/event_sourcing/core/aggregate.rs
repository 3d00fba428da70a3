use anyhow::Result;
use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Commands are validated before emitting events
// 3. Events represent facts that have already happened
// 4. Folding an event into state is pure
//
// An aggregate that has no events yet is represented as `None`, so commands
// that create the aggregate go through the same `handle_command` entry point
// as every other command.
//
// ============================================================================

/// Generic Aggregate trait - all event-sourced aggregates implement this
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Create new aggregate from first event
    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Decide which events a command produces against the current state
    fn handle_command(
        state: Option<&Self>,
        command: &Self::Command,
    ) -> Result<Vec<Self::Event>, Self::Error>;

    /// Current version (sequence number of the last applied event)
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// `(projection, event) -> projection`
    fn fold(state: Option<Self>, event: &Self::Event) -> Result<Self, Self::Error> {
        match state {
            None => Self::apply_first_event(event),
            Some(mut aggregate) => {
                aggregate.apply_event(event)?;
                Ok(aggregate)
            }
        }
    }

    /// Load aggregate from event history (reconstruct from events)
    fn load_from_events(events: Vec<EventEnvelope<Self::Event>>) -> Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        let mut state: Option<Self> = None;

        for envelope in &events {
            let mut aggregate = Self::fold(state.take(), &envelope.event_data)
                .map_err(|e| anyhow::anyhow!("Failed to apply event {}: {}", envelope.sequence_number, e))?;
            aggregate.set_version(envelope.sequence_number);
            state = Some(aggregate);
        }

        state.ok_or_else(|| anyhow::anyhow!("No events to load"))
    }
}

//! Outbound state-change events.
//!
//! [`Notifier`] wraps a [`broadcast::Sender`] of [`Outbound`] messages. The
//! messaging layer subscribes once and routes each message to the owning
//! player's connection. Sending with no subscribers is not an error: events
//! describe state already committed to the record store, so a client that
//! misses one catches up from its next session load.
//!
//! A subscriber that falls behind receives
//! [`broadcast::error::RecvError::Lagged`] and resumes from the most recent
//! event.

use petfarm_types::{Ack, Outbound, Pet, PetId, PlayerId, ServerEvent};
use tokio::sync::broadcast;

/// Fan-out sender for [`Outbound`] events.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Outbound>,
}

impl Notifier {
    /// Create a notifier whose channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every event sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send `event` to `player_id`.
    pub fn send(&self, player_id: PlayerId, event: ServerEvent) {
        if self.tx.send(Outbound { player_id, event }).is_err() {
            tracing::trace!(player_id = %player_id, "No event subscribers");
        }
    }

    /// Deliver a request acknowledgment.
    pub fn ack(&self, player_id: PlayerId, ack: Ack) {
        self.send(player_id, ServerEvent::Ack { ack });
    }

    /// A pet became an adult.
    pub fn pet_evolved(&self, pet: &Pet) {
        self.send(pet.owner_id, ServerEvent::PetEvolved { pet_id: pet.id });
    }

    /// A pet earned `increment` tokens.
    pub fn income_accrued(&self, pet: &Pet, increment: u64) {
        self.send(
            pet.owner_id,
            ServerEvent::IncomeAccrued {
                pet_id: pet.id,
                increment,
                token_income: pet.token_income,
                total_income: pet.total_income,
            },
        );
    }

    /// A pet's stats decayed.
    pub fn stats_decayed(&self, pet: &Pet) {
        self.send(
            pet.owner_id,
            ServerEvent::StatsDecayed {
                pet_id: pet.id,
                stats: pet.stats,
            },
        );
    }
}

/// Extract the pet id carried by a pet event, if any.
pub const fn event_pet_id(event: &ServerEvent) -> Option<PetId> {
    match event {
        ServerEvent::Ack { .. } => None,
        ServerEvent::PetEvolved { pet_id }
        | ServerEvent::IncomeAccrued { pet_id, .. }
        | ServerEvent::StatsDecayed { pet_id, .. } => Some(*pet_id),
    }
}

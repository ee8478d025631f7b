//! Client action, acknowledgment, and server event shapes.
//!
//! Every inbound client action maps 1:1 to a dispatcher [`Topic`]. Each
//! request yields exactly one [`Ack`]. Background state changes reach
//! clients as [`ServerEvent`] values tagged with the owning player.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::RejectionReason;
use crate::ids::{PetId, PetTypeId, PlayerId, PoopId, RequestId};
use crate::structs::PetStats;

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Dispatcher topic. One per inbound action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Topic {
    /// `buy_pet`
    BuyPet,
    /// `feed_pet`
    FeedPet,
    /// `clean_pet`
    CleanPet,
    /// `eated_food`
    EatedFood,
    /// `cleaned_pet`
    CleanedPet,
    /// `played_pet`
    PlayedPet,
    /// `create_poop`
    CreatePoop,
    /// `buy_item`
    BuyItem,
    /// `get_catalog`
    GetCatalog,
    /// `get_inventory`
    GetInventory,
    /// `claim_income`
    ClaimIncome,
}

impl Topic {
    /// Every topic.
    pub const ALL: [Self; 11] = [
        Self::BuyPet,
        Self::FeedPet,
        Self::CleanPet,
        Self::EatedFood,
        Self::CleanedPet,
        Self::PlayedPet,
        Self::CreatePoop,
        Self::BuyItem,
        Self::GetCatalog,
        Self::GetInventory,
        Self::ClaimIncome,
    ];

    /// Wire name of the topic.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BuyPet => "buy_pet",
            Self::FeedPet => "feed_pet",
            Self::CleanPet => "clean_pet",
            Self::EatedFood => "eated_food",
            Self::CleanedPet => "cleaned_pet",
            Self::PlayedPet => "played_pet",
            Self::CreatePoop => "create_poop",
            Self::BuyItem => "buy_item",
            Self::GetCatalog => "get_catalog",
            Self::GetInventory => "get_inventory",
            Self::ClaimIncome => "claim_income",
        }
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A player action received from the messaging layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientAction {
    /// Buy a new pet of the given type.
    BuyPet {
        /// Species to buy.
        pet_type_id: PetTypeId,
        /// Optional display name; the type name is used otherwise.
        name: Option<String>,
    },
    /// Buy one unit of food and feed it immediately.
    FeedPet {
        /// Pet to feed.
        pet_id: PetId,
        /// Food item key.
        item_key: String,
    },
    /// Buy one cleaning item and use it on a poop.
    CleanPet {
        /// Pet to clean.
        pet_id: PetId,
        /// Cleaning item key.
        item_key: String,
        /// Poop to remove.
        poop_id: PoopId,
    },
    /// Feed one unit of food from the inventory.
    EatedFood {
        /// Pet that ate.
        pet_id: PetId,
        /// Food item key.
        item_key: String,
    },
    /// Use one cleaning item from the inventory on a poop.
    CleanedPet {
        /// Pet cleaned.
        pet_id: PetId,
        /// Cleaning item key.
        item_key: String,
        /// Poop removed.
        poop_id: PoopId,
    },
    /// Play with a toy from the inventory.
    PlayedPet {
        /// Pet played with.
        pet_id: PetId,
        /// Toy item key.
        item_key: String,
    },
    /// Spawn a poop on a pet.
    CreatePoop {
        /// Pet that pooped.
        pet_id: PetId,
    },
    /// Buy items into the inventory.
    BuyItem {
        /// Item key.
        item_key: String,
        /// Units to buy.
        quantity: u32,
    },
    /// List the store catalog.
    GetCatalog,
    /// Read the player's inventory.
    GetInventory,
    /// Move a pet's accrued income into the player balance.
    ClaimIncome {
        /// Pet to claim from.
        pet_id: PetId,
    },
}

impl ClientAction {
    /// The dispatcher topic this action is published on.
    pub const fn topic(&self) -> Topic {
        match self {
            Self::BuyPet { .. } => Topic::BuyPet,
            Self::FeedPet { .. } => Topic::FeedPet,
            Self::CleanPet { .. } => Topic::CleanPet,
            Self::EatedFood { .. } => Topic::EatedFood,
            Self::CleanedPet { .. } => Topic::CleanedPet,
            Self::PlayedPet { .. } => Topic::PlayedPet,
            Self::CreatePoop { .. } => Topic::CreatePoop,
            Self::BuyItem { .. } => Topic::BuyItem,
            Self::GetCatalog => Topic::GetCatalog,
            Self::GetInventory => Topic::GetInventory,
            Self::ClaimIncome { .. } => Topic::ClaimIncome,
        }
    }
}

/// An action together with its request and caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Envelope {
    /// Client-supplied request id, stable across resends.
    pub request_id: RequestId,
    /// Authenticated player.
    pub player_id: PlayerId,
    /// The action.
    pub action: ClientAction,
    /// When the messaging layer received it.
    pub received_at: DateTime<Utc>,
}

impl Envelope {
    /// Wrap `action` for `player_id` with a fresh request id.
    pub fn new(player_id: PlayerId, action: ClientAction) -> Self {
        Self {
            request_id: RequestId::new(),
            player_id,
            action,
            received_at: Utc::now(),
        }
    }

    /// The topic of the wrapped action.
    pub const fn topic(&self) -> Topic {
        self.action.topic()
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Acknowledgment sent once per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Ack {
    /// Request being acknowledged.
    pub request_id: RequestId,
    /// Topic the request was published on.
    pub topic: Topic,
    /// Whether the action was applied.
    pub success: bool,
    /// Result payload on success.
    pub data: Option<serde_json::Value>,
    /// Failure reason on rejection.
    pub error: Option<RejectionReason>,
    /// Human-readable summary.
    pub message: String,
    /// When the ack was produced.
    pub timestamp: DateTime<Utc>,
}

impl Ack {
    /// A successful ack carrying `data`.
    pub fn ok(envelope: &Envelope, data: serde_json::Value, message: impl Into<String>) -> Self {
        Self {
            request_id: envelope.request_id,
            topic: envelope.topic(),
            success: true,
            data: Some(data),
            error: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// A failed ack carrying `reason`.
    pub fn fail(envelope: &Envelope, reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            request_id: envelope.request_id,
            topic: envelope.topic(),
            success: false,
            data: None,
            error: Some(reason),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A state change pushed to a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerEvent {
    /// A request was acknowledged.
    Ack {
        /// The acknowledgment.
        ack: Ack,
    },
    /// A pet grew into an adult.
    PetEvolved {
        /// The pet.
        pet_id: PetId,
    },
    /// A pet earned income.
    IncomeAccrued {
        /// The pet.
        pet_id: PetId,
        /// Tokens added this pass.
        increment: u64,
        /// Unclaimed income after the pass.
        token_income: u64,
        /// Lifetime income after the pass.
        total_income: u64,
    },
    /// A pet's stats decayed.
    StatsDecayed {
        /// The pet.
        pet_id: PetId,
        /// Stats after decay.
        stats: PetStats,
    },
}

/// A [`ServerEvent`] addressed to one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Outbound {
    /// Recipient.
    pub player_id: PlayerId,
    /// The event.
    pub event: ServerEvent,
}

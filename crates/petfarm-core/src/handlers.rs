//! The dispatcher subscriber that turns player actions into transactions.
//!
//! | Topic | Flow | Payment |
//! |-------|------|---------|
//! | `buy_pet` | [`TransactionManager::buy_pet`] | tokens |
//! | `buy_item` | [`TransactionManager::buy_item`] | tokens |
//! | `feed_pet` | [`TransactionManager::feed`] | tokens |
//! | `eated_food` | [`TransactionManager::feed`] | inventory |
//! | `played_pet` | [`TransactionManager::play`] | inventory |
//! | `clean_pet` | [`TransactionManager::clean`] | tokens |
//! | `cleaned_pet` | [`TransactionManager::clean`] | inventory |
//! | `create_poop` | [`TransactionManager::create_poop`] | none |
//! | `claim_income` | [`TransactionManager::claim_income`] | none |
//! | `get_catalog` | [`TransactionManager::catalog`] | none |
//! | `get_inventory` | [`TransactionManager::inventory`] | none |
//!
//! A resent request (same `request_id` from the same player, even after a
//! reconnect) is answered from the registry's ack cache without touching
//! the store.

use std::sync::Arc;

use futures::future::BoxFuture;
use petfarm_db::DbError;
use petfarm_sim::Payment;
use petfarm_types::{Ack, ClientAction, Envelope, RejectionReason};
use serde::Serialize;

use crate::dispatcher::Handler;
use crate::session::SessionRegistry;
use crate::transactions::{TransactionError, TransactionManager};

/// Successful response body and summary.
type Reply = Result<(serde_json::Value, String), TransactionError>;

fn reply<T: Serialize>(receipt: &T, message: impl Into<String>) -> Reply {
    let data = serde_json::to_value(receipt).map_err(DbError::from)?;
    Ok((data, message.into()))
}

/// Answers every player-action topic.
pub struct ActionHandler {
    transactions: Arc<TransactionManager>,
    sessions: Arc<SessionRegistry>,
}

impl ActionHandler {
    /// Create a handler.
    pub const fn new(transactions: Arc<TransactionManager>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            transactions,
            sessions,
        }
    }

    async fn run(&self, envelope: &Envelope) -> Reply {
        let tm = &self.transactions;
        let player = envelope.player_id;
        match &envelope.action {
            ClientAction::BuyPet { pet_type_id, name } => {
                let receipt = tm.buy_pet(player, *pet_type_id, name.as_deref()).await?;
                reply(&receipt, format!("{} joined the farm", receipt.pet.name))
            }
            ClientAction::BuyItem { item_key, quantity } => {
                let receipt = tm.buy_item(player, item_key, *quantity).await?;
                reply(&receipt, format!("bought {quantity} {item_key}"))
            }
            ClientAction::FeedPet { pet_id, item_key } => {
                let receipt = tm.feed(player, *pet_id, item_key, Payment::Tokens).await?;
                reply(&receipt, "pet fed")
            }
            ClientAction::EatedFood { pet_id, item_key } => {
                let receipt = tm.feed(player, *pet_id, item_key, Payment::Inventory).await?;
                reply(&receipt, "pet fed")
            }
            ClientAction::PlayedPet { pet_id, item_key } => {
                let receipt = tm.play(player, *pet_id, item_key).await?;
                reply(&receipt, "played with pet")
            }
            ClientAction::CleanPet {
                pet_id,
                item_key,
                poop_id,
            } => {
                let receipt = tm
                    .clean(player, *pet_id, item_key, *poop_id, Payment::Tokens)
                    .await?;
                reply(&receipt, "pet cleaned")
            }
            ClientAction::CleanedPet {
                pet_id,
                item_key,
                poop_id,
            } => {
                let receipt = tm
                    .clean(player, *pet_id, item_key, *poop_id, Payment::Inventory)
                    .await?;
                reply(&receipt, "pet cleaned")
            }
            ClientAction::CreatePoop { pet_id } => {
                let receipt = tm.create_poop(player, *pet_id).await?;
                reply(&receipt, "poop created")
            }
            ClientAction::ClaimIncome { pet_id } => {
                let receipt = tm.claim_income(player, *pet_id).await?;
                reply(&receipt, format!("claimed {} tokens", receipt.amount))
            }
            ClientAction::GetCatalog => reply(&tm.catalog().await?, "catalog"),
            ClientAction::GetInventory => reply(&tm.inventory(player).await?, "inventory"),
        }
    }

    async fn answer(&self, envelope: &Envelope) -> Ack {
        let player = envelope.player_id;
        if !self.sessions.contains(player).await {
            return Ack::fail(envelope, RejectionReason::NoSession, "no open session");
        }
        if let Some(ack) = self.sessions.cached_ack(player, envelope.request_id).await {
            tracing::debug!(
                player_id = %player,
                request_id = %envelope.request_id,
                "Replaying acknowledgment"
            );
            return ack;
        }

        let ack = match self.run(envelope).await {
            Ok((data, message)) => Ack::ok(envelope, data, message),
            Err(e) => {
                tracing::debug!(
                    player_id = %player,
                    topic = %envelope.topic(),
                    reason = ?e.reason(),
                    error = %e,
                    "Action rejected"
                );
                Ack::fail(envelope, e.reason(), e.to_string())
            }
        };
        self.sessions.remember_ack(player, ack.clone()).await;
        ack
    }
}

impl Handler for ActionHandler {
    fn name(&self) -> &'static str {
        "actions"
    }

    fn handle<'a>(&'a self, envelope: &'a Envelope) -> BoxFuture<'a, Option<Ack>> {
        Box::pin(async move { Some(self.answer(envelope).await) })
    }
}

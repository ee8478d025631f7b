//! Player action rules: validation followed by mutation.
//!
//! Every function takes the authoritative documents by reference and returns
//! fresh copies carrying the change, so a rejection leaves the inputs
//! untouched and the caller has nothing to roll back. Checks run in a fixed
//! order:
//!
//! 1. Ownership -- the pet belongs to the acting player.
//! 2. Status -- the pet is active (stat restores and poops only).
//! 3. Item -- the item exists in the right category with a usable effect.
//! 4. Payment -- enough tokens or a nonzero inventory entry.
//! 5. Preconditions -- stats brought current by the decay calculator and
//!    compared with the allow threshold; poop present for cleaning.
//!
//! The caller persists the returned documents and ledger entry in one
//! transaction.

use chrono::{DateTime, Utc};
use petfarm_types::{
    InventoryEntry, ItemCategory, LedgerEntryKind, Pet, PetStatus, PetType, Player, Poop, PoopId,
    RejectionReason, Stat, StatEffect, StoreItem, TokenLedgerEntry,
};
use rand::Rng;

use crate::config::RulesConfig;
use crate::decay;
use crate::error::Rejection;
use crate::pet::{PetOrigin, new_pet};
use crate::poop;

/// How an item used on a pet is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payment {
    /// Buy one unit at catalog price and use it immediately.
    Tokens,
    /// Consume one unit from the player's inventory.
    Inventory,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of [`buy_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPurchase {
    /// Player with tokens debited and inventory credited.
    pub player: Player,
    /// Ledger entry for the debit.
    pub ledger: TokenLedgerEntry,
}

/// Result of [`buy_pet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetPurchase {
    /// Player with tokens debited.
    pub player: Player,
    /// The new pet, not yet persisted.
    pub pet: Pet,
    /// Ledger entry for the debit.
    pub ledger: TokenLedgerEntry,
}

/// Result of [`feed`] and [`play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUse {
    /// Player with tokens or inventory debited.
    pub player: Player,
    /// Pet with decay applied and the stat restored.
    pub pet: Pet,
    /// Ledger entry when paid with tokens.
    pub ledger: Option<TokenLedgerEntry>,
    /// Stat restored.
    pub stat: Stat,
    /// Its value after restoring.
    pub value: u32,
}

/// Result of [`clean`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleaning {
    /// Player with tokens or inventory debited.
    pub player: Player,
    /// Pet with the poop removed and cleanliness restored.
    pub pet: Pet,
    /// Ledger entry when paid with tokens.
    pub ledger: Option<TokenLedgerEntry>,
    /// The poop that was removed.
    pub removed: Poop,
    /// Cleanliness after restoring.
    pub cleanliness: u32,
}

/// Result of [`claim_income`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeClaim {
    /// Player with the income credited.
    pub player: Player,
    /// Pet with `token_income` reset.
    pub pet: Pet,
    /// Tokens moved.
    pub amount: u64,
    /// Ledger entry for the credit.
    pub ledger: TokenLedgerEntry,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn ensure_owner(player: &Player, pet: &Pet) -> Result<(), Rejection> {
    if pet.owner_id == player.id {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectionReason::NotOwner,
            format!("pet {} is not owned by player {}", pet.id, player.id),
        ))
    }
}

fn ensure_active(pet: &Pet) -> Result<(), Rejection> {
    if pet.status == PetStatus::Active {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectionReason::PetInactive,
            format!("pet {} is inactive", pet.id),
        ))
    }
}

/// The restoring effect of `item`, which must be in `category` and restore
/// the stat that category is for.
fn restore_effect(item: &StoreItem, category: ItemCategory) -> Result<StatEffect, Rejection> {
    if item.category != category {
        return Err(Rejection::new(
            RejectionReason::WrongItemCategory,
            format!("item {} is {:?}, expected {category:?}", item.key, item.category),
        ));
    }
    let effect = item.effect.ok_or_else(|| {
        Rejection::new(
            RejectionReason::WrongItemCategory,
            format!("item {} has no stat effect", item.key),
        )
    })?;
    if category.restores() != Some(effect.stat) {
        return Err(Rejection::new(
            RejectionReason::WrongItemCategory,
            format!(
                "item {} restores {:?}, which {category:?} items cannot",
                item.key, effect.stat
            ),
        ));
    }
    Ok(effect)
}

fn debit_tokens(player: &mut Player, cost: u64) -> Result<(), Rejection> {
    player.tokens = player.tokens.checked_sub(cost).ok_or_else(|| {
        Rejection::new(
            RejectionReason::InsufficientTokens,
            format!("need {cost} tokens, have {}", player.tokens),
        )
    })?;
    Ok(())
}

fn take_from_inventory(player: &mut Player, item_key: &str) -> Result<(), Rejection> {
    let entry = player
        .inventory
        .get_mut(item_key)
        .filter(|e| e.quantity > 0)
        .ok_or_else(|| {
            Rejection::new(
                RejectionReason::OutOfStock,
                format!("no {item_key} in inventory"),
            )
        })?;
    entry.quantity = entry.quantity.saturating_sub(1);
    Ok(())
}

/// Charge one unit of `item` to `player`. Returns the ledger entry for a
/// token payment.
fn pay(
    player: &mut Player,
    pet: &Pet,
    item: &StoreItem,
    payment: Payment,
    kind: LedgerEntryKind,
    now: DateTime<Utc>,
) -> Result<Option<TokenLedgerEntry>, Rejection> {
    match payment {
        Payment::Tokens => {
            debit_tokens(player, item.cost)?;
            Ok(Some(TokenLedgerEntry::debit(
                player.id,
                Some(pet.id),
                kind,
                item.cost,
                format!("{} for {}", item.key, pet.name),
                now,
            )))
        }
        Payment::Inventory => {
            take_from_inventory(player, &item.key)?;
            Ok(None)
        }
    }
}

/// Bring `pet`'s stats current and reject when `stat` is above its allow
/// threshold.
fn decay_and_check(
    pet: &mut Pet,
    stat: Stat,
    rules: &RulesConfig,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    let _ = decay::decay_pet_stats(pet, now);
    let current = pet.stats.get(stat).value;
    let threshold = rules.allow_threshold(stat);
    if current > threshold {
        return Err(Rejection::new(
            RejectionReason::StatAboveThreshold,
            format!("{stat:?} is {current}, above the allow threshold {threshold}"),
        ));
    }
    Ok(())
}

/// Raise `stat` by `amount`, keeping its decay checkpoint.
fn apply_restore(pet: &mut Pet, stat: Stat, amount: u32) -> u32 {
    let slot = pet.stats.get_mut(stat);
    slot.value = decay::restore(slot.value, amount);
    slot.value
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

/// Buy `quantity` units of `item` into the inventory.
pub fn buy_item(
    player: &Player,
    item: &StoreItem,
    quantity: u32,
    rules: &RulesConfig,
    now: DateTime<Utc>,
) -> Result<ItemPurchase, Rejection> {
    if quantity == 0 || quantity > rules.max_purchase_quantity {
        return Err(Rejection::new(
            RejectionReason::InvalidQuantity,
            format!(
                "quantity must be between 1 and {}",
                rules.max_purchase_quantity
            ),
        ));
    }
    let total = item
        .cost
        .checked_mul(u64::from(quantity))
        .ok_or_else(|| Rejection::new(RejectionReason::InvalidQuantity, "price overflow"))?;

    let mut player = player.clone();
    debit_tokens(&mut player, total)?;
    let entry = player
        .inventory
        .entry(item.key.clone())
        .or_insert_with(InventoryEntry::default);
    entry.quantity = entry.quantity.saturating_add(quantity);
    entry.total_acquired = entry.total_acquired.saturating_add(quantity);

    let ledger = TokenLedgerEntry::debit(
        player.id,
        None,
        LedgerEntryKind::PurchaseItem,
        total,
        format!("{} x{quantity}", item.key),
        now,
    );
    tracing::debug!(player_id = %player.id, item = %item.key, quantity, total, "item bought");
    Ok(ItemPurchase { player, ledger })
}

/// Buy a new pet of `pet_type`. The pet starts at full stats.
pub fn buy_pet<R: Rng + ?Sized>(
    player: &Player,
    pet_type: &PetType,
    name: Option<&str>,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<PetPurchase, Rejection> {
    let mut player = player.clone();
    debit_tokens(&mut player, pet_type.cost)?;
    let pet = new_pet(player.id, pet_type, name, PetOrigin::Purchase, rng, now);
    let ledger = TokenLedgerEntry::debit(
        player.id,
        Some(pet.id),
        LedgerEntryKind::PurchasePet,
        pet_type.cost,
        format!("{} ({})", pet.name, pet_type.name),
        now,
    );
    tracing::debug!(player_id = %player.id, pet_id = %pet.id, cost = pet_type.cost, "pet bought");
    Ok(PetPurchase {
        player,
        pet,
        ledger,
    })
}

/// Use a restoring item of `category` on `pet`.
#[allow(clippy::too_many_arguments)]
fn use_item(
    player: &Player,
    pet: &Pet,
    item: &StoreItem,
    category: ItemCategory,
    payment: Payment,
    kind: LedgerEntryKind,
    rules: &RulesConfig,
    now: DateTime<Utc>,
) -> Result<ItemUse, Rejection> {
    ensure_owner(player, pet)?;
    ensure_active(pet)?;
    let effect = restore_effect(item, category)?;

    let mut player = player.clone();
    let mut pet = pet.clone();
    let ledger = pay(&mut player, &pet, item, payment, kind, now)?;
    decay_and_check(&mut pet, effect.stat, rules, now)?;
    let value = apply_restore(&mut pet, effect.stat, effect.amount);

    tracing::debug!(
        pet_id = %pet.id,
        item = %item.key,
        stat = ?effect.stat,
        value,
        "item used"
    );
    Ok(ItemUse {
        player,
        pet,
        ledger,
        stat: effect.stat,
        value,
    })
}

/// Feed `pet` one unit of a food item.
pub fn feed(
    player: &Player,
    pet: &Pet,
    item: &StoreItem,
    payment: Payment,
    rules: &RulesConfig,
    now: DateTime<Utc>,
) -> Result<ItemUse, Rejection> {
    use_item(
        player,
        pet,
        item,
        ItemCategory::Food,
        payment,
        LedgerEntryKind::Feed,
        rules,
        now,
    )
}

/// Play with `pet` using a toy.
pub fn play(
    player: &Player,
    pet: &Pet,
    item: &StoreItem,
    payment: Payment,
    rules: &RulesConfig,
    now: DateTime<Utc>,
) -> Result<ItemUse, Rejection> {
    use_item(
        player,
        pet,
        item,
        ItemCategory::Toy,
        payment,
        LedgerEntryKind::Play,
        rules,
        now,
    )
}

/// Remove poop `poop_id` from `pet` with a cleaning item.
pub fn clean(
    player: &Player,
    pet: &Pet,
    item: &StoreItem,
    poop_id: PoopId,
    payment: Payment,
    rules: &RulesConfig,
    now: DateTime<Utc>,
) -> Result<Cleaning, Rejection> {
    ensure_owner(player, pet)?;
    ensure_active(pet)?;
    let effect = restore_effect(item, ItemCategory::Cleaning)?;
    if !pet.has_poop(poop_id) {
        return Err(Rejection::new(
            RejectionReason::PoopNotFound,
            format!("poop {poop_id} is not on pet {}", pet.id),
        ));
    }

    let mut player = player.clone();
    let mut pet = pet.clone();
    let ledger = pay(&mut player, &pet, item, payment, LedgerEntryKind::Clean, now)?;
    decay_and_check(&mut pet, Stat::Cleanliness, rules, now)?;
    let removed = poop::remove_poop(&mut pet, poop_id)?;
    let cleanliness = apply_restore(&mut pet, Stat::Cleanliness, effect.amount);

    tracing::debug!(pet_id = %pet.id, poop_id = %poop_id, cleanliness, "poop cleaned");
    Ok(Cleaning {
        player,
        pet,
        ledger,
        removed,
        cleanliness,
    })
}

/// Spawn a poop on `pet`. Returns the updated pet and the new poop.
pub fn create_poop<R: Rng + ?Sized>(
    player: &Player,
    pet: &Pet,
    rules: &RulesConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<(Pet, Poop), Rejection> {
    ensure_owner(player, pet)?;
    ensure_active(pet)?;
    let mut pet = pet.clone();
    let poop = poop::spawn_poop(&mut pet, rules, rng, now)?;
    Ok((pet, poop))
}

/// Move `pet`'s unclaimed income into the player's balance.
pub fn claim_income(
    player: &Player,
    pet: &Pet,
    now: DateTime<Utc>,
) -> Result<IncomeClaim, Rejection> {
    ensure_owner(player, pet)?;
    if pet.token_income == 0 {
        return Err(Rejection::new(
            RejectionReason::NothingToClaim,
            format!("pet {} has no income to claim", pet.id),
        ));
    }

    let amount = pet.token_income;
    let mut player = player.clone();
    let mut pet = pet.clone();
    player.tokens = player.tokens.saturating_add(amount);
    pet.token_income = 0;

    let ledger = TokenLedgerEntry::credit(
        player.id,
        Some(pet.id),
        LedgerEntryKind::Claim,
        amount,
        format!("income from {}", pet.name),
        now,
    );
    tracing::debug!(player_id = %player.id, pet_id = %pet.id, amount, "income claimed");
    Ok(IncomeClaim {
        player,
        pet,
        amount,
        ledger,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeDelta;
    use petfarm_types::{
        DecayRange, DecayRanges, DecayRates, DefaultStats, LifecycleStage, PetId, PetStats,
        PetTypeId, PlayerId, StatValue, StoreItemId,
    };
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-10T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn player(tokens: u64) -> Player {
        Player {
            id: PlayerId::new(),
            wallet: String::from("0xfeed"),
            tokens,
            inventory: BTreeMap::new(),
            created_at: now(),
            version: 1,
        }
    }

    fn pet_for(owner: &Player) -> Pet {
        Pet {
            id: PetId::new(),
            owner_id: owner.id,
            pet_type_id: PetTypeId::new(),
            name: String::from("Biscuit"),
            stats: PetStats::full(now()),
            decay_rates: DecayRates {
                hunger: 5,
                happiness: 5,
                cleanliness: 5,
            },
            lifecycle_stage: LifecycleStage::Adult,
            status: PetStatus::Active,
            token_income: 0,
            total_income: 0,
            last_claim: None,
            poops: Vec::new(),
            created_at: now(),
            version: 1,
        }
    }

    fn item(key: &str, category: ItemCategory, stat: Stat, cost: u64) -> StoreItem {
        StoreItem {
            id: StoreItemId::new(),
            key: key.to_owned(),
            name: key.to_owned(),
            category,
            cost,
            effect: Some(StatEffect { stat, amount: 30 }),
        }
    }

    fn pet_type(cost: u64) -> PetType {
        let range = DecayRange {
            min_per_hour: 1,
            max_per_hour: 2,
        };
        PetType {
            id: PetTypeId::new(),
            name: String::from("Axolotl"),
            default_stats: DefaultStats::default(),
            decay: DecayRanges {
                hunger: range,
                happiness: range,
                cleanliness: range,
            },
            time_natural_minutes: 10,
            income_per_claim: 1,
            max_income_per_claim: 15,
            max_income: 100,
            cost,
        }
    }

    #[test]
    fn buy_item_debits_and_credits_inventory() {
        let p = player(100);
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 7);
        let out = buy_item(&p, &apple, 3, &RulesConfig::default(), now()).unwrap();
        assert_eq!(out.player.tokens, 79);
        assert_eq!(out.player.quantity_of("apple"), 3);
        assert_eq!(out.ledger.amount, -21);
        assert_eq!(out.ledger.kind, LedgerEntryKind::PurchaseItem);
    }

    #[test]
    fn buy_item_rejects_bad_quantities() {
        let p = player(1_000);
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 1);
        let rules = RulesConfig::default();
        assert_eq!(
            buy_item(&p, &apple, 0, &rules, now()).unwrap_err().reason,
            RejectionReason::InvalidQuantity
        );
        assert_eq!(
            buy_item(&p, &apple, 100, &rules, now()).unwrap_err().reason,
            RejectionReason::InvalidQuantity
        );
    }

    #[test]
    fn buy_item_rejects_when_broke() {
        let p = player(5);
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 7);
        let err = buy_item(&p, &apple, 1, &RulesConfig::default(), now()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::InsufficientTokens);
    }

    #[test]
    fn buy_pet_creates_full_juvenile() {
        let p = player(60);
        let mut rng = StdRng::seed_from_u64(2);
        let out = buy_pet(&p, &pet_type(50), None, &mut rng, now()).unwrap();
        assert_eq!(out.player.tokens, 10);
        assert_eq!(out.pet.owner_id, p.id);
        assert_eq!(out.pet.stats.hunger.value, 100);
        assert_eq!(out.ledger.pet_id, Some(out.pet.id));
        assert!(buy_pet(&out.player, &pet_type(50), None, &mut rng, now()).is_err());
    }

    #[test]
    fn feed_from_inventory_restores_after_decay() {
        let mut p = player(0);
        p.inventory.insert(
            String::from("apple"),
            InventoryEntry {
                quantity: 1,
                total_acquired: 1,
            },
        );
        let mut pet = pet_for(&p);
        pet.stats.hunger = StatValue::new(100, now() - TimeDelta::hours(10));
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 7);

        let out = feed(&p, &pet, &apple, Payment::Inventory, &RulesConfig::default(), now()).unwrap();
        // 100 - 10h * 5 = 50, + 30 restored.
        assert_eq!(out.value, 80);
        assert_eq!(out.pet.stats.hunger.last_update, now());
        assert_eq!(out.player.quantity_of("apple"), 0);
        assert!(out.ledger.is_none());
    }

    #[test]
    fn feed_with_tokens_writes_ledger() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.stats.hunger.value = 20;
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 7);
        let out = feed(&p, &pet, &apple, Payment::Tokens, &RulesConfig::default(), now()).unwrap();
        assert_eq!(out.player.tokens, 3);
        assert_eq!(out.value, 50);
        assert_eq!(out.ledger.unwrap().kind, LedgerEntryKind::Feed);
    }

    #[test]
    fn feed_above_threshold_is_rejected_without_changes() {
        let p = player(10);
        let pet = pet_for(&p);
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 7);
        let err = feed(&p, &pet, &apple, Payment::Tokens, &RulesConfig::default(), now()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::StatAboveThreshold);
    }

    #[test]
    fn feed_rejects_non_food_and_foreign_pets() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.stats.hunger.value = 10;
        let ball = item("ball", ItemCategory::Toy, Stat::Happiness, 1);
        let err = feed(&p, &pet, &ball, Payment::Tokens, &RulesConfig::default(), now()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::WrongItemCategory);

        let stranger = player(10);
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 1);
        let err =
            feed(&stranger, &pet, &apple, Payment::Tokens, &RulesConfig::default(), now()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::NotOwner);
    }

    #[test]
    fn feed_from_empty_inventory_is_out_of_stock() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.stats.hunger.value = 10;
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 1);
        let err =
            feed(&p, &pet, &apple, Payment::Inventory, &RulesConfig::default(), now()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::OutOfStock);
    }

    #[test]
    fn play_restores_happiness() {
        let mut p = player(0);
        p.inventory.insert(
            String::from("ball"),
            InventoryEntry {
                quantity: 2,
                total_acquired: 2,
            },
        );
        let mut pet = pet_for(&p);
        pet.stats.happiness.value = 75;
        let ball = item("ball", ItemCategory::Toy, Stat::Happiness, 3);
        let out = play(&p, &pet, &ball, Payment::Inventory, &RulesConfig::default(), now()).unwrap();
        assert_eq!(out.value, 100);
        assert_eq!(out.player.quantity_of("ball"), 1);
    }

    #[test]
    fn inactive_pet_cannot_be_fed() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.status = PetStatus::Inactive;
        pet.stats.hunger.value = 10;
        let apple = item("apple", ItemCategory::Food, Stat::Hunger, 1);
        let err = feed(&p, &pet, &apple, Payment::Tokens, &RulesConfig::default(), now()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::PetInactive);
    }

    #[test]
    fn clean_removes_poop_and_restores() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.stats.cleanliness.value = 40;
        let mut rng = StdRng::seed_from_u64(4);
        let (pet, poop) = create_poop(&p, &pet, &RulesConfig::default(), &mut rng, now()).unwrap();
        let soap = item("soap", ItemCategory::Cleaning, Stat::Cleanliness, 4);

        let out = clean(&p, &pet, &soap, poop.id, Payment::Tokens, &RulesConfig::default(), now())
            .unwrap();
        assert_eq!(out.removed, poop);
        assert!(out.pet.poops.is_empty());
        assert_eq!(out.cleanliness, 70);
        assert_eq!(out.player.tokens, 6);
    }

    #[test]
    fn clean_with_unknown_poop_changes_nothing() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.stats.cleanliness.value = 40;
        let soap = item("soap", ItemCategory::Cleaning, Stat::Cleanliness, 4);
        let err = clean(
            &p,
            &pet,
            &soap,
            PoopId::new(),
            Payment::Tokens,
            &RulesConfig::default(),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.reason, RejectionReason::PoopNotFound);
        assert_eq!(p.tokens, 10);
        assert_eq!(pet.stats.cleanliness.value, 40);
    }

    #[test]
    fn clean_above_threshold_is_rejected() {
        let p = player(10);
        let pet = pet_for(&p);
        let mut rng = StdRng::seed_from_u64(4);
        let (pet, poop) = create_poop(&p, &pet, &RulesConfig::default(), &mut rng, now()).unwrap();
        let soap = item("soap", ItemCategory::Cleaning, Stat::Cleanliness, 4);
        let err = clean(&p, &pet, &soap, poop.id, Payment::Tokens, &RulesConfig::default(), now())
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::StatAboveThreshold);
    }

    #[test]
    fn cleaning_item_aimed_at_another_stat_is_rejected() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.stats.cleanliness.value = 40;
        pet.stats.hunger.value = 10;
        let mut rng = StdRng::seed_from_u64(4);
        let (pet, poop) = create_poop(&p, &pet, &RulesConfig::default(), &mut rng, now()).unwrap();
        let odd_soap = item("soap", ItemCategory::Cleaning, Stat::Hunger, 4);

        let err = clean(&p, &pet, &odd_soap, poop.id, Payment::Tokens, &RulesConfig::default(), now())
            .unwrap_err();

        assert_eq!(err.reason, RejectionReason::WrongItemCategory);
        assert_eq!(pet.stats.hunger.value, 10);
        assert_eq!(pet.poops.len(), 1);
    }

    #[test]
    fn food_and_toys_only_restore_their_own_stat() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.stats.hunger.value = 10;
        pet.stats.happiness.value = 10;
        let rules = RulesConfig::default();

        let sweet = item("sweet", ItemCategory::Food, Stat::Happiness, 1);
        let err = feed(&p, &pet, &sweet, Payment::Tokens, &rules, now()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::WrongItemCategory);

        let chew_toy = item("chew", ItemCategory::Toy, Stat::Hunger, 1);
        let err = play(&p, &pet, &chew_toy, Payment::Tokens, &rules, now()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::WrongItemCategory);
    }

    #[test]
    fn toy_paid_with_tokens_is_ledgered_as_play() {
        let p = player(10);
        let mut pet = pet_for(&p);
        pet.stats.happiness.value = 20;
        let ball = item("ball", ItemCategory::Toy, Stat::Happiness, 3);
        let out = play(&p, &pet, &ball, Payment::Tokens, &RulesConfig::default(), now()).unwrap();
        assert_eq!(out.player.tokens, 7);
        assert_eq!(out.value, 50);
        let ledger = out.ledger.unwrap();
        assert_eq!(ledger.kind, LedgerEntryKind::Play);
        assert_eq!(ledger.amount, -3);
    }

    #[test]
    fn claim_moves_income_and_resets() {
        let p = player(5);
        let mut pet = pet_for(&p);
        pet.token_income = 12;
        pet.total_income = 40;
        let out = claim_income(&p, &pet, now()).unwrap();
        assert_eq!(out.player.tokens, 17);
        assert_eq!(out.pet.token_income, 0);
        assert_eq!(out.pet.total_income, 40);
        assert_eq!(out.ledger.amount, 12);
        assert_eq!(
            claim_income(&out.player, &out.pet, now()).unwrap_err().reason,
            RejectionReason::NothingToClaim
        );
    }
}

//! Integration tests for session bootstrap, action dispatch, and the
//! inbound event loop, over the in-memory backends.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use petfarm_core::config::{Backend, PetfarmConfig, SessionConfig};
use petfarm_core::dispatcher::{Dispatcher, Handler};
use petfarm_core::handlers::ActionHandler;
use petfarm_core::runtime::Runtime;
use petfarm_core::session::{
    PlayerProfile, ProfileSource, SessionError, SessionRegistry, SessionService,
};
use petfarm_core::transactions::TransactionManager;
use petfarm_db::{JobRegistry, MemoryJobRegistry, MemoryStore, RecordStore};
use petfarm_sim::RulesConfig;
use petfarm_types::{
    ClientAction, DecayRange, DecayRanges, DefaultStats, Envelope, ItemCategory,
    LedgerEntryKind, LifecycleStage, PetType, PetTypeId, RejectionReason, ServerEvent, Stat,
    StatEffect, StoreItem, StoreItemId, Topic,
};

// =============================================================================
// Fixtures
// =============================================================================

fn pet_type(name: &str, hunger: u32) -> PetType {
    let range = DecayRange {
        min_per_hour: 1,
        max_per_hour: 1,
    };
    PetType {
        id: PetTypeId::new(),
        name: name.to_owned(),
        default_stats: DefaultStats {
            hunger,
            happiness: 80,
            cleanliness: 70,
        },
        decay: DecayRanges {
            hunger: range,
            happiness: range,
            cleanliness: range,
        },
        time_natural_minutes: 30,
        income_per_claim: 2,
        max_income_per_claim: 10,
        max_income: 50,
        cost: 40,
    }
}

async fn seeded_store() -> RecordStore {
    let store = RecordStore::from(MemoryStore::new());
    store.upsert_pet_type(&pet_type("Slime", 60)).await.unwrap();
    store.upsert_pet_type(&pet_type("Blob", 50)).await.unwrap();
    store
        .upsert_store_item(&StoreItem {
            id: StoreItemId::new(),
            key: String::from("kibble"),
            name: String::from("Kibble"),
            category: ItemCategory::Food,
            cost: 5,
            effect: Some(StatEffect {
                stat: Stat::Hunger,
                amount: 20,
            }),
        })
        .await
        .unwrap();
    store
}

fn service(
    store: &RecordStore,
    sessions: &Arc<SessionRegistry>,
    config: SessionConfig,
) -> SessionService {
    SessionService::new(
        store.clone(),
        Arc::clone(sessions),
        ProfileSource::Static(PlayerProfile::fallback()),
        config,
    )
}

async fn dispatcher(store: &RecordStore, sessions: &Arc<SessionRegistry>) -> Dispatcher {
    let tm = Arc::new(TransactionManager::new(
        store.clone(),
        Arc::clone(sessions),
        RulesConfig::default(),
        3,
    ));
    let handler: Arc<dyn Handler> = Arc::new(ActionHandler::new(tm, Arc::clone(sessions)));
    let dispatcher = Dispatcher::new();
    dispatcher.subscribe_all(&handler).await;
    dispatcher
}

// =============================================================================
// Connect and disconnect
// =============================================================================

#[tokio::test]
async fn first_connect_grants_tokens_and_starter_pet() {
    let store = seeded_store().await;
    let sessions = Arc::new(SessionRegistry::new());
    let service = service(&store, &sessions, SessionConfig::default());

    let mirror = service.connect("0xnew").await.unwrap();

    assert_eq!(mirror.player.tokens, 100);
    assert_eq!(mirror.pets.len(), 1);
    let pet = mirror.pets.values().next().unwrap();
    // First type by name.
    assert_eq!(pet.name, "Blob");
    assert_eq!(pet.stats.hunger.value, 50);
    assert_eq!(pet.lifecycle_stage, LifecycleStage::Juvenile);
    assert!(mirror.profile.is_default);
    assert!(sessions.contains(mirror.player.id).await);

    let ledger = store.ledger_for_player(mirror.player.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].kind, LedgerEntryKind::StarterGrant);
    assert_eq!(ledger[0].amount, 100);
}

#[tokio::test]
async fn reconnect_reuses_the_player() {
    let store = seeded_store().await;
    let sessions = Arc::new(SessionRegistry::new());
    let service = service(&store, &sessions, SessionConfig::default());

    let first = service.connect("0xreturning").await.unwrap();
    assert!(service.disconnect(first.player.id).await);
    assert!(!service.disconnect(first.player.id).await);

    let second = service.connect("  0xreturning ").await.unwrap();
    assert_eq!(second.player.id, first.player.id);
    assert_eq!(second.pets.len(), 1);
    assert_eq!(
        store.ledger_for_player(first.player.id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn configured_starter_type_and_zero_grant() {
    let store = seeded_store().await;
    let sessions = Arc::new(SessionRegistry::new());
    let config = SessionConfig {
        starting_tokens: 0,
        starter_pet_type: Some(String::from("Slime")),
        ..SessionConfig::default()
    };
    let service = service(&store, &sessions, config);

    let mirror = service.connect("0xbroke").await.unwrap();

    assert_eq!(mirror.player.tokens, 0);
    assert_eq!(mirror.pets.values().next().unwrap().name, "Slime");
    assert!(
        store
            .ledger_for_player(mirror.player.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn blank_wallet_is_refused() {
    let store = seeded_store().await;
    let sessions = Arc::new(SessionRegistry::new());
    let service = service(&store, &sessions, SessionConfig::default());

    let err = service.connect("   ").await.unwrap_err();
    assert!(matches!(err, SessionError::EmptyWallet));
    assert!(sessions.is_empty().await);
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn actions_without_a_session_are_refused() {
    let store = seeded_store().await;
    let sessions = Arc::new(SessionRegistry::new());
    let dispatcher = dispatcher(&store, &sessions).await;
    let player = service(&store, &sessions, SessionConfig::default())
        .connect("0xghost")
        .await
        .unwrap()
        .player;
    sessions.remove(player.id).await;

    let ack = dispatcher
        .publish(&Envelope::new(player.id, ClientAction::GetInventory))
        .await;

    assert!(!ack.success);
    assert_eq!(ack.error, Some(RejectionReason::NoSession));
    assert_eq!(ack.topic, Topic::GetInventory);
}

#[tokio::test]
async fn resent_requests_replay_the_first_ack() {
    let store = seeded_store().await;
    let sessions = Arc::new(SessionRegistry::new());
    let dispatcher = dispatcher(&store, &sessions).await;
    let mirror = service(&store, &sessions, SessionConfig::default())
        .connect("0xbuyer")
        .await
        .unwrap();

    let envelope = Envelope::new(
        mirror.player.id,
        ClientAction::BuyItem {
            item_key: String::from("kibble"),
            quantity: 2,
        },
    );
    let first = dispatcher.publish(&envelope).await;
    let second = dispatcher.publish(&envelope).await;

    assert!(first.success, "{}", first.message);
    assert_eq!(first, second);
    assert_eq!(first.data.as_ref().unwrap()["tokens"], 90);
    let player = store.get_player(mirror.player.id).await.unwrap().unwrap();
    assert_eq!(player.tokens, 90);
    assert_eq!(sessions.get(player.id).await.unwrap().player.tokens, 90);
}

#[tokio::test]
async fn resent_request_after_reconnect_is_not_charged_twice() {
    let store = seeded_store().await;
    let sessions = Arc::new(SessionRegistry::new());
    let dispatcher = dispatcher(&store, &sessions).await;
    let service = service(&store, &sessions, SessionConfig::default());
    let mirror = service.connect("0xreconnect").await.unwrap();

    let envelope = Envelope::new(
        mirror.player.id,
        ClientAction::BuyItem {
            item_key: String::from("kibble"),
            quantity: 2,
        },
    );
    let first = dispatcher.publish(&envelope).await;
    assert!(first.success, "{}", first.message);

    assert!(service.disconnect(mirror.player.id).await);
    let reconnected = service.connect("0xreconnect").await.unwrap();
    assert_eq!(reconnected.player.tokens, 90);

    let second = dispatcher.publish(&envelope).await;

    assert_eq!(first, second);
    let player = store.get_player(mirror.player.id).await.unwrap().unwrap();
    assert_eq!(player.tokens, 90);
    assert_eq!(player.inventory["kibble"].quantity, 2);
    assert_eq!(sessions.get(player.id).await.unwrap().player.tokens, 90);
    let purchases = store
        .ledger_for_player(player.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|entry| entry.kind == LedgerEntryKind::PurchaseItem)
        .count();
    assert_eq!(purchases, 1);
}

#[tokio::test]
async fn rejected_actions_carry_a_reason() {
    let store = seeded_store().await;
    let sessions = Arc::new(SessionRegistry::new());
    let dispatcher = dispatcher(&store, &sessions).await;
    let mirror = service(&store, &sessions, SessionConfig::default())
        .connect("0xclaimer")
        .await
        .unwrap();
    let pet_id = *mirror.pets.keys().next().unwrap();

    let ack = dispatcher
        .publish(&Envelope::new(
            mirror.player.id,
            ClientAction::ClaimIncome { pet_id },
        ))
        .await;

    assert!(!ack.success);
    assert_eq!(ack.error, Some(RejectionReason::NothingToClaim));
    assert!(ack.data.is_none());
}

// =============================================================================
// Runtime and event loop
// =============================================================================

#[tokio::test]
async fn inbound_actions_are_acknowledged_to_the_player() {
    let store = seeded_store().await;
    let config = PetfarmConfig::default();
    assert_eq!(config.infrastructure.record_store, Backend::Memory);
    let mut runtime = Runtime::build(
        config,
        store,
        JobRegistry::from(MemoryJobRegistry::new()),
    )
    .await;
    let mut events = runtime.notifier.subscribe();
    let handles = runtime.start();

    let mirror = runtime.session_service.connect("0xlooped").await.unwrap();
    let envelope = Envelope::new(mirror.player.id, ClientAction::GetCatalog);
    runtime.inbound().send(envelope.clone()).await.unwrap();

    let outbound = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outbound.player_id, mirror.player.id);
    let ServerEvent::Ack { ack } = outbound.event else {
        panic!("expected an ack, got {:?}", outbound.event);
    };
    assert!(ack.success);
    assert_eq!(ack.request_id, envelope.request_id);
    assert_eq!(ack.data.unwrap()["pet_types"].as_array().unwrap().len(), 2);

    runtime.shutdown();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

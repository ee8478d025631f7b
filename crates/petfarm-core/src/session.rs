//! Connected-player sessions and their live mirrors.
//!
//! A session is built from the record store when a player connects and
//! discarded when they disconnect; the record store stays the only durable
//! source of truth. Each [`SessionMirror`] holds the player document, their
//! pets, and the profile fetched at connect time.
//!
//! The last few acknowledgments per player live in the [`SessionRegistry`]
//! beside the mirrors, not inside them, so a client that reconnects and
//! resends a request gets the original answer instead of a second charge.
//!
//! Mirrors are patched after every committed transaction and every job
//! write. A patch only replaces a document with one of equal or newer
//! version, so a slow writer can never roll a mirror back.
//!
//! # Bootstrap
//!
//! ```text
//! wallet ──► find player ──► (missing) starter grant: tokens + starter pet
//!                 │
//!                 ▼
//!            load pets ──► fetch profile (timeout, default fallback)
//!                 │
//!                 ▼
//!          insert mirror into the registry
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use petfarm_db::{DbError, RecordStore, WriteSet};
use petfarm_sim::{PetOrigin, new_pet};
use petfarm_types::{
    Ack, LedgerEntryKind, Pet, PetId, PetType, Player, PlayerId, RequestId, TokenLedgerEntry,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::SessionConfig;

/// Errors raised while opening a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The wallet string was empty.
    #[error("wallet must not be empty")]
    EmptyWallet,

    /// The record store failed.
    #[error("session store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: DbError,
    },
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Display data from the external profile service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Public display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Whether this is the fallback used when the fetch failed.
    #[serde(skip)]
    pub is_default: bool,
}

impl PlayerProfile {
    /// The profile used when the service is unset, slow, or failing.
    pub const fn fallback() -> Self {
        Self {
            display_name: None,
            avatar_url: None,
            is_default: true,
        }
    }
}

/// Profile service reached over HTTP.
///
/// Sends `GET {base_url}/profiles/{wallet}` and expects a JSON
/// [`PlayerProfile`].
#[derive(Debug, Clone)]
pub struct HttpProfileSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpProfileSource {
    /// Create a source for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        }
    }

    async fn request(&self, wallet: &str) -> Result<PlayerProfile, String> {
        let url = format!("{}/profiles/{wallet}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("profile request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("profile service returned {status}"));
        }

        response
            .json::<PlayerProfile>()
            .await
            .map_err(|e| format!("profile response parse failed: {e}"))
    }

    async fn fetch(&self, wallet: &str) -> PlayerProfile {
        match tokio::time::timeout(self.timeout, self.request(wallet)).await {
            Ok(Ok(profile)) => profile,
            Ok(Err(reason)) => {
                tracing::warn!(wallet, reason = %reason, "Profile fetch failed, using default");
                PlayerProfile::fallback()
            }
            Err(_) => {
                tracing::warn!(
                    wallet,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Profile fetch timed out, using default"
                );
                PlayerProfile::fallback()
            }
        }
    }
}

/// Where session profiles come from.
#[derive(Debug, Clone)]
pub enum ProfileSource {
    /// The external profile service.
    Http(HttpProfileSource),
    /// A fixed profile for every player. Used when no service is
    /// configured, and by tests.
    Static(PlayerProfile),
}

impl ProfileSource {
    /// Build the source described by `config`.
    pub fn from_config(config: &SessionConfig) -> Self {
        config.profile_url.as_deref().map_or_else(
            || Self::Static(PlayerProfile::fallback()),
            |url| Self::Http(HttpProfileSource::new(url, config.profile_timeout())),
        )
    }

    /// Fetch the profile for `wallet`. Never fails; errors and timeouts
    /// yield [`PlayerProfile::fallback`].
    pub async fn fetch(&self, wallet: &str) -> PlayerProfile {
        match self {
            Self::Http(source) => source.fetch(wallet).await,
            Self::Static(profile) => profile.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

/// The live view of one connected player.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMirror {
    /// Player document at the newest version seen.
    pub player: Player,
    /// Owned pets at the newest version seen.
    pub pets: BTreeMap<PetId, Pet>,
    /// Profile fetched on connect.
    pub profile: PlayerProfile,
    /// When the session was opened.
    pub connected_at: DateTime<Utc>,
}

impl SessionMirror {
    /// Build a mirror from freshly loaded documents.
    pub fn new(player: Player, pets: Vec<Pet>, profile: PlayerProfile) -> Self {
        Self {
            player,
            pets: pets.into_iter().map(|p| (p.id, p)).collect(),
            profile,
            connected_at: Utc::now(),
        }
    }

    /// Replace the player if `player` is not older. Returns whether it was
    /// applied.
    pub fn apply_player(&mut self, player: &Player) -> bool {
        if player.id != self.player.id || player.version < self.player.version {
            return false;
        }
        self.player = player.clone();
        true
    }

    /// Insert or replace a pet if it belongs to this player and is not
    /// older than the mirrored copy. Returns whether it was applied.
    pub fn apply_pet(&mut self, pet: &Pet) -> bool {
        if pet.owner_id != self.player.id {
            return false;
        }
        if self
            .pets
            .get(&pet.id)
            .is_some_and(|current| pet.version < current.version)
        {
            return false;
        }
        self.pets.insert(pet.id, pet.clone());
        true
    }
}

// ---------------------------------------------------------------------------
// Ack cache
// ---------------------------------------------------------------------------

/// Bounded history of the acknowledgments sent to one player.
#[derive(Debug, Clone, PartialEq)]
pub struct AckCache {
    acks: VecDeque<Ack>,
    capacity: usize,
}

impl AckCache {
    /// An empty cache holding at most `capacity` acks. Zero disables it.
    pub fn new(capacity: usize) -> Self {
        Self {
            acks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// The acknowledgment previously sent for `request_id`.
    pub fn get(&self, request_id: RequestId) -> Option<&Ack> {
        self.acks.iter().find(|a| a.request_id == request_id)
    }

    /// Remember `ack`, evicting the oldest beyond capacity.
    pub fn remember(&mut self, ack: Ack) {
        if self.capacity == 0 {
            return;
        }
        while self.acks.len() >= self.capacity {
            self.acks.pop_front();
        }
        self.acks.push_back(ack);
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Acks kept per player when no capacity is configured.
pub const DEFAULT_ACK_CAPACITY: usize = 64;

/// Every open session keyed by player, plus each player's ack history.
///
/// Ack histories are kept across disconnects for the lifetime of the
/// process.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<PlayerId, SessionMirror>>,
    acks: RwLock<HashMap<PlayerId, AckCache>>,
    ack_capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_ack_capacity(DEFAULT_ACK_CAPACITY)
    }
}

impl SessionRegistry {
    /// An empty registry with [`DEFAULT_ACK_CAPACITY`].
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry keeping `capacity` acks per player.
    pub fn with_ack_capacity(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            acks: RwLock::new(HashMap::new()),
            ack_capacity: capacity,
        }
    }

    /// Add or replace the session of `mirror.player`.
    pub async fn insert(&self, mirror: SessionMirror) {
        self.sessions.write().await.insert(mirror.player.id, mirror);
    }

    /// Close the session of `player_id`.
    pub async fn remove(&self, player_id: PlayerId) -> Option<SessionMirror> {
        self.sessions.write().await.remove(&player_id)
    }

    /// Whether `player_id` has an open session.
    pub async fn contains(&self, player_id: PlayerId) -> bool {
        self.sessions.read().await.contains_key(&player_id)
    }

    /// A snapshot of the session of `player_id`.
    pub async fn get(&self, player_id: PlayerId) -> Option<SessionMirror> {
        self.sessions.read().await.get(&player_id).cloned()
    }

    /// Number of open sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is open.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Patch the mirror of `player.id`, if connected.
    pub async fn patch_player(&self, player: &Player) -> bool {
        self.sessions
            .write()
            .await
            .get_mut(&player.id)
            .is_some_and(|m| m.apply_player(player))
    }

    /// Patch the mirror of `pet.owner_id`, if connected.
    pub async fn patch_pet(&self, pet: &Pet) -> bool {
        self.sessions
            .write()
            .await
            .get_mut(&pet.owner_id)
            .is_some_and(|m| m.apply_pet(pet))
    }

    /// The acknowledgment already sent to `player_id` for `request_id`,
    /// in this session or an earlier one.
    pub async fn cached_ack(&self, player_id: PlayerId, request_id: RequestId) -> Option<Ack> {
        self.acks
            .read()
            .await
            .get(&player_id)
            .and_then(|cache| cache.get(request_id).cloned())
    }

    /// Remember `ack` as sent to `player_id`.
    pub async fn remember_ack(&self, player_id: PlayerId, ack: Ack) {
        if self.ack_capacity == 0 {
            return;
        }
        self.acks
            .write()
            .await
            .entry(player_id)
            .or_insert_with(|| AckCache::new(self.ack_capacity))
            .remember(ack);
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Opens and closes sessions.
pub struct SessionService {
    store: RecordStore,
    registry: Arc<SessionRegistry>,
    profiles: ProfileSource,
    config: SessionConfig,
}

impl SessionService {
    /// Create a session service.
    pub const fn new(
        store: RecordStore,
        registry: Arc<SessionRegistry>,
        profiles: ProfileSource,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            registry,
            profiles,
            config,
        }
    }

    /// Open a session for `wallet`, creating the player on first login.
    ///
    /// Returns a snapshot of the new mirror.
    pub async fn connect(&self, wallet: &str) -> Result<SessionMirror, SessionError> {
        let wallet = wallet.trim();
        if wallet.is_empty() {
            return Err(SessionError::EmptyWallet);
        }

        let player = match self.store.find_player_by_wallet(wallet).await? {
            Some(player) => player,
            None => self.create_player(wallet).await?,
        };
        let pets = self.store.pets_by_owner(player.id).await?;
        let profile = self.profiles.fetch(wallet).await;

        let mirror = SessionMirror::new(player, pets, profile);
        tracing::info!(
            player_id = %mirror.player.id,
            pets = mirror.pets.len(),
            tokens = mirror.player.tokens,
            default_profile = mirror.profile.is_default,
            "Session opened"
        );
        self.registry.insert(mirror.clone()).await;
        Ok(mirror)
    }

    /// Close the session of `player_id`. Returns whether one was open.
    pub async fn disconnect(&self, player_id: PlayerId) -> bool {
        let closed = self.registry.remove(player_id).await.is_some();
        if closed {
            tracing::info!(player_id = %player_id, "Session closed");
        }
        closed
    }

    async fn starter_type(&self) -> Result<Option<PetType>, DbError> {
        let types = self.store.pet_types().await?;
        let Some(name) = &self.config.starter_pet_type else {
            return Ok(types.into_iter().next());
        };
        let found = types.into_iter().find(|t| &t.name == name);
        if found.is_none() {
            tracing::warn!(pet_type = %name, "Configured starter pet type not found");
        }
        Ok(found)
    }

    /// Starter grant: a new player with starting tokens and one pet,
    /// committed together.
    async fn create_player(&self, wallet: &str) -> Result<Player, SessionError> {
        let now = Utc::now();
        let starter = self.starter_type().await?;

        let player = Player {
            id: PlayerId::new(),
            wallet: wallet.to_owned(),
            tokens: self.config.starting_tokens,
            inventory: BTreeMap::new(),
            created_at: now,
            version: 0,
        };
        let pet = starter.as_ref().map(|pet_type| {
            let mut rng = rand::rng();
            new_pet(
                player.id,
                pet_type,
                None,
                PetOrigin::StarterGrant,
                &mut rng,
                now,
            )
        });
        let grant = (self.config.starting_tokens > 0).then(|| {
            TokenLedgerEntry::credit(
                player.id,
                None,
                LedgerEntryKind::StarterGrant,
                self.config.starting_tokens,
                String::from("starter grant"),
                now,
            )
        });

        let mut writes = WriteSet::new().insert_player(player.clone()).ledger(grant);
        if let Some(pet) = pet {
            writes = writes.insert_pet(pet);
        }

        match self.store.commit(writes).await {
            Ok(committed) => {
                let created = committed.player(player.id).cloned().unwrap_or(player);
                tracing::info!(
                    player_id = %created.id,
                    tokens = created.tokens,
                    starter_pet = starter.as_ref().map(|t| t.name.as_str()),
                    "Player created"
                );
                Ok(created)
            }
            Err(e) if e.is_conflict() => {
                // A concurrent connect created the same wallet first.
                tracing::debug!(wallet, "Player created concurrently, re-reading");
                self.store
                    .find_player_by_wallet(wallet)
                    .await?
                    .ok_or_else(|| SessionError::from(e))
            }
            Err(e) => Err(e.into()),
        }
    }
}

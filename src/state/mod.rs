//! Shared context wiring the sync services together.

mod hub;

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;

use crate::{
    backend::{AuthSession, ScoringBackend},
    config::SyncConfig,
    dao::{best_score::ScoreGate, kv::KvHandle, queue::PersistentQueue},
};

pub use self::hub::{DecoratedRow, LeaderboardEvent, LeaderboardHub};

/// Shared handle to the sync context; constructed once at startup and passed
/// into every service instead of living as ambient global state.
pub type SharedState = Arc<SyncState>;

/// Broadcast capacity of the leaderboard event hub.
const HUB_CAPACITY: usize = 16;

/// Parameters of the leaderboard request currently considered live.
///
/// Superseded, never mutated: each new request replaces the slot wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRequest {
    /// Generation token minted for this request.
    pub token: u64,
    /// Ranked stat being fetched.
    pub stat: String,
    /// Number of rows requested.
    pub top_n: usize,
}

/// Central state shared by the submitter, queue processor, connectivity
/// monitor, and leaderboard orchestrator.
pub struct SyncState {
    config: SyncConfig,
    queue: PersistentQueue,
    gate: ScoreGate,
    backend: Arc<dyn ScoringBackend>,
    auth: Arc<dyn AuthSession>,
    generation: AtomicU64,
    last_request: Mutex<Option<LeaderboardRequest>>,
    offline: watch::Sender<bool>,
    hub: LeaderboardHub,
}

impl SyncState {
    /// Construct the shared context, restoring the pending queue and score
    /// floors from the key-value store.
    pub fn new(
        config: SyncConfig,
        kv: KvHandle,
        backend: Arc<dyn ScoringBackend>,
        auth: Arc<dyn AuthSession>,
    ) -> SharedState {
        let queue = PersistentQueue::load(kv.clone(), config.queue_key.clone());
        let gate = ScoreGate::new(kv, config.best_score_key_prefix.clone());
        let (offline_tx, _rx) = watch::channel(false);

        Arc::new(Self {
            config,
            queue,
            gate,
            backend,
            auth,
            generation: AtomicU64::new(0),
            last_request: Mutex::new(None),
            offline: offline_tx,
            hub: LeaderboardHub::new(HUB_CAPACITY),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Durable queue of pending submissions.
    pub fn queue(&self) -> &PersistentQueue {
        &self.queue
    }

    /// Per-stat anti-regression gate.
    pub fn gate(&self) -> &ScoreGate {
        &self.gate
    }

    /// Remote scoring service handle.
    pub fn backend(&self) -> &Arc<dyn ScoringBackend> {
        &self.backend
    }

    /// Authentication collaborator.
    pub fn auth(&self) -> &Arc<dyn AuthSession> {
        &self.auth
    }

    /// Hub leaderboard consumers subscribe to.
    pub fn hub(&self) -> &LeaderboardHub {
        &self.hub
    }

    /// Mint the next generation token, invalidating every earlier one.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Token of the request currently considered live.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether `token` still identifies the live request.
    pub fn is_current(&self, token: u64) -> bool {
        self.current_generation() == token
    }

    /// Record the request to replay after a connectivity drop.
    pub fn remember_request(&self, request: LeaderboardRequest) {
        *self.last_request.lock().unwrap() = Some(request);
    }

    /// Parameters of the most recent leaderboard request, if any.
    pub fn last_request(&self) -> Option<LeaderboardRequest> {
        self.last_request.lock().unwrap().clone()
    }

    /// Current offline flag.
    pub fn is_offline(&self) -> bool {
        *self.offline.borrow()
    }

    /// Subscribe to offline flag updates.
    pub fn offline_watcher(&self) -> watch::Receiver<bool> {
        self.offline.subscribe()
    }

    /// Update and broadcast the offline flag when the value changes.
    pub fn set_offline(&self, value: bool) {
        if self.is_offline() == value {
            return;
        }
        // The watch channel is the source of truth here, so the value must be
        // stored even while nothing subscribes to it.
        self.offline.send_replace(value);
    }
}

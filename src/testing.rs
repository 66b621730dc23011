//! Shared fakes for service-level tests: a scriptable backend, a controllable
//! auth session, and a pre-wired context.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    backend::{AuthSession, BackendError, BackendResult, LeaderboardRow, ScoringBackend},
    config::SyncConfig,
    dao::kv::{KvHandle, MemoryKv},
    state::{SharedState, SyncState},
};

/// Outcome scripted for one `submit_score` call.
pub enum SubmitOutcome {
    /// The backend acknowledges the score.
    Accept,
    /// The backend reports a domain-level rejection.
    Reject,
    /// The call never completes (used to exercise the attempt timeout).
    Hang,
}

#[derive(Clone)]
enum CannedBoard {
    Rows(Vec<LeaderboardRow>),
    Fail,
}

#[derive(Default)]
struct FakeBackendInner {
    boards: Mutex<HashMap<String, CannedBoard>>,
    ranks: Mutex<HashMap<String, LeaderboardRow>>,
    holds: Mutex<HashMap<String, watch::Sender<bool>>>,
    submit_plan: Mutex<VecDeque<SubmitOutcome>>,
    submits: Mutex<Vec<(String, i64)>>,
}

/// Scriptable in-memory scoring backend.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<FakeBackendInner>,
}

impl FakeBackend {
    /// Script the ranked rows returned for `stat`.
    pub fn set_board(&self, stat: &str, rows: Vec<LeaderboardRow>) {
        self.inner
            .boards
            .lock()
            .unwrap()
            .insert(stat.to_owned(), CannedBoard::Rows(rows));
    }

    /// Script every leaderboard query for `stat` to fail.
    pub fn fail_board(&self, stat: &str) {
        self.inner
            .boards
            .lock()
            .unwrap()
            .insert(stat.to_owned(), CannedBoard::Fail);
    }

    /// Script the player's own row for `stat`.
    pub fn set_rank(&self, stat: &str, row: LeaderboardRow) {
        self.inner.ranks.lock().unwrap().insert(stat.to_owned(), row);
    }

    /// Delay every query against `stat` until [`FakeBackend::release`].
    pub fn hold(&self, stat: &str) {
        let (tx, _rx) = watch::channel(false);
        self.inner.holds.lock().unwrap().insert(stat.to_owned(), tx);
    }

    /// Let held queries against `stat` complete.
    pub fn release(&self, stat: &str) {
        if let Some(tx) = self.inner.holds.lock().unwrap().get(stat) {
            // Stored even if no query subscribed to the gate yet.
            tx.send_replace(true);
        }
    }

    /// Script outcomes for upcoming `submit_score` calls; once the plan is
    /// exhausted every call is accepted.
    pub fn plan_submits(&self, outcomes: impl IntoIterator<Item = SubmitOutcome>) {
        self.inner.submit_plan.lock().unwrap().extend(outcomes);
    }

    /// Every `(stat, score)` pair the backend has been asked to accept so far.
    pub fn submitted(&self) -> Vec<(String, i64)> {
        self.inner.submits.lock().unwrap().clone()
    }

    fn gate_for(&self, stat: &str) -> Option<watch::Receiver<bool>> {
        self.inner
            .holds
            .lock()
            .unwrap()
            .get(stat)
            .map(|tx| tx.subscribe())
    }
}

async fn wait_open(gate: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = gate {
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl ScoringBackend for FakeBackend {
    fn submit_score(
        &self,
        stat: &str,
        score: i64,
        _session_length_secs: u64,
    ) -> BoxFuture<'static, BackendResult<()>> {
        self.inner
            .submits
            .lock()
            .unwrap()
            .push((stat.to_owned(), score));
        let outcome = self
            .inner
            .submit_plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmitOutcome::Accept);

        Box::pin(async move {
            match outcome {
                SubmitOutcome::Accept => Ok(()),
                SubmitOutcome::Reject => Err(BackendError::Rejected {
                    reason: "scripted rejection".into(),
                }),
                SubmitOutcome::Hang => std::future::pending().await,
            }
        })
    }

    fn query_leaderboard(
        &self,
        stat: &str,
        top_n: usize,
    ) -> BoxFuture<'static, BackendResult<Vec<LeaderboardRow>>> {
        let gate = self.gate_for(stat);
        let canned = self
            .inner
            .boards
            .lock()
            .unwrap()
            .get(stat)
            .cloned()
            .unwrap_or(CannedBoard::Rows(Vec::new()));

        Box::pin(async move {
            wait_open(gate).await;
            match canned {
                CannedBoard::Rows(rows) => Ok(rows.into_iter().take(top_n).collect()),
                CannedBoard::Fail => Err(BackendError::transport_message("scripted failure")),
            }
        })
    }

    fn query_player_rank(
        &self,
        stat: &str,
    ) -> BoxFuture<'static, BackendResult<Option<LeaderboardRow>>> {
        let gate = self.gate_for(stat);
        let row = self.inner.ranks.lock().unwrap().get(stat).cloned();

        Box::pin(async move {
            wait_open(gate).await;
            Ok(row)
        })
    }
}

/// Auth session whose state tests can flip at will.
pub struct FakeAuth {
    authenticated: watch::Sender<bool>,
    auth_calls: Mutex<u32>,
}

impl FakeAuth {
    /// Build a session in the given initial state.
    pub fn new(authenticated: bool) -> Arc<Self> {
        let (tx, _rx) = watch::channel(authenticated);
        Arc::new(Self {
            authenticated: tx,
            auth_calls: Mutex::new(0),
        })
    }

    /// Drop the session, as a connectivity loss would.
    pub fn deauthenticate(&self) {
        // Stored even when no test subscribes to the auth watch.
        self.authenticated.send_replace(false);
    }

    /// How many times `authenticate` has been called.
    pub fn auth_calls(&self) -> u32 {
        *self.auth_calls.lock().unwrap()
    }
}

impl AuthSession for FakeAuth {
    fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    fn authenticate(&self) -> BoxFuture<'static, BackendResult<()>> {
        *self.auth_calls.lock().unwrap() += 1;
        self.authenticated.send_replace(true);
        Box::pin(async { Ok(()) })
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }
}

/// Pre-wired context shared by service tests.
pub struct TestContext {
    /// Shared sync state under test.
    pub state: SharedState,
    /// Backend fake the state points at.
    pub backend: FakeBackend,
    /// Auth fake the state points at.
    pub auth: Arc<FakeAuth>,
    /// Key-value fake backing queue and gate.
    pub kv: Arc<MemoryKv>,
}

impl TestContext {
    /// Context with an authenticated session and a fresh store.
    pub fn new() -> Self {
        Self::build(Arc::new(MemoryKv::new()), true)
    }

    /// Context whose session is not authenticated.
    pub fn unauthenticated() -> Self {
        Self::build(Arc::new(MemoryKv::new()), false)
    }

    /// Context restoring state from an existing store, as after a relaunch.
    pub fn with_kv(kv: Arc<MemoryKv>) -> Self {
        Self::build(kv, true)
    }

    fn build(kv: Arc<MemoryKv>, authenticated: bool) -> Self {
        let backend = FakeBackend::default();
        let auth = FakeAuth::new(authenticated);
        let state = SyncState::new(
            SyncConfig::default(),
            KvHandle::new(kv.clone()),
            Arc::new(backend.clone()),
            auth.clone(),
        );
        Self {
            state,
            backend,
            auth,
            kv,
        }
    }
}

/// Script the next `count` submissions to be rejected.
pub fn fail_submits(backend: &FakeBackend, count: usize) {
    backend.plan_submits((0..count).map(|_| SubmitOutcome::Reject));
}

/// Convenience constructor for a leaderboard row.
pub fn row(rank: u32, display_name: &str, stat_value: i64) -> LeaderboardRow {
    LeaderboardRow {
        rank,
        player_id: Uuid::new_v4(),
        display_name: display_name.to_owned(),
        stat_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_auth_state_flips_without_subscribers() {
        let auth = FakeAuth::new(true);

        auth.deauthenticate();
        assert!(!auth.is_authenticated());

        auth.authenticate().await.unwrap();
        assert!(auth.is_authenticated());
        assert_eq!(auth.auth_calls(), 1);
    }
}

//! Seam to the remote scoring service and its session/reachability collaborators.

#[cfg(feature = "http-backend")]
pub mod http;

use std::{error::Error, sync::Arc};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by the remote scoring service, regardless of transport.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The call never completed: connection refused, reset, DNS failure, etc.
    #[error("transport failure: {message}")]
    Transport {
        /// Human-readable description of what failed.
        message: String,
        /// Underlying transport error, when one exists.
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    /// The call exceeded its deadline.
    #[error("request timed out")]
    Timeout,
    /// The call completed but the backend reported a domain-level failure.
    #[error("rejected by backend: {reason}")]
    Rejected {
        /// Reason string echoed from the backend response.
        reason: String,
    },
    /// The session is not (or no longer) authenticated.
    #[error("authentication required")]
    AuthRequired,
}

impl BackendError {
    /// Construct a transport error from any underlying failure.
    pub fn transport(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        BackendError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Construct a transport error with no underlying cause to attach.
    pub fn transport_message(message: impl Into<String>) -> Self {
        BackendError::Transport {
            message: message.into(),
            source: None,
        }
    }
}

/// One entry of a ranked leaderboard page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// 1-based position within the stat's ranking.
    pub rank: u32,
    /// Backend identifier of the player holding this row.
    pub player_id: Uuid,
    /// Name shown next to the row.
    pub display_name: String,
    /// Value of the ranked stat for this player.
    pub stat_value: i64,
}

/// RPC surface of the remote scoring service.
///
/// Submission may be aggregated or anti-cheat filtered server-side; the client
/// only relies on the acknowledgement. All calls are one-shot; retry policy
/// lives with the caller.
pub trait ScoringBackend: Send + Sync {
    /// Submit a score for `stat`, resolving once the backend acknowledges it.
    fn submit_score(
        &self,
        stat: &str,
        score: i64,
        session_length_secs: u64,
    ) -> BoxFuture<'static, BackendResult<()>>;

    /// Fetch the top `top_n` ranked rows for `stat`.
    fn query_leaderboard(
        &self,
        stat: &str,
        top_n: usize,
    ) -> BoxFuture<'static, BackendResult<Vec<LeaderboardRow>>>;

    /// Fetch the calling player's own row for `stat`, if the player is ranked.
    fn query_player_rank(
        &self,
        stat: &str,
    ) -> BoxFuture<'static, BackendResult<Option<LeaderboardRow>>>;
}

/// Session collaborator owning authentication with the scoring service.
pub trait AuthSession: Send + Sync {
    /// Whether an authenticated session is currently established.
    fn is_authenticated(&self) -> bool;

    /// (Re-)establish the session; used after connectivity returns.
    fn authenticate(&self) -> BoxFuture<'static, BackendResult<()>>;

    /// Subscribe to authentication state changes.
    fn watch(&self) -> watch::Receiver<bool>;
}

/// Network reachability probe polled by the connectivity monitor.
pub trait ConnectivityProbe: Send + Sync {
    /// Best-effort check that the scoring service is reachable right now.
    fn is_reachable(&self) -> BoxFuture<'static, bool>;
}

/// Session that is always authenticated; for tests and deployments where the
/// platform layer owns login entirely.
pub struct PreauthorizedSession {
    authenticated: watch::Sender<bool>,
}

impl PreauthorizedSession {
    /// Build an always-authenticated session.
    pub fn new() -> Arc<Self> {
        let (authenticated, _rx) = watch::channel(true);
        Arc::new(Self { authenticated })
    }
}

impl AuthSession for PreauthorizedSession {
    fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    fn authenticate(&self) -> BoxFuture<'static, BackendResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }
}

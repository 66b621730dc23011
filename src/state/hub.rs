use tokio::sync::broadcast;

use crate::backend::LeaderboardRow;

/// One row of the final, decorated leaderboard view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedRow {
    /// 1-based position within the ranking.
    pub rank: u32,
    /// Backend identifier of the player.
    pub player_id: uuid::Uuid,
    /// Name shown next to the row.
    pub display_name: String,
    /// Value of the ranked stat.
    pub stat_value: i64,
    /// Per-player attribute merged in from the secondary query.
    pub level: i64,
}

/// Events published to leaderboard consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderboardEvent {
    /// Both queries for the current request completed; rows are ready to render.
    Ready {
        /// Generation token of the request that produced these rows.
        token: u64,
        /// Decorated rows, in rank order.
        rows: Vec<DecoratedRow>,
    },
    /// The current request completed but the stat has no scores yet.
    NoScores {
        /// Generation token of the request.
        token: u64,
    },
    /// The player's own rank for the current request, if ranked.
    MyRank {
        /// Generation token of the request.
        token: u64,
        /// The player's row, when the backend knows one.
        row: Option<LeaderboardRow>,
    },
    /// Connectivity was lost; any in-flight request was invalidated.
    Offline,
}

/// Broadcast hub fanning leaderboard events out to every subscriber.
pub struct LeaderboardHub {
    sender: broadcast::Sender<LeaderboardEvent>,
}

impl LeaderboardHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<LeaderboardEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn publish(&self, event: LeaderboardEvent) {
        let _ = self.sender.send(event);
    }
}

//! Leaderboard fetch orchestration: two independent queries joined under a
//! generation-token cancellation scheme.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    backend::LeaderboardRow,
    state::{DecoratedRow, LeaderboardEvent, LeaderboardRequest, SharedState},
};

/// Transient join bookkeeping for one request. Never consulted again once its
/// token goes stale; abandoned copies are simply dropped.
struct JoinState {
    token: u64,
    primary: Option<Vec<LeaderboardRow>>,
    secondary: Option<IndexMap<Uuid, i64>>,
    fired: bool,
}

/// Fetch the top `top_n` rows for `stat` and publish the joined result.
///
/// Mints a fresh generation token, which invalidates every outstanding fetch:
/// the transport offers no real abort, so cancellation is cooperative and each
/// completion re-checks its captured token before touching anything. The
/// primary (ranked rows) and secondary (per-player attribute used to decorate
/// rows) queries run concurrently; `Ready` or `NoScores` is published exactly
/// once, after both arms complete for the still-current token.
pub fn request(state: &SharedState, stat: &str, top_n: usize) {
    let token = state.advance_generation();
    state.remember_request(LeaderboardRequest {
        token,
        stat: stat.to_owned(),
        top_n,
    });
    debug!(token, stat, top_n, "starting leaderboard fetch");

    let join = Arc::new(Mutex::new(JoinState {
        token,
        primary: None,
        secondary: None,
        fired: false,
    }));

    {
        let state = state.clone();
        let join = join.clone();
        let query = state.backend().query_leaderboard(stat, top_n);
        tokio::spawn(async move {
            let result = query.await;
            if !state.is_current(token) {
                debug!(token, "discarding stale primary leaderboard response");
                return;
            }
            match result {
                Ok(rows) => {
                    join.lock().unwrap().primary = Some(rows);
                    maybe_finish(&state, &join);
                }
                // The join stays pending; the connectivity monitor replays the
                // whole request once the network is back.
                Err(err) => warn!(token, error = %err, "primary leaderboard query failed"),
            }
        });
    }

    {
        let state = state.clone();
        let join = join.clone();
        let query = state
            .backend()
            .query_leaderboard(&state.config().secondary_stat, state.config().secondary_top_n);
        tokio::spawn(async move {
            let result = query.await;
            if !state.is_current(token) {
                debug!(token, "discarding stale secondary leaderboard response");
                return;
            }
            let index = match result {
                Ok(rows) => rows
                    .into_iter()
                    .map(|row| (row.player_id, row.stat_value))
                    .collect(),
                // Fail open: a missing decoration must not starve the primary
                // result, so the join proceeds with an empty index.
                Err(err) => {
                    warn!(token, error = %err, "secondary leaderboard query failed; decorating with defaults");
                    IndexMap::new()
                }
            };
            join.lock().unwrap().secondary = Some(index);
            maybe_finish(&state, &join);
        });
    }
}

/// Fetch the player's own rank for `stat` under the current generation token.
///
/// Runs independently of the row join; a stale completion is discarded by the
/// same token rule.
pub fn request_my_rank(state: &SharedState, stat: &str) {
    let token = state.current_generation();
    let state = state.clone();
    let query = state.backend().query_player_rank(stat);
    tokio::spawn(async move {
        let result = query.await;
        if !state.is_current(token) {
            debug!(token, "discarding stale personal rank response");
            return;
        }
        match result {
            Ok(row) => state.hub().publish(LeaderboardEvent::MyRank { token, row }),
            Err(err) => warn!(token, error = %err, "personal rank query failed"),
        }
    });
}

fn maybe_finish(state: &SharedState, join: &Arc<Mutex<JoinState>>) {
    let mut join = join.lock().unwrap();
    if join.fired || join.primary.is_none() || join.secondary.is_none() {
        return;
    }
    if !state.is_current(join.token) {
        return;
    }
    join.fired = true;

    let rows = join.primary.take().unwrap_or_default();
    let index = join.secondary.take().unwrap_or_default();

    if rows.is_empty() {
        state
            .hub()
            .publish(LeaderboardEvent::NoScores { token: join.token });
        return;
    }

    let default_level = state.config().default_level;
    let decorated = rows
        .into_iter()
        .map(|row| DecoratedRow {
            rank: row.rank,
            player_id: row.player_id,
            display_name: row.display_name,
            stat_value: row.stat_value,
            level: index.get(&row.player_id).copied().unwrap_or(default_level),
        })
        .collect();

    state.hub().publish(LeaderboardEvent::Ready {
        token: join.token,
        rows: decorated,
    });
}

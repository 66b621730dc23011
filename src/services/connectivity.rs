//! Reachability polling and reset-on-reconnect coordination.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    backend::ConnectivityProbe,
    services::leaderboard,
    state::{LeaderboardEvent, SharedState},
};

/// Poll network reachability for the lifetime of the process and react to
/// edges.
///
/// Going offline advances the generation token, so every in-flight leaderboard
/// callback self-cancels, and flips the offline flag the UI watches. Coming
/// back online re-authenticates when needed and replays the last leaderboard
/// request from scratch; a half-finished fetch is never resumed. The queue
/// processor is deliberately left alone on both edges: it already
/// self-throttles on failure and its queue is durable.
pub async fn run(state: SharedState, probe: Arc<dyn ConnectivityProbe>) {
    let poll_interval = state.config().poll_interval;
    let mut was_offline = false;

    loop {
        let reachable = probe.is_reachable().await;

        if !reachable && !was_offline {
            warn!("connectivity lost; invalidating in-flight leaderboard fetches");
            state.advance_generation();
            state.set_offline(true);
            state.hub().publish(LeaderboardEvent::Offline);
            was_offline = true;
        } else if reachable && was_offline {
            if !state.auth().is_authenticated() {
                if let Err(err) = state.auth().authenticate().await {
                    // Still effectively offline for our purposes; try again
                    // next tick.
                    warn!(error = %err, "re-authentication failed after reconnect");
                    sleep(poll_interval).await;
                    continue;
                }
            }
            info!("connectivity restored");
            state.set_offline(false);
            was_offline = false;
            if let Some(last) = state.last_request() {
                info!(stat = %last.stat, "replaying last leaderboard request");
                leaderboard::request(&state, &last.stat, last.top_n);
            }
        }

        sleep(poll_interval).await;
    }
}

//! Synchronous-looking submission façade: try the backend once, fall back to
//! the durable queue.

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{dao::queue::ScoreSubmission, state::SharedState};

/// Submit a finished session's score for `stat`.
///
/// Silently does nothing when the session is unauthenticated or the score does
/// not improve on the recorded floor; both a doomed network call and a wasted
/// queue slot are avoided on purpose. The immediate attempt runs with the
/// transport's default deadline; only queued retries get an explicit timeout.
pub async fn submit(state: &SharedState, stat: &str, score: i64, session_length_secs: u64) {
    if !state.auth().is_authenticated() {
        debug!(stat, score, "skipping submission: not authenticated");
        return;
    }
    if !state.gate().should_attempt(stat, score) {
        debug!(stat, score, "skipping submission: not an improvement");
        return;
    }

    match state
        .backend()
        .submit_score(stat, score, session_length_secs)
        .await
    {
        Ok(()) => {
            info!(stat, score, "score accepted by backend");
            state.gate().commit(stat, score);
        }
        Err(err) => {
            // The floor is raised even though the backend never acknowledged
            // this score. Intentional trade-off inherited from the shipped
            // client: the best score we have tried to send becomes the new
            // floor, so a flaky connection cannot flood the queue with lower
            // scores typed in the meantime. The cost is that a submission the
            // backend later drops is never re-attempted at a lower value.
            warn!(stat, score, error = %err, "immediate submission failed; queueing for retry");
            state.queue().enqueue(ScoreSubmission {
                stat: stat.to_owned(),
                score,
                session_length_secs,
                enqueued_at_unix: OffsetDateTime::now_utc().unix_timestamp(),
            });
            state.gate().commit(stat, score);
        }
    }
}

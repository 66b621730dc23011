//! Perpetual background task draining the pending submission queue.

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Drain the queue for the lifetime of the process.
///
/// Exactly one instance runs system-wide, spawned at startup. The loop is
/// strictly serial: one outstanding submission at a time, head first, and the
/// head stays in place until the backend confirms it (at-least-once). Failed
/// attempts are retried after a flat interval; connectivity loss needs no
/// special handling here because attempts simply keep failing quietly against
/// a durable queue.
pub async fn run(state: SharedState) {
    let submit_timeout = state.config().submit_timeout;
    let retry_interval = state.config().retry_interval;

    loop {
        let Some(item) = state.queue().peek_front() else {
            debug!("submission queue idle");
            state.queue().wait_for_item().await;
            continue;
        };

        let attempt =
            state
                .backend()
                .submit_score(&item.stat, item.score, item.session_length_secs);

        match timeout(submit_timeout, attempt).await {
            Ok(Ok(())) => {
                state.queue().pop_front();
                // Replays after a restart must not regress the floor.
                state.gate().commit(&item.stat, item.score);
                info!(
                    stat = %item.stat,
                    score = item.score,
                    remaining = state.queue().len(),
                    "queued submission accepted"
                );
            }
            Ok(Err(err)) => {
                warn!(
                    stat = %item.stat,
                    score = item.score,
                    error = %err,
                    "queued submission failed; will retry"
                );
                sleep(retry_interval).await;
            }
            Err(_) => {
                warn!(
                    stat = %item.stat,
                    score = item.score,
                    "queued submission timed out; will retry"
                );
                sleep(retry_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::{
        dao::queue::ScoreSubmission,
        testing::{SubmitOutcome, TestContext, fail_submits},
    };

    fn pending(stat: &str, score: i64) -> ScoreSubmission {
        ScoreSubmission {
            stat: stat.into(),
            score,
            session_length_secs: 60,
            enqueued_at_unix: 1_700_000_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn drains_queue_in_fifo_order() {
        let ctx = TestContext::new();
        ctx.state.queue().enqueue(pending("race", 100));
        ctx.state.queue().enqueue(pending("puzzle", 40));

        tokio::spawn(run(ctx.state.clone()));
        sleep(Duration::from_millis(10)).await;

        assert!(ctx.state.queue().is_empty());
        assert_eq!(
            ctx.backend.submitted(),
            vec![("race".to_owned(), 100), ("puzzle".to_owned(), 40)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_head_is_retried_before_later_items() {
        let ctx = TestContext::new();
        fail_submits(&ctx.backend, 2);
        ctx.state.queue().enqueue(pending("race", 100));
        ctx.state.queue().enqueue(pending("puzzle", 40));

        tokio::spawn(run(ctx.state.clone()));

        // Two failures at 5s spacing, then both items drain in order.
        sleep(Duration::from_secs(11)).await;
        assert!(ctx.state.queue().is_empty());
        assert_eq!(
            ctx.backend.submitted(),
            vec![
                ("race".to_owned(), 100),
                ("race".to_owned(), 100),
                ("race".to_owned(), 100),
                ("puzzle".to_owned(), 40)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempt_times_out_and_retries() {
        let ctx = TestContext::new();
        ctx.backend.plan_submits([SubmitOutcome::Hang]);
        ctx.state.queue().enqueue(pending("race", 100));

        tokio::spawn(run(ctx.state.clone()));

        // 10s timeout plus 5s retry pause, then the retry succeeds.
        sleep(Duration::from_secs(16)).await;
        assert!(ctx.state.queue().is_empty());
        assert_eq!(ctx.backend.submitted().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_processor_wakes_on_enqueue() {
        let ctx = TestContext::new();
        tokio::spawn(run(ctx.state.clone()));
        sleep(Duration::from_millis(10)).await;

        ctx.state.queue().enqueue(pending("race", 100));
        sleep(Duration::from_millis(10)).await;

        assert!(ctx.state.queue().is_empty());
        assert_eq!(ctx.state.gate().best("race"), Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_item_survives_restart_and_drains() {
        let ctx = TestContext::new();
        fail_submits(&ctx.backend, 1);
        crate::services::submitter::submit(&ctx.state, "race", 100, 60).await;
        assert_eq!(ctx.state.queue().len(), 1);

        // Relaunch: only durable cells survive, and the item is retried.
        let relaunched = TestContext::with_kv(std::sync::Arc::new(ctx.kv.reopen()));
        assert_eq!(relaunched.state.queue().len(), 1);

        tokio::spawn(run(relaunched.state.clone()));
        sleep(Duration::from_millis(10)).await;

        assert!(relaunched.state.queue().is_empty());
        assert_eq!(relaunched.backend.submitted(), vec![("race".to_owned(), 100)]);
        assert_eq!(relaunched.state.gate().best("race"), Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn replayed_item_never_regresses_the_floor() {
        let ctx = TestContext::new();
        ctx.state.gate().commit("race", 150);
        ctx.state.queue().enqueue(pending("race", 100));

        tokio::spawn(run(ctx.state.clone()));
        sleep(Duration::from_millis(10)).await;

        assert!(ctx.state.queue().is_empty());
        assert_eq!(ctx.state.gate().best("race"), Some(150));
    }
}

//! Background services driving submission, retry, connectivity, and
//! leaderboard fetches over the shared state.

/// Connectivity polling and reset-on-reconnect coordination.
pub mod connectivity;
/// Leaderboard fetch orchestration with generation-token cancellation.
pub mod leaderboard;
/// Background drain loop for the pending submission queue.
pub mod queue_processor;
/// Immediate score submission with queue fallback.
pub mod submitter;

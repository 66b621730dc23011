//! Local persistence: key-value seam, pending submission queue, and
//! best-score floors.

/// Per-stat best-score floors (the anti-regression gate).
pub mod best_score;
/// Local durable key-value storage abstraction.
pub mod kv;
/// Durable FIFO queue of pending score submissions.
pub mod queue;

//! Library crate for score-sync: offline-tolerant score submission and
//! leaderboard aggregation against a remote scoring service.

pub mod backend;
pub mod config;
pub mod dao;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

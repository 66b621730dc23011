//! Per-stat anti-regression gate backed by the key-value store.

use dashmap::DashMap;

use crate::dao::kv::KvHandle;

/// One-way ratchet recording the highest score ever confirmed or attempted for
/// each stat.
///
/// The backend stays the source of truth for ranking; this cache only exists
/// so the client never spends a network call or a queue slot on a score it
/// already knows cannot be an improvement.
pub struct ScoreGate {
    kv: KvHandle,
    key_prefix: String,
    cache: DashMap<String, i64>,
}

impl ScoreGate {
    /// Build a gate persisting floors under `key_prefix` + stat name.
    pub fn new(kv: KvHandle, key_prefix: impl Into<String>) -> Self {
        Self {
            kv,
            key_prefix: key_prefix.into(),
            cache: DashMap::new(),
        }
    }

    /// Whether `score` strictly improves on the recorded floor for `stat`.
    ///
    /// Ties are not worth a network round trip.
    pub fn should_attempt(&self, stat: &str, score: i64) -> bool {
        match self.best(stat) {
            Some(best) => score > best,
            None => true,
        }
    }

    /// Raise the floor for `stat` to `score` if higher, persisting immediately.
    /// Never lowers an existing floor.
    pub fn commit(&self, stat: &str, score: i64) {
        let mut entry = self.cache.entry(stat.to_owned()).or_insert_with(|| {
            self.kv
                .get_json::<i64>(&self.storage_key(stat))
                .unwrap_or(i64::MIN)
        });
        if score <= *entry {
            return;
        }
        *entry = score;
        let key = self.storage_key(stat);
        drop(entry);
        self.kv.set_json(&key, &score);
    }

    /// Recorded floor for `stat`, if any score was ever committed.
    pub fn best(&self, stat: &str) -> Option<i64> {
        if let Some(cached) = self.cache.get(stat) {
            return Some(*cached).filter(|value| *value != i64::MIN);
        }
        let stored = self.kv.get_json::<i64>(&self.storage_key(stat));
        if let Some(value) = stored {
            self.cache.insert(stat.to_owned(), value);
        }
        stored
    }

    fn storage_key(&self, stat: &str) -> String {
        format!("{}{stat}", self.key_prefix)
    }
}

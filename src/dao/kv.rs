//! Local durable key-value storage used for the pending queue and best-score floors.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

/// Abstraction over the device-local key-value store.
///
/// Writes are treated as infallible by the sync core; implementations that can
/// fail (disk full, etc.) log and carry on rather than propagate, since the
/// broader persistence layer owns that concern.
pub trait KvStore: Send + Sync {
    /// Read the raw string stored under `key`, if any.
    fn get_raw(&self, key: &str) -> Option<String>;
    /// Store `value` under `key` in memory.
    fn set_raw(&self, key: &str, value: String);
    /// Flush pending writes to durable storage.
    fn save(&self);
}

/// Cheaply cloneable handle adding typed JSON accessors on top of [`KvStore`].
#[derive(Clone)]
pub struct KvHandle {
    inner: Arc<dyn KvStore>,
}

impl KvHandle {
    /// Wrap a store implementation.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { inner: store }
    }

    /// Read and deserialize the value stored under `key`.
    ///
    /// A value that fails to parse is treated as absent, with a warning, so a
    /// corrupted record never takes the sync core down.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.inner.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding unparseable persisted value");
                None
            }
        }
    }

    /// Serialize `value` and store it under `key`, then flush.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => {
                self.inner.set_raw(key, raw);
                self.inner.save();
            }
            Err(err) => warn!(key, error = %err, "failed to serialize value for storage"),
        }
    }
}

/// In-memory store used by tests; distinguishes live state from what `save`
/// made durable so a process restart can be simulated.
#[derive(Default)]
pub struct MemoryKv {
    live: Mutex<HashMap<String, String>>,
    durable: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    /// Fresh empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store seeded with only the durable cells of `self`, as if the
    /// process had been killed and relaunched.
    pub fn reopen(&self) -> Self {
        let durable = self.durable.lock().unwrap().clone();
        Self {
            live: Mutex::new(durable.clone()),
            durable: Mutex::new(durable),
        }
    }
}

impl KvStore for MemoryKv {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.live.lock().unwrap().get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: String) {
        self.live.lock().unwrap().insert(key.to_owned(), value);
    }

    fn save(&self) {
        let live = self.live.lock().unwrap().clone();
        *self.durable.lock().unwrap() = live;
    }
}

/// File-backed store persisting all cells as a single JSON object.
pub struct FileKv {
    path: PathBuf,
    cells: Mutex<HashMap<String, String>>,
}

impl FileKv {
    /// Open the store at `path`, loading existing cells when the file is
    /// present and starting empty otherwise.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cells = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<HashMap<String, String>>(&contents) {
                Ok(map) => map,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse key-value file; starting empty"
                    );
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read key-value file; starting empty"
                );
                HashMap::new()
            }
        };

        Self {
            path,
            cells: Mutex::new(cells),
        }
    }
}

impl KvStore for FileKv {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.cells.lock().unwrap().get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: String) {
        self.cells.lock().unwrap().insert(key.to_owned(), value);
    }

    fn save(&self) {
        let serialized = {
            let cells = self.cells.lock().unwrap();
            serde_json::to_string(&*cells)
        };
        match serialized {
            Ok(contents) => {
                if let Err(err) = fs::write(&self.path, contents) {
                    warn!(path = %self.path.display(), error = %err, "failed to flush key-value file");
                }
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to serialize key-value file");
            }
        }
    }
}

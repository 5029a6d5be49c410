//! Per-file settings with a session-wide default.

use std::fmt;

use cirrus_core::FileId;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};

/// A value with a session-wide default and optional per-file overrides.
pub struct PerFileStore<T> {
    initial: T,
    default: RwLock<T>,
    overrides: DashMap<FileId, T>,
}

impl<T: Clone + fmt::Debug> fmt::Debug for PerFileStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerFileStore")
            .field("default", &*self.default.read())
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

impl<T: Clone> PerFileStore<T> {
    /// Creates a store whose default is `initial`, restored again by
    /// [`reset`](Self::reset).
    pub fn new(initial: T) -> Self {
        Self {
            default: RwLock::new(initial.clone()),
            initial,
            overrides: DashMap::new(),
        }
    }

    /// Sets the value for `id`, or the default for every file when `id` is
    /// `None`.
    pub fn set(&self, value: T, id: Option<FileId>) {
        match id {
            Some(id) => {
                self.overrides.insert(id, value);
            }
            None => *self.default.write() = value,
        }
    }

    /// Returns the value for `id`, falling back to the default.
    pub fn get(&self, id: FileId) -> T {
        self.overrides
            .get(&id)
            .map(|value| value.clone())
            .unwrap_or_else(|| self.default_value())
    }

    /// Returns the default value.
    pub fn default_value(&self) -> T {
        self.default.read().clone()
    }

    /// Returns whether `id` has its own value.
    pub fn has_override(&self, id: FileId) -> bool {
        self.overrides.contains_key(&id)
    }

    /// Drops the value of `id`.
    pub fn remove(&self, id: FileId) {
        self.overrides.remove(&id);
    }

    /// Drops every per-file value and restores the initial default.
    pub fn reset(&self) {
        self.overrides.clear();
        *self.default.write() = self.initial.clone();
    }
}

/// Extra parameters sent with each completion confirmation.
pub type UploadSuccessParamsStore = PerFileStore<Map<String, Value>>;

/// Upload endpoint per file.
pub type EndpointStore = PerFileStore<String>;

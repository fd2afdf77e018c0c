use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};

use crate::graph::Direction;

/// Entries kept before the cache is flushed wholesale.
pub const ADJACENCY_CACHE_CAPACITY: usize = 16_384;

/// Key of one memoised adjacency lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AdjacencyKey {
    pub node: i64,
    pub direction: Direction,
    pub edge_type: Option<String>,
    pub target_kind: Option<String>,
}

#[derive(Default)]
pub struct AdjacencyCache {
    enabled: bool,
    capacity: usize,
    inner: RwLock<AHashMap<AdjacencyKey, Vec<i64>>>,
    data_version: Mutex<Option<i64>>,
}

impl AdjacencyCache {
    pub fn new(enabled: bool) -> Self {
        Self::with_capacity(enabled, ADJACENCY_CACHE_CAPACITY)
    }

    pub fn with_capacity(enabled: bool, capacity: usize) -> Self {
        Self {
            enabled,
            capacity: capacity.max(1),
            inner: RwLock::new(AHashMap::new()),
            data_version: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &AdjacencyKey) -> Option<Vec<i64>> {
        if !self.enabled {
            return None;
        }
        self.inner.read().get(key).cloned()
    }

    pub fn insert(&self, key: AdjacencyKey, value: Vec<i64>) {
        if !self.enabled {
            return;
        }
        let mut map = self.inner.write();
        if map.len() >= self.capacity && !map.contains_key(&key) {
            map.clear();
        }
        map.insert(key, value);
    }

    /// Records the database `data_version` and drops every entry when it
    /// differs from the last one seen, i.e. another connection committed.
    pub fn observe_data_version(&self, version: i64) {
        let mut seen = self.data_version.lock();
        if *seen != Some(version) {
            if seen.is_some() {
                self.inner.write().clear();
            }
            *seen = Some(version);
        }
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

// grant-gate-core/src/runtime/cache.rs
// ============================================================================
// Module: Grant Gate In-Memory Cache
// Description: Indexed in-memory object cache with snapshot-and-swap updates.
// Purpose: Back resolvers in tests, the CLI, and embedded deployments.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryCache`] stores objects in an immutable snapshot behind an
//! `Arc`. Readers clone the `Arc` and work lock-free on that snapshot while
//! writers build a modified copy and swap it in, so secondary indexes stay
//! consistent with the objects they index for every concurrent reader.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::RwLock;

use crate::core::CacheObject;
use crate::interfaces::CacheError;
use crate::interfaces::IndexFn;
use crate::interfaces::LabelSelector;
use crate::interfaces::ObjectCache;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Immutable cache contents.
struct Snapshot<T> {
    /// Objects keyed by cache key.
    objects: BTreeMap<String, T>,
    /// Registered index functions.
    indexers: BTreeMap<String, IndexFn<T>>,
    /// Index name -> index key -> object keys.
    indices: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl<T> Clone for Snapshot<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            objects: self.objects.clone(),
            indexers: self.indexers.clone(),
            indices: self.indices.clone(),
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            indexers: BTreeMap::new(),
            indices: BTreeMap::new(),
        }
    }
}

impl<T: CacheObject> Snapshot<T> {
    /// Adds `object` under `key` to every registered index.
    fn index_object(&mut self, key: &str, object: &T) {
        for (name, indexer) in &self.indexers {
            let index = self.indices.entry(name.clone()).or_default();
            for value in indexer(object) {
                index.entry(value).or_default().insert(key.to_string());
            }
        }
    }

    /// Removes `object` under `key` from every registered index.
    fn unindex_object(&mut self, key: &str, object: &T) {
        for (name, indexer) in &self.indexers {
            let Some(index) = self.indices.get_mut(name) else {
                continue;
            };
            for value in indexer(object) {
                if let Some(keys) = index.get_mut(&value) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(&value);
                    }
                }
            }
        }
    }

    /// Inserts or replaces an object.
    fn upsert(&mut self, object: T) {
        let key = object.cache_key();
        if let Some(previous) = self.objects.remove(&key) {
            self.unindex_object(&key, &previous);
        }
        self.index_object(&key, &object);
        self.objects.insert(key, object);
    }

    /// Removes an object by key.
    fn remove(&mut self, key: &str) -> Option<T> {
        let previous = self.objects.remove(key)?;
        self.unindex_object(key, &previous);
        Some(previous)
    }
}

// ============================================================================
// SECTION: In-Memory Cache
// ============================================================================

/// Indexed in-memory cache.
///
/// # Invariants
/// - Every snapshot's indices reflect exactly the objects in that snapshot.
pub struct InMemoryCache<T> {
    /// Current snapshot, swapped on every write.
    current: RwLock<Arc<Snapshot<T>>>,
}

impl<T: CacheObject> Default for InMemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CacheObject> InMemoryCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Creates a cache preloaded with objects.
    #[must_use]
    pub fn with_objects(objects: impl IntoIterator<Item = T>) -> Self {
        let mut snapshot = Snapshot::default();
        for object in objects {
            snapshot.upsert(object);
        }
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Inserts or replaces an object.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] when the cache lock is poisoned.
    pub fn upsert(&self, object: T) -> Result<(), CacheError> {
        self.update(|snapshot| {
            snapshot.upsert(object);
        })
    }

    /// Removes an object, returning it when present.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] when the cache lock is poisoned.
    pub fn remove(&self, key: &str) -> Result<Option<T>, CacheError> {
        let mut removed = None;
        self.update(|snapshot| {
            removed = snapshot.remove(key);
        })?;
        Ok(removed)
    }

    /// Returns the number of cached objects.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] when the cache lock is poisoned.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.snapshot()?.objects.len())
    }

    /// Returns true when the cache holds no objects.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] when the cache lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.snapshot()?.objects.is_empty())
    }

    /// Returns the current snapshot.
    fn snapshot(&self) -> Result<Arc<Snapshot<T>>, CacheError> {
        let guard = self
            .current
            .read()
            .map_err(|_| CacheError::Backend(format!("{} cache lock poisoned", T::KIND)))?;
        Ok(Arc::clone(&*guard))
    }

    /// Applies a change to a copy of the snapshot and swaps it in.
    fn update(&self, change: impl FnOnce(&mut Snapshot<T>)) -> Result<(), CacheError> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| CacheError::Backend(format!("{} cache lock poisoned", T::KIND)))?;
        let mut next: Snapshot<T> = (**guard).clone();
        change(&mut next);
        *guard = Arc::new(next);
        Ok(())
    }
}

impl<T: CacheObject> ObjectCache<T> for InMemoryCache<T> {
    fn get(&self, key: &str) -> Result<T, CacheError> {
        self.snapshot()?.objects.get(key).cloned().ok_or_else(|| CacheError::NotFound {
            kind: T::KIND,
            name: key.to_string(),
        })
    }

    fn list(&self, selector: &LabelSelector) -> Result<Vec<T>, CacheError> {
        Ok(self
            .snapshot()?
            .objects
            .values()
            .filter(|object| selector.matches(object.meta()))
            .cloned()
            .collect())
    }

    fn get_by_index(&self, index: &str, key: &str) -> Result<Vec<T>, CacheError> {
        let snapshot = self.snapshot()?;
        if !snapshot.indexers.contains_key(index) {
            return Err(CacheError::UnknownIndex(index.to_string()));
        }
        let Some(keys) = snapshot.indices.get(index).and_then(|entries| entries.get(key)) else {
            return Ok(Vec::new());
        };
        Ok(keys.iter().filter_map(|object_key| snapshot.objects.get(object_key).cloned()).collect())
    }

    fn add_indexer(&self, name: &str, index: IndexFn<T>) -> Result<(), CacheError> {
        let mut duplicate = false;
        self.update(|snapshot| {
            if snapshot.indexers.contains_key(name) {
                duplicate = true;
                return;
            }
            let mut entries: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for (key, object) in &snapshot.objects {
                for value in index(object) {
                    entries.entry(value).or_default().insert(key.clone());
                }
            }
            snapshot.indices.insert(name.to_string(), entries);
            snapshot.indexers.insert(name.to_string(), index);
        })?;
        if duplicate {
            return Err(CacheError::DuplicateIndex(name.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

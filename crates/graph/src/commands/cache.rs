//! Compilation cache - compute-once storage keyed by request structure

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::error::GraphResult;

/// Cache statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Concurrent get-or-compute cache that never evicts
///
/// Concurrent requests for the same key run the compile closure once; the
/// others block on the same cell and receive its value. Failed compilations
/// are not cached.
pub struct CompilationCache<K, V> {
    entries: DashMap<K, Arc<OnceCell<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> CompilationCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached value for `key`, if a compilation finished
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Return the cached value or compute it with `compile`
    pub fn get_or_compile<F>(&self, key: K, compile: F) -> GraphResult<V>
    where
        F: FnOnce() -> GraphResult<V>,
    {
        // Shard lock must be released before compiling
        let cell = {
            let entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()));
            Arc::clone(entry.value())
        };

        let mut compiled = false;
        let result = cell
            .get_or_try_init(|| {
                compiled = true;
                compile()
            })
            .map(V::clone);

        match result {
            Ok(value) => {
                let counter = if compiled { &self.misses } else { &self.hits };
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Err(err) => {
                self.entries
                    .remove_if(&key, |_, current| Arc::ptr_eq(current, &cell) && current.get().is_none());
                Err(err)
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.get(key).map(|cell| cell.get().is_some()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<K, V> Default for CompilationCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for CompilationCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_compiles_once_per_key() {
        let cache: CompilationCache<&str, Arc<String>> = CompilationCache::new();
        let calls = AtomicUsize::new(0);

        let compile = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new("users".to_string()))
        };

        let first = cache.get_or_compile("users", compile).unwrap();
        let second = cache.get_or_compile("users", || unreachable!()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, entries: 1 });
    }

    #[test]
    fn test_failed_compilation_is_not_cached() {
        let cache: CompilationCache<&str, u32> = CompilationCache::new();

        let err = cache
            .get_or_compile("users", || Err(GraphError::malformed_plan("broken")))
            .unwrap_err();
        assert!(err.is_malformed_plan());
        assert!(!cache.contains(&"users"));
        assert!(cache.is_empty());

        assert_eq!(cache.get_or_compile("users", || Ok(7)).unwrap(), 7);
        assert_eq!(cache.get(&"users"), Some(7));
    }

    #[test]
    fn test_concurrent_requests_share_one_compilation() {
        let cache: Arc<CompilationCache<u32, Arc<u32>>> = Arc::new(CompilationCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_compile(1, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(Arc::new(42))
                        })
                        .unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 7);
    }
}

//! Memoization of pipeline results.
//!
//! Entries are keyed by a content fingerprint of the input containers plus
//! the requested sample size, so renaming a file still hits and reusing a
//! name for new content does not. Lookups share a read lock; each key owns
//! its own mutex so at most one computation per key is ever in flight.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};

use crate::config::CacheExpiry;
use crate::data::loader::{canonical_order, ContainerInput};

/// SHA-256 over the role-ordered container contents.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(inputs: &[ContainerInput]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((inputs.len() as u64).to_le_bytes());
        for input in canonical_order(inputs) {
            hasher.update((input.bytes.len() as u64).to_le_bytes());
            hasher.update(&input.bytes);
        }
        Fingerprint(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_string()[..12])
    }
}

/// Cache key: what was uploaded and how many points were asked for.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub sample_size: usize,
}

impl CacheKey {
    pub fn new(inputs: &[ContainerInput], sample_size: usize) -> Self {
        Self {
            fingerprint: Fingerprint::of(inputs),
            sample_size,
        }
    }
}

struct Stored<V> {
    value: Arc<V>,
    inserted: Instant,
}

type Slot<V> = Arc<Mutex<Option<Stored<V>>>>;

/// Thread-safe result cache with optional time-based expiry.
pub struct ResultCache<V> {
    slots: RwLock<HashMap<CacheKey, Slot<V>>>,
    /// `None` keeps entries for the life of the process.
    ttl: Option<Duration>,
    /// Number of times a value was computed (misses that ran the closure).
    computations: AtomicUsize,
}

impl<V> ResultCache<V> {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl,
            computations: AtomicUsize::new(0),
        }
    }

    pub fn from_expiry(expiry: &CacheExpiry) -> Self {
        Self::new(expiry.ttl())
    }

    pub fn indefinite() -> Self {
        Self::new(None)
    }

    fn is_fresh(&self, stored: &Stored<V>) -> bool {
        match self.ttl {
            Some(ttl) => stored.inserted.elapsed() < ttl,
            None => true,
        }
    }

    /// Cached value for `key`, if present and unexpired.
    ///
    /// Never waits: a key whose value is being computed reads as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let slot = self.slots.read().get(key).cloned()?;
        let guard = slot.try_lock()?;
        let value = guard
            .as_ref()
            .filter(|stored| self.is_fresh(stored))
            .map(|stored| Arc::clone(&stored.value));
        value
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// Concurrent callers with the same key block on that key's mutex while
    /// the first one computes, then share its result. Errors are returned
    /// to the computing caller and nothing is stored.
    ///
    /// A miss also purges expired entries. A key removed by [`clear`] or
    /// [`invalidate`] while its value is being computed is detached: the
    /// computing caller still receives the value, it is not stored, and a
    /// caller arriving afterwards computes afresh.
    ///
    /// [`clear`]: Self::clear
    /// [`invalidate`]: Self::invalidate
    pub fn get_or_try_insert_with<F, E>(&self, key: CacheKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let existing = self.slots.read().get(&key).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                self.purge_expired();
                Arc::clone(self.slots.write().entry(key).or_default())
            }
        };

        let mut guard = slot.lock();
        if let Some(stored) = guard.as_ref() {
            if self.is_fresh(stored) {
                debug!("cache hit for {:?} (n = {})", key.fingerprint, key.sample_size);
                return Ok(Arc::clone(&stored.value));
            }
            debug!("cache entry for {:?} expired", key.fingerprint);
        }

        *guard = None;
        let value = match compute() {
            Ok(value) => Arc::new(value),
            Err(e) => {
                self.release_empty_slot(&key, &slot);
                return Err(e);
            }
        };
        self.computations.fetch_add(1, Ordering::Relaxed);
        *guard = Some(Stored {
            value: Arc::clone(&value),
            inserted: Instant::now(),
        });
        Ok(value)
    }

    /// Remove `slot` after a failed computation unless another caller is
    /// queued on it or the key already maps to a different slot.
    fn release_empty_slot(&self, key: &CacheKey, slot: &Slot<V>) {
        let mut slots = self.slots.write();
        // map + this caller; any further reference is a waiter
        let unshared = Arc::strong_count(slot) <= 2;
        if unshared && slots.get(key).is_some_and(|held| Arc::ptr_eq(held, slot)) {
            slots.remove(key);
        }
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.slots.write().remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Remove expired and empty entries no caller is holding.
    pub fn purge_expired(&self) {
        let mut slots = self.slots.write();
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Some(guard) => guard.as_ref().is_some_and(|s| self.is_fresh(s)),
                None => true,
            }
        });
    }

    /// Number of slots held, including empty and expired ones.
    pub fn slot_count(&self) -> usize {
        self.slots.read().len()
    }

    /// Number of stored, unexpired entries.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .is_some_and(|guard| guard.as_ref().is_some_and(|s| self.is_fresh(s)))
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self::from_expiry(&CacheExpiry::default())
    }
}

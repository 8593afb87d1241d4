use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex};

use tracing::trace;

use super::error::Result;

/// Keyed block cache shared by all reader threads.
///
/// - Linear search over a small slot table.
/// - Tracks which slots are in use, so only unused ones are evicted.
/// - Round-robin eviction.
/// - Concurrent requests for the same missing key are coalesced: exactly
///   one caller runs the initializer, the rest block until the slot is
///   ready and then share the value.
/// - If too many threads keep slots in use, spare slots are allocated to
///   scale up to `capacity`; past that, requests wait for a release.
///
/// One condition variable per slot signals readiness; a single cache-wide
/// condition variable signals that space became available. All slot state
/// transitions happen under the cache mutex, but an initializer never holds
/// it while reading or decompressing.
pub(crate) struct Cache<V> {
    state: Mutex<State<V>>,
    space: Condvar,
    initial: usize,
    capacity: usize,
}

struct State<V> {
    slots: Vec<Slot<V>>,
    /// Slots available without eviction pressure: unused + unallocated.
    avail: usize,
    /// Index of the next eviction candidate.
    evict: usize,
    /// Threads waiting for space.
    waiters: usize,
}

struct Slot<V> {
    key: u64,
    /// `Some` once initialization succeeded. A ready slot with no value
    /// marks a failed initialization whose waiters must retry.
    value: Option<Arc<V>>,
    ready: bool,
    refcount: usize,
    cv: Arc<Condvar>,
}

/// Key that can never collide with a block position.
const TOMBSTONE: u64 = u64::MAX;

/// Shared reference to a cached value. While any handle to a slot is live,
/// the slot cannot be evicted; dropping the handle releases it.
pub(crate) struct CacheHandle<'a, V> {
    cache: &'a Cache<V>,
    slot: usize,
    value: Arc<V>,
}

impl<V> std::fmt::Debug for CacheHandle<'_, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle").field("slot", &self.slot).finish()
    }
}

impl<V> Deref for CacheHandle<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.value
    }
}

impl<V> Drop for CacheHandle<'_, V> {
    fn drop(&mut self) {
        let mut st = self.cache.state.lock().unwrap();
        self.cache.release(&mut st, self.slot);
    }
}

impl<V> Cache<V> {
    pub fn new(initial: usize, capacity: usize) -> Self {
        debug_assert!(initial >= 1 && initial <= capacity);
        Cache {
            state: Mutex::new(State {
                slots: Vec::new(),
                avail: initial,
                evict: 0,
                waiters: 0,
            }),
            space: Condvar::new(),
            initial,
            capacity,
        }
    }

    /// Return a handle to the value for `key`, running `init` to produce it
    /// on a miss. With concurrent calls for the same missing key, exactly
    /// one initializer runs; the others wait and share its result. If the
    /// initializer fails, its error is returned to it alone, the slot is
    /// vacated, and any waiters retry.
    pub fn get(&self, key: u64, init: impl FnOnce() -> Result<V>) -> Result<CacheHandle<'_, V>> {
        debug_assert_ne!(key, TOMBSTONE);
        let mut st = self.state.lock().unwrap();
        let slot = loop {
            // Check if we already have the entry.
            if let Some(i) = st.slots.iter().position(|s| s.key == key) {
                if st.slots[i].refcount == 0 {
                    st.avail -= 1;
                }
                st.slots[i].refcount += 1;

                // Wait until it is ready. The slot cannot be reused from
                // under us while we hold a reference to it.
                while !st.slots[i].ready {
                    let cv = st.slots[i].cv.clone();
                    st = cv.wait(st).unwrap();
                }

                match &st.slots[i].value {
                    Some(v) => {
                        let value = v.clone();
                        trace!(key, slot = i, "cache hit");
                        return Ok(CacheHandle {
                            cache: self,
                            slot: i,
                            value,
                        });
                    }
                    None => {
                        // The initializer failed; drop our claim and retry.
                        self.release(&mut st, i);
                        continue;
                    }
                }
            }

            // Not present; try to claim a slot for it.
            if let Some(i) = self.reserve(&mut st, key) {
                break i;
            }

            // Nothing free, wait until something is released.
            st.waiters += 1;
            st = self.space.wait(st).unwrap();
            st.waiters -= 1;
        };
        drop(st);

        trace!(key, slot, "cache miss");
        match init() {
            Ok(v) => {
                let value = Arc::new(v);
                let mut st = self.state.lock().unwrap();
                let s = &mut st.slots[slot];
                s.value = Some(value.clone());
                s.ready = true;
                s.cv.notify_all();
                Ok(CacheHandle {
                    cache: self,
                    slot,
                    value,
                })
            }
            Err(e) => {
                let mut st = self.state.lock().unwrap();
                let s = &mut st.slots[slot];
                s.key = TOMBSTONE;
                s.ready = true;
                s.cv.notify_all();
                self.release(&mut st, slot);
                Err(e)
            }
        }
    }

    /// Claim a slot for `key`, with `refcount` 1 and `ready` false.
    /// Yields `None` when every slot is pinned and the table is at
    /// capacity. Assumes the cache is locked.
    fn reserve(&self, st: &mut State<V>, key: u64) -> Option<usize> {
        // First, prefer a completely fresh slot from the initial allotment.
        if st.avail > 0 && st.slots.len() < self.initial {
            st.avail -= 1;
            return Some(Self::push_slot(st, key));
        }

        // Second, try to evict an unused slot, round-robin.
        let n = st.slots.len();
        for k in 0..n {
            let j = (st.evict + k) % n;
            if st.slots[j].refcount == 0 {
                trace!(old = st.slots[j].key, new = key, slot = j, "cache evict");
                st.avail -= 1;
                st.evict = (j + 1) % n;
                let s = &mut st.slots[j];
                s.key = key;
                s.value = None;
                s.ready = false;
                s.refcount = 1;
                return Some(j);
            }
        }

        // Third, try a spare slot. Spares were never counted in `avail`.
        if st.slots.len() < self.capacity {
            return Some(Self::push_slot(st, key));
        }

        None
    }

    fn push_slot(st: &mut State<V>, key: u64) -> usize {
        st.slots.push(Slot {
            key,
            value: None,
            ready: false,
            refcount: 1,
            cv: Arc::new(Condvar::new()),
        });
        st.slots.len() - 1
    }

    /// Drop one reference to a slot; at zero the slot becomes an eviction
    /// candidate and a space waiter, if any, is woken.
    fn release(&self, st: &mut State<V>, slot: usize) {
        st.slots[slot].refcount -= 1;
        if st.slots[slot].refcount == 0 {
            st.avail += 1;
            if st.waiters > 0 {
                self.space.notify_one();
            }
        }
    }

    /// Number of slots ever allocated.
    pub fn allocated(&self) -> usize {
        self.state.lock().unwrap().slots.len()
    }

    /// Number of slots currently pinned by outstanding handles.
    pub fn in_use(&self) -> usize {
        let st = self.state.lock().unwrap();
        st.slots.iter().filter(|s| s.refcount > 0).count()
    }

    /// Whether `key` currently has a ready slot.
    #[allow(dead_code)]
    pub fn contains(&self, key: u64) -> bool {
        let st = self.state.lock().unwrap();
        st.slots
            .iter()
            .any(|s| s.key == key && s.ready && s.value.is_some())
    }

    #[cfg(test)]
    fn refcount_sum(&self) -> usize {
        let st = self.state.lock().unwrap();
        st.slots.iter().map(|s| s.refcount).sum()
    }
}

//! Session/lock manager: a per-card reference-counted exclusive-access
//! primitive, paired with cache invalidation on release.

use std::sync::{Arc, Mutex};

use crate::error::ScError;
use crate::transport::{ReaderTransport, SlotId};

struct LockState {
    count: u32,
    cache_valid: bool,
}

/// Owns the reference count, the reader's physical lock, and the transient
/// cache that is only meaningful while the lock is held.
///
/// The mutex here guards *only* `count` and the 0<->1 transition; it is not
/// a stand-in for a re-entrant mutex over the whole card. A plain
/// re-entrant mutex would be wrong here: the physical reader lock must be
/// taken exactly once on 0->1 and released exactly once on 1->0,
/// independent of recursion depth.
pub(crate) struct LockManager {
    reader: Arc<dyn ReaderTransport>,
    slot: SlotId,
    state: Mutex<LockState>,
    cache: Mutex<Vec<u8>>,
}

impl LockManager {
    pub(crate) fn new(reader: Arc<dyn ReaderTransport>, slot: SlotId) -> Self {
        LockManager {
            reader,
            slot,
            state: Mutex::new(LockState {
                count: 0,
                cache_valid: false,
            }),
            cache: Mutex::new(Vec::new()),
        }
    }

    /// Take the lock, acquiring the reader's physical lock on 0->1.
    pub(crate) fn lock(&self) -> Result<(), ScError> {
        let mut state = self.state.lock().unwrap();
        if state.count == 0 {
            self.reader.lock(self.slot)?;
            state.cache_valid = true;
        }
        state.count += 1;
        Ok(())
    }

    /// Release the lock, releasing the reader's physical lock and
    /// invalidating the cache on 1->0. Errors from the reader's unlock
    /// callback are logged, not propagated: releasing always succeeds from
    /// the caller's point of view.
    pub(crate) fn unlock(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(state.count > 0, "unlock() without a matching lock()");
        state.count -= 1;
        if state.count == 0 {
            if let Err(e) = self.reader.unlock(self.slot) {
                log::warn!("reader unlock callback failed: {e}");
            }
            state.cache_valid = false;
            let mut cache = self.cache.lock().unwrap();
            cache.iter_mut().for_each(|b| *b = 0);
            cache.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> u32 {
        self.state.lock().unwrap().count
    }

    pub(crate) fn count_is_zero(&self) -> bool {
        self.state.lock().unwrap().count == 0
    }

    pub(crate) fn cache_valid(&self) -> bool {
        self.state.lock().unwrap().cache_valid
    }

    /// Read the transient cache. Only meaningful while the lock is held;
    /// returns `None` outside a locked region.
    pub(crate) fn cache(&self) -> Option<Vec<u8>> {
        if self.cache_valid() {
            Some(self.cache.lock().unwrap().clone())
        } else {
            None
        }
    }

    pub(crate) fn set_cache(&self, data: Vec<u8>) {
        if self.cache_valid() {
            *self.cache.lock().unwrap() = data;
        }
    }
}

/// RAII guard returned by [`crate::card::Card::lock`]. Releases the lock on
/// drop, so holding a guard in scope is how callers hold the lock across a
/// sequence of APDUs rather than pairing lock/unlock calls by hand.
pub struct CardGuard<'a> {
    pub(crate) manager: &'a LockManager,
}

impl Drop for CardGuard<'_> {
    fn drop(&mut self) {
        self.manager.unlock();
    }
}

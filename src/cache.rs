//! Shared block cache.

use crate::handle::Handle;
use crate::sys;

/// An LRU cache of table blocks.
///
/// One cache may back several databases at once. Options and databases only
/// borrow it, so the borrow checker keeps the cache alive until every
/// database that uses it has been closed.
pub struct Cache {
    handle: Handle<sys::emberkv_cache_t>,
}

impl Cache {
    /// Create an LRU cache holding up to `capacity` bytes.
    pub fn new_lru(capacity: usize) -> Self {
        Self {
            handle: Handle::from_raw(sys::emberkv_cache_create_lru(capacity)),
        }
    }

    /// Bytes currently charged to the cache.
    pub fn usage(&self) -> usize {
        // SAFETY: the handle is live for as long as `self`.
        unsafe { sys::emberkv_cache_get_usage(self.handle.as_const()) }
    }

    pub fn capacity(&self) -> usize {
        // SAFETY: as above.
        unsafe { sys::emberkv_cache_get_capacity(self.handle.as_const()) }
    }

    pub(crate) fn as_const(&self) -> *const sys::emberkv_cache_t {
        self.handle.as_const()
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity())
            .field("usage", &self.usage())
            .finish()
    }
}

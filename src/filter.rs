//! Table filter policies.

use crate::handle::Handle;
use crate::sys;

/// A bloom filter policy consulted before reading a table block.
///
/// Shared the same way as [`Cache`](crate::Cache): options borrow it.
pub struct FilterPolicy {
    handle: Handle<sys::emberkv_filterpolicy_t>,
    bits_per_key: i32,
}

impl FilterPolicy {
    /// Bloom filter with `bits_per_key` bits per key. Ten bits gives a false
    /// positive rate of about one percent.
    pub fn new_bloom(bits_per_key: i32) -> Self {
        Self {
            handle: Handle::from_raw(sys::emberkv_filterpolicy_create_bloom(bits_per_key)),
            bits_per_key,
        }
    }

    pub fn bits_per_key(&self) -> i32 {
        self.bits_per_key
    }

    pub(crate) fn as_const(&self) -> *const sys::emberkv_filterpolicy_t {
        self.handle.as_const()
    }
}

impl std::fmt::Debug for FilterPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPolicy")
            .field("bits_per_key", &self.bits_per_key)
            .finish()
    }
}

//! Per-operation options.

use std::marker::PhantomData;

use crate::handle::Handle;
use crate::snapshot::Snapshot;
use crate::sys;
use crate::util::conv::{bool_to_uchar, uchar_to_bool};

/// Options for a read.
///
/// A read without a snapshot sees the latest committed state. With one it
/// sees the state as of the snapshot; the snapshot is borrowed for `'s`, so
/// it cannot be released while these options may still use it.
pub struct ReadOptions<'s> {
    handle: Handle<sys::emberkv_readoptions_t>,
    _snapshot: PhantomData<&'s ()>,
}

impl<'s> ReadOptions<'s> {
    /// Latest state, no checksum verification, blocks cached.
    pub fn new() -> Self {
        Self {
            handle: Handle::from_raw(sys::emberkv_readoptions_create()),
            _snapshot: PhantomData,
        }
    }

    /// Verify the checksum of every block read from disk. Byte flag.
    pub fn set_verify_checksums(&mut self, verify: bool) -> &mut Self {
        // SAFETY: the handle is live and `&mut self` excludes other users.
        unsafe {
            sys::emberkv_readoptions_set_verify_checksums(self.handle.as_ptr(), bool_to_uchar(verify))
        };
        self
    }

    /// Insert blocks read for this operation into the block cache. Byte
    /// flag.
    pub fn set_fill_cache(&mut self, fill: bool) -> &mut Self {
        // SAFETY: as above.
        unsafe { sys::emberkv_readoptions_set_fill_cache(self.handle.as_ptr(), bool_to_uchar(fill)) };
        self
    }

    /// Read as of `snapshot`. A read through these options on a database
    /// other than the one the snapshot came from fails with
    /// [`Error::Read`](crate::Error::Read).
    pub fn set_snapshot(&mut self, snapshot: &'s Snapshot<'_>) -> &mut Self {
        // SAFETY: the snapshot is borrowed for as long as these options.
        unsafe { sys::emberkv_readoptions_set_snapshot(self.handle.as_ptr(), snapshot.as_const()) };
        self
    }

    /// Go back to reading the latest state.
    pub fn clear_snapshot(&mut self) -> &mut Self {
        // SAFETY: null clears the snapshot.
        unsafe { sys::emberkv_readoptions_set_snapshot(self.handle.as_ptr(), std::ptr::null()) };
        self
    }

    pub(crate) fn as_const(&self) -> *const sys::emberkv_readoptions_t {
        self.handle.as_const()
    }
}

impl Default for ReadOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for a write.
pub struct WriteOptions {
    handle: Handle<sys::emberkv_writeoptions_t>,
}

impl WriteOptions {
    /// Unsynced writes: they return once the log record is buffered, so a
    /// crash may lose the most recent ones.
    pub fn new() -> Self {
        Self {
            handle: Handle::from_raw(sys::emberkv_writeoptions_create()),
        }
    }

    /// Sync the log to stable storage before the write returns. Byte flag.
    pub fn set_sync(&mut self, sync: bool) -> &mut Self {
        // SAFETY: the handle is live and `&mut self` excludes other users.
        unsafe { sys::emberkv_writeoptions_set_sync(self.handle.as_ptr(), bool_to_uchar(sync)) };
        self
    }

    pub fn sync(&self) -> bool {
        // SAFETY: the handle is live for as long as `self`.
        uchar_to_bool(unsafe { sys::emberkv_writeoptions_get_sync(self.handle.as_const()) })
    }

    pub(crate) fn as_const(&self) -> *const sys::emberkv_writeoptions_t {
        self.handle.as_const()
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_options_sync_reads_engine_value() {
        let mut wo = WriteOptions::new();
        assert!(!wo.sync());
        wo.set_sync(true);
        assert!(wo.sync());
        // SAFETY: the handle is live.
        assert_eq!(unsafe { sys::emberkv_writeoptions_get_sync(wo.as_const()) }, 1);
        wo.set_sync(false);
        assert!(!wo.sync());
    }
}

//! Point-in-time read views.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::db::Database;
use crate::sys;

/// A consistent view of the database as of the moment it was taken.
///
/// Reads through [`ReadOptions::set_snapshot`](crate::ReadOptions::set_snapshot)
/// see exactly the writes committed before the snapshot, even after later
/// writes and compactions. The snapshot borrows its database, so it is
/// always released before the database is closed.
pub struct Snapshot<'db> {
    db: *mut sys::emberkv_t,
    raw: NonNull<sys::emberkv_snapshot_t>,
    _db: PhantomData<&'db ()>,
}

impl<'db> Snapshot<'db> {
    pub(crate) fn new(db: &'db Database<'_>) -> Self {
        let db = db.as_ptr();
        // SAFETY: `db` is a live database for at least `'db`.
        let raw = unsafe { sys::emberkv_create_snapshot(db) };
        match NonNull::new(raw as *mut sys::emberkv_snapshot_t) {
            Some(raw) => Self {
                db,
                raw,
                _db: PhantomData,
            },
            None => std::alloc::handle_alloc_error(std::alloc::Layout::new::<
                sys::emberkv_snapshot_t,
            >()),
        }
    }

    /// Release the snapshot now. Dropping it has the same effect.
    pub fn release(self) {
        drop(self);
    }

    pub(crate) fn as_const(&self) -> *const sys::emberkv_snapshot_t {
        self.raw.as_ptr()
    }
}

impl Drop for Snapshot<'_> {
    fn drop(&mut self) {
        // SAFETY: the database outlives `self`, and the snapshot is released
        // exactly once, here.
        unsafe { sys::emberkv_release_snapshot(self.db, self.raw.as_ptr()) };
        tracing::trace!("snapshot released");
    }
}

// SAFETY: a snapshot is an immutable sequence number owned by the engine.
unsafe impl Send for Snapshot<'_> {}
unsafe impl Sync for Snapshot<'_> {}

impl std::fmt::Debug for Snapshot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot").finish_non_exhaustive()
    }
}

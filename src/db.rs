//! Database handle.
//!
//! A [`Database`] owns one open engine instance bound to a directory. It
//! goes from open to closed exactly once: [`Database::close`] consumes the
//! handle, and dropping it closes it as well.
//!
//! # Thread Safety
//!
//! The engine serializes writers internally and lets readers proceed
//! concurrently, so `Database` is `Send + Sync` and adds no locking of its
//! own. Share it across threads by reference or with `Arc`.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr;

use bytes::Bytes;
use libc::c_char;

use crate::handle::Handle;
use crate::options::{Options, ReadOptions, WriteOptions};
use crate::snapshot::Snapshot;
use crate::sys;
use crate::util::conv::{path_to_cstring, take_engine_string, to_cstring};
use crate::{Error, Result};

/// Run one engine call that reports failure through an `errptr`, turning
/// the message into the error `kind` builds.
fn engine_call<T>(
    kind: fn(String) -> Error,
    call: impl FnOnce(*mut *mut c_char) -> T,
) -> Result<T> {
    let mut err: *mut c_char = ptr::null_mut();
    let value = call(&mut err);
    // SAFETY: the engine either left `err` null or stored a message we own.
    match unsafe { take_engine_string(err) } {
        Some(message) => Err(kind(message)),
        None => Ok(value),
    }
}

/// An open database.
///
/// `'r` is the lifetime of the shared resources (cache, filter policy,
/// environment) set on the options it was opened with.
pub struct Database<'r> {
    handle: Handle<sys::emberkv_t>,
    path: PathBuf,
    _resources: PhantomData<&'r ()>,
}

impl<'r> Database<'r> {
    /// Open the database in `path`.
    ///
    /// Fails with [`Error::Open`] carrying the engine's message when the
    /// directory is missing and `create_if_missing` is off, when it exists
    /// and `error_if_exists` is on, when another handle holds the directory
    /// lock, or when recovery finds corruption under `paranoid_checks`.
    pub fn open(options: &Options<'r>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path_to_cstring(&path)?;

        // SAFETY: the options handle is live and `name` outlives the call.
        let raw = engine_call(Error::Open, |err| unsafe {
            sys::emberkv_open(options.as_const(), name.as_ptr(), err)
        })?;
        let handle = Handle::try_from_raw(raw)
            .ok_or_else(|| Error::internal("open returned no database and no error"))?;

        tracing::debug!(path = %path.display(), "database opened");
        Ok(Self {
            handle,
            path,
            _resources: PhantomData,
        })
    }

    /// Insert or overwrite `key`. Empty keys and values are allowed.
    pub fn put(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        // SAFETY: all handles are live and the slices outlive the call.
        engine_call(Error::Write, |err| unsafe {
            sys::emberkv_put(
                self.handle.as_ptr(),
                options.as_const(),
                key.as_ptr().cast(),
                key.len(),
                value.as_ptr().cast(),
                value.len(),
                err,
            )
        })
    }

    /// The value of `key`, or `None` when it is absent or deleted.
    pub fn get(&self, options: &ReadOptions<'_>, key: &[u8]) -> Result<Option<Bytes>> {
        let mut len = 0;
        // SAFETY: as above; `len` is written before the call returns.
        let raw = engine_call(Error::Read, |err| unsafe {
            sys::emberkv_get(
                self.handle.as_ptr(),
                options.as_const(),
                key.as_ptr().cast(),
                key.len(),
                &mut len,
                err,
            )
        })?;
        if raw.is_null() {
            return Ok(None);
        }

        // SAFETY: the engine returned `len` readable bytes that we now own.
        let value = unsafe {
            let value = Bytes::copy_from_slice(std::slice::from_raw_parts(raw.cast::<u8>(), len));
            sys::emberkv_free(raw.cast());
            value
        };
        Ok(Some(value))
    }

    /// Remove `key`. Removing a key that does not exist succeeds.
    pub fn delete(&self, options: &WriteOptions, key: &[u8]) -> Result<()> {
        // SAFETY: as for `put`.
        engine_call(Error::Write, |err| unsafe {
            sys::emberkv_delete(
                self.handle.as_ptr(),
                options.as_const(),
                key.as_ptr().cast(),
                key.len(),
                err,
            )
        })
    }

    /// Compact the keys from `start` through `limit`. An empty bound leaves
    /// that side open, so two empty slices compact the whole keyspace.
    ///
    /// Blocks until the compaction is done. Failures are logged by the
    /// engine and, under `paranoid_checks`, turn the database read-only.
    pub fn compact_range(&self, start: &[u8], limit: &[u8]) {
        let bound = |key: &[u8]| {
            if key.is_empty() {
                ptr::null()
            } else {
                key.as_ptr().cast::<c_char>()
            }
        };
        tracing::debug!(start_len = start.len(), limit_len = limit.len(), "compacting range");
        // SAFETY: the handle is live and non-null bounds point into slices
        // that outlive the call.
        unsafe {
            sys::emberkv_compact_range(
                self.handle.as_ptr(),
                bound(start),
                start.len(),
                bound(limit),
                limit.len(),
            )
        };
    }

    /// Take a snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(self)
    }

    /// An engine property such as `emberkv.stats` or
    /// `emberkv.estimate-num-keys`; `None` for unknown names.
    pub fn property(&self, name: &str) -> Option<String> {
        let name = to_cstring(name, "property name").ok()?;
        // SAFETY: the handle is live; the returned string is ours to free.
        unsafe {
            take_engine_string(sys::emberkv_property_value(
                self.handle.as_ptr(),
                name.as_ptr(),
            ))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush pending state, release the directory lock and free the engine
    /// instance.
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "closing database");
        drop(self);
    }

    /// Delete every database file in `path`. The database must not be open.
    pub fn destroy(options: &Options<'_>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = path_to_cstring(path)?;
        // SAFETY: the options handle is live and `name` outlives the call.
        engine_call(Error::Maintenance, |err| unsafe {
            sys::emberkv_destroy_db(options.as_const(), name.as_ptr(), err)
        })?;
        tracing::debug!(path = %path.display(), "database destroyed");
        Ok(())
    }

    /// Rebuild a database that no longer opens from whatever table and log
    /// data is still readable. The database must not be open.
    pub fn repair(options: &Options<'_>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = path_to_cstring(path)?;
        // SAFETY: as for `destroy`.
        engine_call(Error::Maintenance, |err| unsafe {
            sys::emberkv_repair_db(options.as_const(), name.as_ptr(), err)
        })?;
        tracing::debug!(path = %path.display(), "database repaired");
        Ok(())
    }

    pub(crate) fn as_ptr(&self) -> *mut sys::emberkv_t {
        self.handle.as_ptr()
    }
}

impl std::fmt::Debug for Database<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

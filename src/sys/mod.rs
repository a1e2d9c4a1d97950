//! Handle-level engine API.
//!
//! This is the engine side of the boundary. Everything here speaks in raw
//! pointers and C-encoded scalars: objects are created by a `*_create` (or
//! `emberkv_open`) call that returns a pointer and are destroyed by exactly
//! one matching `*_destroy` (or `emberkv_close`) call. Errors come back as
//! an engine-allocated message written through an `errptr` out-parameter
//! and must be released with [`emberkv_free`].
//!
//! Nothing in this module is safe to call directly. The wrappers in the
//! crate root own the pointers and guarantee the one-release rule.
//!
//! The engine keeps a count of live objects per kind; [`live_objects`]
//! exposes it so tests can prove that a teardown left nothing behind.

#![allow(non_camel_case_types)]

use std::alloc::Layout;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use libc::{c_char, c_void};

mod cache;
mod compaction;
mod db;
mod env;
mod filter;
mod memtable;
mod options;
mod table;
mod wal;

pub use cache::*;
pub use db::*;
pub use env::*;
pub use filter::*;
pub use options::*;

/// Kinds of engine objects tracked by the live-object counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectKind {
    Options,
    ReadOptions,
    WriteOptions,
    UniversalCompactionOptions,
    Cache,
    FilterPolicy,
    Env,
    Snapshot,
    Database,
}

const KIND_COUNT: usize = 9;

static LIVE: [AtomicUsize; KIND_COUNT] = [
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
];

pub(crate) fn track_create(kind: ObjectKind) {
    LIVE[kind as usize].fetch_add(1, Ordering::SeqCst);
}

pub(crate) fn track_destroy(kind: ObjectKind) {
    let previous = LIVE[kind as usize].fetch_sub(1, Ordering::SeqCst);
    debug_assert!(previous > 0, "{:?} destroyed more often than created", kind);
}

/// Number of engine objects of each kind that have been created and not
/// yet destroyed, across the whole process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub options: usize,
    pub read_options: usize,
    pub write_options: usize,
    pub universal_compaction_options: usize,
    pub caches: usize,
    pub filter_policies: usize,
    pub envs: usize,
    pub snapshots: usize,
    pub databases: usize,
}

impl LiveObjects {
    /// Sum over all kinds.
    pub fn total(&self) -> usize {
        self.options
            + self.read_options
            + self.write_options
            + self.universal_compaction_options
            + self.caches
            + self.filter_policies
            + self.envs
            + self.snapshots
            + self.databases
    }
}

/// Snapshot of the engine's resource accounting.
pub fn live_objects() -> LiveObjects {
    let get = |kind: ObjectKind| LIVE[kind as usize].load(Ordering::SeqCst);
    LiveObjects {
        options: get(ObjectKind::Options),
        read_options: get(ObjectKind::ReadOptions),
        write_options: get(ObjectKind::WriteOptions),
        universal_compaction_options: get(ObjectKind::UniversalCompactionOptions),
        caches: get(ObjectKind::Cache),
        filter_policies: get(ObjectKind::FilterPolicy),
        envs: get(ObjectKind::Env),
        snapshots: get(ObjectKind::Snapshot),
        databases: get(ObjectKind::Database),
    }
}

/// Move a value to the heap, count it, and hand out the pointer.
pub(crate) fn into_raw<T>(kind: ObjectKind, value: T) -> *mut T {
    track_create(kind);
    Box::into_raw(Box::new(value))
}

/// Reclaim and drop a pointer produced by [`into_raw`].
///
/// # Safety
///
/// `ptr` must come from `into_raw` with the same `kind` and must not have
/// been passed here before.
pub(crate) unsafe fn drop_raw<T>(kind: ObjectKind, ptr: *mut T) {
    if ptr.is_null() {
        return;
    }
    drop(Box::from_raw(ptr));
    track_destroy(kind);
}

/// Copy bytes into a `malloc` allocation the caller releases with
/// [`emberkv_free`].
pub(crate) fn malloc_copy(data: &[u8]) -> *mut c_char {
    // SAFETY: the allocation is at least one byte and `data.len()` bytes
    // are copied into it.
    unsafe {
        let size = data.len().max(1);
        let buf = libc::malloc(size) as *mut u8;
        if buf.is_null() {
            let layout = Layout::from_size_align(size, 1).unwrap_or(Layout::new::<u8>());
            std::alloc::handle_alloc_error(layout);
        }
        ptr::copy_nonoverlapping(data.as_ptr(), buf, data.len());
        buf as *mut c_char
    }
}

/// NUL-terminated engine string, released with [`emberkv_free`].
pub(crate) fn engine_string(msg: &str) -> *mut c_char {
    let mut bytes = Vec::with_capacity(msg.len() + 1);
    bytes.extend(msg.bytes().filter(|&b| b != 0));
    bytes.push(0);
    malloc_copy(&bytes)
}

/// Store `msg` in `errptr`, replacing (and freeing) any earlier message.
///
/// # Safety
///
/// `errptr` must be null or point to a valid `*mut c_char` slot.
pub(crate) unsafe fn set_error(errptr: *mut *mut c_char, msg: &str) {
    if errptr.is_null() {
        return;
    }
    if !(*errptr).is_null() {
        emberkv_free((*errptr).cast());
    }
    *errptr = engine_string(msg);
}

/// Release memory the engine allocated for a value or message.
///
/// # Safety
///
/// `ptr` must be null or come from the engine and not be freed twice.
pub unsafe fn emberkv_free(ptr: *mut c_void) {
    libc::free(ptr);
}

//! Owned engine handles.
//!
//! Every engine object is created by one call and must be destroyed by
//! exactly one matching call. [`Handle`] owns such a pointer: it is never
//! null, it is not `Clone`, and the destroy call runs from `Drop`. A double
//! release therefore cannot be written, and an early return or `?` on an
//! error path still releases the object.

use std::alloc::{handle_alloc_error, Layout};
use std::ptr::NonNull;

use crate::sys;

/// Engine object types with a matching destroy call.
pub(crate) trait Release {
    /// # Safety
    ///
    /// `ptr` must be a live object of this type that is never used again.
    unsafe fn release(ptr: *mut Self);
}

/// Sole owner of one engine object.
pub(crate) struct Handle<T: Release> {
    ptr: NonNull<T>,
}

impl<T: Release> Handle<T> {
    /// Take ownership of a freshly created object. A null pointer means the
    /// engine could not allocate it, which is treated like any other
    /// allocation failure.
    pub fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(ptr) => Self { ptr },
            None => handle_alloc_error(Layout::new::<T>()),
        }
    }

    /// Like [`Handle::from_raw`], but for calls where null signals a
    /// reported failure rather than an allocation failure.
    pub fn try_from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub fn as_const(&self) -> *const T {
        self.ptr.as_ptr()
    }
}

impl<T: Release> Drop for Handle<T> {
    fn drop(&mut self) {
        // SAFETY: the pointer is owned by this handle alone and dropped once.
        unsafe { T::release(self.ptr.as_ptr()) }
    }
}

// SAFETY: a handle only hands out the pointer; thread safety is that of
// the engine object it owns.
unsafe impl<T: Release + Send> Send for Handle<T> {}
unsafe impl<T: Release + Sync> Sync for Handle<T> {}

macro_rules! release_with {
    ($($ty:ty => $destroy:path;)*) => {
        $(
            impl Release for $ty {
                unsafe fn release(ptr: *mut Self) {
                    $destroy(ptr)
                }
            }
        )*
    };
}

release_with! {
    sys::emberkv_options_t => sys::emberkv_options_destroy;
    sys::emberkv_readoptions_t => sys::emberkv_readoptions_destroy;
    sys::emberkv_writeoptions_t => sys::emberkv_writeoptions_destroy;
    sys::emberkv_universal_compaction_options_t => sys::emberkv_universal_compaction_options_destroy;
    sys::emberkv_cache_t => sys::emberkv_cache_destroy;
    sys::emberkv_filterpolicy_t => sys::emberkv_filterpolicy_destroy;
    sys::emberkv_env_t => sys::emberkv_env_destroy;
    sys::emberkv_t => sys::emberkv_close;
}

//! Background thread environment.

use crate::handle::Handle;
use crate::sys;

/// The thread pools a database runs background compactions on.
///
/// [`Env::default_env`] refers to one process-wide environment; dropping
/// such a handle leaves the shared pools running. An environment made with
/// [`Env::new`] has private pools that stop when the last database using it
/// is gone.
pub struct Env {
    handle: Handle<sys::emberkv_env_t>,
}

impl Env {
    pub fn new() -> Self {
        Self {
            handle: Handle::from_raw(sys::emberkv_create_env()),
        }
    }

    pub fn default_env() -> Self {
        Self {
            handle: Handle::from_raw(sys::emberkv_create_default_env()),
        }
    }

    /// Size of the low-priority pool used for compactions.
    pub fn set_background_threads(&mut self, n: i32) -> &mut Self {
        // SAFETY: the handle is live and `&mut self` rules out other users.
        unsafe { sys::emberkv_env_set_background_threads(self.handle.as_ptr(), n) };
        self
    }

    /// Size of the high-priority pool, used for memtable flushes when
    /// `max_background_flushes` is positive.
    pub fn set_high_priority_background_threads(&mut self, n: i32) -> &mut Self {
        // SAFETY: as above.
        unsafe { sys::emberkv_env_set_high_priority_background_threads(self.handle.as_ptr(), n) };
        self
    }

    pub(crate) fn as_const(&self) -> *const sys::emberkv_env_t {
        self.handle.as_const()
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env").finish_non_exhaustive()
    }
}

//! Universal compaction settings.

use crate::handle::Handle;
use crate::sys;

use super::UniversalStopStyle;

/// Settings used when the compaction style is
/// [`CompactionStyle::Universal`](super::CompactionStyle::Universal).
///
/// [`Options::set_universal_compaction_options`](super::Options::set_universal_compaction_options)
/// copies them, so this value may be dropped right after.
pub struct UniversalCompactionOptions {
    handle: Handle<sys::emberkv_universal_compaction_options_t>,
}

impl UniversalCompactionOptions {
    pub fn new() -> Self {
        Self {
            handle: Handle::from_raw(sys::emberkv_universal_compaction_options_create()),
        }
    }

    /// Percentage of flexibility when comparing file sizes.
    pub fn set_size_ratio(&mut self, ratio: i32) -> &mut Self {
        // SAFETY: the handle is live and `&mut self` excludes other users.
        unsafe { sys::emberkv_universal_compaction_options_set_size_ratio(self.handle.as_ptr(), ratio) };
        self
    }

    pub fn set_min_merge_width(&mut self, width: i32) -> &mut Self {
        // SAFETY: as above.
        unsafe {
            sys::emberkv_universal_compaction_options_set_min_merge_width(self.handle.as_ptr(), width)
        };
        self
    }

    pub fn set_max_merge_width(&mut self, width: i32) -> &mut Self {
        // SAFETY: as above.
        unsafe {
            sys::emberkv_universal_compaction_options_set_max_merge_width(self.handle.as_ptr(), width)
        };
        self
    }

    pub fn set_max_size_amplification_percent(&mut self, percent: i32) -> &mut Self {
        // SAFETY: as above.
        unsafe {
            sys::emberkv_universal_compaction_options_set_max_size_amplification_percent(
                self.handle.as_ptr(),
                percent,
            )
        };
        self
    }

    /// -1 compresses everything.
    pub fn set_compression_size_percent(&mut self, percent: i32) -> &mut Self {
        // SAFETY: as above.
        unsafe {
            sys::emberkv_universal_compaction_options_set_compression_size_percent(
                self.handle.as_ptr(),
                percent,
            )
        };
        self
    }

    pub fn set_stop_style(&mut self, style: UniversalStopStyle) -> &mut Self {
        // SAFETY: as above.
        unsafe {
            sys::emberkv_universal_compaction_options_set_stop_style(
                self.handle.as_ptr(),
                style.as_raw(),
            )
        };
        self
    }

    pub(crate) fn as_const(&self) -> *const sys::emberkv_universal_compaction_options_t {
        self.handle.as_const()
    }
}

impl Default for UniversalCompactionOptions {
    fn default() -> Self {
        Self::new()
    }
}

//! Scalar conversions between host values and the engine's parameter encodings.
//!
//! The handle API is not consistent about booleans: most setters take a
//! one-byte flag, a handful take an `int`. Both encodings are kept as
//! separate functions and each setter picks the one its engine entry point
//! expects; see the per-setter notes in `options`.

use std::ffi::{CStr, CString};
use std::path::Path;

use libc::{c_char, c_int, c_uchar};

use crate::sys;
use crate::{Error, Result};

/// Encode a boolean as the engine's one-byte flag.
#[inline]
pub fn bool_to_uchar(b: bool) -> c_uchar {
    if b {
        1
    } else {
        0
    }
}

/// Decode the engine's one-byte flag. Any non-zero byte is true.
#[inline]
pub fn uchar_to_bool(uc: c_uchar) -> bool {
    uc != 0
}

/// Encode a boolean as the engine's integer flag.
#[inline]
pub fn btoi(b: bool) -> c_int {
    if b {
        1
    } else {
        0
    }
}

/// Decode the engine's integer flag.
#[inline]
pub fn itob(i: c_int) -> bool {
    i != 0
}

/// NUL-terminate a host string for a call that only borrows it.
///
/// The engine does not take ownership: the pointer obtained from the
/// returned `CString` is valid only while that value is alive, so callers
/// keep it in a local across the call.
pub fn to_cstring(s: &str, what: &str) -> Result<CString> {
    CString::new(s)
        .map_err(|_| Error::config(format!("{} must not contain NUL bytes: {:?}", what, s)))
}

/// NUL-terminate a filesystem path, preserving non-UTF-8 bytes on unix.
pub fn path_to_cstring(path: &Path) -> Result<CString> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            Error::config(format!("path must not contain NUL bytes: {}", path.display()))
        })
    }
    #[cfg(not(unix))]
    {
        let s = path
            .to_str()
            .ok_or_else(|| Error::config(format!("path is not valid UTF-8: {}", path.display())))?;
        to_cstring(s, "path")
    }
}

/// Convert a NUL-terminated engine string back into a host path.
pub(crate) fn cstr_to_path(s: &CStr) -> std::path::PathBuf {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        std::path::PathBuf::from(std::ffi::OsStr::from_bytes(s.to_bytes()))
    }
    #[cfg(not(unix))]
    {
        std::path::PathBuf::from(s.to_string_lossy().into_owned())
    }
}

/// Copy an engine-allocated message into a `String` and free the original.
///
/// # Safety
///
/// `ptr` must be null or a string allocated by the engine that nothing else
/// will free.
pub(crate) unsafe fn take_engine_string(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let message = CStr::from_ptr(ptr).to_string_lossy().into_owned();
    sys::emberkv_free(ptr.cast());
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uchar_flag_is_bijective() {
        for b in [true, false] {
            assert_eq!(uchar_to_bool(bool_to_uchar(b)), b);
        }
        assert_eq!(bool_to_uchar(true), 1);
        assert_eq!(bool_to_uchar(false), 0);
        assert!(uchar_to_bool(0xFF));
    }

    #[test]
    fn test_int_flag() {
        assert_eq!(btoi(true), 1);
        assert_eq!(btoi(false), 0);
        assert!(itob(7));
        assert!(!itob(0));
    }

    #[test]
    fn test_to_cstring_rejects_interior_nul() {
        assert!(to_cstring("wal\0dir", "wal_dir").unwrap_err().is_configuration());
        assert_eq!(to_cstring("wal", "wal_dir").unwrap().as_bytes(), b"wal");
    }

    #[test]
    fn test_path_roundtrip() {
        let path = Path::new("/tmp/emberkv/db");
        let c = path_to_cstring(path).unwrap();
        assert_eq!(cstr_to_path(&c), path);
    }

    #[test]
    fn test_take_engine_string_null() {
        assert_eq!(unsafe { take_engine_string(std::ptr::null_mut()) }, None);
    }

    #[test]
    fn test_take_engine_string_frees() {
        let raw = sys::engine_string("Corruption: bad block");
        let message = unsafe { take_engine_string(raw) };
        assert_eq!(message.as_deref(), Some("Corruption: bad block"));
    }
}

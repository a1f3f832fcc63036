//! String and error marshaling across the engine boundary.

use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use rusqlite::ffi;
use sqlbridge_error::{BridgeError, Result};

/// Convert a Rust string into a `CString` for an engine call.
///
/// # Errors
///
/// Returns [`BridgeError::InteriorNul`] naming `what` when `value` contains
/// a NUL byte.
pub fn to_cstring(what: &str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| BridgeError::InteriorNul {
        what: what.to_owned(),
    })
}

/// Copy `s` into memory owned by the engine allocator.
///
/// The engine frees such strings with `sqlite3_free` (error messages handed
/// back through `pzErr`/`zErrMsg`, `idxStr` with `needToFreeIdxStr`). The copy
/// stops at the first NUL byte. Returns null if the allocation fails.
///
/// # Safety
///
/// The returned pointer must be released with `sqlite3_free`, either by the
/// caller or by handing it to an engine slot that takes ownership.
pub unsafe fn sqlite_string(s: &str) -> *mut c_char {
    let bytes = s.as_bytes();
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let buf = ffi::sqlite3_malloc64((len + 1) as u64).cast::<u8>();
    if buf.is_null() {
        return ptr::null_mut();
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), buf, len);
    *buf.add(len) = 0;
    buf.cast()
}

/// Borrow a NUL-terminated engine string as UTF-8, replacing invalid
/// sequences. Returns `None` for a null pointer.
///
/// # Safety
///
/// `p` must be null or point to a NUL-terminated string that stays valid
/// for `'a`.
pub unsafe fn text_from_ptr<'a>(p: *const c_char) -> Option<Cow<'a, str>> {
    if p.is_null() {
        None
    } else {
        Some(CStr::from_ptr(p).to_string_lossy())
    }
}

/// Build a [`BridgeError::Engine`] for status `rc`, attaching the handle's
/// current error message.
///
/// The message reads `"<errstr>: <errmsg> (<rc>)"`, collapsed to
/// `"<errmsg> (<rc>)"` when the engine's generic text and the handle's
/// message are identical.
///
/// # Safety
///
/// `db` must be null or a live connection handle.
pub unsafe fn error_from_handle(db: *mut ffi::sqlite3, rc: c_int) -> BridgeError {
    let generic = text_from_ptr(ffi::sqlite3_errstr(rc)).unwrap_or(Cow::Borrowed("unknown error"));
    let specific = if db.is_null() {
        None
    } else {
        text_from_ptr(ffi::sqlite3_errmsg(db))
    };
    let message = match specific {
        Some(msg) if msg != generic => format!("{generic}: {msg} ({rc})"),
        _ => format!("{generic} ({rc})"),
    };
    BridgeError::engine(rc, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cstring_rejects_interior_nul() {
        assert_eq!(to_cstring("name", "main").unwrap().as_bytes(), b"main");
        let err = to_cstring("source database name", "ma\0in").unwrap_err();
        assert!(matches!(err, BridgeError::InteriorNul { ref what } if what == "source database name"));
    }

    #[test]
    fn sqlite_string_round_trip() {
        unsafe {
            let p = sqlite_string("no such column: q");
            assert!(!p.is_null());
            assert_eq!(text_from_ptr(p).unwrap(), "no such column: q");
            ffi::sqlite3_free(p.cast());

            let p = sqlite_string("cut\0here");
            assert_eq!(text_from_ptr(p).unwrap(), "cut");
            ffi::sqlite3_free(p.cast());
        }
    }

    #[test]
    fn null_text_is_none() {
        unsafe {
            assert!(text_from_ptr(ptr::null()).is_none());
        }
    }

    #[test]
    fn error_without_handle_uses_generic_text() {
        let err = unsafe { error_from_handle(ptr::null_mut(), ffi::SQLITE_BUSY) };
        assert_eq!(err.to_string(), "database is locked (5)");
        assert!(err.is_transient());
    }
}

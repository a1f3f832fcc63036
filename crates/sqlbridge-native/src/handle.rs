//! Owned native connection handles.

use std::path::PathBuf;
use std::ptr::{self, NonNull};

use rusqlite::ffi;
use sqlbridge_error::{BridgeError, Result};

use crate::flags::OpenFlags;
use crate::marshal::{error_from_handle, text_from_ptr, to_cstring};

/// An exclusively owned `sqlite3*` connection.
///
/// The handle is closed exactly once: explicitly through [`NativeDb::close`],
/// which reports the engine status, or implicitly on drop, which can only
/// log it.
#[derive(Debug)]
pub struct NativeDb {
    db: Option<NonNull<ffi::sqlite3>>,
    location: String,
    flags: OpenFlags,
}

// SAFETY: the bundled engine is built thread-safe and a `NativeDb` is never
// shared, only moved between threads together with its sole owner.
unsafe impl Send for NativeDb {}

impl NativeDb {
    /// Open `location` with `flags` through `sqlite3_open_v2`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InteriorNul`] if the location cannot be marshaled, or
    /// [`BridgeError::CannotOpen`] carrying the engine's message. A handle the
    /// engine allocated for a failed open is released before returning.
    pub fn open(location: &str, flags: OpenFlags) -> Result<Self> {
        let c_location = to_cstring("database location", location)?;
        let mut raw: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: `c_location` outlives the call and `raw` is a valid out slot.
        let rc = unsafe {
            ffi::sqlite3_open_v2(c_location.as_ptr(), &mut raw, flags.bits(), ptr::null())
        };
        if rc != ffi::SQLITE_OK {
            // SAFETY: `raw` is null or a handle the engine expects us to close.
            let err = unsafe { error_from_handle(raw, rc) };
            if !raw.is_null() {
                // SAFETY: see above; nothing was prepared on a handle whose
                // open failed, so a plain close releases it.
                unsafe {
                    ffi::sqlite3_close(raw);
                }
            }
            tracing::debug!(
                target: "sqlbridge.native",
                location,
                rc,
                "sqlite3_open_v2 failed"
            );
            return Err(BridgeError::CannotOpen {
                path: PathBuf::from(location),
                detail: err.to_string(),
            });
        }
        let Some(db) = NonNull::new(raw) else {
            return Err(BridgeError::CannotOpen {
                path: PathBuf::from(location),
                detail: "engine returned no handle".to_owned(),
            });
        };
        tracing::debug!(target: "sqlbridge.native", location, flags = flags.bits(), "opened");
        Ok(Self {
            db: Some(db),
            location: location.to_owned(),
            flags,
        })
    }

    /// The raw handle, or null once closed.
    #[must_use]
    pub fn as_ptr(&self) -> *mut ffi::sqlite3 {
        self.db.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// The location this handle was opened with.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The flags this handle was opened with.
    #[must_use]
    pub const fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// The handle's current error message (`sqlite3_errmsg`).
    #[must_use]
    pub fn errmsg(&self) -> Option<String> {
        if self.db.is_none() {
            return None;
        }
        // SAFETY: the handle is open.
        unsafe { text_from_ptr(ffi::sqlite3_errmsg(self.as_ptr())).map(|s| s.into_owned()) }
    }

    /// Error for status `rc` with this handle's message attached.
    #[must_use]
    pub fn error(&self, rc: i32) -> BridgeError {
        // SAFETY: `as_ptr` is null or live.
        unsafe { error_from_handle(self.as_ptr(), rc) }
    }

    /// Close the handle with `sqlite3_close`.
    ///
    /// Every backup object bound to the handle must be finished first.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the close is rejected (BUSY while a
    /// backup object or statement is still outstanding).
    pub fn close(mut self) -> Result<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<()> {
        let Some(db) = self.db.take() else {
            return Ok(());
        };
        // SAFETY: we own the handle. Owners of backup objects on it
        // (`BackupSession`) finish them before closing.
        let rc = unsafe { ffi::sqlite3_close(db.as_ptr()) };
        if rc == ffi::SQLITE_OK {
            tracing::debug!(target: "sqlbridge.native", location = %self.location, "closed");
            Ok(())
        } else {
            // SAFETY: a rejected close leaves the handle intact.
            Err(unsafe { error_from_handle(db.as_ptr(), rc) })
        }
    }
}

impl Drop for NativeDb {
    fn drop(&mut self) {
        if let Err(e) = self.close_inner() {
            tracing::warn!(
                target: "sqlbridge.native",
                location = %self.location,
                error = %e,
                "close on drop failed"
            );
        }
    }
}

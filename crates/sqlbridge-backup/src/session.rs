//! The native backup session and the step contract the driver consumes.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use sqlbridge_error::{BridgeError, ErrorCode, Result};
use sqlbridge_native::{NativeDb, OpenFlags, ffi, to_cstring};

/// Result of one bounded unit of copy work.
#[derive(Debug)]
pub enum StepOutcome {
    /// Pages were copied and more remain.
    Continuing,
    /// The copy is logically complete.
    Done,
    /// The engine reported BUSY or LOCKED; try again after the delay.
    Retryable(BridgeError),
    /// Any other engine status. The loop must stop.
    Fatal(BridgeError),
}

impl StepOutcome {
    /// Whether the loop must stop after this outcome.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Fatal(_))
    }
}

/// The operations the driving loop needs from a backup in progress.
pub trait BackupStepper {
    /// Copy up to `pages` pages (all remaining pages if negative).
    fn step(&mut self, pages: i32) -> StepOutcome;

    /// Pages still to be copied, as of the last step.
    fn remaining(&self) -> i32;

    /// Total pages in the source, as of the last step.
    fn pagecount(&self) -> i32;
}

/// Two exclusively owned connections and the engine backup object between
/// them.
///
/// Created by [`BackupSession::open`]; torn down by [`BackupSession::close`]
/// or, failing that, on drop.
#[derive(Debug)]
pub struct BackupSession {
    backup: Option<NonNull<ffi::sqlite3_backup>>,
    source: Option<NativeDb>,
    dest: Option<NativeDb>,
    terminal: bool,
    steps: u64,
}

// SAFETY: the session exclusively owns both connections and the backup
// object; nothing else holds these pointers.
unsafe impl Send for BackupSession {}

impl BackupSession {
    /// Open `dest_location` read-write (creating it) and `src_location`
    /// read-only, both URI-capable, and start a backup from `src_db` on the
    /// source into `dest_db` on the destination.
    ///
    /// # Errors
    ///
    /// Marshaling, open, or `sqlite3_backup_init` failures. Every handle
    /// opened before the failure is closed before returning.
    pub fn open(dest_location: &str, dest_db: &str, src_location: &str, src_db: &str) -> Result<Self> {
        let dest_name = to_cstring("destination database name", dest_db)?;
        let src_name = to_cstring("source database name", src_db)?;

        let dest = NativeDb::open(dest_location, OpenFlags::backup_destination())?;
        let source = NativeDb::open(src_location, OpenFlags::backup_source())?;

        // SAFETY: both handles are open and both names outlive the call.
        let raw = unsafe {
            ffi::sqlite3_backup_init(
                dest.as_ptr(),
                dest_name.as_ptr(),
                source.as_ptr(),
                src_name.as_ptr(),
            )
        };
        let Some(backup) = NonNull::new(raw) else {
            // The engine records init failures on the destination handle.
            // SAFETY: the destination handle is open.
            let rc = unsafe { ffi::sqlite3_errcode(dest.as_ptr()) };
            return Err(dest.error(rc));
        };

        tracing::debug!(
            target: "sqlbridge.backup",
            source = src_location,
            dest = dest_location,
            src_db,
            dest_db,
            "backup session opened"
        );
        Ok(Self {
            backup: Some(backup),
            source: Some(source),
            dest: Some(dest),
            terminal: false,
            steps: 0,
        })
    }

    /// Whether a step returned `Done` or `Fatal`, or the session was closed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Steps issued so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Finish the backup object, then close the source, then the
    /// destination.
    ///
    /// All three actions run even if an earlier one fails; the first error
    /// is returned. Closing an already closed session is a no-op.
    ///
    /// # Errors
    ///
    /// The first teardown error.
    pub fn close(&mut self) -> Result<()> {
        self.terminal = true;
        let mut first: Option<BridgeError> = None;

        if let Some(backup) = self.backup.take() {
            // SAFETY: the backup object is live and never used after finish.
            let rc = unsafe { ffi::sqlite3_backup_finish(backup.as_ptr()) };
            if rc != ffi::SQLITE_OK {
                let err = self
                    .dest
                    .as_ref()
                    .map_or_else(|| BridgeError::engine(rc, "backup finish failed"), |d| d.error(rc));
                tracing::warn!(target: "sqlbridge.backup", error = %err, "backup finish failed");
                first.get_or_insert(err);
            }
        }
        if let Some(source) = self.source.take() {
            if let Err(err) = source.close() {
                tracing::warn!(target: "sqlbridge.backup", error = %err, "closing source failed");
                first.get_or_insert(err);
            }
        }
        if let Some(dest) = self.dest.take() {
            if let Err(err) = dest.close() {
                tracing::warn!(target: "sqlbridge.backup", error = %err, "closing destination failed");
                first.get_or_insert(err);
            }
        }

        first.map_or(Ok(()), Err)
    }

    fn classify(&mut self, rc: i32) -> StepOutcome {
        match ErrorCode::from_raw(rc) {
            Some(ErrorCode::Ok) => StepOutcome::Continuing,
            Some(ErrorCode::Done) => {
                self.terminal = true;
                StepOutcome::Done
            }
            Some(ErrorCode::Busy | ErrorCode::Locked) => StepOutcome::Retryable(self.dest_error(rc)),
            _ => {
                self.terminal = true;
                StepOutcome::Fatal(self.dest_error(rc))
            }
        }
    }

    fn dest_error(&self, rc: i32) -> BridgeError {
        self.dest
            .as_ref()
            .map_or_else(|| BridgeError::engine(rc, format!("backup step failed ({rc})")), |d| d.error(rc))
    }
}

impl BackupStepper for BackupSession {
    fn step(&mut self, pages: i32) -> StepOutcome {
        if self.terminal {
            return StepOutcome::Fatal(BridgeError::misuse(
                "backup step after the session reached a terminal state",
            ));
        }
        let Some(backup) = self.backup else {
            return StepOutcome::Fatal(BridgeError::misuse("backup step on a closed session"));
        };
        self.steps += 1;
        // SAFETY: the backup object is live until `close`.
        let rc = unsafe { ffi::sqlite3_backup_step(backup.as_ptr(), pages) };
        self.classify(rc)
    }

    fn remaining(&self) -> i32 {
        // SAFETY: the backup object is live until `close`.
        self.backup
            .map_or(0, |b| unsafe { ffi::sqlite3_backup_remaining(b.as_ptr()) })
    }

    fn pagecount(&self) -> i32 {
        // SAFETY: the backup object is live until `close`.
        self.backup
            .map_or(0, |b| unsafe { ffi::sqlite3_backup_pagecount(b.as_ptr()) })
    }
}

impl Drop for BackupSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(target: "sqlbridge.backup", error = %err, "backup session teardown on drop failed");
        }
    }
}

//! Connection open flags, analogous to `rusqlite::OpenFlags`.

use std::os::raw::c_int;

use rusqlite::ffi;

/// Subset of SQLite open flags the bridge uses.
///
/// The bit values are the engine's own `SQLITE_OPEN_*` constants, so
/// [`OpenFlags::bits`] can be passed straight to `sqlite3_open_v2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(c_int);

impl OpenFlags {
    /// Open the database in read-only mode.
    pub const READ_ONLY: Self = Self(ffi::SQLITE_OPEN_READONLY);

    /// Open the database for reading and writing.
    pub const READ_WRITE: Self = Self(ffi::SQLITE_OPEN_READWRITE);

    /// Create the database if it does not exist (combined with `READ_WRITE`).
    pub const CREATE: Self = Self(ffi::SQLITE_OPEN_CREATE);

    /// Interpret the location as a `file:` URI.
    pub const URI: Self = Self(ffi::SQLITE_OPEN_URI);

    /// Flags for the destination side of a backup: `READ_WRITE | CREATE | URI`.
    #[must_use]
    pub const fn backup_destination() -> Self {
        Self(Self::READ_WRITE.0 | Self::CREATE.0 | Self::URI.0)
    }

    /// Flags for the source side of a backup: `READ_ONLY | URI`.
    #[must_use]
    pub const fn backup_source() -> Self {
        Self(Self::READ_ONLY.0 | Self::URI.0)
    }

    /// Combine two flag sets with bitwise OR.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check if a flag is set.
    #[must_use]
    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Raw value for `sqlite3_open_v2`.
    #[must_use]
    pub const fn bits(self) -> c_int {
        self.0
    }
}

impl Default for OpenFlags {
    /// `READ_WRITE | CREATE`, the engine's default for `sqlite3_open`.
    fn default() -> Self {
        Self::READ_WRITE.union(Self::CREATE)
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_contain_rw_and_create() {
        let flags = OpenFlags::default();
        assert!(flags.contains(OpenFlags::READ_WRITE));
        assert!(flags.contains(OpenFlags::CREATE));
        assert!(!flags.contains(OpenFlags::URI));
    }

    #[test]
    fn backup_sides() {
        let dest = OpenFlags::backup_destination();
        assert!(dest.contains(OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::URI));
        assert!(!dest.contains(OpenFlags::READ_ONLY));

        let src = OpenFlags::backup_source();
        assert!(src.contains(OpenFlags::READ_ONLY));
        assert!(src.contains(OpenFlags::URI));
        assert!(!src.contains(OpenFlags::READ_WRITE));
        assert!(!src.contains(OpenFlags::CREATE));
    }

    #[test]
    fn bits_are_engine_constants() {
        assert_eq!(OpenFlags::READ_ONLY.bits(), 0x01);
        assert_eq!(OpenFlags::READ_WRITE.bits(), 0x02);
        assert_eq!(OpenFlags::CREATE.bits(), 0x04);
        assert_eq!(OpenFlags::URI.bits(), 0x40);
    }
}

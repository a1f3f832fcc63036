use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for sqlbridge operations.
///
/// Engine statuses surface as [`BridgeError::Engine`] with the numeric code
/// and the engine's own text; everything the bridge itself detects has a
/// structured variant.
#[derive(Error, Debug)]
pub enum BridgeError {
    // === Engine Errors ===
    /// Any non-OK status returned by the engine, with its message attached.
    ///
    /// `code` is the (possibly extended) result code as returned.
    #[error("{message}")]
    Engine { code: i32, message: String },

    /// A database could not be opened.
    #[error("unable to open database '{path}': {detail}")]
    CannotOpen { path: PathBuf, detail: String },

    // === Marshaling Errors ===
    /// A string destined for the engine contains an interior NUL byte.
    #[error("{what} contains an interior NUL byte")]
    InteriorNul { what: String },

    // === Configuration Errors ===
    /// Rejected option value.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    // === Control Flow ===
    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    // === Virtual Table Errors ===
    /// The module does not implement the requested capability.
    #[error("virtual table module does not support {capability}")]
    Unsupported { capability: &'static str },

    /// Attempt to write a read-only virtual table.
    #[error("attempt to write a readonly virtual table")]
    ReadOnly,

    /// Constraint violation reported by a module.
    #[error("constraint failed: {detail}")]
    Constraint { detail: String },

    /// A call arrived in a state where the contract does not allow it.
    #[error("library routine called out of sequence: {detail}")]
    Misuse { detail: String },

    /// A host module method failed.
    #[error("{0}")]
    Module(String),

    /// Internal logic error (a broken invariant or a caught panic).
    #[error("internal error: {0}")]
    Internal(String),
}

/// SQLite result/error codes.
///
/// These match the numeric values from C SQLite's `sqlite3.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Successful result.
    Ok = 0,
    /// Generic error.
    Error = 1,
    /// Internal logic error.
    Internal = 2,
    /// Access permission denied.
    Perm = 3,
    /// Callback requested abort.
    Abort = 4,
    /// Database file is locked.
    Busy = 5,
    /// Table is locked.
    Locked = 6,
    /// Out of memory.
    NoMem = 7,
    /// Attempt to write a read-only database.
    ReadOnly = 8,
    /// Interrupted by `sqlite3_interrupt()`.
    Interrupt = 9,
    /// Disk I/O error.
    IoErr = 10,
    /// Database disk image is malformed.
    Corrupt = 11,
    /// Not found (internal).
    NotFound = 12,
    /// Database or disk is full.
    Full = 13,
    /// Unable to open database file.
    CantOpen = 14,
    /// Locking protocol error.
    Protocol = 15,
    /// (Not used).
    Empty = 16,
    /// Database schema has changed.
    Schema = 17,
    /// String or BLOB exceeds size limit.
    TooBig = 18,
    /// Constraint violation.
    Constraint = 19,
    /// Data type mismatch.
    Mismatch = 20,
    /// Library used incorrectly.
    Misuse = 21,
    /// OS feature not available.
    NoLfs = 22,
    /// Authorization denied.
    Auth = 23,
    /// Not used.
    Format = 24,
    /// Bind parameter out of range.
    Range = 25,
    /// Not a database file.
    NotADb = 26,
    /// Notification (not an error).
    Notice = 27,
    /// Warning (not an error).
    Warning = 28,
    /// `sqlite3_step()` has another row ready.
    Row = 100,
    /// `sqlite3_step()` has finished executing.
    Done = 101,
}

impl ErrorCode {
    /// Status reported for a capability the module does not implement.
    pub const NOT_SUPPORTED: Self = Self::NoLfs;

    /// Decode the primary code of a (possibly extended) result code.
    #[must_use]
    pub const fn from_raw(rc: i32) -> Option<Self> {
        let code = match rc & 0xff {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::Internal,
            3 => Self::Perm,
            4 => Self::Abort,
            5 => Self::Busy,
            6 => Self::Locked,
            7 => Self::NoMem,
            8 => Self::ReadOnly,
            9 => Self::Interrupt,
            10 => Self::IoErr,
            11 => Self::Corrupt,
            12 => Self::NotFound,
            13 => Self::Full,
            14 => Self::CantOpen,
            15 => Self::Protocol,
            16 => Self::Empty,
            17 => Self::Schema,
            18 => Self::TooBig,
            19 => Self::Constraint,
            20 => Self::Mismatch,
            21 => Self::Misuse,
            22 => Self::NoLfs,
            23 => Self::Auth,
            24 => Self::Format,
            25 => Self::Range,
            26 => Self::NotADb,
            27 => Self::Notice,
            28 => Self::Warning,
            100 => Self::Row,
            101 => Self::Done,
            _ => return None,
        };
        Some(code)
    }
}

impl BridgeError {
    /// Map this error to the SQLite result code reported across the native
    /// boundary.
    #[allow(clippy::match_same_arms)]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Engine { code, .. } => match ErrorCode::from_raw(*code) {
                Some(code) => code,
                None => ErrorCode::Error,
            },
            Self::CannotOpen { .. } => ErrorCode::CantOpen,
            Self::InteriorNul { .. } | Self::InvalidConfig { .. } => ErrorCode::Misuse,
            Self::Cancelled => ErrorCode::Interrupt,
            Self::Unsupported { .. } => ErrorCode::NOT_SUPPORTED,
            Self::ReadOnly => ErrorCode::ReadOnly,
            Self::Constraint { .. } => ErrorCode::Constraint,
            Self::Misuse { .. } => ErrorCode::Misuse,
            Self::Module(_) => ErrorCode::Error,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// The raw code to hand back to the engine.
    ///
    /// Engine errors keep their extended code; everything else reports the
    /// primary code of [`Self::error_code`].
    pub const fn raw_code(&self) -> i32 {
        match self {
            Self::Engine { code, .. } => *code,
            other => other.error_code() as i32,
        }
    }

    /// Whether this is a transient error that may succeed on retry.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.error_code(),
            ErrorCode::Busy | ErrorCode::Locked
        ) && matches!(self, Self::Engine { .. })
    }

    /// Whether this error is the distinct cancellation error.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error means the capability does not exist, as opposed to
    /// having failed.
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Create an engine error.
    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        Self::Engine {
            code,
            message: message.into(),
        }
    }

    /// Create a misuse error.
    pub fn misuse(detail: impl Into<String>) -> Self {
        Self::Misuse {
            detail: detail.into(),
        }
    }

    /// Create a host module error.
    pub fn module(msg: impl Into<String>) -> Self {
        Self::Module(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `BridgeError`.
pub type Result<T> = std::result::Result<T, BridgeError>;

//! Online backup and Rust-defined virtual tables for SQLite.
//!
//! [`Connection`] pairs a `rusqlite` connection with the registry of
//! virtual-table modules registered on it. The backup entry point works on
//! database locations and needs no open connection.
//!
//! ```no_run
//! use sqlbridge::{BackupOptions, Connection, Cx, backup};
//!
//! let conn = Connection::open("live.db")?;
//! conn.sql().execute_batch("CREATE TABLE IF NOT EXISTS t(b INTEGER)")?;
//! backup(&Cx::new(), "copy.db", "live.db", BackupOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod connection;

pub use connection::Connection;
pub use sqlbridge_backup::{
    BackupOptions, BackupSession, BackupSettings, BackupStepper, StepOutcome, backup, run_backup,
};
pub use sqlbridge_error::{BridgeError, ErrorCode, Result};
pub use sqlbridge_native::OpenFlags;
pub use sqlbridge_types::{Cx, SqliteValue};
pub use sqlbridge_vtab::{
    ColumnContext, ConstraintOp, FunctionOverriding, IndexConstraint, IndexConstraintUsage,
    IndexInfo, IndexOrderBy, Module, ModuleRegistration, RenamableTable, SavepointTable,
    ScalarFunction, TableArgs, TransactionalTable, UpdatableTable, UpdateOp, VirtualTable,
    VirtualTableCursor,
};

//! Host-defined virtual tables.
//!
//! A [`Module`] is turned into a fully populated `sqlite3_module` whose
//! slots are monomorphized `extern "C"` shims. The engine's
//! calls are routed to the host's [`VirtualTable`] through a
//! [`TableInstance`] (capability routing, absent-capability answers) and to
//! its cursors through a [`ScanCursor`] (scan state machine). Values cross
//! the boundary as [`SqliteValue`](sqlbridge_types::SqliteValue).
//!
//! Registration is per connection through a [`ModuleRegistry`].
//!
//! Tracing: target `sqlbridge.vtab`. INFO on (un)registration, DEBUG per
//! dispatched call, WARN on host errors, ERROR on caught panics.

#![allow(
    unsafe_code,
    unsafe_op_in_unsafe_fn,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_safety_doc
)]

pub mod cursor;
mod dispatch;
pub mod index;
pub mod module;
pub mod registry;
pub mod table;
pub mod values;

pub use cursor::{CursorState, ScanCursor};
pub use index::{ConstraintOp, IndexConstraint, IndexConstraintUsage, IndexInfo, IndexOrderBy};
pub use module::{
    ColumnContext, FunctionOverriding, Module, RenamableTable, SavepointTable, ScalarFunction,
    TableArgs, TransactionalTable, UpdatableTable, UpdateOp, VirtualTable, VirtualTableCursor,
};
pub use registry::{ModuleRegistration, ModuleRegistry};
pub use table::TableInstance;

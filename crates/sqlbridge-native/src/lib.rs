//! The engine-library boundary.
//!
//! Everything that touches a raw `sqlite3*` outside of the virtual-table
//! shims lives here: opening and closing connections, turning engine
//! status codes into [`BridgeError`](sqlbridge_error::BridgeError)s, and
//! moving strings across the boundary with the right allocator.
//!
//! Tracing: target `sqlbridge.native`. DEBUG on open/close, WARN when a
//! handle has to be closed from `Drop` and the close fails.

#![allow(
    unsafe_code,
    unsafe_op_in_unsafe_fn,
    clippy::borrow_as_ptr,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod flags;
pub mod handle;
pub mod marshal;

pub use flags::OpenFlags;
pub use handle::NativeDb;
pub use marshal::{error_from_handle, sqlite_string, text_from_ptr, to_cstring};
/// Raw engine bindings (`libsqlite3-sys`, as re-exported by rusqlite).
pub use rusqlite::ffi;

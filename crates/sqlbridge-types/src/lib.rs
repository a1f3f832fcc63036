//! Shared value and context types for sqlbridge.
//!
//! [`SqliteValue`] is the dynamically typed value that crosses the native
//! boundary in both directions. [`cx::Cx`] threads cancellation through the
//! long-running backup loop.

pub mod cx;
pub mod value;

pub use cx::{CancelReason, Cx};
pub use value::SqliteValue;

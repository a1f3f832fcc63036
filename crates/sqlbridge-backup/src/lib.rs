//! Incremental online backup.
//!
//! A [`BackupSession`] owns a read-only source connection, a read-write
//! destination connection and the engine's backup object between them.
//! [`run_backup`] drives any [`BackupStepper`] through the step/retry loop:
//! cancellation is checked before every step and before every inter-step
//! wait, BUSY/LOCKED steps are retried, and the progress callback sees the
//! counters once per step.
//!
//! [`backup`] is the one-call entry point: open, drive, close.
//!
//! ```no_run
//! use std::time::Duration;
//! use sqlbridge_backup::{BackupOptions, backup};
//! use sqlbridge_types::Cx;
//!
//! let options = BackupOptions::default()
//!     .with_pages_per_step(100)
//!     .with_step_delay(Duration::from_millis(10))
//!     .with_progress(|remaining, total| eprintln!("{remaining}/{total}"));
//! backup(&Cx::new(), "copy.db", "live.db", options)?;
//! # Ok::<(), sqlbridge_error::BridgeError>(())
//! ```

pub mod config;
pub mod driver;
pub mod session;

pub use config::{BackupOptions, BackupSettings, ProgressFn};
pub use driver::{backup, run_backup};
pub use session::{BackupSession, BackupStepper, StepOutcome};

//! Backup options.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlbridge_error::{BridgeError, Result};

/// Default attached-database name on both sides.
pub const DEFAULT_DB_NAME: &str = "main";
/// Default page quantum per step.
pub const DEFAULT_PAGES_PER_STEP: i32 = 50;
/// Default wait between steps.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(250);

/// Progress callback: `(remaining, pagecount)` as sampled after a step.
pub type ProgressFn = Box<dyn FnMut(i32, i32) + Send>;

/// Everything a backup run can be configured with.
pub struct BackupOptions {
    /// Database on the source connection to copy from.
    pub source_db: String,
    /// Database on the destination connection to copy into.
    pub dest_db: String,
    /// Pages copied per step. Negative copies everything in one step.
    pub pages_per_step: i32,
    /// Wait after every step that did not finish the copy.
    pub step_delay: Duration,
    /// Invoked once per step with the engine's counters.
    pub progress: ProgressFn,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            source_db: DEFAULT_DB_NAME.to_owned(),
            dest_db: DEFAULT_DB_NAME.to_owned(),
            pages_per_step: DEFAULT_PAGES_PER_STEP,
            step_delay: DEFAULT_STEP_DELAY,
            progress: Box::new(|_, _| {}),
        }
    }
}

impl fmt::Debug for BackupOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupOptions")
            .field("source_db", &self.source_db)
            .field("dest_db", &self.dest_db)
            .field("pages_per_step", &self.pages_per_step)
            .field("step_delay", &self.step_delay)
            .finish_non_exhaustive()
    }
}

impl BackupOptions {
    #[must_use]
    pub fn with_source_db(mut self, name: impl Into<String>) -> Self {
        self.source_db = name.into();
        self
    }

    #[must_use]
    pub fn with_dest_db(mut self, name: impl Into<String>) -> Self {
        self.dest_db = name.into();
        self
    }

    #[must_use]
    pub const fn with_pages_per_step(mut self, pages: i32) -> Self {
        self.pages_per_step = pages;
        self
    }

    #[must_use]
    pub const fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, f: impl FnMut(i32, i32) + Send + 'static) -> Self {
        self.progress = Box::new(f);
        self
    }

    /// Reject values the loop cannot make progress with.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidConfig`] for a zero page quantum or an empty
    /// database name.
    pub fn validate(&self) -> Result<()> {
        if self.pages_per_step == 0 {
            return Err(BridgeError::invalid_config(
                "pages per step must be non-zero",
            ));
        }
        if self.source_db.is_empty() {
            return Err(BridgeError::invalid_config(
                "source database name must not be empty",
            ));
        }
        if self.dest_db.is_empty() {
            return Err(BridgeError::invalid_config(
                "destination database name must not be empty",
            ));
        }
        Ok(())
    }
}

/// The serializable part of [`BackupOptions`].
///
/// Missing fields take the defaults, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupSettings {
    pub source_db: String,
    pub dest_db: String,
    pub pages_per_step: i32,
    pub step_delay_ms: u64,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            source_db: DEFAULT_DB_NAME.to_owned(),
            dest_db: DEFAULT_DB_NAME.to_owned(),
            pages_per_step: DEFAULT_PAGES_PER_STEP,
            step_delay_ms: 250,
        }
    }
}

impl BackupSettings {
    /// Parse settings from a JSON document.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidConfig`] if the document does not describe
    /// valid settings.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::invalid_config(e.to_string()))?;
        settings.clone().into_options().validate()?;
        Ok(settings)
    }

    /// Options with these settings and a no-op progress callback.
    #[must_use]
    pub fn into_options(self) -> BackupOptions {
        BackupOptions {
            source_db: self.source_db,
            dest_db: self.dest_db,
            pages_per_step: self.pages_per_step,
            step_delay: Duration::from_millis(self.step_delay_ms),
            ..BackupOptions::default()
        }
    }
}

impl From<BackupSettings> for BackupOptions {
    fn from(settings: BackupSettings) -> Self {
        settings.into_options()
    }
}

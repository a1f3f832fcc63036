//! Scan state machine wrapped around every host cursor.

use sqlbridge_error::{BridgeError, Result};
use sqlbridge_types::SqliteValue;
use sqlbridge_types::cx::Cx;

use crate::module::{ColumnContext, VirtualTableCursor};

/// Where a scan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Opened, not yet filtered.
    Open,
    /// Positioned on a row.
    Filtered,
    /// Past the last row.
    Eof,
    Closed,
}

/// A host cursor plus the state the engine has driven it into.
///
/// `column` and `rowid` are only forwarded while the cursor is positioned
/// on a row; anywhere else they fail with [`BridgeError::Misuse`] instead of
/// reaching the host.
#[derive(Debug)]
pub struct ScanCursor<C> {
    inner: C,
    state: CursorState,
}

impl<C: VirtualTableCursor> ScanCursor<C> {
    #[must_use]
    pub const fn new(inner: C) -> Self {
        Self {
            inner,
            state: CursorState::Open,
        }
    }

    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    /// The host cursor.
    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    /// Start (or restart) a scan. Allowed in any state but `Closed`.
    ///
    /// # Errors
    ///
    /// Misuse on a closed cursor, or the host's filter error (which leaves
    /// the cursor unfiltered).
    pub fn filter(
        &mut self,
        cx: &Cx,
        idx_num: i32,
        idx_str: Option<&str>,
        args: &[SqliteValue],
    ) -> Result<()> {
        if self.state == CursorState::Closed {
            return Err(BridgeError::misuse("filter on a closed cursor"));
        }
        if let Err(err) = self.inner.filter(cx, idx_num, idx_str, args) {
            self.state = CursorState::Open;
            return Err(err);
        }
        self.settle();
        Ok(())
    }

    /// Advance to the next row.
    ///
    /// # Errors
    ///
    /// Misuse unless positioned on a row, or the host's error.
    pub fn next(&mut self, cx: &Cx) -> Result<()> {
        if self.state != CursorState::Filtered {
            return Err(self.not_on_row("next"));
        }
        self.inner.next(cx)?;
        self.settle();
        Ok(())
    }

    /// True unless positioned on a row.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.state != CursorState::Filtered
    }

    /// Read column `col` of the current row.
    ///
    /// # Errors
    ///
    /// Misuse unless positioned on a row, or the host's error.
    pub fn column(&self, ctx: &mut ColumnContext, col: i32) -> Result<()> {
        if self.state != CursorState::Filtered {
            return Err(self.not_on_row("column"));
        }
        self.inner.column(ctx, col)
    }

    /// The rowid of the current row.
    ///
    /// # Errors
    ///
    /// Misuse unless positioned on a row, or the host's error.
    pub fn rowid(&self) -> Result<i64> {
        if self.state != CursorState::Filtered {
            return Err(self.not_on_row("rowid"));
        }
        self.inner.rowid()
    }

    /// Mark the scan finished. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.state = CursorState::Closed;
    }

    fn settle(&mut self) {
        self.state = if self.inner.eof() {
            CursorState::Eof
        } else {
            CursorState::Filtered
        };
    }

    fn not_on_row(&self, what: &str) -> BridgeError {
        BridgeError::misuse(format!("{what} on a cursor that is {:?}, not on a row", self.state))
    }
}

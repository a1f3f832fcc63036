//! Per-table state and capability routing.

use std::collections::HashMap;

use sqlbridge_error::{BridgeError, Result};
use sqlbridge_types::cx::Cx;

use crate::cursor::ScanCursor;
use crate::index::IndexInfo;
use crate::module::{ScalarFunction, TableArgs, UpdateOp, VirtualTable};

/// One connected virtual table: the host table plus the identity the
/// engine created it under.
///
/// Every optional slot is answered here. A capability the host does not
/// expose gets the fixed "absent" answer: writes and renames fail with
/// [`BridgeError::Unsupported`], transaction and savepoint notifications
/// succeed without effect, and function lookups report no overload.
pub struct TableInstance<T> {
    table: T,
    module_name: String,
    database: String,
    name: String,
    // Boxed so the address handed to the engine survives map growth.
    functions: HashMap<(String, i32), Box<ScalarFunction>>,
}

impl<T: VirtualTable> TableInstance<T> {
    #[must_use]
    pub fn new(table: T, args: &TableArgs) -> Self {
        Self {
            table,
            module_name: args.module_name.clone(),
            database: args.database.clone(),
            name: args.table_name.clone(),
            functions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn table(&self) -> &T {
        &self.table
    }

    /// Ask the host for a plan and check it.
    ///
    /// # Errors
    ///
    /// The host's error, or misuse if the answer is malformed.
    pub fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
        self.table.best_index(info)?;
        info.validate()
    }

    /// Open a cursor wrapped in its state machine.
    ///
    /// # Errors
    ///
    /// The host's error.
    pub fn open(&self) -> Result<ScanCursor<T::Cursor>> {
        self.table.open().map(ScanCursor::new)
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn disconnect(&mut self, cx: &Cx) -> Result<()> {
        self.table.disconnect(cx)
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn destroy(&mut self, cx: &Cx) -> Result<()> {
        self.table.destroy(cx)
    }

    /// Apply a write.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Unsupported`] when the table is not updatable, else the
    /// host's error.
    pub fn update(&mut self, cx: &Cx, op: UpdateOp<'_>) -> Result<Option<i64>> {
        match self.table.updatable() {
            Some(writer) => writer.update(cx, op),
            None => Err(BridgeError::Unsupported {
                capability: "update",
            }),
        }
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn begin(&mut self, cx: &Cx) -> Result<()> {
        self.table.transactional().map_or(Ok(()), |t| t.begin(cx))
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn sync(&mut self, cx: &Cx) -> Result<()> {
        self.table.transactional().map_or(Ok(()), |t| t.sync(cx))
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn commit(&mut self, cx: &Cx) -> Result<()> {
        self.table.transactional().map_or(Ok(()), |t| t.commit(cx))
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn rollback(&mut self, cx: &Cx) -> Result<()> {
        self.table.transactional().map_or(Ok(()), |t| t.rollback(cx))
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn savepoint(&mut self, cx: &Cx, n: i32) -> Result<()> {
        self.table.savepoints().map_or(Ok(()), |s| s.savepoint(cx, n))
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn release(&mut self, cx: &Cx, n: i32) -> Result<()> {
        self.table.savepoints().map_or(Ok(()), |s| s.release(cx, n))
    }

    /// # Errors
    ///
    /// The host's error.
    pub fn rollback_to(&mut self, cx: &Cx, n: i32) -> Result<()> {
        self.table.savepoints().map_or(Ok(()), |s| s.rollback_to(cx, n))
    }

    /// Rename the table, tracking the new name on success.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Unsupported`] when the table is not renamable, else the
    /// host's error.
    pub fn rename(&mut self, cx: &Cx, new_name: &str) -> Result<()> {
        let Some(renamer) = self.table.renamable() else {
            return Err(BridgeError::Unsupported {
                capability: "rename",
            });
        };
        renamer.rename(cx, new_name)?;
        tracing::debug!(
            target: "sqlbridge.vtab",
            module = %self.module_name,
            from = %self.name,
            to = new_name,
            "virtual table renamed"
        );
        new_name.clone_into(&mut self.name);
        Ok(())
    }

    /// The host's overload of `name`/`n_arg`, kept alive for the lifetime of
    /// this table.
    ///
    /// The first overload returned for a given name and arity is the one
    /// kept; the engine may still hold its address in a prepared statement.
    pub fn find_function(&mut self, n_arg: i32, name: &str) -> Option<&ScalarFunction> {
        let key = (name.to_ascii_lowercase(), n_arg);
        if !self.functions.contains_key(&key) {
            let found = self.table.function_overrides()?.find_function(n_arg, name)?;
            self.functions.insert(key.clone(), Box::new(found));
        }
        self.functions.get(&key).map(Box::as_ref)
    }
}

impl<T> std::fmt::Debug for TableInstance<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableInstance")
            .field("module_name", &self.module_name)
            .field("database", &self.database)
            .field("name", &self.name)
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}

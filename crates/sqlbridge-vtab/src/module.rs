//! Virtual table module, table and cursor traits.
//!
//! Virtual tables expose host data sources as SQL tables. They follow the
//! engine's xCreate/xConnect/xBestIndex/xFilter/xNext protocol.
//!
//! The mandatory surface is [`Module`] + [`VirtualTable`] +
//! [`VirtualTableCursor`]. Everything else (writes, transactions,
//! savepoints, function overrides, rename) is an optional capability trait
//! a table exposes through an accessor on [`VirtualTable`]. An accessor
//! left at its default `None` makes the dispatch table answer that slot with
//! a fixed "capability absent" result.
//!
//! # Cx on I/O Methods
//!
//! Methods that perform I/O accept `&Cx` for cancellation. Lightweight
//! accessors (`eof`, `column`, `rowid`) do not require `&Cx` since they
//! operate on already-fetched row data.

use std::sync::Arc;

use sqlbridge_error::Result;
use sqlbridge_types::SqliteValue;
use sqlbridge_types::cx::Cx;

use crate::index::IndexInfo;

/// Arguments of `CREATE VIRTUAL TABLE <database>.<table> USING
/// <module>(<arguments>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableArgs {
    pub module_name: String,
    pub database: String,
    pub table_name: String,
    /// Module arguments, verbatim and untrimmed of quotes.
    pub arguments: Vec<String>,
}

/// A host scalar function a table substitutes for a built-in.
pub type ScalarFunction = Arc<dyn Fn(&[SqliteValue]) -> Result<SqliteValue> + Send + Sync>;

/// A virtual table module: the factory the engine calls for
/// `CREATE VIRTUAL TABLE` and for every later connection to such a table.
#[allow(clippy::missing_errors_doc)]
pub trait Module: Send + 'static {
    /// The table type this module produces.
    type Table: VirtualTable;

    /// Advertised `sqlite3_module.iVersion`, clamped to `1..=3`.
    ///
    /// Version 2 enables the savepoint slots, version 3 the shadow-name
    /// test.
    fn version(&self) -> i32 {
        3
    }

    /// Called for `CREATE VIRTUAL TABLE`.
    ///
    /// Returns the `CREATE TABLE` statement to declare and the new table.
    /// May create backing storage. Default delegates to `connect`.
    fn create(&self, cx: &Cx, args: &TableArgs) -> Result<(String, Self::Table)> {
        self.connect(cx, args)
    }

    /// Called for subsequent opens of an existing virtual table.
    fn connect(&self, cx: &Cx, args: &TableArgs) -> Result<(String, Self::Table)>;

    /// Whether `<table>_<suffix>` names one of this module's shadow tables.
    fn is_shadow_name(_suffix: &str) -> bool {
        false
    }
}

/// A virtual table instance.
///
/// At minimum implement `best_index` and `open`.
#[allow(clippy::missing_errors_doc)]
pub trait VirtualTable: Send + 'static {
    /// The cursor type for scanning this virtual table.
    type Cursor: VirtualTableCursor;

    /// Inform the query planner about available indexes and their costs.
    fn best_index(&self, info: &mut IndexInfo) -> Result<()>;

    /// Open a new scan cursor.
    fn open(&self) -> Result<Self::Cursor>;

    /// Drop a virtual table instance (opposite of `connect`).
    fn disconnect(&mut self, _cx: &Cx) -> Result<()> {
        Ok(())
    }

    /// Called for `DROP TABLE`: destroy backing storage.
    ///
    /// Default delegates to `disconnect`.
    fn destroy(&mut self, cx: &Cx) -> Result<()> {
        self.disconnect(cx)
    }

    fn updatable(&mut self) -> Option<&mut dyn UpdatableTable> {
        None
    }

    fn transactional(&mut self) -> Option<&mut dyn TransactionalTable> {
        None
    }

    fn savepoints(&mut self) -> Option<&mut dyn SavepointTable> {
        None
    }

    fn function_overrides(&mut self) -> Option<&mut dyn FunctionOverriding> {
        None
    }

    fn renamable(&mut self) -> Option<&mut dyn RenamableTable> {
        None
    }
}

/// A cursor for scanning a virtual table.
///
/// # Lifecycle
///
/// 1. [`filter`](Self::filter) begins a scan with planner-chosen parameters.
/// 2. Iterate: check [`eof`](Self::eof), read [`column`](Self::column)/[`rowid`](Self::rowid), advance with [`next`](Self::next).
/// 3. The cursor is dropped when the scan is complete.
///
/// The dispatch layer wraps every cursor in a
/// [`ScanCursor`](crate::cursor::ScanCursor), so implementations never see
/// `column`/`rowid` outside a filtered, not-yet-exhausted scan.
#[allow(clippy::missing_errors_doc)]
pub trait VirtualTableCursor: Send + 'static {
    /// Begin a scan with the filter parameters chosen by `best_index`.
    fn filter(
        &mut self,
        cx: &Cx,
        idx_num: i32,
        idx_str: Option<&str>,
        args: &[SqliteValue],
    ) -> Result<()>;

    /// Advance to the next row.
    fn next(&mut self, cx: &Cx) -> Result<()>;

    /// Whether the cursor has moved past the last row.
    fn eof(&self) -> bool;

    /// Write the value of column `col` into `ctx`.
    fn column(&self, ctx: &mut ColumnContext, col: i32) -> Result<()>;

    /// Return the rowid of the current row.
    fn rowid(&self) -> Result<i64>;
}

/// A context object passed to [`VirtualTableCursor::column`] for writing
/// the column value.
///
/// Analogous to the engine's `sqlite3_context*` used with `sqlite3_result_*`.
/// A column left unset reads as NULL.
#[derive(Debug, Default)]
pub struct ColumnContext {
    value: Option<SqliteValue>,
}

impl ColumnContext {
    /// Create a new empty column context.
    #[must_use]
    pub fn new() -> Self {
        Self { value: None }
    }

    /// Set the value for this column.
    pub fn set_value(&mut self, val: impl Into<SqliteValue>) {
        self.value = Some(val.into());
    }

    /// Take the value out of this context, leaving `None`.
    pub fn take_value(&mut self) -> Option<SqliteValue> {
        self.value.take()
    }
}

/// One decoded `xUpdate` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOp<'a> {
    Delete {
        rowid: i64,
    },
    /// `rowid` is `Some` when the statement supplied one explicitly.
    Insert {
        rowid: Option<i64>,
        values: &'a [SqliteValue],
    },
    /// `old_rowid != new_rowid` when the statement assigns the rowid.
    Update {
        old_rowid: i64,
        new_rowid: i64,
        values: &'a [SqliteValue],
    },
}

/// INSERT/UPDATE/DELETE support.
#[allow(clippy::missing_errors_doc)]
pub trait UpdatableTable {
    /// Apply `op`. For an insert, return the new rowid.
    fn update(&mut self, cx: &Cx, op: UpdateOp<'_>) -> Result<Option<i64>>;
}

/// Notifications from the engine's transaction manager.
#[allow(clippy::missing_errors_doc)]
pub trait TransactionalTable {
    fn begin(&mut self, cx: &Cx) -> Result<()>;

    /// Phase one of a two-phase commit.
    fn sync(&mut self, _cx: &Cx) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self, cx: &Cx) -> Result<()>;

    fn rollback(&mut self, cx: &Cx) -> Result<()>;
}

/// Nested savepoints, numbered from 0 by the engine.
#[allow(clippy::missing_errors_doc)]
pub trait SavepointTable {
    fn savepoint(&mut self, cx: &Cx, n: i32) -> Result<()>;

    fn release(&mut self, cx: &Cx, n: i32) -> Result<()>;

    fn rollback_to(&mut self, cx: &Cx, n: i32) -> Result<()>;
}

/// Overloads of SQL functions whose first argument is a column of this
/// table.
pub trait FunctionOverriding {
    /// The replacement for `name` called with `n_arg` arguments, if any.
    fn find_function(&mut self, n_arg: i32, name: &str) -> Option<ScalarFunction>;
}

/// `ALTER TABLE ... RENAME TO` support.
#[allow(clippy::missing_errors_doc)]
pub trait RenamableTable {
    fn rename(&mut self, cx: &Cx, new_name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use sqlbridge_error::BridgeError;

    use super::*;
    use crate::index::{ConstraintOp, IndexConstraint};

    // -- Mock: generate_series(start, stop) --

    struct SeriesModule;

    struct GenerateSeries {
        destroyed: bool,
    }

    struct GenerateSeriesCursor {
        stop: i64,
        current: i64,
    }

    impl Module for SeriesModule {
        type Table = GenerateSeries;

        fn connect(&self, _cx: &Cx, _args: &TableArgs) -> Result<(String, GenerateSeries)> {
            Ok((
                "CREATE TABLE x(value INTEGER)".to_owned(),
                GenerateSeries { destroyed: false },
            ))
        }
    }

    impl VirtualTable for GenerateSeries {
        type Cursor = GenerateSeriesCursor;

        fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
            info.estimated_cost = 10.0;
            info.estimated_rows = 100;
            info.idx_num = 1;

            if !info.constraints.is_empty() && info.constraints[0].usable {
                info.constraint_usage[0].argv_index = 1;
                info.constraint_usage[0].omit = true;
            }
            Ok(())
        }

        fn open(&self) -> Result<GenerateSeriesCursor> {
            Ok(GenerateSeriesCursor { stop: 0, current: 1 })
        }

        fn destroy(&mut self, _cx: &Cx) -> Result<()> {
            self.destroyed = true;
            Ok(())
        }
    }

    impl VirtualTableCursor for GenerateSeriesCursor {
        fn filter(
            &mut self,
            _cx: &Cx,
            _idx_num: i32,
            _idx_str: Option<&str>,
            args: &[SqliteValue],
        ) -> Result<()> {
            self.current = args.first().map_or(1, SqliteValue::to_integer);
            self.stop = args.get(1).map_or(10, SqliteValue::to_integer);
            Ok(())
        }

        fn next(&mut self, _cx: &Cx) -> Result<()> {
            self.current += 1;
            Ok(())
        }

        fn eof(&self) -> bool {
            self.current > self.stop
        }

        fn column(&self, ctx: &mut ColumnContext, _col: i32) -> Result<()> {
            ctx.set_value(self.current);
            Ok(())
        }

        fn rowid(&self) -> Result<i64> {
            Ok(self.current)
        }
    }

    // -- Mock: writable table --

    #[derive(Default)]
    struct Notes {
        rows: Vec<(i64, Vec<SqliteValue>)>,
        next_rowid: i64,
    }

    impl UpdatableTable for Notes {
        fn update(&mut self, _cx: &Cx, op: UpdateOp<'_>) -> Result<Option<i64>> {
            match op {
                UpdateOp::Insert { rowid, values } => {
                    self.next_rowid += 1;
                    let rowid = rowid.unwrap_or(self.next_rowid);
                    self.rows.push((rowid, values.to_vec()));
                    Ok(Some(rowid))
                }
                UpdateOp::Delete { rowid } => {
                    self.rows.retain(|(r, _)| *r != rowid);
                    Ok(None)
                }
                UpdateOp::Update { .. } => Err(BridgeError::ReadOnly),
            }
        }
    }

    impl VirtualTable for Notes {
        type Cursor = GenerateSeriesCursor;

        fn best_index(&self, _info: &mut IndexInfo) -> Result<()> {
            Ok(())
        }

        fn open(&self) -> Result<GenerateSeriesCursor> {
            Ok(GenerateSeriesCursor { stop: 0, current: 1 })
        }

        fn updatable(&mut self) -> Option<&mut dyn UpdatableTable> {
            Some(self)
        }
    }

    #[test]
    fn test_vtab_create_vs_connect() {
        let cx = Cx::new();
        let args = TableArgs {
            module_name: "series".to_owned(),
            database: "main".to_owned(),
            table_name: "s".to_owned(),
            arguments: vec![],
        };

        let (schema, table) = SeriesModule.create(&cx, &args).unwrap();
        assert_eq!(schema, "CREATE TABLE x(value INTEGER)");
        assert!(!table.destroyed);
        assert!(!SeriesModule::is_shadow_name("data"));
        assert_eq!(SeriesModule.version(), 3);
    }

    #[test]
    fn test_vtab_best_index_populates_info() {
        let (_, vtab) = SeriesModule
            .connect(&Cx::new(), &TableArgs {
                module_name: "series".to_owned(),
                database: "main".to_owned(),
                table_name: "s".to_owned(),
                arguments: vec![],
            })
            .unwrap();

        let mut info = IndexInfo::new(
            vec![IndexConstraint {
                column: 0,
                op: ConstraintOp::Gt,
                usable: true,
            }],
            vec![],
        );

        vtab.best_index(&mut info).unwrap();

        assert_eq!(info.idx_num, 1);
        assert!((info.estimated_cost - 10.0).abs() < f64::EPSILON);
        assert_eq!(info.estimated_rows, 100);
        assert_eq!(info.constraint_usage[0].argv_index, 1);
        assert!(info.constraint_usage[0].omit);
    }

    #[test]
    fn test_vtab_cursor_filter_next_eof() {
        let cx = Cx::new();
        let vtab = GenerateSeries { destroyed: false };
        let mut cursor = vtab.open().unwrap();

        cursor
            .filter(&cx, 0, None, &[SqliteValue::Integer(1), SqliteValue::Integer(3)])
            .unwrap();

        let mut values = Vec::new();
        while !cursor.eof() {
            let mut ctx = ColumnContext::new();
            cursor.column(&mut ctx, 0).unwrap();
            let rowid = cursor.rowid().unwrap();
            values.push((rowid, ctx.take_value().unwrap()));
            cursor.next(&cx).unwrap();
        }

        assert_eq!(values, vec![
            (1, SqliteValue::Integer(1)),
            (2, SqliteValue::Integer(2)),
            (3, SqliteValue::Integer(3)),
        ]);
    }

    #[test]
    fn test_default_capabilities_are_absent() {
        let mut vtab = GenerateSeries { destroyed: false };
        assert!(vtab.updatable().is_none());
        assert!(vtab.transactional().is_none());
        assert!(vtab.savepoints().is_none());
        assert!(vtab.function_overrides().is_none());
        assert!(vtab.renamable().is_none());

        vtab.destroy(&Cx::new()).unwrap();
        assert!(vtab.destroyed);
    }

    #[test]
    fn test_update_through_capability() {
        let cx = Cx::new();
        let mut notes = Notes::default();
        let values = [SqliteValue::from("hello")];
        let writer = notes.updatable().unwrap();

        let rowid = writer
            .update(&cx, UpdateOp::Insert { rowid: None, values: &values })
            .unwrap();
        assert_eq!(rowid, Some(1));
        let err = writer
            .update(&cx, UpdateOp::Update { old_rowid: 1, new_rowid: 1, values: &values })
            .unwrap_err();
        assert!(matches!(err, BridgeError::ReadOnly));
        writer.update(&cx, UpdateOp::Delete { rowid: 1 }).unwrap();
        assert!(notes.rows.is_empty());
    }

    #[test]
    fn test_column_context_lifecycle() {
        let mut ctx = ColumnContext::new();
        assert!(ctx.take_value().is_none());

        ctx.set_value(42_i64);
        assert_eq!(ctx.take_value(), Some(SqliteValue::Integer(42)));

        assert!(ctx.take_value().is_none());
    }
}

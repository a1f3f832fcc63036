//! The generated `sqlite3_module` and the `extern "C"` shims behind it.
//!
//! One set of shims is monomorphized per [`Module`] type. Every slot of the
//! native table is filled; slots for capabilities a table does not expose
//! are answered by [`TableInstance`]. Host code never unwinds into engine
//! frames: each call runs under `catch_unwind` and a panic is reported as
//! an internal error.
//!
//! Slots that start work (xFilter, xNext, xUpdate, xBegin, xSync, xCommit,
//! xSavepoint) check the module's [`Cx`] first and fail with
//! [`BridgeError::Cancelled`] once it is cancelled. Slots that end work
//! (rollback, release, close, disconnect) always run.
//!
//! Ownership: the table, its module and a [`Cx`] live in one boxed
//! [`HostModule`] handed to `sqlite3_create_module_v2` as client data with
//! [`drop_host`] as destructor, so the engine frees it when the module is
//! dropped or replaced and its last table is gone. Each connected table is
//! a boxed [`NativeTable`] freed by `xDisconnect` (or a successful
//! `xDestroy`); each cursor a boxed [`NativeCursor`] freed by `xClose`.

use std::any::Any;
use std::borrow::Cow;
use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uchar};
use std::panic::{self, AssertUnwindSafe};
use std::{ptr, slice};

use sqlbridge_error::{BridgeError, Result};
use sqlbridge_native::{error_from_handle, ffi, sqlite_string, text_from_ptr, to_cstring};
use sqlbridge_types::SqliteValue;
use sqlbridge_types::cx::Cx;

use crate::cursor::ScanCursor;
use crate::index::{ConstraintOp, IndexConstraint, IndexInfo, IndexOrderBy};
use crate::module::{ColumnContext, Module, ScalarFunction, TableArgs, UpdateOp, VirtualTable};
use crate::table::TableInstance;
use crate::values::{set_result, set_result_error, values_from_argv};

const TARGET: &str = "sqlbridge.vtab";

// SAFETY: every field of `sqlite3_module` is an integer or an
// `Option<fn>`, for which all-zero is a valid value.
const ZERO_MODULE: ffi::sqlite3_module = unsafe { std::mem::zeroed() };

/// Client data registered with the engine for one module name.
pub(crate) struct HostModule<M: Module> {
    native: ffi::sqlite3_module,
    module: M,
    name: String,
    cx: Cx,
}

impl<M: Module> HostModule<M> {
    pub(crate) fn new(name: &str, module: M, cx: Cx) -> Box<Self> {
        let version = clamp_version(module.version());
        Box::new(Self {
            native: native_module::<M>(version),
            module,
            name: name.to_owned(),
            cx,
        })
    }

    pub(crate) const fn version(&self) -> i32 {
        self.native.iVersion
    }

    /// The dispatch table inside a host object that has been leaked with
    /// `Box::into_raw`.
    pub(crate) fn native_ptr(host: *mut Self) -> *const ffi::sqlite3_module {
        // SAFETY: only a place projection, nothing is read.
        unsafe { &raw const (*host).native }
    }
}

/// Engine-side destructor for a [`HostModule`].
pub(crate) unsafe extern "C" fn drop_host<M: Module>(p: *mut c_void) {
    if p.is_null() {
        return;
    }
    let host = Box::from_raw(p.cast::<HostModule<M>>());
    tracing::debug!(target: TARGET, module = %host.name, "module released by engine");
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(host))) {
        tracing::error!(target: TARGET, panic = %panic_message(payload.as_ref()), "module drop panicked");
    }
}

/// A connected table as the engine sees it. `base` must stay first.
#[repr(C)]
struct NativeTable<T: VirtualTable> {
    base: ffi::sqlite3_vtab,
    instance: TableInstance<T>,
    cx: Cx,
}

/// An open cursor as the engine sees it. `base` must stay first.
#[repr(C)]
struct NativeCursor<C> {
    base: ffi::sqlite3_vtab_cursor,
    scan: ScanCursor<C>,
    cx: Cx,
}

pub(crate) const fn clamp_version(version: i32) -> i32 {
    if version < 1 {
        1
    } else if version > 3 {
        3
    } else {
        version
    }
}

/// Build the native dispatch table for `M` advertising `version`.
pub(crate) fn native_module<M: Module>(version: i32) -> ffi::sqlite3_module {
    ffi::sqlite3_module {
        iVersion: clamp_version(version),
        xCreate: Some(x_create::<M>),
        xConnect: Some(x_connect::<M>),
        xBestIndex: Some(x_best_index::<M::Table>),
        xDisconnect: Some(x_disconnect::<M::Table>),
        xDestroy: Some(x_destroy::<M::Table>),
        xOpen: Some(x_open::<M::Table>),
        xClose: Some(x_close::<<M::Table as VirtualTable>::Cursor>),
        xFilter: Some(x_filter::<<M::Table as VirtualTable>::Cursor>),
        xNext: Some(x_next::<<M::Table as VirtualTable>::Cursor>),
        xEof: Some(x_eof::<<M::Table as VirtualTable>::Cursor>),
        xColumn: Some(x_column::<<M::Table as VirtualTable>::Cursor>),
        xRowid: Some(x_rowid::<<M::Table as VirtualTable>::Cursor>),
        xUpdate: Some(x_update::<M::Table>),
        xBegin: Some(x_begin::<M::Table>),
        xSync: Some(x_sync::<M::Table>),
        xCommit: Some(x_commit::<M::Table>),
        xRollback: Some(x_rollback::<M::Table>),
        xFindFunction: Some(x_find_function::<M::Table>),
        xRename: Some(x_rename::<M::Table>),
        xSavepoint: Some(x_savepoint::<M::Table>),
        xRelease: Some(x_release::<M::Table>),
        xRollbackTo: Some(x_rollback_to::<M::Table>),
        xShadowName: Some(x_shadow_name::<M>),
        ..ZERO_MODULE
    }
}

// ---------------------------------------------------------------------------
// Boundary helpers
// ---------------------------------------------------------------------------

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

/// Run host code, turning a panic into [`BridgeError::Internal`].
fn guard<R>(slot: &'static str, f: impl FnOnce() -> Result<R>) -> Result<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(target: TARGET, slot, panic = %message, "virtual table callback panicked");
            Err(BridgeError::internal(format!("{slot} panicked: {message}")))
        }
    }
}

/// Store `err` in the table's `zErrMsg` and return its code.
unsafe fn report(vtab: *mut ffi::sqlite3_vtab, slot: &'static str, err: &BridgeError) -> c_int {
    if err.is_unsupported() {
        tracing::debug!(target: TARGET, slot, error = %err, "capability absent");
    } else {
        tracing::warn!(target: TARGET, slot, code = err.raw_code(), error = %err, "virtual table call failed");
    }
    if !vtab.is_null() {
        if !(*vtab).zErrMsg.is_null() {
            ffi::sqlite3_free((*vtab).zErrMsg.cast());
        }
        (*vtab).zErrMsg = sqlite_string(&err.to_string());
    }
    err.raw_code()
}

unsafe fn report_cursor(cursor: *mut ffi::sqlite3_vtab_cursor, slot: &'static str, err: &BridgeError) -> c_int {
    report((*cursor).pVtab, slot, err)
}

unsafe fn raw_slice<'a, T>(ptr: *const T, len: c_int) -> &'a [T] {
    match usize::try_from(len) {
        Ok(n) if n > 0 && !ptr.is_null() => slice::from_raw_parts(ptr, n),
        _ => &[],
    }
}

unsafe fn raw_slice_mut<'a, T>(ptr: *mut T, len: c_int) -> &'a mut [T] {
    match usize::try_from(len) {
        Ok(n) if n > 0 && !ptr.is_null() => slice::from_raw_parts_mut(ptr, n),
        _ => &mut [],
    }
}

unsafe fn table_args(argc: c_int, argv: *const *const c_char) -> TableArgs {
    let mut words = raw_slice(argv, argc)
        .iter()
        .map(|&p| text_from_ptr(p).map_or_else(String::new, Cow::into_owned));
    TableArgs {
        module_name: words.next().unwrap_or_default(),
        database: words.next().unwrap_or_default(),
        table_name: words.next().unwrap_or_default(),
        arguments: words.collect(),
    }
}

// ---------------------------------------------------------------------------
// Construction and teardown
// ---------------------------------------------------------------------------

unsafe extern "C" fn x_create<M: Module>(
    db: *mut ffi::sqlite3,
    aux: *mut c_void,
    argc: c_int,
    argv: *const *const c_char,
    pp_vtab: *mut *mut ffi::sqlite3_vtab,
    pz_err: *mut *mut c_char,
) -> c_int {
    construct::<M>(db, aux, argc, argv, pp_vtab, pz_err, true)
}

unsafe extern "C" fn x_connect<M: Module>(
    db: *mut ffi::sqlite3,
    aux: *mut c_void,
    argc: c_int,
    argv: *const *const c_char,
    pp_vtab: *mut *mut ffi::sqlite3_vtab,
    pz_err: *mut *mut c_char,
) -> c_int {
    construct::<M>(db, aux, argc, argv, pp_vtab, pz_err, false)
}

unsafe fn construct<M: Module>(
    db: *mut ffi::sqlite3,
    aux: *mut c_void,
    argc: c_int,
    argv: *const *const c_char,
    pp_vtab: *mut *mut ffi::sqlite3_vtab,
    pz_err: *mut *mut c_char,
    create: bool,
) -> c_int {
    let slot = if create { "xCreate" } else { "xConnect" };
    let host = &*aux.cast::<HostModule<M>>();
    let args = table_args(argc, argv);

    let built = guard(slot, || {
        if create {
            host.module.create(&host.cx, &args)
        } else {
            host.module.connect(&host.cx, &args)
        }
    });
    let declared = match built {
        Ok((schema, table)) => match to_cstring("declared table schema", &schema) {
            Ok(sql) => {
                let rc = ffi::sqlite3_declare_vtab(db, sql.as_ptr());
                if rc == ffi::SQLITE_OK {
                    Ok(table)
                } else {
                    Err(error_from_handle(db, rc))
                }
            }
            Err(err) => Err(err),
        },
        Err(err) => Err(err),
    };

    match declared {
        Ok(table) => {
            tracing::debug!(
                target: TARGET,
                slot,
                module = %args.module_name,
                database = %args.database,
                table = %args.table_name,
                "virtual table connected"
            );
            let native = Box::new(NativeTable {
                base: std::mem::zeroed(),
                instance: TableInstance::new(table, &args),
                cx: host.cx.clone(),
            });
            *pp_vtab = Box::into_raw(native).cast();
            ffi::SQLITE_OK
        }
        Err(err) => {
            tracing::warn!(
                target: TARGET,
                slot,
                module = %args.module_name,
                table = %args.table_name,
                error = %err,
                "virtual table construction failed"
            );
            if !pz_err.is_null() {
                *pz_err = sqlite_string(&err.to_string());
            }
            err.raw_code()
        }
    }
}

/// Free a table whose host state is already torn down.
unsafe fn release_table<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab) {
    let native = Box::from_raw(vtab.cast::<NativeTable<T>>());
    let _ = guard("release", move || {
        drop(native);
        Ok(())
    });
}

unsafe extern "C" fn x_disconnect<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab) -> c_int {
    let NativeTable { instance, cx, .. } = &mut *vtab.cast::<NativeTable<T>>();
    let result = guard("xDisconnect", || instance.disconnect(cx));
    release_table::<T>(vtab);
    match result {
        Ok(()) => ffi::SQLITE_OK,
        Err(err) => {
            tracing::warn!(target: TARGET, error = %err, "disconnect failed; table released anyway");
            err.raw_code()
        }
    }
}

unsafe extern "C" fn x_destroy<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab) -> c_int {
    let NativeTable { instance, cx, .. } = &mut *vtab.cast::<NativeTable<T>>();
    let name = instance.name().to_owned();
    match guard("xDestroy", || instance.destroy(cx)) {
        Ok(()) => {
            tracing::debug!(target: TARGET, table = %name, "virtual table destroyed");
            release_table::<T>(vtab);
            ffi::SQLITE_OK
        }
        // The engine keeps the table; it is released later by xDisconnect.
        Err(err) => report(vtab, "xDestroy", &err),
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

unsafe fn read_index_info(raw: &ffi::sqlite3_index_info) -> IndexInfo {
    let constraints = raw_slice(raw.aConstraint, raw.nConstraint)
        .iter()
        .map(|c| IndexConstraint {
            column: c.iColumn,
            op: ConstraintOp::from_raw(c.op),
            usable: c.usable != 0,
        })
        .collect();
    let order_by = raw_slice(raw.aOrderBy, raw.nOrderBy)
        .iter()
        .map(|o| IndexOrderBy {
            column: o.iColumn,
            desc: o.desc != 0,
        })
        .collect();
    let mut info = IndexInfo::new(constraints, order_by);
    info.estimated_cost = raw.estimatedCost;
    info.estimated_rows = raw.estimatedRows;
    info.columns_used = raw.colUsed;
    info
}

unsafe fn write_index_info(raw: &mut ffi::sqlite3_index_info, info: &IndexInfo) {
    let usage = raw_slice_mut(raw.aConstraintUsage, raw.nConstraint);
    for (slot, answer) in usage.iter_mut().zip(&info.constraint_usage) {
        slot.argvIndex = answer.argv_index;
        slot.omit = c_uchar::from(answer.omit);
    }
    raw.idxNum = info.idx_num;
    if let Some(idx_str) = &info.idx_str {
        let p = sqlite_string(idx_str);
        if !p.is_null() {
            raw.idxStr = p;
            raw.needToFreeIdxStr = 1;
        }
    }
    raw.orderByConsumed = c_int::from(info.order_by_consumed);
    raw.estimatedCost = info.estimated_cost;
    raw.estimatedRows = info.estimated_rows;
    if info.unique_scan {
        raw.idxFlags |= ffi::SQLITE_INDEX_SCAN_UNIQUE;
    }
}

unsafe extern "C" fn x_best_index<T: VirtualTable>(
    vtab: *mut ffi::sqlite3_vtab,
    info: *mut ffi::sqlite3_index_info,
) -> c_int {
    let NativeTable { instance, .. } = &*vtab.cast::<NativeTable<T>>();
    let raw = &mut *info;
    let mut plan = read_index_info(raw);
    match guard("xBestIndex", || instance.best_index(&mut plan)) {
        Ok(()) => {
            tracing::debug!(
                target: TARGET,
                table = %instance.name(),
                constraints = plan.constraints.len(),
                idx_num = plan.idx_num,
                args = plan.argument_count(),
                cost = plan.estimated_cost,
                "best_index"
            );
            write_index_info(raw, &plan);
            ffi::SQLITE_OK
        }
        Err(err) => report(vtab, "xBestIndex", &err),
    }
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

unsafe extern "C" fn x_open<T: VirtualTable>(
    vtab: *mut ffi::sqlite3_vtab,
    pp_cursor: *mut *mut ffi::sqlite3_vtab_cursor,
) -> c_int {
    let NativeTable { instance, cx, .. } = &*vtab.cast::<NativeTable<T>>();
    match guard("xOpen", || instance.open()) {
        Ok(scan) => {
            let cursor = Box::new(NativeCursor {
                base: std::mem::zeroed(),
                scan,
                cx: cx.clone(),
            });
            *pp_cursor = Box::into_raw(cursor).cast();
            ffi::SQLITE_OK
        }
        Err(err) => report(vtab, "xOpen", &err),
    }
}

unsafe extern "C" fn x_close<C: crate::module::VirtualTableCursor>(
    cursor: *mut ffi::sqlite3_vtab_cursor,
) -> c_int {
    let mut native = Box::from_raw(cursor.cast::<NativeCursor<C>>());
    native.scan.close();
    let _ = guard("xClose", move || {
        drop(native);
        Ok(())
    });
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_filter<C: crate::module::VirtualTableCursor>(
    cursor: *mut ffi::sqlite3_vtab_cursor,
    idx_num: c_int,
    idx_str: *const c_char,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) -> c_int {
    let NativeCursor { scan, cx, .. } = &mut *cursor.cast::<NativeCursor<C>>();
    let idx_str = text_from_ptr(idx_str);
    let args = values_from_argv(argc, argv);
    tracing::debug!(
        target: TARGET,
        idx_num,
        idx_str = idx_str.as_deref(),
        arg_types = ?args.iter().map(SqliteValue::typeof_str).collect::<Vec<_>>(),
        "filter"
    );
    let filtered = guard("xFilter", || {
        cx.checkpoint()?;
        scan.filter(cx, idx_num, idx_str.as_deref(), &args)
    });
    match filtered {
        Ok(()) => ffi::SQLITE_OK,
        Err(err) => report_cursor(cursor, "xFilter", &err),
    }
}

unsafe extern "C" fn x_next<C: crate::module::VirtualTableCursor>(
    cursor: *mut ffi::sqlite3_vtab_cursor,
) -> c_int {
    let NativeCursor { scan, cx, .. } = &mut *cursor.cast::<NativeCursor<C>>();
    match guard("xNext", || {
        cx.checkpoint()?;
        scan.next(cx)
    }) {
        Ok(()) => ffi::SQLITE_OK,
        Err(err) => report_cursor(cursor, "xNext", &err),
    }
}

unsafe extern "C" fn x_eof<C: crate::module::VirtualTableCursor>(
    cursor: *mut ffi::sqlite3_vtab_cursor,
) -> c_int {
    let NativeCursor { scan, .. } = &*cursor.cast::<NativeCursor<C>>();
    c_int::from(scan.eof())
}

unsafe extern "C" fn x_column<C: crate::module::VirtualTableCursor>(
    cursor: *mut ffi::sqlite3_vtab_cursor,
    ctx: *mut ffi::sqlite3_context,
    col: c_int,
) -> c_int {
    let NativeCursor { scan, .. } = &*cursor.cast::<NativeCursor<C>>();
    let mut column = ColumnContext::new();
    match guard("xColumn", || scan.column(&mut column, col)) {
        Ok(()) => {
            set_result(ctx, &column.take_value().unwrap_or(SqliteValue::Null));
            ffi::SQLITE_OK
        }
        Err(err) => report_cursor(cursor, "xColumn", &err),
    }
}

unsafe extern "C" fn x_rowid<C: crate::module::VirtualTableCursor>(
    cursor: *mut ffi::sqlite3_vtab_cursor,
    p_rowid: *mut ffi::sqlite3_int64,
) -> c_int {
    let NativeCursor { scan, .. } = &*cursor.cast::<NativeCursor<C>>();
    match guard("xRowid", || scan.rowid()) {
        Ok(rowid) => {
            *p_rowid = rowid;
            ffi::SQLITE_OK
        }
        Err(err) => report_cursor(cursor, "xRowid", &err),
    }
}

// ---------------------------------------------------------------------------
// Writes and optional capabilities
// ---------------------------------------------------------------------------

/// Decode the engine's `xUpdate` argument convention.
fn decode_update(args: &[SqliteValue]) -> Result<UpdateOp<'_>> {
    match args {
        [] => Err(BridgeError::misuse("xUpdate called without arguments")),
        [old] => Ok(UpdateOp::Delete {
            rowid: old.to_integer(),
        }),
        [SqliteValue::Null, new, values @ ..] => Ok(UpdateOp::Insert {
            rowid: (!new.is_null()).then(|| new.to_integer()),
            values,
        }),
        [old, new, values @ ..] => Ok(UpdateOp::Update {
            old_rowid: old.to_integer(),
            new_rowid: new.to_integer(),
            values,
        }),
    }
}

/// Forward one `xUpdate` call. An insert always yields the rowid the
/// engine should report.
fn apply_update<T: VirtualTable>(
    instance: &mut TableInstance<T>,
    cx: &Cx,
    args: &[SqliteValue],
) -> Result<Option<i64>> {
    cx.checkpoint()?;
    let op = decode_update(args)?;
    tracing::debug!(target: TARGET, table = %instance.name(), ?op, "update");
    let UpdateOp::Insert { rowid: explicit, .. } = op else {
        return instance.update(cx, op);
    };
    match instance.update(cx, op)?.or(explicit) {
        Some(rowid) => Ok(Some(rowid)),
        None => Err(BridgeError::misuse("insert must report the new rowid")),
    }
}

unsafe extern "C" fn x_update<T: VirtualTable>(
    vtab: *mut ffi::sqlite3_vtab,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
    p_rowid: *mut ffi::sqlite3_int64,
) -> c_int {
    let NativeTable { instance, cx, .. } = &mut *vtab.cast::<NativeTable<T>>();
    let args = values_from_argv(argc, argv);
    match guard("xUpdate", || apply_update(instance, cx, &args)) {
        Ok(Some(rowid)) => {
            if !p_rowid.is_null() {
                *p_rowid = rowid;
            }
            ffi::SQLITE_OK
        }
        Ok(None) => ffi::SQLITE_OK,
        Err(err) => report(vtab, "xUpdate", &err),
    }
}

/// Run a table-level notification and map its result.
unsafe fn with_table<T: VirtualTable>(
    vtab: *mut ffi::sqlite3_vtab,
    slot: &'static str,
    f: impl FnOnce(&mut TableInstance<T>, &Cx) -> Result<()>,
) -> c_int {
    let NativeTable { instance, cx, .. } = &mut *vtab.cast::<NativeTable<T>>();
    match guard(slot, || f(instance, cx)) {
        Ok(()) => ffi::SQLITE_OK,
        Err(err) => report(vtab, slot, &err),
    }
}

unsafe extern "C" fn x_begin<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab) -> c_int {
    with_table::<T>(vtab, "xBegin", |t, cx| {
        cx.checkpoint()?;
        t.begin(cx)
    })
}

unsafe extern "C" fn x_sync<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab) -> c_int {
    with_table::<T>(vtab, "xSync", |t, cx| {
        cx.checkpoint()?;
        t.sync(cx)
    })
}

unsafe extern "C" fn x_commit<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab) -> c_int {
    with_table::<T>(vtab, "xCommit", |t, cx| {
        cx.checkpoint()?;
        t.commit(cx)
    })
}

unsafe extern "C" fn x_rollback<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab) -> c_int {
    with_table::<T>(vtab, "xRollback", |t, cx| t.rollback(cx))
}

unsafe extern "C" fn x_savepoint<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab, n: c_int) -> c_int {
    with_table::<T>(vtab, "xSavepoint", |t, cx| {
        cx.checkpoint()?;
        t.savepoint(cx, n)
    })
}

unsafe extern "C" fn x_release<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab, n: c_int) -> c_int {
    with_table::<T>(vtab, "xRelease", |t, cx| t.release(cx, n))
}

unsafe extern "C" fn x_rollback_to<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab, n: c_int) -> c_int {
    with_table::<T>(vtab, "xRollbackTo", |t, cx| t.rollback_to(cx, n))
}

unsafe extern "C" fn x_rename<T: VirtualTable>(vtab: *mut ffi::sqlite3_vtab, new_name: *const c_char) -> c_int {
    let Some(new_name) = text_from_ptr(new_name) else {
        return report(vtab, "xRename", &BridgeError::misuse("rename to a null name"));
    };
    with_table::<T>(vtab, "xRename", |t, cx| t.rename(cx, &new_name))
}

type OverloadFn = unsafe extern "C" fn(*mut ffi::sqlite3_context, c_int, *mut *mut ffi::sqlite3_value);

unsafe extern "C" fn x_find_function<T: VirtualTable>(
    vtab: *mut ffi::sqlite3_vtab,
    n_arg: c_int,
    name: *const c_char,
    px_func: *mut Option<OverloadFn>,
    pp_arg: *mut *mut c_void,
) -> c_int {
    let Some(name) = text_from_ptr(name) else {
        return 0;
    };
    let NativeTable { instance, .. } = &mut *vtab.cast::<NativeTable<T>>();
    let found = guard("xFindFunction", || {
        Ok(instance.find_function(n_arg, &name).map(ptr::from_ref))
    });
    match found {
        Ok(Some(function)) => {
            tracing::debug!(target: TARGET, function = %name, n_arg, "function overloaded by virtual table");
            *px_func = Some(call_overload);
            *pp_arg = function.cast_mut().cast();
            1
        }
        Ok(None) | Err(_) => 0,
    }
}

/// Trampoline for overloads found by `xFindFunction`; the function itself
/// is the user data.
unsafe extern "C" fn call_overload(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) {
    let function = &*ffi::sqlite3_user_data(ctx).cast::<ScalarFunction>();
    let args = values_from_argv(argc, argv);
    match guard("overloaded function", || function(&args)) {
        Ok(value) => set_result(ctx, &value),
        Err(err) => set_result_error(ctx, &err),
    }
}

unsafe extern "C" fn x_shadow_name<M: Module>(name: *const c_char) -> c_int {
    let Some(suffix) = text_from_ptr(name) else {
        return 0;
    };
    guard("xShadowName", || Ok(M::is_shadow_name(&suffix))).map_or(0, c_int::from)
}

//! `sqlite3_value` / `sqlite3_context` marshaling.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uchar};
use std::slice;

use sqlbridge_error::BridgeError;
use sqlbridge_native::ffi;
use sqlbridge_types::SqliteValue;

/// Copy an engine value into an owned [`SqliteValue`].
///
/// # Safety
///
/// `value` must be a live `sqlite3_value*` handed to the current callback.
pub unsafe fn value_from_ptr(value: *mut ffi::sqlite3_value) -> SqliteValue {
    match ffi::sqlite3_value_type(value) {
        ffi::SQLITE_INTEGER => SqliteValue::Integer(ffi::sqlite3_value_int64(value)),
        ffi::SQLITE_FLOAT => SqliteValue::Float(ffi::sqlite3_value_double(value)),
        ffi::SQLITE_TEXT => {
            let text = ffi::sqlite3_value_text(value);
            let len = ffi::sqlite3_value_bytes(value);
            if text.is_null() || len <= 0 {
                SqliteValue::Text(String::new())
            } else {
                let bytes = slice::from_raw_parts(text, len as usize);
                SqliteValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
        ffi::SQLITE_BLOB => {
            let blob = ffi::sqlite3_value_blob(value);
            let len = ffi::sqlite3_value_bytes(value);
            if blob.is_null() || len <= 0 {
                SqliteValue::Blob(Vec::new())
            } else {
                SqliteValue::Blob(slice::from_raw_parts(blob.cast::<u8>(), len as usize).to_vec())
            }
        }
        _ => SqliteValue::Null,
    }
}

/// Copy an `(argc, argv)` pair into owned values.
///
/// # Safety
///
/// `argv` must be null (with `argc <= 0`) or point to `argc` live values.
pub unsafe fn values_from_argv(argc: c_int, argv: *mut *mut ffi::sqlite3_value) -> Vec<SqliteValue> {
    let Ok(len) = usize::try_from(argc) else {
        return Vec::new();
    };
    if argv.is_null() || len == 0 {
        return Vec::new();
    }
    slice::from_raw_parts(argv, len)
        .iter()
        .map(|&v| value_from_ptr(v))
        .collect()
}

/// Hand `value` back as the result of the current call. The engine copies
/// text and blobs.
///
/// # Safety
///
/// `ctx` must be the live `sqlite3_context*` of the current callback.
pub unsafe fn set_result(ctx: *mut ffi::sqlite3_context, value: &SqliteValue) {
    match value {
        SqliteValue::Null => ffi::sqlite3_result_null(ctx),
        SqliteValue::Integer(i) => ffi::sqlite3_result_int64(ctx, *i),
        SqliteValue::Float(f) => ffi::sqlite3_result_double(ctx, *f),
        SqliteValue::Text(s) => {
            let ptr = if s.is_empty() {
                c"".as_ptr()
            } else {
                s.as_ptr().cast::<c_char>()
            };
            ffi::sqlite3_result_text64(
                ctx,
                ptr,
                s.len() as u64,
                ffi::SQLITE_TRANSIENT(),
                ffi::SQLITE_UTF8 as c_uchar,
            );
        }
        SqliteValue::Blob(b) if b.is_empty() => ffi::sqlite3_result_zeroblob(ctx, 0),
        SqliteValue::Blob(b) => {
            ffi::sqlite3_result_blob64(
                ctx,
                b.as_ptr().cast::<c_void>(),
                b.len() as u64,
                ffi::SQLITE_TRANSIENT(),
            );
        }
    }
}

/// Report `err` as the result of the current call.
///
/// # Safety
///
/// `ctx` must be the live `sqlite3_context*` of the current callback.
pub unsafe fn set_result_error(ctx: *mut ffi::sqlite3_context, err: &BridgeError) {
    let message = err.to_string();
    let len = c_int::try_from(message.len()).unwrap_or(c_int::MAX);
    ffi::sqlite3_result_error(ctx, message.as_ptr().cast::<c_char>(), len);
    ffi::sqlite3_result_error_code(ctx, err.raw_code());
}

//! End-to-end backups between on-disk databases, checked through rusqlite.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rusqlite::Connection;
use sqlbridge_backup::{BackupOptions, BackupSession, BackupSettings, BackupStepper, backup};
use sqlbridge_error::BridgeError;
use sqlbridge_types::Cx;

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn seed_rows(path: &Path, rows: i64) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch("CREATE TABLE t(b INTEGER)").unwrap();
    let tx = conn.unchecked_transaction().unwrap();
    for i in 0..rows {
        tx.execute("INSERT INTO t VALUES (?1)", [i]).unwrap();
    }
    tx.commit().unwrap();
}

fn seed_blobs(path: &Path, rows: i64) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch("CREATE TABLE blobs(x BLOB)").unwrap();
    for _ in 0..rows {
        conn.execute("INSERT INTO blobs VALUES (randomblob(3000))", [])
            .unwrap();
    }
}

fn read_rows(path: &Path) -> Vec<i64> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn.prepare("SELECT b FROM t ORDER BY rowid").unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap()
}

fn table_exists(path: &Path, name: &str) -> bool {
    let conn = Connection::open(path).unwrap();
    conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        > 0
}

// ─── Full copies ────────────────────────────────────────────────────────

#[test]
fn default_options_copy_rows_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_rows(&src, 1000);

    backup(&Cx::new(), path_str(&dest), path_str(&src), BackupOptions::default()).unwrap();

    assert_eq!(read_rows(&dest), (0..1000).collect::<Vec<_>>());
}

#[test]
fn existing_destination_content_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_rows(&src, 10);
    Connection::open(&dest)
        .unwrap()
        .execute_batch("CREATE TABLE stale(x); INSERT INTO stale VALUES (1);")
        .unwrap();

    let options = BackupOptions::default().with_step_delay(Duration::ZERO);
    backup(&Cx::new(), path_str(&dest), path_str(&src), options).unwrap();

    assert!(!table_exists(&dest, "stale"));
    assert_eq!(read_rows(&dest).len(), 10);
}

#[test]
fn uri_locations_are_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_rows(&src, 25);

    let src_uri = format!("file:{}?mode=ro", path_str(&src));
    let dest_uri = format!("file:{}", path_str(&dest));
    let options = BackupOptions::default().with_step_delay(Duration::ZERO);
    backup(&Cx::new(), &dest_uri, &src_uri, options).unwrap();

    assert_eq!(read_rows(&dest), (0..25).collect::<Vec<_>>());
}

#[test]
fn settings_from_json_drive_a_backup() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_rows(&src, 50);

    let settings = BackupSettings::from_json(
        r#"{"source_db": "main", "dest_db": "main", "pages_per_step": 1, "step_delay_ms": 0}"#,
    )
    .unwrap();
    backup(&Cx::new(), path_str(&dest), path_str(&src), settings.into()).unwrap();

    assert_eq!(read_rows(&dest).len(), 50);
}

// ─── Progress ───────────────────────────────────────────────────────────

#[test]
fn single_page_steps_report_monotone_progress() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_blobs(&src, 20);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = BackupOptions::default()
        .with_pages_per_step(1)
        .with_step_delay(Duration::ZERO)
        .with_progress(move |remaining, total| sink.lock().unwrap().push((remaining, total)));
    backup(&Cx::new(), path_str(&dest), path_str(&src), options).unwrap();

    let seen = seen.lock().unwrap();
    let (_, total) = *seen.last().unwrap();
    assert!(total > 20);
    assert_eq!(seen.len(), usize::try_from(total).unwrap());
    assert!(seen.windows(2).all(|w| w[1].0 <= w[0].0));
    assert_eq!(seen.last().unwrap().0, 0);
}

#[test]
fn manual_session_steps_match_pagecount() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_blobs(&src, 5);

    let mut session =
        BackupSession::open(path_str(&dest), "main", path_str(&src), "main").unwrap();
    let mut steps = 0;
    loop {
        steps += 1;
        match session.step(2) {
            sqlbridge_backup::StepOutcome::Continuing => assert!(session.remaining() > 0),
            sqlbridge_backup::StepOutcome::Done => break,
            other => panic!("unexpected step outcome {other:?}"),
        }
    }
    let pagecount = session.pagecount();
    assert_eq!(steps, (pagecount + 1) / 2);
    session.close().unwrap();
}

// ─── Contention and cancellation ────────────────────────────────────────

#[test]
fn locked_destination_is_retried_until_released() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_rows(&src, 100);

    let holder = Connection::open(&dest).unwrap();
    holder
        .execute_batch("CREATE TABLE placeholder(x); BEGIN EXCLUSIVE;")
        .unwrap();

    let seen = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&seen);
    let dest_path = dest.clone();
    let src_path = src.clone();
    let worker = thread::spawn(move || {
        let options = BackupOptions::default()
            .with_step_delay(Duration::from_millis(10))
            .with_progress(move |_, _| *sink.lock().unwrap() += 1);
        backup(&Cx::new(), path_str(&dest_path), path_str(&src_path), options)
    });

    thread::sleep(Duration::from_millis(100));
    holder.execute_batch("COMMIT").unwrap();
    drop(holder);

    worker.join().unwrap().unwrap();
    assert!(*seen.lock().unwrap() > 1);
    assert_eq!(read_rows(&dest).len(), 100);
    assert!(!table_exists(&dest, "placeholder"));
}

#[test]
fn cancel_before_start_leaves_destination_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_rows(&src, 10);

    let cx = Cx::new();
    cx.cancel();
    let err = backup(&cx, path_str(&dest), path_str(&src), BackupOptions::default()).unwrap_err();

    assert!(matches!(err, BridgeError::Cancelled));
    assert!(!dest.exists() || !table_exists(&dest, "t"));
}

#[test]
fn cancel_during_wait_returns_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_blobs(&src, 10);

    let cx = Cx::new();
    let canceller = cx.clone();
    let options = BackupOptions::default()
        .with_pages_per_step(1)
        .with_step_delay(Duration::from_secs(30))
        .with_progress(move |_, _| canceller.cancel());
    let err = backup(&cx, path_str(&dest), path_str(&src), options).unwrap_err();
    assert!(err.is_cancelled());
}

// ─── Failures ───────────────────────────────────────────────────────────

#[test]
fn missing_source_cannot_be_opened() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("absent.db");
    let dest = dir.path().join("dst.db");

    let err = backup(&Cx::new(), path_str(&dest), path_str(&src), BackupOptions::default())
        .unwrap_err();

    assert!(matches!(err, BridgeError::CannotOpen { ref path, .. } if path == &src));
}

#[test]
fn unknown_database_name_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    let dest = dir.path().join("dst.db");
    seed_rows(&src, 1);

    let options = BackupOptions::default().with_source_db("archive");
    let err = backup(&Cx::new(), path_str(&dest), path_str(&src), options).unwrap_err();

    assert_eq!(err.raw_code(), 1);
    assert!(err.to_string().contains("unknown database archive"));
}

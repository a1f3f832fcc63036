//! The step/retry loop and the one-call backup entry point.

use sqlbridge_error::Result;
use sqlbridge_types::Cx;

use crate::config::BackupOptions;
use crate::session::{BackupSession, BackupStepper, StepOutcome};

/// Drive `session` until it reports `Done`, a step fails, or `cx` is
/// cancelled.
///
/// Every iteration checks cancellation, issues one step of
/// `options.pages_per_step` pages, and reports the counters to
/// `options.progress` exactly once. `Continuing` and `Retryable` steps are
/// followed by a cancellable wait of `options.step_delay`.
///
/// # Errors
///
/// [`BridgeError::Cancelled`](sqlbridge_error::BridgeError::Cancelled) if
/// `cx` is cancelled, or the error carried by a `Fatal` step.
pub fn run_backup<S>(cx: &Cx, session: &mut S, options: &mut BackupOptions) -> Result<()>
where
    S: BackupStepper + ?Sized,
{
    let mut steps: u64 = 0;
    let mut retries: u64 = 0;
    loop {
        if let Err(err) = cx.checkpoint() {
            tracing::info!(
                target: "sqlbridge.backup",
                steps,
                reason = ?cx.cancel_reason(),
                "backup cancelled before step"
            );
            return Err(err);
        }

        let outcome = session.step(options.pages_per_step);
        steps += 1;
        let remaining = session.remaining();
        let pagecount = session.pagecount();
        (options.progress)(remaining, pagecount);

        match outcome {
            StepOutcome::Done => {
                tracing::info!(target: "sqlbridge.backup", steps, retries, pagecount, "backup complete");
                return Ok(());
            }
            StepOutcome::Fatal(err) => {
                tracing::warn!(target: "sqlbridge.backup", steps, error = %err, "backup step failed");
                return Err(err);
            }
            StepOutcome::Retryable(err) => {
                retries += 1;
                tracing::warn!(
                    target: "sqlbridge.backup",
                    steps,
                    retries,
                    error = %err,
                    "source or destination busy, retrying"
                );
            }
            StepOutcome::Continuing => {
                tracing::debug!(target: "sqlbridge.backup", steps, remaining, pagecount, "step");
            }
        }

        if let Err(err) = cx.sleep(options.step_delay) {
            tracing::info!(
                target: "sqlbridge.backup",
                steps,
                reason = ?cx.cancel_reason(),
                "backup cancelled while waiting"
            );
            return Err(err);
        }
    }
}

/// Copy database `options.source_db` of `src` into `options.dest_db` of
/// `dest`.
///
/// `dest` is opened read-write and created if missing; `src` is opened
/// read-only. Both may be `file:` URIs. The session is closed on every
/// path. If the loop fails its error wins and a close error is only logged.
///
/// # Errors
///
/// Invalid options, open failures, cancellation, a fatal step, or a
/// teardown failure after a successful copy.
pub fn backup(cx: &Cx, dest: &str, src: &str, mut options: BackupOptions) -> Result<()> {
    options.validate()?;
    let span = tracing::info_span!(target: "sqlbridge.backup", "backup", source = src, dest);
    let _guard = span.enter();

    cx.checkpoint()?;
    tracing::info!(
        target: "sqlbridge.backup",
        source_db = %options.source_db,
        dest_db = %options.dest_db,
        pages_per_step = options.pages_per_step,
        step_delay_ms = u64::try_from(options.step_delay.as_millis()).unwrap_or(u64::MAX),
        "backup started"
    );

    let mut session = BackupSession::open(dest, &options.dest_db, src, &options.source_db)?;
    let outcome = run_backup(cx, &mut session, &mut options);
    let closed = session.close();

    match (outcome, closed) {
        (Err(err), Err(close_err)) => {
            tracing::warn!(
                target: "sqlbridge.backup",
                error = %close_err,
                "teardown failed after an earlier backup error"
            );
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
        (Ok(()), closed) => closed,
    }
}

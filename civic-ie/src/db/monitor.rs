//! Transaction timing
//!
//! Wraps a SQLite transaction with acquisition and hold-time logging. A
//! transaction that is dropped without commit rolls back (sqlx semantics);
//! the drop is logged so abandoned submissions show up in traces.

use civic_common::Result;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;

/// Hold time above which a transaction is reported
const LONG_HOLD_MS: u128 = 1000;

/// Logs how long a transaction was held when it finishes or is dropped
struct HoldTimer {
    caller: &'static str,
    acquired_at: Instant,
    finished: bool,
}

impl HoldTimer {
    fn finish(mut self, how: &'static str) {
        self.finished = true;
        log_release(self.caller, self.acquired_at, how);
    }
}

impl Drop for HoldTimer {
    fn drop(&mut self) {
        if !self.finished {
            log_release(self.caller, self.acquired_at, "drop");
        }
    }
}

fn log_release(caller: &'static str, acquired_at: Instant, how: &'static str) {
    let held_ms = acquired_at.elapsed().as_millis();
    if held_ms > LONG_HOLD_MS {
        tracing::warn!(caller, held_ms, how, "Long transaction held the database writer");
    } else {
        tracing::debug!(caller, held_ms, how, "Transaction released");
    }
}

pub struct MonitoredTransaction<'c> {
    tx: Transaction<'c, Sqlite>,
    timer: HoldTimer,
}

impl<'c> MonitoredTransaction<'c> {
    /// Connection to run statements on
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        let Self { tx, timer } = self;
        tx.commit().await?;
        timer.finish("commit");
        Ok(())
    }
}

/// Begin a transaction, logging how long the pool took to hand out a connection
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();
    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > LONG_HOLD_MS {
        tracing::warn!(caller, wait_ms, "Slow connection acquisition, pool may be saturated");
    } else {
        tracing::debug!(caller, wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction {
        tx,
        timer: HoldTimer {
            caller,
            acquired_at: Instant::now(),
            finished: false,
        },
    })
}

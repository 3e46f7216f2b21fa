//! `tracing` events emitted by the execution layer.
//!
//! Enabled by the `tracing` feature (on by default). Statements are logged as
//! SQL text only; parameter values never reach a log line.
//!
//! | target          | level | event                                   |
//! |-----------------|-------|-----------------------------------------|
//! | `pgdoc.sql`     | DEBUG | statement executed                      |
//! | `pgdoc.retry`   | WARN  | transient failure, attempt repeated     |
//! | `pgdoc.sql`     | ERROR | deadlock                                |
//! | `pgdoc.keygen`  | DEBUG | new key block reserved                  |
//! | `pgdoc.tx`      | WARN  | transaction dropped without commit      |

use crate::error::DocError;
use std::time::Duration;

/// Longest SQL text written to a log line, in bytes.
#[cfg(feature = "tracing")]
const MAX_SQL_LENGTH: usize = 500;

#[cfg(feature = "tracing")]
fn truncate_sql(sql: &str) -> String {
    if sql.len() <= MAX_SQL_LENGTH {
        return sql.to_string();
    }
    let mut end = MAX_SQL_LENGTH;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

#[cfg(feature = "tracing")]
pub(crate) fn statement(transaction: &str, tag: Option<&str>, sql: &str, elapsed: Duration) {
    tracing::debug!(
        target: "pgdoc.sql",
        transaction,
        tag = tag.unwrap_or("-"),
        elapsed_ms = elapsed.as_millis() as u64,
        sql = %truncate_sql(sql),
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn statement(_transaction: &str, _tag: Option<&str>, _sql: &str, _elapsed: Duration) {}

#[cfg(feature = "tracing")]
pub(crate) fn retry(attempt: u32, delay: Duration, error: &DocError) {
    tracing::warn!(
        target: "pgdoc.retry",
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "retrying transient failure",
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn retry(_attempt: u32, _delay: Duration, _error: &DocError) {}

#[cfg(feature = "tracing")]
pub(crate) fn deadlock(transaction: &str, sql: &str, open_transactions: &str) {
    tracing::error!(
        target: "pgdoc.sql",
        transaction,
        sql = %truncate_sql(sql),
        open_transactions,
        "deadlock detected",
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn deadlock(_transaction: &str, _sql: &str, _open_transactions: &str) {}

#[cfg(feature = "tracing")]
pub(crate) fn key_block(table: &str, start: i64, end: i64) {
    tracing::debug!(target: "pgdoc.keygen", table, start, end, "reserved key block");
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn key_block(_table: &str, _start: i64, _end: i64) {}

#[cfg(feature = "tracing")]
pub(crate) fn dropped_transaction(transaction: &str, statements: usize) {
    tracing::warn!(
        target: "pgdoc.tx",
        transaction,
        statements,
        "transaction dropped without commit or rollback; rolling back",
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn dropped_transaction(_transaction: &str, _statements: usize) {}

#[cfg(all(test, feature = "tracing"))]
mod tests {
    use super::*;

    #[test]
    fn long_sql_is_truncated_on_a_char_boundary() {
        let sql = format!("SELECT '{}'", "é".repeat(400));
        let out = truncate_sql(&sql);
        assert!(out.ends_with("..."));
        assert!(out.len() <= MAX_SQL_LENGTH + 3);
    }

    #[test]
    fn short_sql_is_unchanged() {
        assert_eq!(truncate_sql("SELECT 1"), "SELECT 1");
    }
}

//! Store configuration.

use crate::retry::{BackoffPolicy, RetryPolicy};
use crate::sql::Dialect;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of ids reserved per key block.
pub const DEFAULT_KEY_BLOCK_SIZE: i64 = 10;

/// Default number of statements kept per transaction for diagnostics.
pub const DEFAULT_TRACE_CAPACITY: usize = 200;

/// How `to_list_with_count` obtains the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountStrategy {
    /// Page query followed by a `COUNT(*)` query.
    #[default]
    TwoRoundTrips,
    /// One CTE statement with a `COUNT(*) OVER ()` column.
    SingleRoundTrip,
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options applied when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// `BEGIN ISOLATION LEVEL ... [READ ONLY]`
    pub fn begin_sql(&self) -> String {
        let mut sql = format!("BEGIN ISOLATION LEVEL {}", self.isolation.sql());
        if self.read_only {
            sql.push_str(" READ ONLY");
        }
        sql
    }
}

/// Configuration for a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Clone)]
pub struct StoreConfig {
    /// Dialect statements are rendered in before execution.
    pub dialect: Dialect,
    /// Ids reserved per key block.
    pub key_block_size: i64,
    /// Timeout applied to every command without its own override.
    pub command_timeout: Option<Duration>,
    pub count_strategy: CountStrategy,
    /// Statements kept per transaction for deadlock reports.
    pub trace_capacity: usize,
    pub transaction_options: TransactionOptions,
    /// Retry policy for reads and bulk deletes.
    pub retry_policy: Arc<dyn RetryPolicy>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            key_block_size: DEFAULT_KEY_BLOCK_SIZE,
            command_timeout: None,
            count_strategy: CountStrategy::default(),
            trace_capacity: DEFAULT_TRACE_CAPACITY,
            transaction_options: TransactionOptions::default(),
            retry_policy: Arc::new(BackoffPolicy::default()),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("dialect", &self.dialect)
            .field("key_block_size", &self.key_block_size)
            .field("command_timeout", &self.command_timeout)
            .field("count_strategy", &self.count_strategy)
            .field("trace_capacity", &self.trace_capacity)
            .field("transaction_options", &self.transaction_options)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

impl StoreConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the key block size (at least 1).
    pub fn key_block_size(mut self, size: i64) -> Self {
        self.key_block_size = size.max(1);
        self
    }

    /// Set the default command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn count_strategy(mut self, strategy: CountStrategy) -> Self {
        self.count_strategy = strategy;
        self
    }

    pub fn trace_capacity(mut self, capacity: usize) -> Self {
        self.trace_capacity = capacity;
        self
    }

    pub fn transaction_options(mut self, options: TransactionOptions) -> Self {
        self.transaction_options = options;
        self
    }

    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }
}

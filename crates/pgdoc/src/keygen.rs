//! Block-based id allocation.
//!
//! Each table owns a block of reserved ids. `next_id` hands them out under
//! that table's lock and reserves a new block from the [`BlockSource`] once the
//! current one is used up. Blocks are never returned, so ids are never reused;
//! ids left in a block when the process exits are simply skipped.

use crate::error::{DocError, DocResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// DDL for the table [`PgBlockSource`] reserves blocks in.
pub const KEY_BLOCKS_DDL: &str = r#"CREATE TABLE IF NOT EXISTS "KeyBlocks" ("Table" text PRIMARY KEY, "NextKey" bigint NOT NULL)"#;

const RESERVE_SQL: &str = r#"INSERT INTO "KeyBlocks" ("Table", "NextKey") VALUES ($1, $2) ON CONFLICT ("Table") DO UPDATE SET "NextKey" = "KeyBlocks"."NextKey" + EXCLUDED."NextKey" RETURNING "NextKey""#;

/// Where key blocks come from.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Reserve `size` more ids for `table`; returns the new highest reserved id.
    ///
    /// The caller owns `max - size + 1 ..= max`.
    async fn next_block(&self, table: &str, size: i64) -> DocResult<i64>;
}

/// Ids reserved for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    start: i64,
    next: i64,
    /// Last id of the block, inclusive.
    end: i64,
}

impl Block {
    const EMPTY: Block = Block {
        start: 0,
        next: 1,
        end: 0,
    };

    fn exhausted(&self) -> bool {
        self.next > self.end
    }

    fn extend(&mut self, table: &str, max: i64, size: i64) -> DocResult<()> {
        if max < self.next {
            return Err(DocError::Other(format!(
                "key block source returned {max} for {table}, below the next id {}",
                self.next
            )));
        }
        let start = max.saturating_sub(size).saturating_add(1).max(1);
        // Never hand out an id below one already issued.
        self.start = start.max(self.next);
        self.next = self.start;
        self.end = max;
        Ok(())
    }
}

/// Per-table id allocator.
///
/// Tables are independent: allocating for one never waits on another.
pub struct KeyAllocator {
    source: Arc<dyn BlockSource>,
    block_size: i64,
    blocks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Block>>>>,
}

impl fmt::Debug for KeyAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAllocator")
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl KeyAllocator {
    pub fn new(source: Arc<dyn BlockSource>, block_size: i64) -> Self {
        Self {
            source,
            block_size: block_size.max(1),
            blocks: Mutex::new(HashMap::new()),
        }
    }

    pub fn block_size(&self) -> i64 {
        self.block_size
    }

    fn block(&self, table: &str) -> Arc<tokio::sync::Mutex<Block>> {
        let mut blocks = match self.blocks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        blocks
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Block::EMPTY)))
            .clone()
    }

    /// Next unused id for `table`. Never 0.
    pub async fn next_id(&self, table: &str) -> DocResult<i64> {
        let block = self.block(table);
        let mut block = block.lock().await;
        if block.exhausted() {
            let max = self.source.next_block(table, self.block_size).await?;
            block.extend(table, max, self.block_size)?;
            crate::logging::key_block(table, block.start, block.end);
        }
        let id = block.next;
        block.next += 1;
        Ok(id)
    }
}

/// Reserves blocks in the `KeyBlocks` table, each in its own SERIALIZABLE
/// transaction on a pooled connection.
#[cfg(feature = "pool")]
#[derive(Debug, Clone)]
pub struct PgBlockSource {
    pool: deadpool_postgres::Pool,
    retry: crate::retry::RetryManager,
}

#[cfg(feature = "pool")]
impl PgBlockSource {
    pub fn new(pool: deadpool_postgres::Pool, retry: crate::retry::RetryManager) -> Self {
        Self { pool, retry }
    }

    async fn reserve(&self, table: &str, size: i64) -> DocResult<i64> {
        let mut client = self.pool.get().await?;
        let tx = client
            .build_transaction()
            .isolation_level(tokio_postgres::IsolationLevel::Serializable)
            .start()
            .await?;
        let row = tx.query_one(RESERVE_SQL, &[&table, &size]).await?;
        let max: i64 = row.try_get(0)?;
        tx.commit().await?;
        Ok(max)
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl BlockSource for PgBlockSource {
    async fn next_block(&self, table: &str, size: i64) -> DocResult<i64> {
        self.retry.retry(|| self.reserve(table, size)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Shared in-memory `KeyBlocks` row per table.
    #[derive(Default)]
    struct MemorySource {
        next_keys: Mutex<HashMap<String, i64>>,
        calls: AtomicI64,
    }

    #[async_trait]
    impl BlockSource for MemorySource {
        async fn next_block(&self, table: &str, size: i64) -> DocResult<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut keys = self.next_keys.lock().unwrap();
            let next = keys.entry(table.to_string()).or_insert(0);
            *next += size;
            Ok(*next)
        }
    }

    #[tokio::test]
    async fn allocators_interleave_whole_blocks() {
        let source = Arc::new(MemorySource::default());
        let a = KeyAllocator::new(source.clone(), 10);
        let b = KeyAllocator::new(source.clone(), 10);

        for expected in 1..=10 {
            assert_eq!(a.next_id("People").await.unwrap(), expected);
        }
        for expected in 11..=20 {
            assert_eq!(b.next_id("People").await.unwrap(), expected);
        }
        assert_eq!(a.next_id("People").await.unwrap(), 21);
        for _ in 0..9 {
            b.next_id("People").await.unwrap();
        }
        assert_eq!(b.next_id("People").await.unwrap(), 31);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn tables_are_independent() {
        let source = Arc::new(MemorySource::default());
        let allocator = KeyAllocator::new(source, 5);
        assert_eq!(allocator.next_id("People").await.unwrap(), 1);
        assert_eq!(allocator.next_id("Orders").await.unwrap(), 1);
        assert_eq!(allocator.next_id("People").await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocation_never_overlaps() {
        let source = Arc::new(MemorySource::default());
        let allocator = Arc::new(KeyAllocator::new(source, 7));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for _ in 0..50 {
                    ids.push(allocator.next_id("People").await.unwrap());
                }
                ids
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(all.len(), before);
        assert!(all.iter().all(|&id| id > 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn allocators_sharing_a_source_never_overlap() {
        let source = Arc::new(MemorySource::default());

        let mut handles = Vec::new();
        for _ in 0..6 {
            let allocator = KeyAllocator::new(source.clone(), 5);
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for _ in 0..40 {
                    ids.push(allocator.next_id("People").await.unwrap());
                    tokio::task::yield_now().await;
                }
                ids
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        assert_eq!(all.len(), 240);
        assert!(all.iter().all(|&id| id > 0));
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 240);
        // 6 allocators x 40 ids in blocks of 5.
        assert_eq!(source.calls.load(Ordering::SeqCst), 48);
    }

    #[test]
    fn block_start_is_never_zero() {
        let mut block = Block::EMPTY;
        block.extend("People", 3, 10).unwrap();
        assert_eq!((block.start, block.end), (1, 3));
    }

    #[test]
    fn block_below_issued_ids_is_rejected() {
        let mut block = Block::EMPTY;
        block.extend("People", 10, 10).unwrap();
        block.next = 11;
        let err = block.extend("People", 5, 10).unwrap_err();
        assert!(matches!(err, DocError::Other(_)));
        assert!(block.exhausted());
    }

    struct StaleSource;

    #[async_trait]
    impl BlockSource for StaleSource {
        async fn next_block(&self, _table: &str, _size: i64) -> DocResult<i64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn stale_source_issues_nothing() {
        let allocator = KeyAllocator::new(Arc::new(StaleSource), 10);
        assert!(allocator.next_id("People").await.is_err());
        assert!(allocator.next_id("People").await.is_err());
    }
}

//! Store-level state shared by every transaction it opens.

use crate::config::{StoreConfig, TransactionOptions};
use crate::document::{Document, DocumentMapRegistry};
use crate::error::{DocError, DocResult};
use crate::keygen::{BlockSource, KeyAllocator};
use crate::related::RelatedDocumentStore;
use crate::retry::RetryManager;
use crate::transaction::{Connection, DocTransaction, TransactionRegistry};
use crate::types::TypeHandlerRegistry;
use std::fmt;
use std::sync::Arc;

pub(crate) struct Shared {
    pub(crate) config: StoreConfig,
    pub(crate) retry: RetryManager,
    pub(crate) registry: TransactionRegistry,
    pub(crate) maps: DocumentMapRegistry,
    pub(crate) handlers: TypeHandlerRegistry,
    pub(crate) keys: KeyAllocator,
    pub(crate) related: Option<Arc<dyn RelatedDocumentStore>>,
}

/// Entry point: owns the connection source, the document maps and the key
/// allocator, and opens [`DocTransaction`]s.
///
/// Cheap to clone; clones share all state.
///
/// ```ignore
/// let store = DocumentStore::connect(&database_url, StoreConfig::default())?;
/// let tx = store.begin().await?;
/// let mut duck = Person::new("Donald", "Duck");
/// tx.insert(&mut duck).await?;
/// tx.commit().await?;
/// ```
#[derive(Clone)]
pub struct DocumentStore {
    shared: Arc<Shared>,
    #[cfg(feature = "pool")]
    pool: Option<deadpool_postgres::Pool>,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.shared.config)
            .field("maps", &self.shared.maps.len())
            .field("open_transactions", &self.shared.registry.len())
            .finish_non_exhaustive()
    }
}

/// Optional parts of a [`DocumentStore`].
#[derive(Default)]
pub struct DocumentStoreBuilder {
    config: StoreConfig,
    maps: Option<DocumentMapRegistry>,
    handlers: Option<TypeHandlerRegistry>,
    related: Option<Arc<dyn RelatedDocumentStore>>,
    block_source: Option<Arc<dyn BlockSource>>,
    #[cfg(feature = "pool")]
    pool: Option<deadpool_postgres::Pool>,
}

impl DocumentStoreBuilder {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[cfg(feature = "pool")]
    pub fn pool(mut self, pool: deadpool_postgres::Pool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Maps to use instead of the `#[derive(Document)]` inventory.
    pub fn maps(mut self, maps: DocumentMapRegistry) -> Self {
        self.maps = Some(maps);
        self
    }

    pub fn handlers(mut self, handlers: TypeHandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn related(mut self, related: Arc<dyn RelatedDocumentStore>) -> Self {
        self.related = Some(related);
        self
    }

    /// Where key blocks come from. Defaults to the `KeyBlocks` table on the pool.
    pub fn block_source(mut self, source: Arc<dyn BlockSource>) -> Self {
        self.block_source = Some(source);
        self
    }

    pub fn build(self) -> DocResult<DocumentStore> {
        let retry = RetryManager::new(Arc::clone(&self.config.retry_policy));
        let source = match self.block_source {
            Some(source) => source,
            None => self.default_block_source(&retry)?,
        };
        let keys = KeyAllocator::new(source, self.config.key_block_size);
        let shared = Shared {
            retry,
            registry: TransactionRegistry::new(),
            maps: self.maps.unwrap_or_else(DocumentMapRegistry::from_inventory),
            handlers: self.handlers.unwrap_or_default(),
            keys,
            related: self.related,
            config: self.config,
        };
        Ok(DocumentStore {
            shared: Arc::new(shared),
            #[cfg(feature = "pool")]
            pool: self.pool,
        })
    }

    #[cfg(feature = "pool")]
    fn default_block_source(&self, retry: &RetryManager) -> DocResult<Arc<dyn BlockSource>> {
        match &self.pool {
            Some(pool) => Ok(Arc::new(crate::keygen::PgBlockSource::new(
                pool.clone(),
                retry.clone(),
            ))),
            None => Err(DocError::Other(
                "a block source is required when the store has no pool".to_string(),
            )),
        }
    }

    #[cfg(not(feature = "pool"))]
    fn default_block_source(&self, _retry: &RetryManager) -> DocResult<Arc<dyn BlockSource>> {
        Err(DocError::Other(
            "a block source is required when the store has no pool".to_string(),
        ))
    }
}

impl DocumentStore {
    pub fn builder(config: StoreConfig) -> DocumentStoreBuilder {
        DocumentStoreBuilder::new(config)
    }

    /// Store over a new pool for `database_url`.
    #[cfg(feature = "pool")]
    pub fn connect(database_url: &str, config: StoreConfig) -> DocResult<Self> {
        let pool = crate::pool::create_pool(database_url)?;
        Self::new(pool, config)
    }

    #[cfg(feature = "pool")]
    pub fn new(pool: deadpool_postgres::Pool, config: StoreConfig) -> DocResult<Self> {
        Self::builder(config).pool(pool).build()
    }

    /// Open a transaction on a pooled connection with the configured options.
    #[cfg(feature = "pool")]
    pub async fn begin(&self) -> DocResult<DocTransaction> {
        self.begin_with(self.shared.config.transaction_options).await
    }

    #[cfg(feature = "pool")]
    pub async fn begin_with(&self, options: TransactionOptions) -> DocResult<DocTransaction> {
        let pool = self.pool.as_ref().ok_or_else(|| {
            DocError::Connection("store was built without a pool; use begin_on".to_string())
        })?;
        let client = pool.get().await?;
        DocTransaction::begin(
            Arc::clone(&self.shared),
            Connection::Pooled(client),
            options,
        )
        .await
    }

    /// Open a transaction on a connection the caller established.
    ///
    /// The connection is owned by the transaction and closed with it.
    pub async fn begin_on(
        &self,
        client: tokio_postgres::Client,
        options: TransactionOptions,
    ) -> DocResult<DocTransaction> {
        DocTransaction::begin(Arc::clone(&self.shared), Connection::Direct(client), options).await
    }

    /// Next id for `T`'s table, outside any transaction.
    pub async fn next_id<T: Document>(&self) -> DocResult<i64> {
        let map = self.shared.maps.resolve::<T>()?;
        self.shared.keys.next_id(map.table()).await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    pub fn maps(&self) -> &DocumentMapRegistry {
        &self.shared.maps
    }

    pub fn handlers(&self) -> &TypeHandlerRegistry {
        &self.shared.handlers
    }

    pub fn transactions(&self) -> &TransactionRegistry {
        &self.shared.registry
    }

    #[cfg(feature = "pool")]
    pub fn pool(&self) -> Option<&deadpool_postgres::Pool> {
        self.pool.as_ref()
    }
}

use super::Statement;
use crate::document::DocumentMap;
use crate::param::BoundParam;
use crate::retry::OperationKind;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::ToSql;

/// Final SQL text plus bound parameters and execution metadata.
///
/// Produced once per terminal builder call and never mutated afterwards; the
/// `with_*` methods consume the command and return a new one.
#[derive(Debug, Clone)]
#[must_use]
pub struct PreparedCommand {
    sql: String,
    params: Vec<BoundParam>,
    map: Option<Arc<DocumentMap>>,
    kind: OperationKind,
    timeout: Option<Duration>,
    tag: Option<String>,
}

impl PreparedCommand {
    pub fn new(statement: Statement, kind: OperationKind) -> Self {
        Self {
            sql: statement.sql,
            params: statement.params,
            map: None,
            kind,
            timeout: None,
            tag: None,
        }
    }

    /// Attach the document map used to translate constraint violations.
    pub fn with_map(mut self, map: Arc<DocumentMap>) -> Self {
        self.map = Some(map);
        self
    }

    /// Override the store's command timeout for this command.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Tag used in statement logs.
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    pub fn map(&self) -> Option<&DocumentMap> {
        self.map.as_deref()
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Parameter values as `tokio-postgres` bind references.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| &p.value as &(dyn ToSql + Sync))
            .collect()
    }
}

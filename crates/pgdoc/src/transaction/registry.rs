use super::trace::{StatementTrace, TracedStatement};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Diagnostics shared between a transaction and the registry.
#[derive(Debug)]
pub(crate) struct TransactionState {
    pub(crate) name: String,
    pub(crate) started: Instant,
    trace: Mutex<StatementTrace>,
}

impl TransactionState {
    pub(crate) fn trace(&self) -> MutexGuard<'_, StatementTrace> {
        match self.trace.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn record(&self, statement: TracedStatement) {
        self.trace().record(statement);
    }
}

/// Every transaction currently open on a store.
///
/// Used to attach a dump of concurrent transactions to deadlock errors.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    next_id: AtomicU64,
    open: Mutex<BTreeMap<u64, Arc<TransactionState>>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<TransactionState>>> {
        match self.open.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn register(&self, trace_capacity: usize) -> (u64, Arc<TransactionState>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let state = Arc::new(TransactionState {
            name: format!("tx-{id}"),
            started: Instant::now(),
            trace: Mutex::new(StatementTrace::new(trace_capacity)),
        });
        self.open().insert(id, Arc::clone(&state));
        (id, state)
    }

    pub(crate) fn unregister(&self, id: u64) {
        self.open().remove(&id);
    }

    /// Number of open transactions.
    pub fn len(&self) -> usize {
        self.open().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable listing of open transactions and their recent statements.
    ///
    /// Contains SQL text only, never parameter values.
    pub fn dump(&self) -> String {
        let open: Vec<_> = self.open().values().cloned().collect();
        let mut out = String::new();
        for state in open {
            let trace = state.trace();
            let _ = writeln!(
                out,
                "  {} (open {:?}, {} statements)",
                state.name,
                state.started.elapsed(),
                trace.total()
            );
            let _ = write!(out, "{trace}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn register_and_dump() {
        let registry = TransactionRegistry::new();
        let (first, state) = registry.register(10);
        let (second, _) = registry.register(10);
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);

        state.record(TracedStatement {
            sql: "UPDATE \"People\" SET \"FirstName\" = $1".into(),
            tag: None,
            elapsed: Duration::from_millis(3),
            succeeded: true,
        });
        let dump = registry.dump();
        assert!(dump.contains(&state.name));
        assert!(dump.contains("UPDATE \"People\""));

        registry.unregister(first);
        assert_eq!(registry.len(), 1);
        assert!(!registry.dump().contains(&format!("{} (", state.name)));
    }
}

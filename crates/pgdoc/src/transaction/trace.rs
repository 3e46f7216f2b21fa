use std::fmt;
use std::time::Duration;

/// One statement issued by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedStatement {
    pub sql: String,
    pub tag: Option<String>,
    pub elapsed: Duration,
    pub succeeded: bool,
}

/// Bounded record of the statements a transaction issued.
///
/// Recording stops once `capacity` statements are stored; later statements
/// are only counted.
#[derive(Debug, Clone)]
pub struct StatementTrace {
    capacity: usize,
    statements: Vec<TracedStatement>,
    dropped: usize,
}

impl StatementTrace {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            statements: Vec::new(),
            dropped: 0,
        }
    }

    pub fn record(&mut self, statement: TracedStatement) {
        if self.statements.len() < self.capacity {
            self.statements.push(statement);
        } else {
            self.dropped += 1;
        }
    }

    pub fn statements(&self) -> &[TracedStatement] {
        &self.statements
    }

    /// Statements issued after the trace was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Total statements issued, recorded or not.
    pub fn total(&self) -> usize {
        self.statements.len() + self.dropped
    }
}

impl fmt::Display for StatementTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.statements.iter().enumerate() {
            let status = if statement.succeeded { "ok" } else { "failed" };
            write!(f, "    {:>3}. [{status}, {:?}]", i + 1, statement.elapsed)?;
            if let Some(tag) = &statement.tag {
                write!(f, " ({tag})")?;
            }
            writeln!(f, " {}", statement.sql)?;
        }
        if self.dropped > 0 {
            writeln!(f, "    ... {} more not recorded", self.dropped)?;
        }
        Ok(())
    }
}

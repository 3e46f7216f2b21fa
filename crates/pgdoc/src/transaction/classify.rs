use super::registry::TransactionRegistry;
use crate::document::DocumentMap;
use crate::error::DocError;

const UNIQUE_VIOLATION: &str = "23505";
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, PartialEq, Eq)]
enum Class<'a> {
    Unique { constraint: &'a str, message: &'a str },
    Deadlock,
    Other,
}

fn class<'a>(code: &str, constraint: Option<&str>, map: Option<&'a DocumentMap>) -> Class<'a> {
    match code {
        UNIQUE_VIOLATION => {
            let declared = constraint
                .zip(map)
                .and_then(|(name, map)| map.unique_constraint(name));
            match declared {
                Some(c) => Class::Unique {
                    constraint: &c.name,
                    message: &c.message,
                },
                None => Class::Other,
            }
        }
        DEADLOCK_DETECTED => Class::Deadlock,
        _ => Class::Other,
    }
}

/// Attach statement context to a driver error and translate the ones callers
/// handle specifically.
///
/// Parameter values never end up in the resulting error.
pub(crate) fn classify(
    error: DocError,
    sql: &str,
    transaction: &str,
    map: Option<&DocumentMap>,
    registry: &TransactionRegistry,
) -> DocError {
    let DocError::Query(source) = error else {
        return error;
    };
    let class = match source.as_db_error() {
        Some(db) => class(db.code().code(), db.constraint(), map),
        None => Class::Other,
    };
    match class {
        Class::Unique {
            constraint,
            message,
        } => DocError::UniqueConstraint {
            constraint: constraint.to_string(),
            message: message.to_string(),
        },
        Class::Deadlock => {
            let open_transactions = registry.dump();
            crate::logging::deadlock(transaction, sql, &open_transactions);
            DocError::Deadlock {
                sql: sql.to_string(),
                transaction: transaction.to_string(),
                open_transactions,
                source,
            }
        }
        Class::Other => DocError::Database {
            sql: sql.to_string(),
            transaction: transaction.to_string(),
            source,
        },
    }
}

//! SQL generation.
//!
//! [`SqlGenerator`] walks a [`SelectAst`](crate::ast::SelectAst) and renders it
//! for a [`Dialect`] through a [`SqlWriter`], which keeps text and parameter
//! references apart until the final [`Statement`] is produced. Document
//! statements (insert/update/load) live in [`document`].
//!
//! ```ignore
//! use pgdoc::sql::{Dialect, SqlGenerator};
//!
//! let statement = SqlGenerator::new(Dialect::SqlServer, &store).select(&ast)?;
//! assert_eq!(statement.sql, "SELECT * FROM [People] WHERE [FirstName] = @firstname__0 ORDER BY [Id] ASC");
//! ```

mod command;
mod dialect;
pub mod document;
mod generator;
mod writer;

#[cfg(test)]
mod tests;

pub use command::PreparedCommand;
pub use dialect::Dialect;
pub use generator::{ROW_NUMBER_COLUMN, SqlGenerator, TOTAL_COUNT_COLUMN, count_ast};
pub use writer::{SqlWriter, Statement};

//! Derive macros for pgdoc
//!
//! Provides `#[derive(Document)]` and `#[derive(FromRow)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod common;
mod document;
mod from_row;

/// Derive `Document` for a struct stored as one row, or for an enum of such structs.
///
/// # Example
///
/// ```ignore
/// use pgdoc::Document;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Document)]
/// #[serde(rename_all = "camelCase")]
/// #[doc_map(table = "People")]
/// #[doc_map(unique(name = "UX_People_Email", columns("Email"), message = "email already registered"))]
/// struct Person {
///     #[doc_map(id)]
///     id: i64,
///     #[doc_map(indexed, max_length = 100)]
///     first_name: String,
///     #[doc_map(indexed)]
///     email: Option<String>,
///     nickname: Option<String>,
/// }
/// ```
///
/// # Generated
///
/// - `impl Document`: the `DocumentMap` and id accessors
/// - one `Field<Self, V>` constant per field (`Person::FIRST_NAME`)
/// - an inventory registration so `DocumentMapRegistry::from_inventory` finds the type
///
/// # Attributes
///
/// - `#[doc_map(table = "name")]` - table name (required)
/// - `#[doc_map(id_column = "Id", document_column = "Document")]` - column overrides
/// - `#[doc_map(unique(name = "..", columns(".."), message = ".."))]` - declared unique constraint
/// - `#[doc_map(id)]` - id field (defaults to a field named `id`; must be `i64`)
/// - `#[doc_map(indexed)]` - store the field in its own column
/// - `#[doc_map(column = "..", sql_type = "..", max_length = N)]` - indexed column details
///
/// JSON keys follow the struct's `#[serde(rename_all)]` and field `#[serde(rename)]`.
///
/// # Polymorphic documents
///
/// An enum of newtype variants, each wrapping a document stored in the same
/// table, reads every row back as the variant named by its discriminator column.
/// The first variant supplies the table and column map.
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Document)]
/// #[serde(untagged)]
/// #[doc_map(discriminator = "Kind")]
/// enum Animal {
///     #[doc_map(discriminator = "dog")]
///     Dog(Dog),
///     #[doc_map(discriminator = "cat")]
///     Cat(Cat),
/// }
/// ```
///
/// - `#[doc_map(discriminator = "Column")]` - discriminator column (defaults to `Discriminator`)
/// - `#[doc_map(discriminator = "value")]` on a variant - stored value (defaults to the variant name)
#[proc_macro_derive(Document, attributes(doc_map))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    document::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `FromRow` for a projection struct; fields are read by column name.
///
/// # Example
///
/// ```ignore
/// use pgdoc::FromRow;
///
/// #[derive(FromRow)]
/// struct NameCount {
///     #[doc_map(column = "LastName")]
///     last_name: String,
///     people: i64,
/// }
/// ```
///
/// # Attributes
///
/// - `#[doc_map(column = "name")]` - Map field to a different column name
#[proc_macro_derive(FromRow, attributes(doc_map))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

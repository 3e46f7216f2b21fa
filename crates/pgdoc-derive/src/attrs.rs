//! Parsing of `#[doc_map(...)]` and the serde naming attributes.

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use syn::{DeriveInput, LitInt, LitStr, Result};

pub(crate) struct UniqueAttr {
    pub name: String,
    pub columns: Vec<String>,
    pub message: String,
}

/// Struct-level `#[doc_map(...)]`.
#[derive(Default)]
pub(crate) struct StructAttrs {
    pub table: Option<String>,
    pub id_column: Option<String>,
    pub document_column: Option<String>,
    pub unique: Vec<UniqueAttr>,
    /// Discriminator column of a polymorphic enum.
    pub discriminator: Option<String>,
    /// `#[serde(rename_all = "...")]`
    pub rename_all: Option<String>,
}

impl StructAttrs {
    pub fn parse(input: &DeriveInput) -> Result<Self> {
        let mut out = Self::default();
        for attr in &input.attrs {
            if attr.path().is_ident("serde") {
                // Other serde keys are not ours to validate.
                let _ = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename_all") {
                        let value: LitStr = meta.value()?.parse()?;
                        out.rename_all = Some(value.value());
                    } else if meta.input.peek(syn::Token![=]) {
                        let _: syn::Expr = meta.value()?.parse()?;
                    }
                    Ok(())
                });
                continue;
            }
            if !attr.path().is_ident("doc_map") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    out.table = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("id_column") {
                    out.id_column = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("document_column") {
                    out.document_column = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("discriminator") {
                    out.discriminator = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("unique") {
                    let mut name = None;
                    let mut columns = Vec::new();
                    let mut message = None;
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("name") {
                            name = Some(inner.value()?.parse::<LitStr>()?.value());
                        } else if inner.path.is_ident("message") {
                            message = Some(inner.value()?.parse::<LitStr>()?.value());
                        } else if inner.path.is_ident("columns") {
                            let content;
                            syn::parenthesized!(content in inner.input);
                            let list = content.parse_terminated(
                                |input| input.parse::<LitStr>(),
                                syn::Token![,],
                            )?;
                            columns.extend(list.iter().map(LitStr::value));
                        } else {
                            return Err(inner.error("expected `name`, `columns` or `message`"));
                        }
                        Ok(())
                    })?;
                    let Some(name) = name else {
                        return Err(meta.error("unique constraint requires `name`"));
                    };
                    if columns.is_empty() {
                        return Err(meta.error("unique constraint requires `columns(..)`"));
                    }
                    let message = message
                        .unwrap_or_else(|| format!("{name} violated"));
                    out.unique.push(UniqueAttr {
                        name,
                        columns,
                        message,
                    });
                } else {
                    return Err(meta.error(
                        "expected `table`, `id_column`, `document_column`, `discriminator` or `unique`",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }

    /// JSON key serde uses for a field named `field`.
    pub fn json_key(&self, field: &str) -> String {
        match self.rename_all.as_deref() {
            Some("camelCase") => field.to_lower_camel_case(),
            Some("PascalCase") => field.to_upper_camel_case(),
            Some("snake_case") => field.to_snake_case(),
            Some("SCREAMING_SNAKE_CASE") => field.to_shouty_snake_case(),
            Some("kebab-case") => field.to_kebab_case(),
            Some("lowercase") => field.to_lowercase(),
            Some("UPPERCASE") => field.to_uppercase(),
            _ => field.to_string(),
        }
    }
}

/// Field-level `#[doc_map(...)]` and `#[serde(rename)]`.
#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub id: bool,
    pub indexed: bool,
    pub column: Option<String>,
    pub sql_type: Option<String>,
    pub max_length: Option<usize>,
    /// `#[serde(rename = "...")]`
    pub rename: Option<String>,
    /// `#[serde(skip)]`
    pub skipped: bool,
}

impl FieldAttrs {
    pub fn parse(field: &syn::Field) -> Result<Self> {
        let mut out = Self::default();
        for attr in &field.attrs {
            if attr.path().is_ident("serde") {
                let _ = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        let value: LitStr = meta.value()?.parse()?;
                        out.rename = Some(value.value());
                    } else if meta.path.is_ident("skip") {
                        out.skipped = true;
                    } else if meta.input.peek(syn::Token![=]) {
                        let _: syn::Expr = meta.value()?.parse()?;
                    }
                    Ok(())
                });
                continue;
            }
            if !attr.path().is_ident("doc_map") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    out.id = true;
                } else if meta.path.is_ident("indexed") {
                    out.indexed = true;
                } else if meta.path.is_ident("column") {
                    out.column = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("sql_type") {
                    out.indexed = true;
                    out.sql_type = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("max_length") {
                    out.indexed = true;
                    out.max_length = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                } else {
                    return Err(meta.error(
                        "expected `id`, `indexed`, `column`, `sql_type` or `max_length`",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

/// Variant-level `#[doc_map(discriminator = "...")]`.
pub(crate) struct VariantAttrs {
    pub discriminator: Option<String>,
}

impl VariantAttrs {
    pub fn parse(variant: &syn::Variant) -> Result<Self> {
        let mut discriminator = None;
        for attr in &variant.attrs {
            if !attr.path().is_ident("doc_map") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("discriminator") {
                    discriminator = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `discriminator`"))
                }
            })?;
        }
        Ok(Self { discriminator })
    }
}

//! Document derive macro implementation

use crate::attrs::{FieldAttrs, StructAttrs, VariantAttrs};
use crate::common::syn_types::{is_byte_vec, last_ident, option_inner};
use heck::{ToShoutySnakeCase, ToUpperCamelCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Enum(data) => return expand_enum(&input, data),
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Document can only be derived for structs with named fields",
                ));
            }
        },
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input,
                "Document can only be derived for structs and enums",
            ));
        }
    };

    let attrs = StructAttrs::parse(&input)?;
    if attrs.discriminator.is_some() {
        return Err(syn::Error::new_spanned(
            &input,
            "`discriminator` belongs on an enum of document variants",
        ));
    }
    let Some(table) = attrs.table.clone() else {
        return Err(syn::Error::new_spanned(
            &input,
            "Document requires #[doc_map(table = \"table_name\")] attribute",
        ));
    };

    let mut parsed = Vec::with_capacity(fields.len());
    for field in fields {
        parsed.push((field, FieldAttrs::parse(field)?));
    }
    let explicit_id = parsed.iter().any(|(_, a)| a.id);

    let mut id_field = None;
    let mut id_key = None;
    let mut indexed = Vec::new();
    let mut consts = Vec::new();

    for (field, field_attrs) in parsed {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if field_attrs.skipped {
            continue;
        }
        let field_name = ident.to_string();
        let key = field_attrs
            .rename
            .clone()
            .unwrap_or_else(|| attrs.json_key(&field_name));

        let (value_ty, nullable) = match option_inner(&field.ty) {
            Some(inner) => (inner, true),
            None => (&field.ty, false),
        };
        let const_name = format_ident!("{}", field_name.to_shouty_snake_case());
        consts.push(quote! {
            pub const #const_name: pgdoc::Field<Self, #value_ty> = pgdoc::Field::new(#key);
        });

        let is_id = if explicit_id {
            field_attrs.id
        } else {
            field_name == "id"
        };
        if is_id {
            if id_field.is_some() {
                return Err(syn::Error::new_spanned(field, "only one field can be #[doc_map(id)]"));
            }
            id_field = Some(ident.clone());
            id_key = Some(key);
            continue;
        }

        if !field_attrs.indexed {
            continue;
        }
        let column = field_attrs
            .column
            .clone()
            .unwrap_or_else(|| field_name.to_upper_camel_case());
        let sql_type = match &field_attrs.sql_type {
            Some(declared) => sql_type_tokens(declared),
            None => infer_sql_type(value_ty).ok_or_else(|| {
                syn::Error::new_spanned(
                    &field.ty,
                    "cannot infer the column type; add #[doc_map(sql_type = \"...\")]",
                )
            })?,
        };
        let max_length = field_attrs.max_length.map(|n| quote! { .max_length(#n) });
        indexed.push(quote! {
            .indexed(
                pgdoc::IndexedColumn::new(#key, #column, #sql_type)
                    .nullable(#nullable)
                    #max_length
            )
        });
    }

    let (Some(id_field), Some(id_key)) = (id_field, id_key) else {
        return Err(syn::Error::new_spanned(
            &input,
            "Document requires an `id: i64` field or a field marked #[doc_map(id)]",
        ));
    };
    let id_column = attrs.id_column.clone().unwrap_or_else(|| "Id".to_string());
    let document_column = attrs
        .document_column
        .as_ref()
        .map(|column| quote! { .document_column(#column) });
    let unique = attrs.unique.iter().map(|u| {
        let name = &u.name;
        let columns = &u.columns;
        let message = &u.message;
        quote! {
            .unique(pgdoc::UniqueConstraint::new(#name, [#(#columns),*], #message))
        }
    });

    // Generic documents have no single type to register.
    let registration = generics.params.is_empty().then(|| {
        quote! {
            pgdoc::inventory::submit! {
                pgdoc::DocumentRegistration {
                    type_name: ::std::any::type_name::<#name>,
                    map: <#name as pgdoc::Document>::map,
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #(#consts)*
        }

        impl #impl_generics pgdoc::Document for #name #ty_generics #where_clause {
            fn map() -> pgdoc::DocumentMap {
                pgdoc::DocumentMap::for_type::<Self>(#table)
                    .id(#id_key, #id_column)
                    #document_column
                    #(#indexed)*
                    #(#unique)*
            }

            fn id(&self) -> i64 {
                self.#id_field
            }

            fn set_id(&mut self, id: i64) {
                self.#id_field = id;
            }
        }

        #registration
    })
}

/// A polymorphic document: an enum whose newtype variants are documents sharing
/// one table. The first variant supplies the column map; the discriminator
/// column picks the variant when a row is read back.
fn expand_enum(input: &DeriveInput, data: &DataEnum) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let attrs = StructAttrs::parse(input)?;
    if attrs.table.is_some() || attrs.id_column.is_some() || attrs.document_column.is_some() {
        return Err(syn::Error::new_spanned(
            input,
            "a polymorphic document takes its table and columns from its first variant",
        ));
    }
    let column = attrs
        .discriminator
        .clone()
        .unwrap_or_else(|| "Discriminator".to_string());

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        let inner = match &variant.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0].ty,
            _ => {
                return Err(syn::Error::new_spanned(
                    variant,
                    "polymorphic document variants must wrap exactly one document type",
                ));
            }
        };
        let discriminator = VariantAttrs::parse(variant)?
            .discriminator
            .unwrap_or_else(|| variant.ident.to_string());
        variants.push((&variant.ident, inner, discriminator));
    }
    let Some((_, base, _)) = variants.first() else {
        return Err(syn::Error::new_spanned(
            input,
            "a polymorphic document needs at least one variant",
        ));
    };

    let resolver = variants.iter().map(|(_, ty, discriminator)| {
        quote! { .variant(#discriminator, ::std::any::type_name::<#ty>()) }
    });
    let ids = variants.iter().map(|(ident, _, _)| {
        quote! { Self::#ident(inner) => pgdoc::Document::id(inner), }
    });
    let set_ids = variants.iter().map(|(ident, _, _)| {
        quote! { Self::#ident(inner) => pgdoc::Document::set_id(inner, id), }
    });
    let discriminators = variants.iter().map(|(ident, _, discriminator)| {
        quote! { Self::#ident(_) => ::std::option::Option::Some(#discriminator), }
    });
    let readers = variants.iter().map(|(ident, ty, _)| {
        quote! {
            if concrete == ::std::option::Option::Some(::std::any::type_name::<#ty>()) {
                return ::std::result::Result::Ok(Self::#ident(
                    <#ty as pgdoc::Document>::from_document(::std::option::Option::None, json)?,
                ));
            }
        }
    });

    let registration = input.generics.params.is_empty().then(|| {
        quote! {
            pgdoc::inventory::submit! {
                pgdoc::DocumentRegistration {
                    type_name: ::std::any::type_name::<#name>,
                    map: <#name as pgdoc::Document>::map,
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics pgdoc::Document for #name #ty_generics #where_clause {
            fn map() -> pgdoc::DocumentMap {
                <#base as pgdoc::Document>::map()
                    .retyped::<Self>()
                    .resolver(pgdoc::TypeResolver::new(#column) #(#resolver)*)
            }

            fn id(&self) -> i64 {
                match self {
                    #(#ids)*
                }
            }

            fn set_id(&mut self, id: i64) {
                match self {
                    #(#set_ids)*
                }
            }

            fn discriminator(&self) -> ::std::option::Option<&str> {
                match self {
                    #(#discriminators)*
                }
            }

            fn from_document(
                concrete: ::std::option::Option<&str>,
                json: pgdoc::serde_json::Value,
            ) -> pgdoc::DocResult<Self> {
                #(#readers)*
                ::std::result::Result::Err(pgdoc::DocError::decode(
                    #column,
                    ::std::format!(
                        "{} has no variant for {:?}",
                        ::std::any::type_name::<Self>(),
                        concrete,
                    ),
                ))
            }
        }

        #registration
    })
}

fn sql_type_tokens(declared: &str) -> TokenStream {
    match declared.to_ascii_lowercase().as_str() {
        "boolean" | "bool" => quote!(pgdoc::SqlType::Boolean),
        "integer" | "int" => quote!(pgdoc::SqlType::Integer),
        "bigint" => quote!(pgdoc::SqlType::BigInt),
        "double" | "float" => quote!(pgdoc::SqlType::Double),
        "text" => quote!(pgdoc::SqlType::Text),
        "bytes" | "bytea" => quote!(pgdoc::SqlType::Bytes),
        "uuid" => quote!(pgdoc::SqlType::Uuid),
        "timestamp" | "timestamptz" => quote!(pgdoc::SqlType::Timestamp),
        "json" | "jsonb" => quote!(pgdoc::SqlType::Json),
        _ => quote!(pgdoc::SqlType::Custom(::std::string::String::from(#declared))),
    }
}

fn infer_sql_type(ty: &syn::Type) -> Option<TokenStream> {
    if is_byte_vec(ty) {
        return Some(quote!(pgdoc::SqlType::Bytes));
    }
    let tokens = match last_ident(ty)?.as_str() {
        "bool" => quote!(pgdoc::SqlType::Boolean),
        "i16" | "i32" => quote!(pgdoc::SqlType::Integer),
        "i64" => quote!(pgdoc::SqlType::BigInt),
        "f32" | "f64" => quote!(pgdoc::SqlType::Double),
        "String" => quote!(pgdoc::SqlType::Text),
        "Uuid" => quote!(pgdoc::SqlType::Uuid),
        "DateTime" => quote!(pgdoc::SqlType::Timestamp),
        "Value" => quote!(pgdoc::SqlType::Json),
        _ => return None,
    };
    Some(tokens)
}

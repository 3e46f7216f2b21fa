//! Identifier and field-path validation.
//!
//! Table names, column names and JSON field paths end up inside SQL text (JSON
//! paths are inlined as literals), so every name is validated against
//! `[A-Za-z_][A-Za-z0-9_]*` before it is rendered. Dotted field paths
//! (`address.city`) are validated segment by segment.

use crate::error::{DocError, DocResult};

/// Check a single identifier part.
pub fn validate_identifier(name: &str) -> DocResult<()> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(DocError::validation("Identifier cannot be empty")),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(c) => {
            return Err(DocError::validation(format!(
                "Invalid identifier start character: '{c}' in '{name}'"
            )));
        }
    }
    for c in chars {
        if !(c == '_' || c.is_ascii_alphanumeric()) {
            return Err(DocError::validation(format!(
                "Invalid character in identifier: '{c}' in '{name}'"
            )));
        }
    }
    Ok(())
}

/// Split a dotted field path into validated segments.
pub fn field_path(path: &str) -> DocResult<Vec<&str>> {
    if path.is_empty() {
        return Err(DocError::validation("Field path cannot be empty"));
    }
    let segments: Vec<&str> = path.split('.').collect();
    for segment in &segments {
        if segment.is_empty() {
            return Err(DocError::validation(format!(
                "Empty segment in field path '{path}'"
            )));
        }
        validate_identifier(segment)?;
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_identifier("People").is_ok());
        assert!(validate_identifier("_first_name2").is_ok());
    }

    #[test]
    fn rejects_injection_attempts() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("name'; DROP TABLE x;--").is_err());
        assert!(validate_identifier("a]b").is_err());
        assert!(validate_identifier("a\"b").is_err());
    }

    #[test]
    fn field_paths_split_on_dots() {
        assert_eq!(field_path("address.city").unwrap(), vec!["address", "city"]);
        assert_eq!(field_path("age").unwrap(), vec!["age"]);
        assert!(field_path("address.").is_err());
        assert!(field_path(".city").is_err());
        assert!(field_path("a.b-c").is_err());
    }
}

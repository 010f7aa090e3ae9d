//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as parameters in prepared
//! statements, so any identifier spliced into SQL text goes through here
//! first. Validation rejects the obvious injection vectors; quoting handles
//! everything else.

use crate::error::{DbError, Result};

/// Conservative upper bound on identifier length.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before it is used in dynamic SQL.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers over [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbError::invalid_identifier("identifier cannot be empty"));
    }
    if name.contains('\0') {
        return Err(DbError::invalid_identifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DbError::invalid_identifier(format!(
            "identifier exceeds {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }
    Ok(())
}

/// Validate an identifier destined for DDL text, where no quoting applies.
///
/// Rendered DDL splices names bare, so they are restricted to ASCII
/// alphanumerics and underscore, not starting with a digit. Anything else
/// must be rejected before SQL is built.
pub fn validate_bare_identifier(name: &str) -> Result<()> {
    validate_identifier(name)?;
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(DbError::invalid_identifier(format!(
            "identifier cannot start with a digit: {:?}",
            name
        )));
    }
    if let Some(bad) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(DbError::invalid_identifier(format!(
            "identifier contains {:?}: {:?}",
            bad, name
        )));
    }
    Ok(())
}

/// Quote an identifier for SQLite, escaping embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

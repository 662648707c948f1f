//! SQL identifier validation and quoting for generated scripts.
//!
//! Identifiers cannot be bound as parameters, and the data scripts are meant to
//! be pasted into a SQL console, so every table and column name that reaches
//! generated SQL goes through this module.

use crate::error::{MigrateError, Result};

/// PostgreSQL truncates identifiers beyond 63 bytes.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier before it is written into SQL text.
///
/// Rejects empty names, names containing null bytes and names longer than the
/// PostgreSQL limit.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Always double-quote an identifier, doubling embedded quotes.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Whether a name can appear in SQL without quotes.
///
/// PostgreSQL folds unquoted names to lower case, so anything with an upper
/// case letter (`viewCount`) must be quoted to survive.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Quote an identifier only when PostgreSQL would otherwise change or reject it.
pub fn quote_if_needed(name: &str) -> Result<String> {
    validate_identifier(name)?;
    if is_plain_identifier(name) {
        Ok(name.to_string())
    } else {
        quote_pg(name)
    }
}

/// `public.<table>` with the table quoted as needed.
pub fn qualify_public(table: &str) -> Result<String> {
    Ok(format!("public.{}", quote_if_needed(table)?))
}

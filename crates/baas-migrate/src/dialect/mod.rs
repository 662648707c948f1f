//! SQL generation for exported data.
//!
//! Each table becomes one self-contained PostgreSQL script:
//!
//! - triggers disabled around the load
//! - multi-row `INSERT`s of [`INSERT_BATCH_ROWS`] rows each
//! - `ON CONFLICT (id) DO UPDATE` so the script can be run again safely
//! - a best-effort identity sequence resync for tables that need one

pub mod columns;

pub use columns::{map_column_names, target_column, MappedColumn, COLUMN_MAPPINGS};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::core::identifier::qualify_public;
use crate::core::Record;
use crate::error::Result;
use crate::schema::has_identity_column;

/// Rows per generated `INSERT` statement.
pub const INSERT_BATCH_ROWS: usize = 100;

/// Whether a string is an ISO-8601 date or timestamp.
pub fn is_iso_timestamp(s: &str) -> bool {
    if s.len() < 10 || !s.as_bytes()[0].is_ascii_digit() {
        return false;
    }
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render a JSON value as a SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Timestamps never contain quotes; they pass through as plain literals.
        Value::String(s) if is_iso_timestamp(s) => format!("'{}'", s),
        Value::String(s) => quote_text(s),
        Value::Array(_) | Value::Object(_) => quote_text(&value.to_string()),
    }
}

/// Property names of a record, in record order.
fn record_properties(record: &Record) -> Vec<String> {
    record.keys().cloned().collect()
}

fn values_row(record: &Record, columns: &[MappedColumn]) -> String {
    let values = columns
        .iter()
        .map(|c| record.get(&c.property).map(sql_literal).unwrap_or_else(|| "NULL".into()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({})", values)
}

/// `ON CONFLICT` clause for a column set, or `None` without an `id` column.
pub fn conflict_clause(columns: &[MappedColumn]) -> Option<String> {
    if !columns.iter().any(MappedColumn::is_id) {
        return None;
    }

    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !c.is_id())
        .map(|c| format!("{} = EXCLUDED.{}", c.sql, c.sql))
        .collect();

    if updates.is_empty() {
        Some("ON CONFLICT (id) DO NOTHING".to_string())
    } else {
        Some(format!("ON CONFLICT (id) DO UPDATE SET {}", updates.join(", ")))
    }
}

/// Build one `INSERT` statement per [`INSERT_BATCH_ROWS`] records.
pub fn build_insert_statements(table: &str, records: &[Record]) -> Result<Vec<String>> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };

    let qualified = qualify_public(table)?;
    let columns = map_column_names(table, &record_properties(first))?;
    let column_list = columns
        .iter()
        .map(|c| c.sql.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let conflict = conflict_clause(&columns);

    let statements = records
        .chunks(INSERT_BATCH_ROWS)
        .map(|chunk| {
            let rows = chunk
                .iter()
                .map(|r| format!("  {}", values_row(r, &columns)))
                .collect::<Vec<_>>()
                .join(",\n");
            let mut sql = format!("INSERT INTO {} ({}) VALUES\n{}", qualified, column_list, rows);
            if let Some(ref clause) = conflict {
                sql.push('\n');
                sql.push_str(clause);
            }
            sql.push(';');
            sql
        })
        .collect();

    Ok(statements)
}

fn sequence_resync(table: &str, qualified: &str) -> String {
    format!(
        r#"-- Resync identity sequence (best effort)
DO $$
BEGIN
  PERFORM setval(
    pg_get_serial_sequence('{qualified}', 'id'),
    COALESCE((SELECT MAX(id) FROM {qualified}), 0) + 1,
    false
  );
EXCEPTION WHEN OTHERS THEN
  RAISE NOTICE 'sequence resync skipped for {table}: %', SQLERRM;
END $$;
"#
    )
}

/// Complete data script for one table.
///
/// An empty record list yields a script holding only a comment.
pub fn build_table_script(table: &str, records: &[Record]) -> Result<String> {
    let qualified = qualify_public(table)?;

    if records.is_empty() {
        return Ok(format!(
            "-- Table {}: no rows exported (empty or unreadable on the source).\n",
            table
        ));
    }

    let mut script = format!("-- Data for table {}\n-- Rows: {}\n\n", table, records.len());
    script.push_str(&format!("ALTER TABLE {} DISABLE TRIGGER ALL;\n\n", qualified));

    for statement in build_insert_statements(table, records)? {
        script.push_str(&statement);
        script.push_str("\n\n");
    }

    script.push_str(&format!("ALTER TABLE {} ENABLE TRIGGER ALL;\n", qualified));

    if has_identity_column(table) {
        script.push('\n');
        script.push_str(&sequence_resync(table, &qualified));
    }

    Ok(script)
}

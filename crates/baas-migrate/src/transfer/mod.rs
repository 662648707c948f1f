//! Table data export and import.
//!
//! Export reads every known table in [`EXPORT_TABLES`] order; import writes
//! them back in [`IMPORT_ORDER`], which puts every referenced table before the
//! tables that point at it. Both run strictly sequentially: one table at a
//! time, one batch at a time.

mod export;
mod import;

pub use export::{render_sql_scripts, DataExporter};
pub use import::{DataImporter, FailedBatch, ImportReport, TableImportSummary};

/// Tables read by the exporter, in export order.
pub const EXPORT_TABLES: &[&str] = &[
    "profiles",
    "categories",
    "amenities",
    "brokers",
    "properties",
    "applications",
    "tenants",
    "conversations",
    "messages",
    "resources",
    "property_type_translations",
    "ai_configs",
    "storage_configs",
];

/// Tables written by the importer, parents before children.
pub const IMPORT_ORDER: &[&str] = &[
    "profiles",
    "categories",
    "amenities",
    "brokers",
    "property_type_translations",
    "resources",
    "properties",
    "applications",
    "tenants",
    "conversations",
    "messages",
    "ai_configs",
    "storage_configs",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{dependencies_of, SCHEMA_TABLES};
    use std::collections::BTreeSet;

    #[test]
    fn test_import_order_puts_parents_first() {
        for (idx, table) in IMPORT_ORDER.iter().enumerate() {
            for dep in dependencies_of(table) {
                let dep_idx = IMPORT_ORDER
                    .iter()
                    .position(|t| t == dep)
                    .unwrap_or_else(|| panic!("{} missing from import order", dep));
                assert!(
                    dep_idx < idx,
                    "{} is imported before its dependency {}",
                    table,
                    dep
                );
            }
        }
    }

    #[test]
    fn test_table_lists_cover_the_schema() {
        let schema: BTreeSet<_> = SCHEMA_TABLES.iter().collect();
        let export: BTreeSet<_> = EXPORT_TABLES.iter().collect();
        let import: BTreeSet<_> = IMPORT_ORDER.iter().collect();
        assert_eq!(export, schema);
        assert_eq!(import, schema);
        assert_eq!(IMPORT_ORDER.len(), import.len(), "no duplicates");
    }
}

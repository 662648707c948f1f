//! Schema export.
//!
//! The backend offers no portable introspection API, so the default provider
//! returns a fixed DDL script for the application's known tables. Callers with
//! a live-introspection capability can supply their own [`SchemaProvider`].
//!
//! The script is only ever returned to the caller. Nothing in this crate runs
//! DDL against a target project.

use async_trait::async_trait;

use crate::error::Result;

/// The DDL script for every known table, function and policy.
pub const SCHEMA_TEMPLATE: &str = include_str!("template.sql");

/// Every table the application defines.
pub const SCHEMA_TABLES: &[&str] = &[
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

/// Foreign-key edges: each table with the tables it references.
pub const TABLE_DEPENDENCIES: &[(&str, &[&str])] = &[
    ("profiles", &[]),
    ("categories", &[]),
    ("amenities", &[]),
    ("brokers", &["profiles"]),
    ("property_type_translations", &[]),
    ("resources", &["profiles"]),
    ("properties", &["categories", "brokers", "profiles"]),
    ("applications", &["properties", "profiles"]),
    ("tenants", &["properties", "profiles", "applications"]),
    ("conversations", &["properties", "profiles", "brokers"]),
    ("messages", &["conversations", "profiles"]),
    ("ai_configs", &[]),
    ("storage_configs", &[]),
];

/// Tables whose `id` is an identity column backed by a sequence.
pub const IDENTITY_TABLES: &[&str] = &["property_type_translations", "ai_configs", "storage_configs"];

/// Tables referenced by `table`, empty for unknown tables.
pub fn dependencies_of(table: &str) -> &'static [&'static str] {
    TABLE_DEPENDENCIES
        .iter()
        .find(|(name, _)| *name == table)
        .map(|(_, deps)| *deps)
        .unwrap_or(&[])
}

pub fn has_identity_column(table: &str) -> bool {
    IDENTITY_TABLES.contains(&table)
}

/// Source of the DDL script handed to the operator.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Produce the complete DDL script.
    async fn export_schema(&self) -> Result<String>;

    /// Short label for log lines.
    fn name(&self) -> &str;
}

/// Provider returning [`SCHEMA_TEMPLATE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSchema;

#[async_trait]
impl SchemaProvider for StaticSchema {
    async fn export_schema(&self) -> Result<String> {
        Ok(SCHEMA_TEMPLATE.to_string())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// Tables referenced from `public.` inside each CREATE TABLE block.
    fn referenced_tables(ddl: &str) -> Vec<(String, BTreeSet<String>)> {
        let marker = "CREATE TABLE IF NOT EXISTS public.";
        ddl.split(marker)
            .skip(1)
            .map(|block| {
                let name = block.split_whitespace().next().unwrap_or_default().to_string();
                let body = block.split(");").next().unwrap_or_default();
                let refs = body
                    .split("REFERENCES public.")
                    .skip(1)
                    .filter_map(|rest| rest.split_whitespace().next())
                    .map(str::to_string)
                    .collect();
                (name, refs)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_static_schema_returns_template() {
        let ddl = StaticSchema.export_schema().await.unwrap();
        assert_eq!(ddl, SCHEMA_TEMPLATE);
        assert_eq!(StaticSchema.name(), "static");
    }

    #[test]
    fn test_template_defines_every_table_with_rls() {
        for table in SCHEMA_TABLES {
            assert!(
                SCHEMA_TEMPLATE.contains(&format!("CREATE TABLE IF NOT EXISTS public.{} (", table)),
                "missing table {}",
                table
            );
            assert!(
                SCHEMA_TEMPLATE.contains(&format!("ALTER TABLE public.{} ENABLE ROW LEVEL SECURITY", table)),
                "missing RLS for {}",
                table
            );
        }
    }

    #[test]
    fn test_template_defines_functions() {
        assert!(SCHEMA_TEMPLATE.contains("FUNCTION public.increment_property_views(property_id uuid)"));
        assert!(SCHEMA_TEMPLATE.contains("FUNCTION public.set_active_ai_config(config_id bigint)"));
    }

    #[test]
    fn test_template_can_be_applied_twice() {
        let lines: Vec<&str> = SCHEMA_TEMPLATE.lines().collect();
        let mut policies = 0;
        for (i, line) in lines.iter().enumerate() {
            let Some(rest) = line.strip_prefix("CREATE POLICY ") else {
                continue;
            };
            policies += 1;
            let (name, table) = rest.split_once(" ON ").unwrap();
            let table = table.split_whitespace().next().unwrap();
            let expected = format!("DROP POLICY IF EXISTS {} ON {};", name, table);
            assert!(i > 0 && lines[i - 1] == expected, "no drop before policy {}", name);
        }
        assert!(policies > 0);
        assert!(!SCHEMA_TEMPLATE.contains("CREATE FUNCTION"));
        assert_eq!(
            SCHEMA_TEMPLATE.matches("CREATE TABLE ").count(),
            SCHEMA_TEMPLATE.matches("CREATE TABLE IF NOT EXISTS ").count()
        );
    }

    #[test]
    fn test_dependency_table_matches_template() {
        let parsed = referenced_tables(SCHEMA_TEMPLATE);
        assert_eq!(parsed.len(), SCHEMA_TABLES.len());
        for (table, refs) in parsed {
            let declared: BTreeSet<String> =
                dependencies_of(&table).iter().map(|s| s.to_string()).collect();
            assert_eq!(refs, declared, "dependency mismatch for {}", table);
        }
    }

    #[test]
    fn test_identity_tables_use_identity_columns() {
        for (table, _) in referenced_tables(SCHEMA_TEMPLATE) {
            let marker = format!("CREATE TABLE IF NOT EXISTS public.{} (", table);
            let block = SCHEMA_TEMPLATE
                .split(&marker)
                .nth(1)
                .and_then(|rest| rest.split(");").next())
                .unwrap();
            assert_eq!(
                block.contains("GENERATED BY DEFAULT AS IDENTITY"),
                has_identity_column(&table),
                "identity mismatch for {}",
                table
            );
        }
    }
}

//! Schema description
//!
//! In-memory snapshot of the tables and columns the LLM is allowed to see.
//! A snapshot is never mutated; `SchemaCatalog` swaps whole snapshots when
//! the schema is re-introspected.

use crate::db::introspect::SchemaIntrospector;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Case-insensitive column lookup.
    pub fn find_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableInfo>,
}

impl SchemaDescription {
    pub fn new(tables: Vec<TableInfo>) -> Self {
        Self { tables }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Case-insensitive table lookup; returns the table with its catalog casing.
    pub fn find_table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// Process-wide holder of the current schema snapshot.
pub struct SchemaCatalog {
    current: RwLock<Arc<SchemaDescription>>,
}

impl SchemaCatalog {
    pub fn new(schema: SchemaDescription) -> Self {
        Self {
            current: RwLock::new(Arc::new(schema)),
        }
    }

    /// Introspect once; on failure log and continue with an empty snapshot.
    pub async fn load(introspector: &SchemaIntrospector) -> Self {
        match introspector.describe_schema().await {
            Ok(schema) => {
                info!("Loaded schema with {} table(s)", schema.tables.len());
                Self::new(schema)
            }
            Err(e) => {
                warn!("Error getting schema, continuing without schema context: {}", e);
                Self::new(SchemaDescription::empty())
            }
        }
    }

    pub fn snapshot(&self) -> Arc<SchemaDescription> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, schema: SchemaDescription) {
        let schema = Arc::new(schema);
        match self.current.write() {
            Ok(mut guard) => *guard = schema,
            Err(poisoned) => *poisoned.into_inner() = schema,
        }
    }

    /// Re-introspect explicitly. The previous snapshot stays in place on failure.
    pub async fn refresh(&self, introspector: &SchemaIntrospector) -> Result<Arc<SchemaDescription>> {
        let schema = introspector.describe_schema().await?;
        info!("Schema refreshed: {} table(s)", schema.tables.len());
        self.replace(schema);
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_schema() -> SchemaDescription {
        SchemaDescription::new(vec![TableInfo::new(
            "Invoice",
            vec![
                ColumnInfo::new("id", "text", false),
                ColumnInfo::new("totalAmount", "numeric", true),
            ],
        )])
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let schema = invoice_schema();
        let table = schema.find_table("invoice").unwrap();
        assert_eq!(table.name, "Invoice");
        assert_eq!(table.find_column("TOTALAMOUNT").unwrap().name, "totalAmount");
        assert!(schema.find_table("Vendor").is_none());
    }

    #[test]
    fn test_catalog_swaps_snapshots() {
        let catalog = SchemaCatalog::new(SchemaDescription::empty());
        let before = catalog.snapshot();
        assert!(before.is_empty());

        catalog.replace(invoice_schema());
        assert!(before.is_empty());
        assert_eq!(catalog.snapshot().table_names().collect::<Vec<_>>(), vec!["Invoice"]);
    }
}

//! Catalog introspection for PostgreSQL
//!
//! Reads `information_schema` once and produces a `SchemaDescription` with
//! tables ordered by name and columns in ordinal order.

use crate::error::{Nl2SqlError, Result};
use crate::schema::{ColumnInfo, SchemaDescription, TableInfo};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::debug;

pub struct SchemaIntrospector {
    pool: PgPool,
    schema: String,
}

impl SchemaIntrospector {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.schema
    }

    pub async fn describe_schema(&self) -> Result<SchemaDescription> {
        let tables = self.load_table_names().await?;
        let mut columns_by_table = self.load_columns().await?;

        let tables = tables
            .into_iter()
            .map(|name| {
                let columns = columns_by_table.remove(&name).unwrap_or_default();
                debug!("Table {} has {} column(s)", name, columns.len());
                TableInfo::new(name, columns)
            })
            .collect();

        Ok(SchemaDescription::new(tables))
    }

    async fn load_table_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = $1
            ORDER BY table_name
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Nl2SqlError::Introspection(format!("Failed to list tables: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("table_name")
                    .map_err(|e| Nl2SqlError::Introspection(e.to_string()))
            })
            .collect()
    }

    async fn load_columns(&self) -> Result<HashMap<String, Vec<ColumnInfo>>> {
        let rows = sqlx::query(
            r#"
            SELECT
                table_name::text AS table_name,
                column_name::text AS column_name,
                data_type::text AS data_type,
                is_nullable::text AS is_nullable
            FROM information_schema.columns
            WHERE table_schema = $1
            ORDER BY table_name, ordinal_position
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Nl2SqlError::Introspection(format!("Failed to list columns: {}", e)))?;

        let mut columns: HashMap<String, Vec<ColumnInfo>> = HashMap::new();
        for row in rows {
            let table: String = row
                .try_get("table_name")
                .map_err(|e| Nl2SqlError::Introspection(e.to_string()))?;
            let name: String = row
                .try_get("column_name")
                .map_err(|e| Nl2SqlError::Introspection(e.to_string()))?;
            let data_type: String = row
                .try_get("data_type")
                .map_err(|e| Nl2SqlError::Introspection(e.to_string()))?;
            let is_nullable: String = row
                .try_get("is_nullable")
                .map_err(|e| Nl2SqlError::Introspection(e.to_string()))?;

            columns
                .entry(table)
                .or_default()
                .push(ColumnInfo::new(name, data_type, is_nullable == "YES"));
        }

        Ok(columns)
    }
}

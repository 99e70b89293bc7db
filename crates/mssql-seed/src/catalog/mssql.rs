//! Column catalog backed by `INFORMATION_SCHEMA.COLUMNS`.

use tiberius::{Query, Row};
use tracing::debug;

use super::{ColumnCatalog, ColumnInfo};
use crate::connection::MssqlConnection;
use crate::error::{Result, SeedError};

const COLUMNS_QUERY: &str = r#"
    SELECT
        COLUMN_NAME,
        DATA_TYPE,
        CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
        CAST(ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(TABLE_SCHEMA) + '.' + QUOTENAME(TABLE_NAME)), COLUMN_NAME, 'IsIdentity'), 0) AS INT)
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_NAME = @P1
    ORDER BY ORDINAL_POSITION
"#;

const COLUMNS_QUERY_WITH_SCHEMA: &str = r#"
    SELECT
        COLUMN_NAME,
        DATA_TYPE,
        CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
        CAST(ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(TABLE_SCHEMA) + '.' + QUOTENAME(TABLE_NAME)), COLUMN_NAME, 'IsIdentity'), 0) AS INT)
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_NAME = @P1 AND TABLE_SCHEMA = @P2
    ORDER BY ORDINAL_POSITION
"#;

/// Split `schema.table` into its parts; a bare name has no schema.
fn split_table_name(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    }
}

fn column_from_row(row: &Row) -> Result<ColumnInfo> {
    let name: &str = row.try_get(0)?.unwrap_or_default();
    let data_type: &str = row.try_get(1)?.unwrap_or_default();
    let is_nullable = row.try_get::<i32, _>(2)?.unwrap_or(0) == 1;
    let is_identity = row.try_get::<i32, _>(3)?.unwrap_or(0) == 1;
    Ok(ColumnInfo::new(name, data_type, is_nullable, is_identity))
}

impl ColumnCatalog for MssqlConnection {
    fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        if let Some(cached) = self.column_cache.get(table) {
            return Ok(cached.clone());
        }

        let (schema, name) = split_table_name(table);
        let sql = if schema.is_some() {
            COLUMNS_QUERY_WITH_SCHEMA
        } else {
            COLUMNS_QUERY
        };

        let (runtime, client) = self.parts();
        let rows = runtime.block_on(async {
            let mut query = Query::new(sql);
            query.bind(name);
            if let Some(schema) = schema {
                query.bind(schema);
            }
            query.query(client).await?.into_first_result().await
        })?;

        let columns = rows
            .iter()
            .map(column_from_row)
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(SeedError::Config(format!(
                "table {} not found or has no columns",
                table
            )));
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        self.column_cache.insert(table.to_string(), columns.clone());
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_table_name() {
        assert_eq!(split_table_name("Customer"), (None, "Customer"));
        assert_eq!(split_table_name("sales.Order"), (Some("sales"), "Order"));
    }
}

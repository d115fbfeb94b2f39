use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use clinichat_core::datasource::{Connector, ConnectorError, TabularPage};

use crate::DbPool;

/// Read-only connector over the sqlite pool.
///
/// A connection is acquired from the pool per call and returned when the call
/// completes, so concurrent turns never share a handle.
pub struct SqlConnector {
    pool: DbPool,
}

impl SqlConnector {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Connector for SqlConnector {
    async fn run(&self, statement: &str) -> Result<TabularPage, ConnectorError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|error| ConnectorError::Unavailable(error.to_string()))?;

        let rows = sqlx::query(statement)
            .fetch_all(&mut *conn)
            .await
            .map_err(|error| ConnectorError::Query(error.to_string()))?;

        let Some(first) = rows.first() else {
            return Ok(TabularPage::default());
        };

        let columns =
            first.columns().iter().map(|column| column.name().to_string()).collect::<Vec<_>>();

        let mut pages = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                cells.push(decode_cell(row, index)?);
            }
            pages.push(cells);
        }

        Ok(TabularPage { columns, rows: pages })
    }
}

/// Decodes one sqlite value to its text rendering by declared type.
fn decode_cell(row: &SqliteRow, index: usize) -> Result<String, ConnectorError> {
    let raw = row
        .try_get_raw(index)
        .map_err(|error| ConnectorError::Query(error.to_string()))?;

    if raw.is_null() {
        return Ok(String::new());
    }
    let type_name = raw.type_info().name().to_string();

    let decoded = match type_name.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index).map(|value| value.to_string()),
        "REAL" => row.try_get::<f64, _>(index).map(|value| value.to_string()),
        _ => row.try_get::<String, _>(index),
    };

    decoded.map_err(|error| ConnectorError::Query(error.to_string()))
}

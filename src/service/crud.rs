//! Generic CRUD execution against PostgreSQL.

use crate::config::TableInfo;
use crate::error::AppError;
use crate::sql::{delete, insert, select_by_reference, select_list, update, PgBindValue, QueryBuf, SortKey};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row};

/// Filters, ordering and paging for a list query. Keys are attribute names.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub order: Vec<SortKey>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub struct CrudService;

impl CrudService {
    pub const DEFAULT_LIMIT: u32 = 100;

    /// List rows; limit defaults to 100 and is capped at `max_limit`, offset defaults to 0.
    pub async fn list(
        pool: &PgPool,
        schema: &str,
        table: &TableInfo,
        query: &ListQuery,
        max_limit: u32,
    ) -> Result<Vec<Value>, AppError> {
        let limit = query.limit.unwrap_or(Self::DEFAULT_LIMIT).min(max_limit);
        let offset = query.offset.unwrap_or(0);
        let q = select_list(table, schema, &query.filters, &query.order, Some(limit), Some(offset));
        Self::query_many(pool, &q).await
    }

    /// Fetch one row by reference id. Returns JSON object or None.
    pub async fn read(
        pool: &PgPool,
        schema: &str,
        table: &TableInfo,
        reference_id: &str,
    ) -> Result<Option<Value>, AppError> {
        let mut q = select_by_reference(table, schema);
        q.params.push(Value::String(reference_id.to_string()));
        Self::query_optional(pool, &q).await
    }

    /// Insert one row. Returns created row.
    pub async fn create(
        pool: &PgPool,
        schema: &str,
        table: &TableInfo,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let q = insert(table, schema, body);
        Self::query_optional(pool, &q)
            .await?
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))
    }

    /// Update one row by reference id. Returns updated row.
    pub async fn update(
        pool: &PgPool,
        schema: &str,
        table: &TableInfo,
        reference_id: &str,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = update(table, schema, reference_id, body);
        Self::query_optional(pool, &q).await
    }

    /// Delete one row by reference id. Returns deleted row or None.
    pub async fn delete(
        pool: &PgPool,
        schema: &str,
        table: &TableInfo,
        reference_id: &str,
    ) -> Result<Option<Value>, AppError> {
        let mut q = delete(table, schema);
        q.params.push(Value::String(reference_id.to_string()));
        Self::query_optional(pool, &q).await
    }

    async fn query_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn query_many(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

/// Row to JSON object keyed by column name. Unreadable or NULL cells become null.
fn row_to_json(row: &PgRow) -> Value {
    let map: Map<String, Value> = row
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.ordinal())))
        .collect();
    Value::Object(map)
}

/// Try decoders in turn; the first whose type matches the column wins.
macro_rules! try_cell {
    ($row:expr, $idx:expr, $ty:ty, $conv:expr) => {
        if let Ok(v) = $row.try_get::<Option<$ty>, _>($idx) {
            return v.map($conv).unwrap_or(Value::Null);
        }
    };
}

fn cell_to_value(row: &PgRow, idx: usize) -> Value {
    try_cell!(row, idx, i16, |n| Value::Number(n.into()));
    try_cell!(row, idx, i32, |n| Value::Number(n.into()));
    try_cell!(row, idx, i64, |n| Value::Number(n.into()));
    try_cell!(row, idx, f32, |n| float_value(f64::from(n)));
    try_cell!(row, idx, f64, float_value);
    try_cell!(row, idx, bool, Value::Bool);
    try_cell!(row, idx, uuid::Uuid, |u| Value::String(u.to_string()));
    try_cell!(row, idx, chrono::DateTime<chrono::Utc>, |d| Value::String(d.to_rfc3339()));
    try_cell!(row, idx, chrono::NaiveDateTime, |d| Value::String(
        d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    ));
    try_cell!(row, idx, chrono::NaiveDate, |d| Value::String(d.format("%Y-%m-%d").to_string()));
    try_cell!(row, idx, String, Value::String);
    try_cell!(row, idx, Value, |j| j);
    Value::Null
}

fn float_value(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a table descriptor.
//! Body and filter keys are attribute names; they are mapped to physical columns here.

use crate::config::{ColumnInfo, TableInfo};
use crate::middleware::REFERENCE_ID_COLUMN;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from the catalog).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// PostgreSQL type a text parameter is cast to for a catalog data type (e.g. "int(11)" -> bigint).
/// `None` means the column is textual and needs no cast.
pub fn pg_cast(data_type: &str) -> Option<&'static str> {
    let lower = data_type.trim().to_lowercase();
    let base = lower.split('(').next().unwrap_or("").trim();
    match base {
        "tinyint" if lower.starts_with("tinyint(1)") => Some("boolean"),
        "bool" | "boolean" => Some("boolean"),
        "int" | "integer" | "bigint" | "smallint" | "tinyint" | "mediumint" | "serial" | "bigserial" => Some("bigint"),
        "float" | "double" | "real" | "numeric" | "decimal" => Some("numeric"),
        "timestamp" | "timestamptz" | "datetime" => Some("timestamptz"),
        "date" => Some("date"),
        "time" => Some("time"),
        "json" | "jsonb" => Some("jsonb"),
        "uuid" => Some("uuid"),
        _ => None,
    }
}

fn placeholder(n: usize, col: &ColumnInfo) -> String {
    match pg_cast(&col.data_type) {
        Some(t) => format!("${}::{}", n, t),
        None => format!("${}", n),
    }
}

/// SELECT list over every physical column; numeric comes back as text so the row decoder can read it.
fn select_column_list(table: &TableInfo) -> String {
    if table.columns.is_empty() {
        return "*".into();
    }
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(c.physical_name());
            if pg_cast(&c.data_type) == Some("numeric") {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// Parse "-created_at,title" into sort keys. Unknown attributes are dropped.
pub fn parse_order(table: &TableInfo, spec: &str) -> Vec<SortKey> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let (descending, name) = match s.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, s.strip_prefix('+').unwrap_or(s)),
            };
            table.column(name).map(|c| SortKey {
                column: c.physical_name().to_string(),
                descending,
            })
        })
        .collect()
}

/// SELECT list with optional filters (exact match per attribute), ORDER BY sort keys, optional LIMIT/OFFSET.
/// Filters on unknown attributes are ignored; params bound in filter order.
pub fn select_list(
    table: &TableInfo,
    schema: &str,
    filters: &[(String, Value)],
    order: &[SortKey],
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for (name, val) in filters {
        let Some(col) = table.column(name) else { continue };
        if val.is_null() {
            where_parts.push(format!("{} IS NULL", quoted(col.physical_name())));
            continue;
        }
        let n = q.push_param(val.clone());
        where_parts.push(format!("{} = {}", quoted(col.physical_name()), placeholder(n, col)));
    }

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let order_clause = if order.is_empty() {
        String::new()
    } else {
        let keys: Vec<String> = order
            .iter()
            .map(|k| format!("{} {}", quoted(&k.column), if k.descending { "DESC" } else { "ASC" }))
            .collect();
        format!(" ORDER BY {}", keys.join(", "))
    };
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(table),
        qualified_table(schema, &table.table_name),
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT by reference id. Caller adds the id as sole param.
pub fn select_by_reference(table: &TableInfo, schema: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        select_column_list(table),
        qualified_table(schema, &table.table_name),
        quoted(REFERENCE_ID_COLUMN)
    );
    q
}

/// INSERT the attributes present in body. Columns not sent keep their DB default.
pub fn insert(table: &TableInfo, schema: &str, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, val) in body {
        let Some(col) = table.column(name) else { continue };
        let n = q.push_param(val.clone());
        cols.push(quoted(col.physical_name()));
        placeholders.push(placeholder(n, col));
    }
    let target = qualified_table(schema, &table.table_name);
    let returning = select_column_list(table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by reference id: SET only attributes present in body, plus updated_at when the table has it.
pub fn update(table: &TableInfo, schema: &str, reference_id: &str, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, &table.table_name);
    let mut sets = Vec::new();
    for (name, val) in body {
        if name == REFERENCE_ID_COLUMN {
            continue;
        }
        let Some(col) = table.column(name) else { continue };
        let n = q.push_param(val.clone());
        sets.push(format!("{} = {}", quoted(col.physical_name()), placeholder(n, col)));
    }
    if sets.is_empty() {
        let mut q = select_by_reference(table, schema);
        q.params.push(Value::String(reference_id.to_string()));
        return q;
    }
    if table.has_column("updated_at") && !body.contains_key("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let id_param = q.push_param(Value::String(reference_id.to_string()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        target,
        sets.join(", "),
        quoted(REFERENCE_ID_COLUMN),
        id_param,
        select_column_list(table)
    );
    q
}

/// DELETE by reference id. Caller adds the id as sole param.
pub fn delete(table: &TableInfo, schema: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1 RETURNING {}",
        qualified_table(schema, &table.table_name),
        quoted(REFERENCE_ID_COLUMN),
        select_column_list(table)
    );
    q
}

//! Load table descriptors from the world catalog and exchange contracts from data_exchange.

use crate::config::{exposed_tables_predicate, is_exposed_table_name, CmsConfig, ExchangeContract, TableInfo};
use crate::error::ConfigError;
use sqlx::PgPool;

/// One world row as selected by `load_tables`.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CatalogRow {
    pub table_name: String,
    pub permission: i64,
    pub default_permission: i64,
    pub world_schema_json: String,
    pub is_top_level: bool,
    pub is_hidden: bool,
    pub is_state_tracking_enabled: bool,
    pub default_order: Option<String>,
}

/// Scalar fields persisted on the catalog row. These win over the same fields in the schema blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogOverrides {
    pub table_name: String,
    pub permission: i64,
    pub default_permission: i64,
    pub is_top_level: bool,
    pub is_hidden: bool,
    pub is_state_tracking_enabled: bool,
    pub default_order: Option<String>,
}

impl CatalogRow {
    pub fn overrides(&self) -> CatalogOverrides {
        CatalogOverrides {
            table_name: self.table_name.clone(),
            permission: self.permission,
            default_permission: self.default_permission,
            is_top_level: self.is_top_level,
            is_hidden: self.is_hidden,
            is_state_tracking_enabled: self.is_state_tracking_enabled,
            default_order: self.default_order.clone(),
        }
    }

    /// Decode the schema blob and apply the row's overrides.
    pub fn to_table_info(&self) -> Result<TableInfo, serde_json::Error> {
        let decoded: TableInfo = serde_json::from_str(&self.world_schema_json)?;
        Ok(merge(decoded, &self.overrides()))
    }
}

/// Overlay catalog scalars onto a decoded blob. Columns, relations and validations come from the blob;
/// a null default_order keeps the blob's value.
pub fn merge(mut decoded: TableInfo, overrides: &CatalogOverrides) -> TableInfo {
    decoded.table_name = overrides.table_name.clone();
    decoded.permission = overrides.permission;
    decoded.default_permission = overrides.default_permission;
    decoded.is_top_level = overrides.is_top_level;
    decoded.is_hidden = overrides.is_hidden;
    decoded.is_state_tracking_enabled = overrides.is_state_tracking_enabled;
    if let Some(order) = &overrides.default_order {
        decoded.default_order = order.clone();
    }
    decoded
}

/// Turn catalog rows into descriptors, in row order. Rows with a malformed blob or an excluded name are skipped.
pub fn tables_from_rows(rows: &[CatalogRow]) -> Vec<TableInfo> {
    let mut tables = Vec::with_capacity(rows.len());
    for row in rows {
        if !is_exposed_table_name(&row.table_name) {
            tracing::debug!(table = %row.table_name, "skipping system table");
            continue;
        }
        match row.to_table_info() {
            Ok(table) => tables.push(table),
            Err(e) => {
                tracing::error!(table = %row.table_name, error = %e, "failed to decode world schema json");
            }
        }
    }
    tables
}

/// Read every exposed table from the world catalog. Only the query itself can fail the load.
pub async fn load_tables(pool: &PgPool, config: &CmsConfig) -> Result<Vec<TableInfo>, ConfigError> {
    let sql = format!(
        "SELECT table_name, permission, default_permission, world_schema_json, is_top_level, is_hidden, \
         is_state_tracking_enabled, default_order FROM {} WHERE {}",
        config.qualified("world"),
        exposed_tables_predicate()
    );
    tracing::debug!(sql = %sql, "query");
    let rows = sqlx::query_as::<_, CatalogRow>(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to select from world table");
            ConfigError::Load(e.to_string())
        })?;

    let tables = tables_from_rows(&rows);
    tracing::info!(loaded = tables.len(), rows = rows.len(), "loaded tables from world table");
    Ok(tables)
}

/// Load exchange contracts (JSONB payload rows). An undecodable contract fails the load.
pub async fn load_exchange_contracts(pool: &PgPool, config: &CmsConfig) -> Result<Vec<ExchangeContract>, ConfigError> {
    let sql = format!("SELECT name, payload FROM {} ORDER BY name", config.qualified("data_exchange"));
    tracing::debug!(sql = %sql, "query");
    let rows = sqlx::query_as::<_, (String, serde_json::Value)>(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let mut out = Vec::with_capacity(rows.len());
    for (name, payload) in rows {
        let contract: ExchangeContract = serde_json::from_value(payload).map_err(|e| ConfigError::Exchange {
            name: name.clone(),
            message: e.to_string(),
        })?;
        out.push(contract);
    }
    Ok(out)
}

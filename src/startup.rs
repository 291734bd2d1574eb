//! Startup wiring: secrets, catalog, interceptor chains and the resource registry.

use crate::config::{load_tables, CmsConfig, TableInfo};
use crate::error::AppError;
use crate::middleware::{build_middleware_set, EventBus};
use crate::registry::{register, RegistryCell};
use crate::secrets::ensure_secrets;
use crate::state::AppState;
use crate::store::PgConfigStore;
use sqlx::PgPool;
use std::sync::Arc;

/// Bootstrap secrets, load the catalog and build the application state.
/// Call after `ensure_sys_tables`.
pub async fn initialize(pool: PgPool, config: CmsConfig) -> Result<AppState, AppError> {
    let store = PgConfigStore::new(pool.clone(), &config);
    ensure_secrets(&store).await?;
    let tables = load_tables(&pool, &config).await?;
    tracing::info!(tables = tables.len(), "loaded catalog");
    assemble(pool, tables, config)
}

/// Build chains and registry over already-loaded tables. The chains are built against an empty
/// registry slot that is filled once every resource is registered.
pub fn assemble(pool: PgPool, tables: Vec<TableInfo>, config: CmsConfig) -> Result<AppState, AppError> {
    let events = EventBus::new();
    let cell = RegistryCell::new();
    let middleware = Arc::new(build_middleware_set(&config, &cell, &events));
    let registry = Arc::new(register(tables, middleware, &pool, &config));
    cell.set(Arc::clone(&registry))?;
    Ok(AppState {
        pool,
        registry,
        config: Arc::new(config),
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn assemble_registers_named_tables() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/world_test")
            .unwrap();
        let tables = vec![
            TableInfo {
                table_name: "widgets".into(),
                ..Default::default()
            },
            TableInfo::default(),
        ];
        let state = assemble(pool, tables, CmsConfig::default()).unwrap();
        assert_eq!(state.registry.len(), 1);
        assert!(state.registry.get("widgets").is_some());
    }
}

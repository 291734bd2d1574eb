//! Name-keyed map of live resource handlers, built once at startup and read concurrently afterwards.

use crate::config::{CmsConfig, ResourceModel, TableInfo, TableRelation};
use crate::error::AppError;
use crate::middleware::MiddlewareSet;
use crate::resource::DbResource;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

#[derive(Default)]
pub struct ResourceRegistry {
    by_name: HashMap<String, Arc<DbResource>>,
}

impl ResourceRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<DbResource>> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Handler on the other side of `relation`, seen from `from`. `None` when that table is not registered.
    pub fn resolve_relation(&self, from: &str, relation: &TableRelation) -> Option<&Arc<DbResource>> {
        relation.counterpart(from).and_then(|name| self.get(name))
    }

    /// Insert a handler. A second handler under the same name replaces the first.
    fn insert(&mut self, resource: DbResource) {
        let name = resource.name().to_string();
        if self.by_name.insert(name.clone(), Arc::new(resource)).is_some() {
            tracing::warn!(table = %name, "duplicate table name, keeping the later definition");
        }
    }
}

/// Build one handler per named table over the shared middleware set.
/// Tables with an empty name are logged and skipped.
pub fn register(
    tables: Vec<TableInfo>,
    middleware: Arc<MiddlewareSet>,
    pool: &PgPool,
    config: &CmsConfig,
) -> ResourceRegistry {
    let mut registry = ResourceRegistry::default();
    for table in tables {
        if table.table_name.is_empty() {
            tracing::error!(columns = table.columns.len(), "table name is empty, not adding it as a resource");
            continue;
        }
        let model = ResourceModel::new(
            &table.table_name,
            &table.columns,
            table.default_permission,
            &table.relations,
        );
        registry.insert(DbResource::new(model, pool.clone(), Arc::clone(&middleware), table, config));
    }
    tracing::info!(resources = registry.len(), "registered resources");
    registry
}

/// Write-once slot for the registry. Handed to interceptors before the registry exists,
/// filled once registration finishes.
#[derive(Clone, Default)]
pub struct RegistryCell(Arc<OnceLock<Arc<ResourceRegistry>>>);

impl RegistryCell {
    pub fn new() -> Self {
        RegistryCell::default()
    }

    pub fn set(&self, registry: Arc<ResourceRegistry>) -> Result<(), AppError> {
        self.0
            .set(registry)
            .map_err(|_| AppError::Conflict("resource registry already published".into()))
    }

    pub fn get(&self) -> Option<&Arc<ResourceRegistry>> {
        self.0.get()
    }
}

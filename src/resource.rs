//! Per-table resource handler: runs every operation through the shared interceptor chains.

use crate::config::{CmsConfig, ResourceModel, TableInfo};
use crate::error::AppError;
use crate::middleware::{
    DatabaseRequestInterceptor, MiddlewareSet, Operation, Phase, RequestContext, TableAccessPermissionChecker,
    REFERENCE_ID_COLUMN,
};
use crate::permission::Actor;
use crate::service::{CrudService, ListQuery};
use crate::sql::parse_order;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::sync::Arc;

pub struct DbResource {
    model: ResourceModel,
    table: TableInfo,
    middleware: Arc<MiddlewareSet>,
    pool: PgPool,
    schema: String,
    max_page_size: u32,
}

impl DbResource {
    pub fn new(
        model: ResourceModel,
        pool: PgPool,
        middleware: Arc<MiddlewareSet>,
        table: TableInfo,
        config: &CmsConfig,
    ) -> Self {
        DbResource {
            model,
            table,
            middleware,
            pool,
            schema: config.world_schema.clone(),
            max_page_size: config.max_page_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.table.table_name
    }

    pub fn model(&self) -> &ResourceModel {
        &self.model
    }

    pub fn table(&self) -> &TableInfo {
        &self.table
    }

    pub fn middleware(&self) -> &Arc<MiddlewareSet> {
        &self.middleware
    }

    pub async fn find_all(&self, actor: &Actor, mut query: ListQuery) -> Result<Vec<Value>, AppError> {
        let ctx = RequestContext::new(&self.table, actor, Operation::FindAll, Phase::Before);
        self.middleware.run(&ctx, Vec::new()).await?;
        if query.order.is_empty() {
            query.order = parse_order(&self.table, &self.table.default_order);
        }
        let rows = CrudService::list(&self.pool, &self.schema, &self.table, &query, self.max_page_size).await?;
        let rows = self.middleware.run(&ctx.after(), rows).await?;
        Ok(rows.into_iter().map(|r| self.project(r)).collect())
    }

    pub async fn find_one(&self, actor: &Actor, reference_id: &str) -> Result<Value, AppError> {
        let ctx = RequestContext::new(&self.table, actor, Operation::FindOne, Phase::Before);
        self.middleware.run(&ctx, Vec::new()).await?;
        let row = self.load(reference_id).await?;
        let rows = self.middleware.run(&ctx.after(), vec![row]).await?;
        self.single(rows, reference_id)
    }

    pub async fn create(&self, actor: &Actor, body: Value) -> Result<Value, AppError> {
        let ctx = RequestContext::new(&self.table, actor, Operation::Create, Phase::Before);
        let rows = self.middleware.run(&ctx, vec![body]).await?;
        let body = first_object(rows)?;
        let created = CrudService::create(&self.pool, &self.schema, &self.table, &body).await?;
        tracing::debug!(table = %self.name(), "created row");
        let rows = self.middleware.run(&ctx.after(), vec![created]).await?;
        self.single(rows, "created row")
    }

    pub async fn update(&self, actor: &Actor, reference_id: &str, body: Value) -> Result<Value, AppError> {
        self.authorize_table(actor, Operation::Update).await?;
        let existing = self.load(reference_id).await?;
        let ctx = RequestContext::new(&self.table, actor, Operation::Update, Phase::Before)
            .with_existing(Some(&existing));
        let rows = self.middleware.run(&ctx, vec![body]).await?;
        let body = first_object(rows)?;
        let updated = CrudService::update(&self.pool, &self.schema, &self.table, reference_id, &body)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", self.name(), reference_id)))?;
        let rows = self.middleware.run(&ctx.after(), vec![updated]).await?;
        self.single(rows, reference_id)
    }

    pub async fn delete(&self, actor: &Actor, reference_id: &str) -> Result<(), AppError> {
        self.authorize_table(actor, Operation::Delete).await?;
        let existing = self.load(reference_id).await?;
        let ctx = RequestContext::new(&self.table, actor, Operation::Delete, Phase::Before)
            .with_existing(Some(&existing));
        self.middleware.run(&ctx, Vec::new()).await?;
        CrudService::delete(&self.pool, &self.schema, &self.table, reference_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", self.name(), reference_id)))?;
        self.middleware.run(&ctx.after(), Vec::new()).await?;
        Ok(())
    }

    /// Table-level check for operations that must read the existing row first, so an actor
    /// without table access is denied before any SQL runs.
    async fn authorize_table(&self, actor: &Actor, operation: Operation) -> Result<(), AppError> {
        let ctx = RequestContext::new(&self.table, actor, operation, Phase::Before);
        TableAccessPermissionChecker.intercept(&ctx, Vec::new()).await?;
        Ok(())
    }

    async fn load(&self, reference_id: &str) -> Result<Value, AppError> {
        CrudService::read(&self.pool, &self.schema, &self.table, reference_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", self.name(), reference_id)))
    }

    fn single(&self, rows: Vec<Value>, what: &str) -> Result<Value, AppError> {
        rows.into_iter()
            .next()
            .map(|r| self.project(r))
            .ok_or_else(|| AppError::NotFound(format!("{} {}", self.name(), what)))
    }

    /// Keep only attributes exposed by the model (plus reference_id), renamed from physical column names.
    pub fn project(&self, row: Value) -> Value {
        let Value::Object(mut source) = row else { return row };
        let mut out = Map::new();
        if let Some(id) = source.remove(REFERENCE_ID_COLUMN) {
            out.insert(REFERENCE_ID_COLUMN.to_string(), id);
        }
        for col in &self.model.columns {
            if let Some(v) = source.remove(col.physical_name()) {
                out.insert(col.name.clone(), v);
            }
        }
        Value::Object(out)
    }
}

fn first_object(rows: Vec<Value>) -> Result<Map<String, Value>, AppError> {
    match rows.into_iter().next() {
        Some(Value::Object(m)) => Ok(m),
        Some(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        None => Err(AppError::BadRequest("empty request body".into())),
    }
}

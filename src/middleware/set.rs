//! The ten interceptor chains (five operations, before and after) shared by every table.

use crate::config::CmsConfig;
use crate::error::AppError;
use crate::middleware::{
    DataValidationMiddleware, DatabaseRequestInterceptor, EventBus, EventHandler, ExchangeMiddleware,
    ObjectAccessPermissionChecker, Operation, Phase, RequestContext, TableAccessPermissionChecker,
};
use crate::registry::RegistryCell;
use serde_json::Value;
use std::sync::Arc;

pub type Interceptor = Arc<dyn DatabaseRequestInterceptor>;

#[derive(Clone, Default)]
pub struct MiddlewareSet {
    pub before_find_all: Vec<Interceptor>,
    pub after_find_all: Vec<Interceptor>,
    pub before_find_one: Vec<Interceptor>,
    pub after_find_one: Vec<Interceptor>,
    pub before_create: Vec<Interceptor>,
    pub after_create: Vec<Interceptor>,
    pub before_update: Vec<Interceptor>,
    pub after_update: Vec<Interceptor>,
    pub before_delete: Vec<Interceptor>,
    pub after_delete: Vec<Interceptor>,
}

impl MiddlewareSet {
    pub fn chain(&self, operation: Operation, phase: Phase) -> &[Interceptor] {
        match (operation, phase) {
            (Operation::FindAll, Phase::Before) => &self.before_find_all,
            (Operation::FindAll, Phase::After) => &self.after_find_all,
            (Operation::FindOne, Phase::Before) => &self.before_find_one,
            (Operation::FindOne, Phase::After) => &self.after_find_one,
            (Operation::Create, Phase::Before) => &self.before_create,
            (Operation::Create, Phase::After) => &self.after_create,
            (Operation::Update, Phase::Before) => &self.before_update,
            (Operation::Update, Phase::After) => &self.after_update,
            (Operation::Delete, Phase::Before) => &self.before_delete,
            (Operation::Delete, Phase::After) => &self.after_delete,
        }
    }

    /// Run the chain for `ctx` in order, feeding each interceptor the previous one's rows.
    /// The first error stops the chain.
    pub async fn run(&self, ctx: &RequestContext<'_>, rows: Vec<Value>) -> Result<Vec<Value>, AppError> {
        let mut rows = rows;
        for interceptor in self.chain(ctx.operation, ctx.phase) {
            rows = interceptor.intercept(ctx, rows).await.inspect_err(|e| {
                if e.is_denial() {
                    tracing::debug!(
                        table = %ctx.table.table_name,
                        interceptor = interceptor.name(),
                        operation = ?ctx.operation,
                        "request denied"
                    );
                }
            })?;
        }
        Ok(rows)
    }
}

/// Build the shared chains. Every chain starts with the table then object permission checkers;
/// the event-specific interceptors follow in a fixed order.
///
/// `registry` may still be empty; it is read by the exchange interceptor only while handling requests.
pub fn build_middleware_set(config: &CmsConfig, registry: &RegistryCell, events: &EventBus) -> MiddlewareSet {
    let table_checker: Interceptor = Arc::new(TableAccessPermissionChecker);
    let object_checker: Interceptor = Arc::new(ObjectAccessPermissionChecker);
    let data_validation: Interceptor = Arc::new(DataValidationMiddleware::default());
    let exchange: Interceptor = Arc::new(ExchangeMiddleware::new(config, registry.clone()));

    let find_one_handler: Interceptor = Arc::new(EventHandler::new_find_one(events.clone()));
    let create_handler: Interceptor = Arc::new(EventHandler::new_create(events.clone()));
    let update_handler: Interceptor = Arc::new(EventHandler::new_update(events.clone()));
    let delete_handler: Interceptor = Arc::new(EventHandler::new_delete(events.clone()));

    let chain = |rest: &[&Interceptor]| -> Vec<Interceptor> {
        let mut out = vec![Arc::clone(&table_checker), Arc::clone(&object_checker)];
        out.extend(rest.iter().map(|i| Arc::clone(i)));
        out
    };

    MiddlewareSet {
        before_find_all: chain(&[]),
        after_find_all: chain(&[]),
        before_find_one: chain(&[&find_one_handler]),
        after_find_one: chain(&[&find_one_handler]),
        before_create: chain(&[&data_validation, &create_handler]),
        after_create: chain(&[&create_handler, &exchange]),
        before_update: chain(&[&data_validation, &update_handler]),
        after_update: chain(&[&update_handler]),
        before_delete: chain(&[&delete_handler]),
        after_delete: chain(&[&delete_handler]),
    }
}

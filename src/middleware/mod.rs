//! Request interceptors run around every CRUD operation, and the per-operation chains that order them.

mod events;
mod exchange;
mod permission;
mod set;
mod validation;

pub use events::{EventBus, EventHandler, ResourceEvent};
pub use exchange::ExchangeMiddleware;
pub use permission::{ObjectAccessPermissionChecker, TableAccessPermissionChecker};
pub use set::{build_middleware_set, Interceptor, MiddlewareSet};
pub use validation::{DataValidationMiddleware, RequestValidator};

use crate::config::TableInfo;
use crate::error::AppError;
use crate::permission::{Access, Actor};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Column holding a row's owner reference id.
pub const OWNER_COLUMN: &str = "user_account_id";
/// Column holding a row's own permission mask.
pub const PERMISSION_COLUMN: &str = "permission";
/// Column holding the group reference ids a row is shared with.
pub const GROUPS_COLUMN: &str = "usergroup_ids";
/// Stable public identifier of a row.
pub const REFERENCE_ID_COLUMN: &str = "reference_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    FindAll,
    FindOne,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::FindAll,
        Operation::FindOne,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    /// Permission bit an actor needs to perform this operation.
    pub fn required_access(self) -> Access {
        match self {
            Operation::FindAll => Access::Peek,
            Operation::FindOne => Access::Read,
            Operation::Create => Access::Create,
            Operation::Update => Access::Update,
            Operation::Delete => Access::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
}

/// What an interceptor sees besides the rows: the table, the caller and where in the lifecycle it runs.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext<'a> {
    pub table: &'a TableInfo,
    pub actor: &'a Actor,
    pub operation: Operation,
    pub phase: Phase,
    /// Stored row targeted by find-one, update and delete (loaded before the before-chain).
    pub existing: Option<&'a Value>,
}

impl<'a> RequestContext<'a> {
    pub fn new(table: &'a TableInfo, actor: &'a Actor, operation: Operation, phase: Phase) -> Self {
        RequestContext {
            table,
            actor,
            operation,
            phase,
            existing: None,
        }
    }

    pub fn with_existing(mut self, existing: Option<&'a Value>) -> Self {
        self.existing = existing;
        self
    }

    pub fn after(self) -> Self {
        RequestContext {
            phase: Phase::After,
            ..self
        }
    }
}

/// One link of a chain. Returning `Err` stops the chain; `AppError::Forbidden` marks a denial.
/// Implementations are shared by every table and every concurrent request.
#[async_trait]
pub trait DatabaseRequestInterceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect or transform `rows`: the request payload in the before phase, the results in the after phase.
    async fn intercept(&self, ctx: &RequestContext<'_>, rows: Vec<Value>) -> Result<Vec<Value>, AppError>;
}

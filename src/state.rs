//! Shared application state for all routes. Built once by `initialize`; the registry is immutable afterwards.

use crate::config::CmsConfig;
use crate::middleware::EventBus;
use crate::registry::ResourceRegistry;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<ResourceRegistry>,
    pub config: Arc<CmsConfig>,
    /// Subscribe here to observe create/update/delete/find-one events.
    pub events: EventBus,
}

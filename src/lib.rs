//! World API: tables described in the `world` catalog become permission-checked CRUD resources,
//! each operation running through a shared chain of request interceptors.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod permission;
pub mod registry;
pub mod resource;
pub mod response;
pub mod routes;
pub mod secrets;
pub mod service;
pub mod sql;
pub mod startup;
pub mod state;
pub mod store;
pub mod util;

pub use config::{load_exchange_contracts, load_tables, CmsConfig, ResourceModel, TableInfo};
pub use error::{AppError, ConfigError};
pub use middleware::{build_middleware_set, DatabaseRequestInterceptor, EventBus, MiddlewareSet};
pub use permission::{Actor, Permission};
pub use registry::{register, RegistryCell, ResourceRegistry};
pub use resource::DbResource;
pub use routes::{app_router, common_routes, entity_routes};
pub use secrets::ensure_secrets;
pub use startup::{assemble, initialize};
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_sys_tables, ConfigStore, PgConfigStore};
pub use util::in_array_index;

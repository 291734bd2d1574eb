//! Router assembly.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::{entity_routes, MAX_BODY_BYTES};

use crate::state::AppState;
use axum::Router;

/// Every route the server exposes.
pub fn app_router(state: AppState) -> Router {
    common_routes(state.clone()).merge(entity_routes(state))
}

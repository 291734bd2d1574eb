//! Per-table CRUD handlers. The table is resolved from the path through the registry;
//! all permission, validation and event work happens in the resource's interceptor chains.

use crate::error::AppError;
use crate::permission::Actor;
use crate::resource::DbResource;
use crate::response::{success_created, success_many, success_one};
use crate::service::ListQuery;
use crate::sql::parse_order;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

fn resource<'a>(state: &'a AppState, table: &str) -> Result<&'a Arc<DbResource>, AppError> {
    state
        .registry
        .get(table)
        .ok_or_else(|| AppError::NotFound(format!("resource {}", table)))
}

fn parse_paging(key: &str, value: &str) -> Result<u32, AppError> {
    value
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key)))
}

/// `limit`, `offset` and `sort` are reserved; any other key naming an exposed attribute is an equality filter.
/// `null` filters on IS NULL. Other keys are ignored.
pub fn list_query(resource: &DbResource, params: &HashMap<String, String>) -> Result<ListQuery, AppError> {
    let mut query = ListQuery::default();
    for (k, v) in params {
        match k.as_str() {
            "limit" => query.limit = Some(parse_paging(k, v)?),
            "offset" => query.offset = Some(parse_paging(k, v)?),
            "sort" => query.order = parse_order(resource.table(), v),
            _ => {
                if resource.model().attribute_names().any(|a| a == k.as_str()) {
                    let value = if v == "null" { Value::Null } else { Value::String(v.clone()) };
                    query.filters.push((k.clone(), value));
                }
            }
        }
    }
    Ok(query)
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let resource = resource(&state, &table)?;
    let query = list_query(resource, &params)?;
    let (limit, offset) = (query.limit, query.offset);
    let rows = resource.find_all(&actor, query).await?;
    Ok(success_many(rows, limit, offset))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let row = resource(&state, &table)?.create(&actor, body).await?;
    Ok(success_created(row))
}

pub async fn read(
    State(state): State<AppState>,
    actor: Actor,
    Path((table, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let row = resource(&state, &table)?.find_one(&actor, &id).await?;
    Ok(success_one(row))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let row = resource(&state, &table)?.update(&actor, &id, body).await?;
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    actor: Actor,
    Path((table, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    resource(&state, &table)?.delete(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

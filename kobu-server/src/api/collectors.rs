//! Collector endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use kobu_common::assignment::{rank_workloads, CollectorWorkload};
use kobu_common::db::{self, Collector, NewCollector};
use kobu_common::uuid_utils;
use serde::Deserialize;

use super::error::ApiResult;
use super::role::{Caller, Role};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CollectorQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

/// GET /api/collectors
pub async fn list_collectors(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<CollectorQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Collector>>> {
    caller.require(&[Role::Admin, Role::Management])?;
    let Query(query) = query?;

    let collectors = db::list_collectors(&state.db, query.include_inactive).await?;
    Ok(Json(collectors))
}

/// POST /api/collectors
pub async fn create_collector(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<NewCollector>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Collector>)> {
    caller.require(&[Role::Admin])?;
    let Json(new) = body?;

    let collector = db::create_collector(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(collector)))
}

/// PUT /api/collectors/:id/active
pub async fn set_active(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    body: Result<Json<ActiveRequest>, JsonRejection>,
) -> ApiResult<Json<Collector>> {
    caller.require(&[Role::Admin])?;
    let id = uuid_utils::parse_id("id", &id)?;
    let Json(request) = body?;

    let collector = db::set_collector_active(&state.db, id, request.active).await?;
    Ok(Json(collector))
}

/// GET /api/collectors/workloads
///
/// Active collectors, least loaded first (the order automatic assignment uses).
pub async fn workloads(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<CollectorWorkload>>> {
    caller.require(&[Role::Admin])?;

    let mut loads = db::collector_workloads(&state.db).await?;
    rank_workloads(&mut loads);
    Ok(Json(loads))
}

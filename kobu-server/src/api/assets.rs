//! Case endpoints
//!
//! Admins manage cases and assignment, management browses, and collectors
//! see only the cases assigned to them.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use kobu_common::assignment::{assign_assets, unassign_asset, AssignmentOutcome};
use kobu_common::db::{
    self, Asset, AssetStatus, AssetUpdate, Collector, NewAsset, PaymentReport, VisitReport,
};
use kobu_common::filter::{AssetFilter, ReportFilter};
use kobu_common::{time, uuid_utils, Error, KobuEvent};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::error::ApiResult;
use super::role::{Caller, Role};
use crate::pagination::{calculate_pagination, default_page, Page, PAGE_SIZE};
use crate::AppState;

/// Query string of the case table
#[derive(Debug, Deserialize)]
pub struct AssetQuery {
    pub status: Option<AssetStatus>,
    pub collector_id: Option<Uuid>,
    pub region: Option<String>,
    pub search: Option<String>,
    pub min_balance_cents: Option<i64>,
    pub max_balance_cents: Option<i64>,
    #[serde(default)]
    pub unassigned_only: bool,
    #[serde(default)]
    pub open_only: bool,
    #[serde(default = "default_page")]
    pub page: i64,
}

impl AssetQuery {
    pub fn filter(&self) -> AssetFilter {
        AssetFilter {
            status: self.status,
            collector_id: self.collector_id,
            region: self.region.clone(),
            search: self.search.clone(),
            min_balance_cents: self.min_balance_cents,
            max_balance_cents: self.max_balance_cents,
            unassigned_only: self.unassigned_only,
            open_only: self.open_only,
        }
    }
}

/// A case with its collector and report history
#[derive(Debug, Serialize)]
pub struct AssetDetail {
    #[serde(flatten)]
    pub asset: Asset,
    pub outstanding_cents: i64,
    pub collector: Option<Collector>,
    pub visits: Vec<VisitReport>,
    pub payments: Vec<PaymentReport>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub asset_ids: Vec<Uuid>,
    /// Omit to pick the active collector with the fewest open cases
    #[serde(default)]
    pub collector_id: Option<Uuid>,
}

/// GET /api/assets
pub async fn list_assets(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<AssetQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Asset>>> {
    caller.require(&[Role::Admin, Role::Management])?;
    let Query(query) = query?;
    let filter = query.filter();

    let total = db::count_assets(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page);
    let items = db::list_assets(&state.db, &filter, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/assets
pub async fn create_asset(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<NewAsset>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Asset>)> {
    caller.require(&[Role::Admin])?;
    let Json(new) = body?;

    let asset = db::create_asset(&state.db, &new).await?;
    let now = time::now();
    state.events.emit_lossy(KobuEvent::AssetCreated {
        asset_id: asset.guid,
        account_number: asset.account_number.clone(),
        timestamp: now,
    });
    if let Some(collector_id) = asset.collector_id {
        state.events.emit_lossy(KobuEvent::AssetsAssigned {
            collector_id,
            asset_ids: vec![asset.guid],
            auto_selected: false,
            timestamp: now,
        });
    }

    Ok((StatusCode::CREATED, Json(asset)))
}

/// GET /api/assets/:id
///
/// Collectors may only open their own cases.
pub async fn get_asset(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<Json<AssetDetail>> {
    let id = uuid_utils::parse_id("id", &id)?;
    let asset = db::get_asset(&state.db, id).await?;

    if caller.is_collector() && asset.collector_id != Some(caller.user_id) {
        return Err(Error::Forbidden(format!(
            "Case {} is not assigned to you",
            asset.account_number
        ))
        .into());
    }

    let collector = match asset.collector_id {
        Some(collector_id) => Some(db::get_collector(&state.db, collector_id).await?),
        None => None,
    };
    let reports = ReportFilter {
        asset_id: Some(id),
        ..Default::default()
    };
    let visits = db::list_all_visit_reports(&state.db, &reports).await?;
    let payments = db::list_all_payment_reports(&state.db, &reports).await?;

    Ok(Json(AssetDetail {
        outstanding_cents: asset.outstanding_cents(),
        asset,
        collector,
        visits,
        payments,
    }))
}

/// PATCH /api/assets/:id
pub async fn update_asset(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    body: Result<Json<AssetUpdate>, JsonRejection>,
) -> ApiResult<Json<Asset>> {
    caller.require(&[Role::Admin])?;
    let id = uuid_utils::parse_id("id", &id)?;
    let Json(update) = body?;

    let asset = db::update_asset(&state.db, id, &update).await?;
    Ok(Json(asset))
}

/// DELETE /api/assets/:id
pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(&[Role::Admin])?;
    let id = uuid_utils::parse_id("id", &id)?;

    db::delete_asset(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/assets/assign
pub async fn assign(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<AssignRequest>, JsonRejection>,
) -> ApiResult<Json<AssignmentOutcome>> {
    caller.require(&[Role::Admin])?;
    let Json(request) = body?;

    let outcome = assign_assets(&state.db, &request.asset_ids, request.collector_id).await?;
    info!(
        "Admin {} assigned {} cases to {}",
        caller.user_id,
        outcome.assets.len(),
        outcome.collector.name
    );
    state.events.emit_lossy(KobuEvent::AssetsAssigned {
        collector_id: outcome.collector.guid,
        asset_ids: outcome.assets.iter().map(|a| a.guid).collect(),
        auto_selected: outcome.auto_selected,
        timestamp: time::now(),
    });

    Ok(Json(outcome))
}

/// POST /api/assets/:id/unassign
pub async fn unassign(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<Json<Asset>> {
    caller.require(&[Role::Admin])?;
    let id = uuid_utils::parse_id("id", &id)?;

    let asset = unassign_asset(&state.db, id).await?;
    state.events.emit_lossy(KobuEvent::AssetUnassigned {
        asset_id: asset.guid,
        timestamp: time::now(),
    });
    Ok(Json(asset))
}

/// Query string of the collector's case list
#[derive(Debug, Deserialize)]
pub struct CaseQuery {
    pub status: Option<AssetStatus>,
    pub search: Option<String>,
    /// Include settled and closed cases
    #[serde(default)]
    pub all: bool,
    #[serde(default = "default_page")]
    pub page: i64,
}

/// GET /api/collector/cases
///
/// Open cases by default; `all=true` or an explicit `status` widens the list.
pub async fn collector_cases(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<CaseQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Asset>>> {
    caller.require(&[Role::Collector])?;
    let Query(query) = query?;

    let filter = AssetFilter {
        status: query.status,
        collector_id: Some(caller.user_id),
        search: query.search.clone(),
        open_only: query.status.is_none() && !query.all,
        ..Default::default()
    };
    let total = db::count_assets(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page);
    let items = db::list_assets(&state.db, &filter, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(Page::new(items, total, pagination)))
}

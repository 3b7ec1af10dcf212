//! Role dashboards

use axum::{extract::State, Extension, Json};
use kobu_common::dashboard::{
    admin_summary, collector_dashboard, management_overview, AdminSummary, CollectorDashboard,
    ManagementOverview,
};
use kobu_common::time;

use super::error::ApiResult;
use super::role::{Caller, Role};
use crate::AppState;

/// GET /api/dashboard/admin
pub async fn admin(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<AdminSummary>> {
    caller.require(&[Role::Admin])?;
    Ok(Json(admin_summary(&state.db).await?))
}

/// GET /api/dashboard/management
pub async fn management(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<ManagementOverview>> {
    caller.require(&[Role::Admin, Role::Management])?;
    Ok(Json(management_overview(&state.db).await?))
}

/// GET /api/dashboard/collector
///
/// "Today" is the East Africa calendar day.
pub async fn collector(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<CollectorDashboard>> {
    caller.require(&[Role::Collector])?;
    let today = time::local_date(time::now());
    Ok(Json(
        collector_dashboard(&state.db, caller.user_id, today).await?,
    ))
}

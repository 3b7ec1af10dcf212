//! Letters and CSV exports
//!
//! Letters are returned as plain text (or JSON with `?format=json`); layout
//! and PDF rendering belong to the client.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use kobu_common::dashboard::management_overview;
use kobu_common::db::{self, ValidationStatus};
use kobu_common::documents::{
    assets_csv, collectors_csv, payments_csv, render_demand_letter,
    render_promise_acknowledgement, Letter,
};
use kobu_common::filter::AssetFilter;
use kobu_common::{time, uuid_utils, Error};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::assets::AssetQuery;
use super::error::ApiResult;
use super::reports::ReportQuery;
use super::role::{Caller, Role};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LetterQuery {
    pub format: Option<String>,
}

fn letter_response(letter: Letter, query: &LetterQuery, file_stem: &str) -> Response {
    if query.format.as_deref() == Some("json") {
        return Json(letter).into_response();
    }
    let text = format!("Ref: {}\n\n{}", letter.reference, letter.body);
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}.txt\"", file_stem),
            ),
        ],
        text,
    )
        .into_response()
}

fn csv_response(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/documents/demand-letter/:asset_id
pub async fn demand_letter(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(asset_id): Path<String>,
    query: Result<Query<LetterQuery>, QueryRejection>,
) -> ApiResult<Response> {
    caller.require(&[Role::Admin])?;
    let Query(query) = query?;
    let asset_id = uuid_utils::parse_id("asset_id", &asset_id)?;

    let asset = db::get_asset(&state.db, asset_id).await?;
    let notice_days = db::load_notice_days(&state.db).await?;
    let letter = render_demand_letter(
        &asset,
        time::local_date(time::now()),
        &state.company_name,
        notice_days,
    )?;

    info!("Issued demand letter {} for case {}", letter.reference, asset.account_number);
    Ok(letter_response(
        letter,
        &query,
        &format!("demand-{}", asset.account_number),
    ))
}

/// GET /api/documents/promise-letter/:visit_id
///
/// Only approved promise-to-pay visits can be acknowledged.
pub async fn promise_letter(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(visit_id): Path<String>,
    query: Result<Query<LetterQuery>, QueryRejection>,
) -> ApiResult<Response> {
    caller.require(&[Role::Admin])?;
    let Query(query) = query?;
    let visit_id = uuid_utils::parse_id("visit_id", &visit_id)?;

    let visit = db::get_visit_report(&state.db, visit_id).await?;
    if visit.validation != ValidationStatus::Approved {
        return Err(Error::Conflict(format!(
            "Visit {} is {}; only approved promises are acknowledged",
            visit.guid, visit.validation
        ))
        .into());
    }
    let asset = db::get_asset(&state.db, visit.asset_id).await?;
    let letter = render_promise_acknowledgement(
        &asset,
        &visit,
        time::local_date(time::now()),
        &state.company_name,
    )?;

    Ok(letter_response(
        letter,
        &query,
        &format!("promise-{}", asset.account_number),
    ))
}

/// GET /api/documents/assets.csv (accepts the case table filters)
pub async fn export_assets(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<AssetQuery>, QueryRejection>,
) -> ApiResult<Response> {
    caller.require(&[Role::Admin, Role::Management])?;
    let Query(query) = query?;

    let assets = db::list_all_assets(&state.db, &query.filter()).await?;
    let names: HashMap<Uuid, String> = db::list_collectors(&state.db, true)
        .await?
        .into_iter()
        .map(|c| (c.guid, c.name))
        .collect();

    Ok(csv_response("assets.csv", assets_csv(&assets, &names)))
}

/// GET /api/documents/collectors.csv
pub async fn export_collectors(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Response> {
    caller.require(&[Role::Admin, Role::Management])?;

    let overview = management_overview(&state.db).await?;
    Ok(csv_response(
        "collectors.csv",
        collectors_csv(&overview.collectors),
    ))
}

/// GET /api/documents/payments.csv (accepts the report queue filters)
pub async fn export_payments(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Response> {
    caller.require(&[Role::Admin, Role::Management])?;
    let Query(query) = query?;

    let payments = db::list_all_payment_reports(&state.db, &query.filter_for(&caller)).await?;
    let accounts: HashMap<Uuid, String> = db::list_all_assets(&state.db, &AssetFilter::default())
        .await?
        .into_iter()
        .map(|a| (a.guid, a.account_number))
        .collect();

    Ok(csv_response("payments.csv", payments_csv(&payments, &accounts)))
}

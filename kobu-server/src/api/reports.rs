//! Visit and payment report endpoints
//!
//! Collectors submit evidence; admins approve or reject it. Intake loads the
//! evidence thresholds from settings on every request so changes apply
//! without a restart.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use kobu_common::db::{
    self, Asset, AssetStatus, NewPaymentReport, NewVisitReport, PaymentReport, Review,
    ReviewDecision, ValidationStatus, VisitReport,
};
use kobu_common::events::ReportKind;
use kobu_common::filter::ReportFilter;
use kobu_common::{time, uuid_utils, KobuEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiResult;
use super::role::{Caller, Role};
use crate::pagination::{calculate_pagination, default_page, Page, PAGE_SIZE};
use crate::AppState;

/// Query string of the report queues
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub validation: Option<ValidationStatus>,
    pub collector_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_page")]
    pub page: i64,
}

impl ReportQuery {
    /// Collectors only ever see their own reports
    pub(crate) fn filter_for(&self, caller: &Caller) -> ReportFilter {
        ReportFilter {
            validation: self.validation,
            collector_id: if caller.is_collector() {
                Some(caller.user_id)
            } else {
                self.collector_id
            },
            asset_id: self.asset_id,
            from: self.from,
            to: self.to,
        }
    }
}

/// Body of approve/reject requests
#[derive(Debug, Default, Deserialize)]
pub struct ReviewBody {
    #[serde(default)]
    pub note: Option<String>,
}

/// A reviewed report and the case it belongs to
#[derive(Debug, Serialize)]
pub struct ReviewResponse<T> {
    pub report: T,
    pub asset: Asset,
}

const ALL_ROLES: &[Role] = &[Role::Admin, Role::Management, Role::Collector];

fn review_from(caller: &Caller, decision: ReviewDecision, body: Option<Json<ReviewBody>>) -> Review {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Review {
        reviewer_id: caller.user_id,
        decision,
        note: body.note,
    }
}

// =============================================================================
// Visits
// =============================================================================

/// GET /api/visits
pub async fn list_visits(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<Page<VisitReport>>> {
    caller.require(ALL_ROLES)?;
    let Query(query) = query?;
    let filter = query.filter_for(&caller);

    let total = db::count_visit_reports(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page);
    let items = db::list_visit_reports(&state.db, &filter, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/visits
pub async fn submit_visit(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<NewVisitReport>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<VisitReport>)> {
    caller.require(&[Role::Collector])?;
    let Json(new) = body?;

    let policy = db::load_evidence_policy(&state.db).await?;
    let report =
        db::insert_visit_report(&state.db, caller.user_id, &new, &policy, time::now()).await?;

    state.events.emit_lossy(KobuEvent::VisitReported {
        report_id: report.guid,
        asset_id: report.asset_id,
        collector_id: report.collector_id,
        flag_count: report.flags.len(),
        timestamp: report.submitted_at,
    });
    Ok((StatusCode::CREATED, Json(report)))
}

/// POST /api/visits/:id/approve
pub async fn approve_visit(
    state: State<AppState>,
    caller: Extension<Caller>,
    id: Path<String>,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<Json<ReviewResponse<VisitReport>>> {
    review_visit(state, caller, id, ReviewDecision::Approve, body).await
}

/// POST /api/visits/:id/reject (a note is required)
pub async fn reject_visit(
    state: State<AppState>,
    caller: Extension<Caller>,
    id: Path<String>,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<Json<ReviewResponse<VisitReport>>> {
    review_visit(state, caller, id, ReviewDecision::Reject, body).await
}

async fn review_visit(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    decision: ReviewDecision,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<Json<ReviewResponse<VisitReport>>> {
    caller.require(&[Role::Admin])?;
    let id = uuid_utils::parse_id("id", &id)?;
    let review = review_from(&caller, decision, body);

    let (report, asset) = db::review_visit_report(&state.db, id, &review).await?;
    state.events.emit_lossy(KobuEvent::ReportReviewed {
        kind: ReportKind::Visit,
        report_id: report.guid,
        asset_id: asset.guid,
        validation: report.validation,
        asset_status: asset.status,
        timestamp: time::now(),
    });

    Ok(Json(ReviewResponse { report, asset }))
}

// =============================================================================
// Payments
// =============================================================================

/// GET /api/payments
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<Page<PaymentReport>>> {
    caller.require(ALL_ROLES)?;
    let Query(query) = query?;
    let filter = query.filter_for(&caller);

    let total = db::count_payment_reports(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page);
    let items =
        db::list_payment_reports(&state.db, &filter, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/payments
pub async fn submit_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<NewPaymentReport>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PaymentReport>)> {
    caller.require(&[Role::Collector])?;
    let Json(new) = body?;

    let policy = db::load_evidence_policy(&state.db).await?;
    let report =
        db::insert_payment_report(&state.db, caller.user_id, &new, &policy, time::now()).await?;

    state.events.emit_lossy(KobuEvent::PaymentReported {
        report_id: report.guid,
        asset_id: report.asset_id,
        collector_id: report.collector_id,
        amount_cents: report.amount_cents,
        timestamp: report.submitted_at,
    });
    Ok((StatusCode::CREATED, Json(report)))
}

/// POST /api/payments/:id/approve
pub async fn approve_payment(
    state: State<AppState>,
    caller: Extension<Caller>,
    id: Path<String>,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<Json<ReviewResponse<PaymentReport>>> {
    review_payment(state, caller, id, ReviewDecision::Approve, body).await
}

/// POST /api/payments/:id/reject (a note is required)
pub async fn reject_payment(
    state: State<AppState>,
    caller: Extension<Caller>,
    id: Path<String>,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<Json<ReviewResponse<PaymentReport>>> {
    review_payment(state, caller, id, ReviewDecision::Reject, body).await
}

async fn review_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    decision: ReviewDecision,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<Json<ReviewResponse<PaymentReport>>> {
    caller.require(&[Role::Admin])?;
    let id = uuid_utils::parse_id("id", &id)?;
    let review = review_from(&caller, decision, body);

    let (report, asset) = db::review_payment_report(&state.db, id, &review).await?;
    let now = time::now();
    state.events.emit_lossy(KobuEvent::ReportReviewed {
        kind: ReportKind::Payment,
        report_id: report.guid,
        asset_id: asset.guid,
        validation: report.validation,
        asset_status: asset.status,
        timestamp: now,
    });

    // Only the approval that crossed the balance settles the case
    let settled_now = report.validation == ValidationStatus::Approved
        && asset.status == AssetStatus::Settled
        && asset.collected_cents - report.amount_cents < asset.balance_cents;
    if settled_now {
        state.events.emit_lossy(KobuEvent::AssetSettled {
            asset_id: asset.guid,
            collected_cents: asset.collected_cents,
            timestamp: now,
        });
    }

    Ok(Json(ReviewResponse { report, asset }))
}

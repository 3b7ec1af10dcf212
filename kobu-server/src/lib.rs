//! kobu-server library - Watu Kobu debt collection HTTP API
//!
//! Role-gated JSON endpoints over the shared SQLite database, plus CSV
//! exports, debtor letters and a live event stream for dashboards.

use axum::Router;
use kobu_common::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus feeding the SSE stream
    pub events: Arc<EventBus>,
    /// Company name printed on letters
    pub company_name: String,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, events: Arc<EventBus>, company_name: impl Into<String>) -> Self {
        Self {
            db,
            events,
            company_name: company_name.into(),
        }
    }
}

/// Build application router
///
/// `/health` and `/api/buildinfo` are public; everything else requires the
/// caller identity headers (see [`api::role`]).
pub fn build_router(state: AppState) -> Router {
    use api::{assets, collectors, dashboard, documents, reports};
    use axum::middleware;
    use axum::routing::{get, post, put};

    // Protected routes (require caller identity)
    let protected = Router::new()
        .route("/api/assets", get(assets::list_assets).post(assets::create_asset))
        .route("/api/assets/assign", post(assets::assign))
        .route(
            "/api/assets/:id",
            get(assets::get_asset)
                .patch(assets::update_asset)
                .delete(assets::delete_asset),
        )
        .route("/api/assets/:id/unassign", post(assets::unassign))
        .route(
            "/api/collectors",
            get(collectors::list_collectors).post(collectors::create_collector),
        )
        .route("/api/collectors/workloads", get(collectors::workloads))
        .route("/api/collectors/:id/active", put(collectors::set_active))
        .route("/api/collector/cases", get(assets::collector_cases))
        .route("/api/visits", get(reports::list_visits).post(reports::submit_visit))
        .route("/api/visits/:id/approve", post(reports::approve_visit))
        .route("/api/visits/:id/reject", post(reports::reject_visit))
        .route(
            "/api/payments",
            get(reports::list_payments).post(reports::submit_payment),
        )
        .route("/api/payments/:id/approve", post(reports::approve_payment))
        .route("/api/payments/:id/reject", post(reports::reject_payment))
        .route("/api/dashboard/admin", get(dashboard::admin))
        .route("/api/dashboard/management", get(dashboard::management))
        .route("/api/dashboard/collector", get(dashboard::collector))
        .route(
            "/api/documents/demand-letter/:asset_id",
            get(documents::demand_letter),
        )
        .route(
            "/api/documents/promise-letter/:visit_id",
            get(documents::promise_letter),
        )
        .route("/api/documents/assets.csv", get(documents::export_assets))
        .route(
            "/api/documents/collectors.csv",
            get(documents::export_collectors),
        )
        .route("/api/documents/payments.csv", get(documents::export_payments))
        .route("/api/events", get(api::event_stream))
        .layer(middleware::from_fn(api::identify_caller));

    // Public routes
    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Figures for the role dashboards
//!
//! Counts and sums come straight from SQL aggregates. Percentages are
//! computed here so every dashboard rounds the same way.

use crate::db::rows::uuid_col;
use crate::time::local_day_bounds;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// `part` as a percentage of `whole`, rounded to two decimals
///
/// ```
/// use kobu_common::dashboard::percentage;
///
/// assert_eq!(percentage(1, 3), 33.33);
/// assert_eq!(percentage(5, 0), 0.0);
/// ```
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    let raw = part as f64 * 100.0 / whole as f64;
    (raw * 100.0).round() / 100.0
}

/// Case counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: i64,
    pub unassigned: i64,
    pub assigned: i64,
    pub promised: i64,
    pub settled: i64,
    pub closed: i64,
}

/// Admin dashboard cards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSummary {
    pub cases: StatusCounts,
    pub total_balance_cents: i64,
    pub total_collected_cents: i64,
    /// Remaining debt on cases that are not closed
    pub total_outstanding_cents: i64,
    pub recovery_rate: f64,
    pub pending_visits: i64,
    pub pending_payments: i64,
    pub active_collectors: i64,
}

/// Build the admin dashboard
pub async fn admin_summary(pool: &SqlitePool) -> Result<AdminSummary> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN status = 'unassigned' THEN 1 ELSE 0 END), 0) AS unassigned,
            COALESCE(SUM(CASE WHEN status = 'assigned' THEN 1 ELSE 0 END), 0) AS assigned,
            COALESCE(SUM(CASE WHEN status = 'promised' THEN 1 ELSE 0 END), 0) AS promised,
            COALESCE(SUM(CASE WHEN status = 'settled' THEN 1 ELSE 0 END), 0) AS settled,
            COALESCE(SUM(CASE WHEN status = 'closed' THEN 1 ELSE 0 END), 0) AS closed,
            COALESCE(SUM(balance_cents), 0) AS balance,
            COALESCE(SUM(collected_cents), 0) AS collected,
            COALESCE(SUM(CASE WHEN status != 'closed' AND balance_cents > collected_cents
                THEN balance_cents - collected_cents ELSE 0 END), 0) AS outstanding
        FROM assets
        "#,
    )
    .fetch_one(pool)
    .await?;

    let cases = StatusCounts {
        total: row.try_get("total")?,
        unassigned: row.try_get("unassigned")?,
        assigned: row.try_get("assigned")?,
        promised: row.try_get("promised")?,
        settled: row.try_get("settled")?,
        closed: row.try_get("closed")?,
    };
    let total_balance_cents: i64 = row.try_get("balance")?;
    let total_collected_cents: i64 = row.try_get("collected")?;

    let pending_visits: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM visit_reports WHERE validation = 'pending'")
            .fetch_one(pool)
            .await?;
    let pending_payments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payment_reports WHERE validation = 'pending'")
            .fetch_one(pool)
            .await?;
    let active_collectors: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM collectors WHERE active = 1")
            .fetch_one(pool)
            .await?;

    Ok(AdminSummary {
        cases,
        total_balance_cents,
        total_collected_cents,
        total_outstanding_cents: row.try_get("outstanding")?,
        recovery_rate: percentage(total_collected_cents, total_balance_cents),
        pending_visits,
        pending_payments,
        active_collectors,
    })
}

/// One row of the management performance table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorPerformance {
    pub collector_id: Uuid,
    pub name: String,
    pub region: String,
    pub active: bool,
    pub open_cases: i64,
    pub settled_cases: i64,
    /// Balance of all cases currently held by the collector
    pub portfolio_balance_cents: i64,
    /// Amount collected so far on those cases
    pub portfolio_collected_cents: i64,
    pub recovery_rate: f64,
    pub approved_visits: i64,
    /// Approved payments the collector reported
    pub payments_collected_cents: i64,
    /// Share of all approved payments
    pub share_of_collections: f64,
}

/// Per-region totals for the management view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionTotals {
    pub region: String,
    pub cases: i64,
    pub balance_cents: i64,
    pub collected_cents: i64,
    pub recovery_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementOverview {
    pub collectors: Vec<CollectorPerformance>,
    pub regions: Vec<RegionTotals>,
    pub total_payments_collected_cents: i64,
}

/// Fill in rates and shares, then order by amount collected (highest first)
pub fn rank_performance(rows: &mut [CollectorPerformance]) -> i64 {
    let total: i64 = rows.iter().map(|r| r.payments_collected_cents).sum();
    for row in rows.iter_mut() {
        row.recovery_rate = percentage(row.portfolio_collected_cents, row.portfolio_balance_cents);
        row.share_of_collections = percentage(row.payments_collected_cents, total);
    }
    rows.sort_by(|a, b| {
        b.payments_collected_cents
            .cmp(&a.payments_collected_cents)
            .then_with(|| a.name.cmp(&b.name))
    });
    total
}

/// Build the management dashboard
pub async fn management_overview(pool: &SqlitePool) -> Result<ManagementOverview> {
    let rows = sqlx::query(
        r#"
        SELECT c.guid, c.name, c.region, c.active,
            COALESCE(SUM(CASE WHEN a.status IN ('assigned', 'promised') THEN 1 ELSE 0 END), 0) AS open_cases,
            COALESCE(SUM(CASE WHEN a.status = 'settled' THEN 1 ELSE 0 END), 0) AS settled_cases,
            COALESCE(SUM(a.balance_cents), 0) AS balance,
            COALESCE(SUM(a.collected_cents), 0) AS collected,
            (SELECT COUNT(*) FROM visit_reports v
                WHERE v.collector_id = c.guid AND v.validation = 'approved') AS approved_visits,
            (SELECT COALESCE(SUM(p.amount_cents), 0) FROM payment_reports p
                WHERE p.collector_id = c.guid AND p.validation = 'approved') AS payments
        FROM collectors c
        LEFT JOIN assets a ON a.collector_id = c.guid
        GROUP BY c.guid, c.name, c.region, c.active
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut collectors = rows
        .iter()
        .map(|row| {
            Ok(CollectorPerformance {
                collector_id: uuid_col(row, "guid")?,
                name: row.try_get("name")?,
                region: row.try_get("region")?,
                active: row.try_get::<i64, _>("active")? != 0,
                open_cases: row.try_get("open_cases")?,
                settled_cases: row.try_get("settled_cases")?,
                portfolio_balance_cents: row.try_get("balance")?,
                portfolio_collected_cents: row.try_get("collected")?,
                recovery_rate: 0.0,
                approved_visits: row.try_get("approved_visits")?,
                payments_collected_cents: row.try_get("payments")?,
                share_of_collections: 0.0,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let total_payments_collected_cents = rank_performance(&mut collectors);

    let region_rows = sqlx::query(
        r#"
        SELECT region, COUNT(*) AS cases,
            COALESCE(SUM(balance_cents), 0) AS balance,
            COALESCE(SUM(collected_cents), 0) AS collected
        FROM assets
        GROUP BY region
        ORDER BY region
        "#,
    )
    .fetch_all(pool)
    .await?;

    let regions = region_rows
        .iter()
        .map(|row| {
            let balance_cents: i64 = row.try_get("balance")?;
            let collected_cents: i64 = row.try_get("collected")?;
            Ok(RegionTotals {
                region: row.try_get("region")?,
                cases: row.try_get("cases")?,
                balance_cents,
                collected_cents,
                recovery_rate: percentage(collected_cents, balance_cents),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ManagementOverview {
        collectors,
        regions,
        total_payments_collected_cents,
    })
}

/// Collector home screen figures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorDashboard {
    pub collector_id: Uuid,
    pub open_cases: i64,
    pub promised_cases: i64,
    pub settled_cases: i64,
    pub outstanding_cents: i64,
    pub collected_cents: i64,
    pub recovery_rate: f64,
    pub pending_reports: i64,
    pub rejected_reports: i64,
    pub visits_today: i64,
    pub collected_today_cents: i64,
}

/// Build one collector's dashboard; `today` is the local calendar date
pub async fn collector_dashboard(
    pool: &SqlitePool,
    collector_id: Uuid,
    today: NaiveDate,
) -> Result<CollectorDashboard> {
    let id = collector_id.to_string();

    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN status IN ('assigned', 'promised') THEN 1 ELSE 0 END), 0) AS open_cases,
            COALESCE(SUM(CASE WHEN status = 'promised' THEN 1 ELSE 0 END), 0) AS promised,
            COALESCE(SUM(CASE WHEN status = 'settled' THEN 1 ELSE 0 END), 0) AS settled,
            COALESCE(SUM(CASE WHEN status IN ('assigned', 'promised') AND balance_cents > collected_cents
                THEN balance_cents - collected_cents ELSE 0 END), 0) AS outstanding,
            COALESCE(SUM(balance_cents), 0) AS balance,
            COALESCE(SUM(collected_cents), 0) AS collected
        FROM assets
        WHERE collector_id = ?
        "#,
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;

    let reports = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM visit_reports WHERE collector_id = ?1 AND validation = 'pending')
          + (SELECT COUNT(*) FROM payment_reports WHERE collector_id = ?1 AND validation = 'pending') AS pending,
            (SELECT COUNT(*) FROM visit_reports WHERE collector_id = ?1 AND validation = 'rejected')
          + (SELECT COUNT(*) FROM payment_reports WHERE collector_id = ?1 AND validation = 'rejected') AS rejected
        "#,
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;

    let (start, end) = local_day_bounds(today);
    let visits_today: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM visit_reports WHERE collector_id = ? AND submitted_at >= ? AND submitted_at < ?",
    )
    .bind(&id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;
    let collected_today_cents: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0) FROM payment_reports
        WHERE collector_id = ? AND validation = 'approved' AND paid_at >= ? AND paid_at < ?
        "#,
    )
    .bind(&id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    let balance: i64 = row.try_get("balance")?;
    let collected: i64 = row.try_get("collected")?;

    Ok(CollectorDashboard {
        collector_id,
        open_cases: row.try_get("open_cases")?,
        promised_cases: row.try_get("promised")?,
        settled_cases: row.try_get("settled")?,
        outstanding_cents: row.try_get("outstanding")?,
        collected_cents: collected,
        recovery_rate: percentage(collected, balance),
        pending_reports: reports.try_get("pending")?,
        rejected_reports: reports.try_get("rejected")?,
        visits_today,
        collected_today_cents,
    })
}

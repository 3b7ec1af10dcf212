//! Visit and payment report intake and review

use crate::db::assets::{get_asset, write_asset};
use crate::db::models::{
    Asset, AssetStatus, NewPaymentReport, NewVisitReport, PaymentReport, Review,
    ReviewDecision, ValidationStatus, VisitOutcome, VisitReport,
};
use crate::db::rows::{enum_col, json_col, opt_uuid_col, point_cols, uuid_col};
use crate::evidence::{assess_payment, assess_visit, EvidencePolicy};
use crate::filter::ReportFilter;
use crate::{time, uuid_utils, Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

const VISIT_COLUMNS: &str = "guid, asset_id, collector_id, outcome, notes, visited_at, \
    submitted_at, latitude, longitude, promised_amount_cents, promised_date, photo_ref, \
    validation, flags, reviewed_by, reviewed_at, review_note";

const PAYMENT_COLUMNS: &str = "guid, asset_id, collector_id, amount_cents, method, reference, \
    paid_at, submitted_at, latitude, longitude, receipt_ref, validation, flags, reviewed_by, \
    reviewed_at, review_note";

fn visit_from_row(row: &SqliteRow) -> Result<VisitReport> {
    Ok(VisitReport {
        guid: uuid_col(row, "guid")?,
        asset_id: uuid_col(row, "asset_id")?,
        collector_id: uuid_col(row, "collector_id")?,
        outcome: enum_col(row, "outcome")?,
        notes: row.try_get("notes")?,
        visited_at: row.try_get("visited_at")?,
        submitted_at: row.try_get("submitted_at")?,
        location: point_cols(row)?,
        promised_amount_cents: row.try_get("promised_amount_cents")?,
        promised_date: row.try_get("promised_date")?,
        photo_ref: row.try_get("photo_ref")?,
        validation: enum_col(row, "validation")?,
        flags: json_col(row, "flags")?,
        reviewed_by: opt_uuid_col(row, "reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        review_note: row.try_get("review_note")?,
    })
}

fn payment_from_row(row: &SqliteRow) -> Result<PaymentReport> {
    Ok(PaymentReport {
        guid: uuid_col(row, "guid")?,
        asset_id: uuid_col(row, "asset_id")?,
        collector_id: uuid_col(row, "collector_id")?,
        amount_cents: row.try_get("amount_cents")?,
        method: enum_col(row, "method")?,
        reference: row.try_get("reference")?,
        paid_at: row.try_get("paid_at")?,
        submitted_at: row.try_get("submitted_at")?,
        location: point_cols(row)?,
        receipt_ref: row.try_get("receipt_ref")?,
        validation: enum_col(row, "validation")?,
        flags: json_col(row, "flags")?,
        reviewed_by: opt_uuid_col(row, "reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        review_note: row.try_get("review_note")?,
    })
}

/// Check that `collector_id` may report on `asset`
fn ensure_reportable(asset: &Asset, collector_id: Uuid) -> Result<()> {
    if asset.collector_id != Some(collector_id) {
        return Err(Error::Forbidden(format!(
            "Case {} is not assigned to this collector",
            asset.account_number
        )));
    }
    if asset.status.is_final() {
        return Err(Error::Conflict(format!(
            "Case {} is {} and accepts no further reports",
            asset.account_number, asset.status
        )));
    }
    Ok(())
}

/// Record a field visit submitted by `collector_id`
///
/// Evidence heuristics run here and their findings are stored with the
/// report, which starts `pending`.
pub async fn insert_visit_report(
    pool: &SqlitePool,
    collector_id: Uuid,
    new: &NewVisitReport,
    policy: &EvidencePolicy,
    submitted_at: DateTime<Utc>,
) -> Result<VisitReport> {
    new.validate()?;

    let asset = get_asset(pool, new.asset_id).await?;
    ensure_reportable(&asset, collector_id)?;

    let flags = assess_visit(new, &asset, submitted_at, policy);
    let report = VisitReport {
        guid: uuid_utils::generate(),
        asset_id: asset.guid,
        collector_id,
        outcome: new.outcome,
        notes: new.notes.trim().to_string(),
        visited_at: new.visited_at,
        submitted_at,
        location: new.location,
        promised_amount_cents: new.promised_amount_cents,
        promised_date: new.promised_date,
        photo_ref: new.photo_ref.clone(),
        validation: ValidationStatus::Pending,
        flags,
        reviewed_by: None,
        reviewed_at: None,
        review_note: None,
    };

    sqlx::query(
        r#"
        INSERT INTO visit_reports (guid, asset_id, collector_id, outcome, notes, visited_at,
            submitted_at, latitude, longitude, promised_amount_cents, promised_date, photo_ref,
            validation, flags)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.guid.to_string())
    .bind(report.asset_id.to_string())
    .bind(report.collector_id.to_string())
    .bind(report.outcome.as_str())
    .bind(&report.notes)
    .bind(report.visited_at)
    .bind(report.submitted_at)
    .bind(report.location.map(|p| p.latitude))
    .bind(report.location.map(|p| p.longitude))
    .bind(report.promised_amount_cents)
    .bind(report.promised_date)
    .bind(&report.photo_ref)
    .bind(report.validation.as_str())
    .bind(serde_json::to_string(&report.flags)?)
    .execute(pool)
    .await?;

    if report.flags.is_empty() {
        info!("Visit {} recorded for case {}", report.guid, asset.account_number);
    } else {
        warn!(
            "Visit {} recorded for case {} with {} evidence flags",
            report.guid,
            asset.account_number,
            report.flags.len()
        );
    }
    Ok(report)
}

/// Record a payment submitted by `collector_id`
///
/// A reference already carried by an approved payment is refused. A
/// reference shared with a pending payment is accepted and flagged so the
/// reviewer sees both.
pub async fn insert_payment_report(
    pool: &SqlitePool,
    collector_id: Uuid,
    new: &NewPaymentReport,
    policy: &EvidencePolicy,
    submitted_at: DateTime<Utc>,
) -> Result<PaymentReport> {
    new.validate()?;

    let asset = get_asset(pool, new.asset_id).await?;
    ensure_reportable(&asset, collector_id)?;

    let reference = new.normalized_reference();
    let approved = count_reference(pool, &reference, ValidationStatus::Approved).await?;
    if approved > 0 {
        return Err(Error::Conflict(format!(
            "Payment reference {} has already been approved",
            reference
        )));
    }
    let pending = count_reference(pool, &reference, ValidationStatus::Pending).await?;

    let flags = assess_payment(new, submitted_at, pending > 0, policy);
    let report = PaymentReport {
        guid: uuid_utils::generate(),
        asset_id: asset.guid,
        collector_id,
        amount_cents: new.amount_cents,
        method: new.method,
        reference,
        paid_at: new.paid_at,
        submitted_at,
        location: new.location,
        receipt_ref: new.receipt_ref.clone(),
        validation: ValidationStatus::Pending,
        flags,
        reviewed_by: None,
        reviewed_at: None,
        review_note: None,
    };

    sqlx::query(
        r#"
        INSERT INTO payment_reports (guid, asset_id, collector_id, amount_cents, method,
            reference, paid_at, submitted_at, latitude, longitude, receipt_ref, validation, flags)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.guid.to_string())
    .bind(report.asset_id.to_string())
    .bind(report.collector_id.to_string())
    .bind(report.amount_cents)
    .bind(report.method.as_str())
    .bind(&report.reference)
    .bind(report.paid_at)
    .bind(report.submitted_at)
    .bind(report.location.map(|p| p.latitude))
    .bind(report.location.map(|p| p.longitude))
    .bind(&report.receipt_ref)
    .bind(report.validation.as_str())
    .bind(serde_json::to_string(&report.flags)?)
    .execute(pool)
    .await?;

    info!(
        "Payment {} of {} cents ({}) recorded for case {}",
        report.guid, report.amount_cents, report.reference, asset.account_number
    );
    Ok(report)
}

async fn count_reference<'e, E>(exec: E, reference: &str, status: ValidationStatus) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payment_reports WHERE reference = ? AND validation = ?",
    )
    .bind(reference)
    .bind(status.as_str())
    .fetch_one(exec)
    .await?;
    Ok(count)
}

/// Fetch one visit report
pub async fn get_visit_report<'e, E>(exec: E, id: Uuid) -> Result<VisitReport>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM visit_reports WHERE guid = ?", VISIT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(exec)
        .await?
        .ok_or_else(|| Error::NotFound(format!("visit report {}", id)))?;
    visit_from_row(&row)
}

/// Fetch one payment report
pub async fn get_payment_report<'e, E>(exec: E, id: Uuid) -> Result<PaymentReport>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM payment_reports WHERE guid = ?", PAYMENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(exec)
        .await?
        .ok_or_else(|| Error::NotFound(format!("payment report {}", id)))?;
    payment_from_row(&row)
}

/// One page of visit reports, oldest submission first (review queue order)
pub async fn list_visit_reports(
    pool: &SqlitePool,
    filter: &ReportFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<VisitReport>> {
    let mut qb =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM visit_reports", VISIT_COLUMNS));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY submitted_at, guid LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(visit_from_row).collect()
}

pub async fn count_visit_reports(pool: &SqlitePool, filter: &ReportFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM visit_reports");
    filter.push_where(&mut qb);
    Ok(qb.build_query_scalar().fetch_one(pool).await?)
}

/// One page of payment reports, oldest submission first
pub async fn list_payment_reports(
    pool: &SqlitePool,
    filter: &ReportFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<PaymentReport>> {
    let mut qb =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM payment_reports", PAYMENT_COLUMNS));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY submitted_at, guid LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(payment_from_row).collect()
}

pub async fn count_payment_reports(pool: &SqlitePool, filter: &ReportFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM payment_reports");
    filter.push_where(&mut qb);
    Ok(qb.build_query_scalar().fetch_one(pool).await?)
}

/// Every visit matching `filter` in submission order
pub async fn list_all_visit_reports(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> Result<Vec<VisitReport>> {
    let mut qb =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM visit_reports", VISIT_COLUMNS));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY submitted_at, guid");
    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(visit_from_row).collect()
}

/// Every payment matching `filter` in payment-date order (used by the register export)
pub async fn list_all_payment_reports(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> Result<Vec<PaymentReport>> {
    let mut qb =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM payment_reports", PAYMENT_COLUMNS));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY paid_at, guid");
    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(payment_from_row).collect()
}

/// Move a pending report to its reviewed state; fails if it is no longer pending
async fn mark_reviewed(
    conn: &mut SqliteConnection,
    table: &str,
    id: Uuid,
    review: &Review,
    reviewed_at: DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET validation = ?, reviewed_by = ?, reviewed_at = ?, review_note = ? \
         WHERE guid = ? AND validation = 'pending'",
        table
    );
    let result = sqlx::query(&sql)
        .bind(review.decision.resulting_status().as_str())
        .bind(review.reviewer_id.to_string())
        .bind(reviewed_at)
        .bind(review.note.as_deref().map(str::trim))
        .bind(id.to_string())
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!("Report {} has already been reviewed", id)));
    }
    Ok(())
}

/// Approve or reject a visit report
///
/// Approving a promise-to-pay moves an `assigned` case to `promised`.
/// Returns the reviewed report and the case as it stands afterwards.
pub async fn review_visit_report(
    pool: &SqlitePool,
    id: Uuid,
    review: &Review,
) -> Result<(VisitReport, Asset)> {
    review.validate()?;

    let mut tx = pool.begin().await?;
    let report = get_visit_report(&mut *tx, id).await?;
    let now = time::now();

    mark_reviewed(&mut tx, "visit_reports", id, review, now).await?;

    let mut asset = get_asset(&mut *tx, report.asset_id).await?;
    if review.decision == ReviewDecision::Approve
        && report.outcome == VisitOutcome::PromiseToPay
        && asset.status == AssetStatus::Assigned
    {
        asset.status = AssetStatus::Promised;
        asset.updated_at = now;
        write_asset(&mut tx, &asset).await?;
    }

    let report = get_visit_report(&mut *tx, id).await?;
    tx.commit().await?;

    info!(
        "Visit {} {} by {}",
        id,
        report.validation,
        review.reviewer_id
    );
    Ok((report, asset))
}

/// Approve or reject a payment report
///
/// Approval credits the amount to the case and settles it once the balance is
/// covered. Closed cases are credited but stay closed.
pub async fn review_payment_report(
    pool: &SqlitePool,
    id: Uuid,
    review: &Review,
) -> Result<(PaymentReport, Asset)> {
    review.validate()?;

    let mut tx = pool.begin().await?;
    let report = get_payment_report(&mut *tx, id).await?;
    let now = time::now();

    if review.decision == ReviewDecision::Approve
        && count_reference(&mut *tx, &report.reference, ValidationStatus::Approved).await? > 0
    {
        return Err(Error::Conflict(format!(
            "Payment reference {} has already been approved",
            report.reference
        )));
    }

    mark_reviewed(&mut tx, "payment_reports", id, review, now).await?;

    let mut asset = get_asset(&mut *tx, report.asset_id).await?;
    if review.decision == ReviewDecision::Approve {
        asset.collected_cents = asset
            .collected_cents
            .checked_add(report.amount_cents)
            .ok_or_else(|| {
                Error::Conflict(format!(
                    "Crediting payment {} would overflow the collected total of case {}",
                    id, asset.account_number
                ))
            })?;
        if asset.status != AssetStatus::Closed && asset.collected_cents >= asset.balance_cents {
            asset.status = AssetStatus::Settled;
        }
        asset.updated_at = now;
        write_asset(&mut tx, &asset).await?;
    }

    let report = get_payment_report(&mut *tx, id).await?;
    tx.commit().await?;

    info!(
        "Payment {} {} by {} (case {} collected {} of {})",
        id,
        report.validation,
        review.reviewer_id,
        asset.account_number,
        asset.collected_cents,
        asset.balance_cents
    );
    Ok((report, asset))
}

//! Database-backed tests for the collection workflow
//!
//! Cover case CRUD, workload-based assignment, report intake with evidence
//! flags, manual review, and the dashboard aggregates built on top.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use kobu_common::assignment::{assign_assets, unassign_asset};
use kobu_common::dashboard::{admin_summary, collector_dashboard, management_overview};
use kobu_common::db::{
    count_assets, create_asset, create_collector, delete_asset, get_asset, get_payment_report,
    get_setting, init_database, init_memory_database, insert_payment_report, insert_visit_report,
    list_assets, list_visit_reports, load_evidence_policy, load_notice_days,
    review_payment_report, review_visit_report, set_collector_active, set_setting, update_asset,
    AssetStatus, AssetUpdate, Collector, GeoPoint, NewAsset, NewCollector, NewPaymentReport,
    NewVisitReport, PaymentMethod, Review, ReviewDecision, ValidationStatus, VisitOutcome,
    MAX_AMOUNT_CENTS,
};
use kobu_common::evidence::{EvidenceFlag, EvidencePolicy};
use kobu_common::filter::{AssetFilter, ReportFilter};
use kobu_common::time::local_date;
use kobu_common::Error;
use sqlx::SqlitePool;
use uuid::Uuid;

async fn setup() -> SqlitePool {
    init_memory_database().await.expect("in-memory database")
}

fn new_asset(account: &str, balance_cents: i64) -> NewAsset {
    NewAsset {
        account_number: account.to_string(),
        debtor_name: format!("Debtor {}", account),
        debtor_phone: "+254722000111".to_string(),
        region: "Nairobi".to_string(),
        product: "Logbook loan".to_string(),
        balance_cents,
        location: Some(GeoPoint::new(-1.2864, 36.8172)),
        ..Default::default()
    }
}

async fn collector(pool: &SqlitePool, name: &str) -> Collector {
    create_collector(
        pool,
        &NewCollector {
            name: name.to_string(),
            phone: "+254733000000".to_string(),
            region: "Nairobi".to_string(),
        },
    )
    .await
    .unwrap()
}

fn admin_review(decision: ReviewDecision, note: Option<&str>) -> Review {
    Review {
        reviewer_id: Uuid::new_v4(),
        decision,
        note: note.map(str::to_string),
    }
}

fn payment(asset_id: Uuid, amount_cents: i64, reference: &str) -> NewPaymentReport {
    NewPaymentReport {
        asset_id,
        amount_cents,
        method: PaymentMethod::Mpesa,
        reference: reference.to_string(),
        paid_at: Utc::now() - Duration::minutes(5),
        location: None,
        receipt_ref: None,
    }
}

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
async fn test_database_file_created_and_reopened() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("kobu.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists(), "database file was not created");
    assert_eq!(
        get_setting(&pool, "max_report_delay_minutes").await.unwrap().as_deref(),
        Some("30")
    );
    pool.close().await;

    // Second open is idempotent
    let pool = init_database(&db_path).await.unwrap();
    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(versions, 1);
}

#[tokio::test]
async fn test_evidence_policy_defaults_and_override() {
    let pool = setup().await;
    assert_eq!(load_evidence_policy(&pool).await.unwrap(), EvidencePolicy::default());

    set_setting(&pool, "max_report_delay_minutes", "45").await.unwrap();
    set_setting(&pool, "max_visit_distance_meters", "garbage").await.unwrap();
    let policy = load_evidence_policy(&pool).await.unwrap();
    assert_eq!(policy.max_report_delay_minutes, 45);
    assert_eq!(policy.max_visit_distance_meters, 500.0);
}

#[tokio::test]
async fn test_notice_days_setting_is_range_checked() {
    let pool = setup().await;
    assert_eq!(load_notice_days(&pool).await.unwrap(), 14);

    set_setting(&pool, "demand_letter_notice_days", "30").await.unwrap();
    assert_eq!(load_notice_days(&pool).await.unwrap(), 30);

    for bad in ["0", "366", "9223372036854775807"] {
        set_setting(&pool, "demand_letter_notice_days", bad).await.unwrap();
        let err = load_notice_days(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{} gave {:?}", bad, err);
    }
}

// =============================================================================
// Case CRUD
// =============================================================================

#[tokio::test]
async fn test_create_and_fetch_asset() {
    let pool = setup().await;
    let created = create_asset(&pool, &new_asset("LN-100", 25_000_00)).await.unwrap();

    assert_eq!(created.status, AssetStatus::Unassigned);
    let fetched = get_asset(&pool, created.guid).await.unwrap();
    assert_eq!(fetched.account_number, "LN-100");
    assert_eq!(fetched.balance_cents, 25_000_00);
    assert_eq!(fetched.location, Some(GeoPoint::new(-1.2864, 36.8172)));

    let dup = create_asset(&pool, &new_asset("LN-100", 1)).await.unwrap_err();
    assert!(matches!(dup, Error::Conflict(_)), "got {:?}", dup);

    let missing = get_asset(&pool, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, Error::NotFound(_)));
}

#[tokio::test]
async fn test_create_with_collector_starts_assigned() {
    let pool = setup().await;
    let c = collector(&pool, "Akinyi").await;
    let mut new = new_asset("LN-101", 5_000_00);
    new.collector_id = Some(c.guid);

    let asset = create_asset(&pool, &new).await.unwrap();
    assert_eq!(asset.status, AssetStatus::Assigned);
    assert!(asset.assigned_at.is_some());

    set_collector_active(&pool, c.guid, false).await.unwrap();
    new.account_number = "LN-102".to_string();
    assert!(matches!(create_asset(&pool, &new).await, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_update_close_and_reopen() {
    let pool = setup().await;
    let asset = create_asset(&pool, &new_asset("LN-110", 9_000_00)).await.unwrap();

    let updated = update_asset(
        &pool,
        asset.guid,
        &AssetUpdate {
            debtor_phone: Some(" +254700999888 ".to_string()),
            status: Some(AssetStatus::Closed),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.debtor_phone, "+254700999888");
    assert_eq!(updated.status, AssetStatus::Closed);

    let reopened = update_asset(
        &pool,
        asset.guid,
        &AssetUpdate {
            status: Some(AssetStatus::Assigned),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(reopened.status, AssetStatus::Unassigned, "no collector, so unassigned");

    let refused = update_asset(
        &pool,
        asset.guid,
        &AssetUpdate {
            status: Some(AssetStatus::Settled),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(refused, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_delete_refused_once_reported() {
    let pool = setup().await;
    let c = collector(&pool, "Mwangi").await;
    let keep = create_asset(&pool, &new_asset("LN-120", 1_000_00)).await.unwrap();
    let drop = create_asset(&pool, &new_asset("LN-121", 1_000_00)).await.unwrap();

    delete_asset(&pool, drop.guid).await.unwrap();
    assert!(matches!(get_asset(&pool, drop.guid).await, Err(Error::NotFound(_))));

    assign_assets(&pool, &[keep.guid], Some(c.guid)).await.unwrap();
    insert_payment_report(
        &pool,
        c.guid,
        &payment(keep.guid, 100_00, "QAB1"),
        &EvidencePolicy::default(),
        Utc::now(),
    )
    .await
    .unwrap();

    assert!(matches!(delete_asset(&pool, keep.guid).await, Err(Error::Conflict(_))));
}

// =============================================================================
// Assignment
// =============================================================================

#[tokio::test]
async fn test_auto_assignment_uses_lowest_workload() {
    let pool = setup().await;
    let busy = collector(&pool, "Busy").await;
    let idle = collector(&pool, "Idle").await;
    let away = collector(&pool, "Away").await;
    set_collector_active(&pool, away.guid, false).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(create_asset(&pool, &new_asset(&format!("LN-2{:02}", i), 1_000_00)).await.unwrap().guid);
    }

    assign_assets(&pool, &ids[0..2], Some(busy.guid)).await.unwrap();

    let outcome = assign_assets(&pool, &ids[2..5], None).await.unwrap();
    assert!(outcome.auto_selected);
    assert_eq!(outcome.collector.guid, idle.guid);
    assert_eq!(outcome.assets.len(), 3);
    assert!(outcome.assets.iter().all(|a| a.status == AssetStatus::Assigned));

    // Idle now holds 3, Busy 2
    let outcome = assign_assets(&pool, &ids[5..6], None).await.unwrap();
    assert_eq!(outcome.collector.guid, busy.guid);
}

#[tokio::test]
async fn test_assignment_is_all_or_nothing() {
    let pool = setup().await;
    let c = collector(&pool, "Wekesa").await;
    let ok = create_asset(&pool, &new_asset("LN-300", 1_000_00)).await.unwrap();
    let closed = create_asset(&pool, &new_asset("LN-301", 1_000_00)).await.unwrap();
    update_asset(
        &pool,
        closed.guid,
        &AssetUpdate {
            status: Some(AssetStatus::Closed),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let err = assign_assets(&pool, &[ok.guid, closed.guid], Some(c.guid)).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(get_asset(&pool, ok.guid).await.unwrap().collector_id, None);

    assert!(matches!(assign_assets(&pool, &[], Some(c.guid)).await, Err(Error::InvalidInput(_))));
    assert!(matches!(
        assign_assets(&pool, &[Uuid::new_v4()], Some(c.guid)).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_no_active_collectors() {
    let pool = setup().await;
    let asset = create_asset(&pool, &new_asset("LN-310", 1_000_00)).await.unwrap();
    assert!(matches!(assign_assets(&pool, &[asset.guid], None).await, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_unassign_returns_case_to_pool() {
    let pool = setup().await;
    let c = collector(&pool, "Chege").await;
    let asset = create_asset(&pool, &new_asset("LN-320", 1_000_00)).await.unwrap();
    assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();

    let back = unassign_asset(&pool, asset.guid).await.unwrap();
    assert_eq!(back.status, AssetStatus::Unassigned);
    assert_eq!(back.collector_id, None);
    assert_eq!(count_assets(&pool, &AssetFilter { unassigned_only: true, ..Default::default() }).await.unwrap(), 1);
}

// =============================================================================
// Visit reports
// =============================================================================

#[tokio::test]
async fn test_visit_intake_flags_and_review() {
    let pool = setup().await;
    let c = collector(&pool, "Odhiambo").await;
    let other = collector(&pool, "Kilonzo").await;
    let asset = create_asset(&pool, &new_asset("LN-400", 40_000_00)).await.unwrap();
    assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();

    let now = Utc::now();
    let visit = NewVisitReport {
        asset_id: asset.guid,
        outcome: VisitOutcome::PromiseToPay,
        notes: "Will pay after harvest".to_string(),
        visited_at: now - Duration::minutes(90),
        // About 1.1 km north of the debtor
        location: Some(GeoPoint::new(-1.2764, 36.8172)),
        promised_amount_cents: Some(10_000_00),
        promised_date: NaiveDate::from_ymd_opt(2026, 12, 1),
        photo_ref: Some("photos/ln-400/1.jpg".to_string()),
    };
    let policy = EvidencePolicy::default();

    let forbidden = insert_visit_report(&pool, other.guid, &visit, &policy, now).await.unwrap_err();
    assert!(matches!(forbidden, Error::Forbidden(_)));

    let report = insert_visit_report(&pool, c.guid, &visit, &policy, now).await.unwrap();
    assert_eq!(report.validation, ValidationStatus::Pending);
    assert_eq!(report.flags.len(), 2);
    assert!(matches!(report.flags[0], EvidenceFlag::TimestampSkew { minutes: 90, .. }));
    assert!(matches!(report.flags[1], EvidenceFlag::FarFromDebtor { .. }));

    let queue = list_visit_reports(
        &pool,
        &ReportFilter {
            validation: Some(ValidationStatus::Pending),
            ..Default::default()
        },
        50,
        0,
    )
    .await
    .unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].flags, report.flags);

    let (reviewed, asset) =
        review_visit_report(&pool, report.guid, &admin_review(ReviewDecision::Approve, None))
            .await
            .unwrap();
    assert_eq!(reviewed.validation, ValidationStatus::Approved);
    assert!(reviewed.reviewed_at.is_some());
    assert_eq!(asset.status, AssetStatus::Promised);

    let again = review_visit_report(&pool, report.guid, &admin_review(ReviewDecision::Reject, Some("late")))
        .await
        .unwrap_err();
    assert!(matches!(again, Error::Conflict(_)));
}

#[tokio::test]
async fn test_rejection_needs_note_and_keeps_status() {
    let pool = setup().await;
    let c = collector(&pool, "Mutiso").await;
    let asset = create_asset(&pool, &new_asset("LN-410", 4_000_00)).await.unwrap();
    assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();

    let now = Utc::now();
    let report = insert_visit_report(
        &pool,
        c.guid,
        &NewVisitReport {
            asset_id: asset.guid,
            outcome: VisitOutcome::DebtorAbsent,
            notes: String::new(),
            visited_at: now - Duration::minutes(2),
            location: Some(GeoPoint::new(-1.2865, 36.8173)),
            promised_amount_cents: None,
            promised_date: None,
            photo_ref: None,
        },
        &EvidencePolicy::default(),
        now,
    )
    .await
    .unwrap();
    assert!(report.flags.is_empty());

    let no_note = review_visit_report(&pool, report.guid, &admin_review(ReviewDecision::Reject, None))
        .await
        .unwrap_err();
    assert!(matches!(no_note, Error::InvalidInput(_)));

    let (rejected, asset) = review_visit_report(
        &pool,
        report.guid,
        &admin_review(ReviewDecision::Reject, Some("Photo missing")),
    )
    .await
    .unwrap();
    assert_eq!(rejected.validation, ValidationStatus::Rejected);
    assert_eq!(rejected.review_note.as_deref(), Some("Photo missing"));
    assert_eq!(asset.status, AssetStatus::Assigned);
}

// =============================================================================
// Payment reports
// =============================================================================

#[tokio::test]
async fn test_payments_settle_case() {
    let pool = setup().await;
    let c = collector(&pool, "Nyambura").await;
    let asset = create_asset(&pool, &new_asset("LN-500", 10_000_00)).await.unwrap();
    assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();
    let policy = EvidencePolicy::default();

    let first = insert_payment_report(&pool, c.guid, &payment(asset.guid, 6_000_00, "rkl1"), &policy, Utc::now())
        .await
        .unwrap();
    assert_eq!(first.reference, "RKL1");
    let second = insert_payment_report(&pool, c.guid, &payment(asset.guid, 4_000_00, "RKL2"), &policy, Utc::now())
        .await
        .unwrap();

    let (_, after_first) = review_payment_report(&pool, first.guid, &admin_review(ReviewDecision::Approve, None))
        .await
        .unwrap();
    assert_eq!(after_first.collected_cents, 6_000_00);
    assert_eq!(after_first.status, AssetStatus::Assigned);

    let (_, settled) = review_payment_report(&pool, second.guid, &admin_review(ReviewDecision::Approve, None))
        .await
        .unwrap();
    assert_eq!(settled.collected_cents, 10_000_00);
    assert_eq!(settled.status, AssetStatus::Settled);
    assert_eq!(settled.outstanding_cents(), 0);

    // Settled cases accept no further reports
    let late = insert_payment_report(&pool, c.guid, &payment(asset.guid, 1_00, "RKL3"), &policy, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(late, Error::Conflict(_)));
}

#[tokio::test]
async fn test_duplicate_references() {
    let pool = setup().await;
    let c = collector(&pool, "Barasa").await;
    let asset = create_asset(&pool, &new_asset("LN-510", 50_000_00)).await.unwrap();
    assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();
    let policy = EvidencePolicy::default();

    let original = insert_payment_report(&pool, c.guid, &payment(asset.guid, 1_000_00, "QX9"), &policy, Utc::now())
        .await
        .unwrap();
    assert!(original.flags.is_empty());

    let twin = insert_payment_report(&pool, c.guid, &payment(asset.guid, 1_000_00, " qx9 "), &policy, Utc::now())
        .await
        .unwrap();
    assert_eq!(
        twin.flags,
        vec![EvidenceFlag::DuplicateReference { reference: "QX9".to_string() }]
    );

    review_payment_report(&pool, original.guid, &admin_review(ReviewDecision::Approve, None))
        .await
        .unwrap();

    let err = review_payment_report(&pool, twin.guid, &admin_review(ReviewDecision::Approve, None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    // Rejecting the twin is still possible
    review_payment_report(&pool, twin.guid, &admin_review(ReviewDecision::Reject, Some("Duplicate")))
        .await
        .unwrap();

    let err = insert_payment_report(&pool, c.guid, &payment(asset.guid, 1_000_00, "QX9"), &policy, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_oversized_amounts_are_refused() {
    let pool = setup().await;
    let err = create_asset(&pool, &new_asset("LN-520", MAX_AMOUNT_CENTS + 1)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);

    let c = collector(&pool, "Otieno").await;
    let asset = create_asset(&pool, &new_asset("LN-521", MAX_AMOUNT_CENTS)).await.unwrap();
    assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();
    let policy = EvidencePolicy::default();

    let err = insert_payment_report(&pool, c.guid, &payment(asset.guid, i64::MAX, "BIG1"), &policy, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);

    let err = update_asset(
        &pool,
        asset.guid,
        &AssetUpdate {
            balance_cents: Some(i64::MAX),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_credit_overflow_is_a_conflict() {
    let pool = setup().await;
    let c = collector(&pool, "Wafula").await;
    let asset = create_asset(&pool, &new_asset("LN-530", 10_000_00)).await.unwrap();
    assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();
    let policy = EvidencePolicy::default();
    let report = insert_payment_report(&pool, c.guid, &payment(asset.guid, 10, "OVF1"), &policy, Utc::now())
        .await
        .unwrap();

    let near_max = i64::MAX - 5;
    sqlx::query("UPDATE assets SET collected_cents = ? WHERE guid = ?")
        .bind(near_max)
        .bind(asset.guid.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let err = review_payment_report(&pool, report.guid, &admin_review(ReviewDecision::Approve, None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {:?}", err);

    // Nothing was written
    assert_eq!(get_asset(&pool, asset.guid).await.unwrap().collected_cents, near_max);
    assert_eq!(
        get_payment_report(&pool, report.guid).await.unwrap().validation,
        ValidationStatus::Pending
    );
}

// =============================================================================
// Filters and dashboards
// =============================================================================

#[tokio::test]
async fn test_asset_filters_and_paging() {
    let pool = setup().await;
    let c = collector(&pool, "Koech").await;
    for i in 0..7 {
        let mut new = new_asset(&format!("LN-6{:02}", i), (i + 1) * 1_000_00);
        if i == 3 {
            new.debtor_name = "Grace 100% Mumbua".to_string();
            new.region = "Machakos".to_string();
        }
        let asset = create_asset(&pool, &new).await.unwrap();
        if i % 2 == 0 {
            assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();
        }
    }

    let all = AssetFilter::default();
    assert_eq!(count_assets(&pool, &all).await.unwrap(), 7);
    assert_eq!(list_assets(&pool, &all, 5, 0).await.unwrap().len(), 5);
    assert_eq!(list_assets(&pool, &all, 5, 5).await.unwrap().len(), 2);

    let search = AssetFilter {
        search: Some("100%".to_string()),
        ..Default::default()
    };
    let found = list_assets(&pool, &search, 50, 0).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].account_number, "LN-603");

    let by_account = AssetFilter {
        search: Some("ln-60".to_string()),
        region: Some("machakos".to_string()),
        ..Default::default()
    };
    assert_eq!(count_assets(&pool, &by_account).await.unwrap(), 1);

    let mut accented = new_asset("LN-690", 1_000_00);
    accented.debtor_name = "Ömer Wekesa".to_string();
    create_asset(&pool, &accented).await.unwrap();
    let by_accented_name = AssetFilter {
        search: Some("ÖMER wek".to_string()),
        ..Default::default()
    };
    let found = list_assets(&pool, &by_accented_name, 50, 0).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].account_number, "LN-690");

    assert_eq!(count_assets(&pool, &AssetFilter::caseload(c.guid)).await.unwrap(), 4);
    let rich = AssetFilter {
        min_balance_cents: Some(5_000_00),
        status: Some(AssetStatus::Assigned),
        ..Default::default()
    };
    // balances 5k (i=4) and 7k (i=6) are assigned
    assert_eq!(count_assets(&pool, &rich).await.unwrap(), 2);
}

#[tokio::test]
async fn test_dashboards() {
    let pool = setup().await;
    let a = collector(&pool, "Atieno").await;
    let b = collector(&pool, "Bett").await;

    let a1 = create_asset(&pool, &new_asset("LN-700", 10_000_00)).await.unwrap();
    let a2 = create_asset(&pool, &new_asset("LN-701", 30_000_00)).await.unwrap();
    let b1 = create_asset(&pool, &new_asset("LN-702", 20_000_00)).await.unwrap();
    create_asset(&pool, &new_asset("LN-703", 40_000_00)).await.unwrap();

    assign_assets(&pool, &[a1.guid, a2.guid], Some(a.guid)).await.unwrap();
    assign_assets(&pool, &[b1.guid], Some(b.guid)).await.unwrap();

    let policy = EvidencePolicy::default();
    let p1 = insert_payment_report(&pool, a.guid, &payment(a1.guid, 10_000_00, "A1"), &policy, Utc::now())
        .await
        .unwrap();
    let p2 = insert_payment_report(&pool, b.guid, &payment(b1.guid, 5_000_00, "B1"), &policy, Utc::now())
        .await
        .unwrap();
    insert_payment_report(&pool, b.guid, &payment(b1.guid, 1_000_00, "B2"), &policy, Utc::now())
        .await
        .unwrap();
    review_payment_report(&pool, p1.guid, &admin_review(ReviewDecision::Approve, None)).await.unwrap();
    review_payment_report(&pool, p2.guid, &admin_review(ReviewDecision::Approve, None)).await.unwrap();

    let summary = admin_summary(&pool).await.unwrap();
    assert_eq!(summary.cases.total, 4);
    assert_eq!(summary.cases.unassigned, 1);
    assert_eq!(summary.cases.assigned, 2);
    assert_eq!(summary.cases.settled, 1);
    assert_eq!(summary.total_balance_cents, 100_000_00);
    assert_eq!(summary.total_collected_cents, 15_000_00);
    assert_eq!(summary.total_outstanding_cents, 85_000_00);
    assert_eq!(summary.recovery_rate, 15.0);
    assert_eq!(summary.pending_payments, 1);
    assert_eq!(summary.pending_visits, 0);
    assert_eq!(summary.active_collectors, 2);

    let overview = management_overview(&pool).await.unwrap();
    assert_eq!(overview.total_payments_collected_cents, 15_000_00);
    assert_eq!(overview.collectors[0].name, "Atieno");
    assert_eq!(overview.collectors[0].open_cases, 1);
    assert_eq!(overview.collectors[0].settled_cases, 1);
    assert_eq!(overview.collectors[0].recovery_rate, 25.0);
    assert_eq!(overview.collectors[0].share_of_collections, 66.67);
    assert_eq!(overview.collectors[1].name, "Bett");
    assert_eq!(overview.collectors[1].share_of_collections, 33.33);
    assert_eq!(overview.regions.len(), 1);
    assert_eq!(overview.regions[0].cases, 4);

    let mine = collector_dashboard(&pool, b.guid, local_date(Utc::now())).await.unwrap();
    assert_eq!(mine.open_cases, 1);
    assert_eq!(mine.outstanding_cents, 15_000_00);
    assert_eq!(mine.collected_cents, 5_000_00);
    assert_eq!(mine.recovery_rate, 25.0);
    assert_eq!(mine.pending_reports, 1);
    assert_eq!(mine.rejected_reports, 0);
    assert_eq!(mine.visits_today, 0);
}

#[tokio::test]
async fn test_collector_dashboard_counts_local_day() {
    let pool = setup().await;
    let c = collector(&pool, "Chebet").await;
    let asset = create_asset(&pool, &new_asset("LN-710", 50_000_00)).await.unwrap();
    assign_assets(&pool, &[asset.guid], Some(c.guid)).await.unwrap();
    let policy = EvidencePolicy::default();

    // 10 March in Nairobi runs from 21:00 UTC on 9 March to 21:00 UTC on 10 March
    let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
    let morning = Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap();
    let before_midnight = Utc.with_ymd_and_hms(2026, 3, 9, 20, 59, 59).unwrap();
    let after_midnight = Utc.with_ymd_and_hms(2026, 3, 9, 21, 0, 0).unwrap();

    let visit = |submitted_at: DateTime<Utc>| NewVisitReport {
        asset_id: asset.guid,
        outcome: VisitOutcome::DebtorAbsent,
        notes: String::new(),
        visited_at: submitted_at - Duration::minutes(5),
        location: Some(GeoPoint::new(-1.2864, 36.8172)),
        promised_amount_cents: None,
        promised_date: None,
        photo_ref: None,
    };
    insert_visit_report(&pool, c.guid, &visit(morning), &policy, morning).await.unwrap();
    insert_visit_report(&pool, c.guid, &visit(before_midnight), &policy, before_midnight)
        .await
        .unwrap();

    let mut paid = Vec::new();
    for (reference, amount, paid_at) in [
        ("DAY1", 1_000_00, morning),
        ("DAY2", 250_00, after_midnight),
        ("PREV", 7_000_00, before_midnight),
    ] {
        let mut new = payment(asset.guid, amount, reference);
        new.paid_at = paid_at;
        let report = insert_payment_report(&pool, c.guid, &new, &policy, paid_at + Duration::minutes(1))
            .await
            .unwrap();
        paid.push(report.guid);
    }
    for id in &paid {
        review_payment_report(&pool, *id, &admin_review(ReviewDecision::Approve, None))
            .await
            .unwrap();
    }
    // Pending payments paid today are not counted
    let mut pending = payment(asset.guid, 9_000_00, "DAY3");
    pending.paid_at = morning;
    insert_payment_report(&pool, c.guid, &pending, &policy, morning).await.unwrap();

    let dashboard = collector_dashboard(&pool, c.guid, today).await.unwrap();
    assert_eq!(dashboard.visits_today, 1);
    assert_eq!(dashboard.collected_today_cents, 1_250_00);
    assert_eq!(dashboard.collected_cents, 8_250_00);

    let previous = collector_dashboard(&pool, c.guid, today.pred_opt().unwrap()).await.unwrap();
    assert_eq!(previous.visits_today, 1);
    assert_eq!(previous.collected_today_cents, 7_000_00);
}

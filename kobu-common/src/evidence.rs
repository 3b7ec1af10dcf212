//! Advisory checks on field evidence
//!
//! Every visit and payment report is run through these checks when it is
//! submitted. The findings are stored with the report as flags so the
//! reviewing administrator can see them next to the approve/reject buttons.
//! A flag never changes the validation status on its own.

use crate::db::models::{Asset, GeoPoint, NewPaymentReport, NewVisitReport, PaymentMethod};
use crate::time::minutes_between;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distance
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Thresholds applied by the checks (loaded from the settings table)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvidencePolicy {
    /// Largest allowed gap between the claimed event time and submission
    pub max_report_delay_minutes: i64,
    /// Largest allowed distance between a visit fix and the debtor location
    pub max_visit_distance_meters: f64,
    /// Clock drift tolerated before a claimed time counts as "in the future"
    pub future_tolerance_minutes: i64,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self {
            max_report_delay_minutes: 30,
            max_visit_distance_meters: 500.0,
            future_tolerance_minutes: 5,
        }
    }
}

/// One heuristic finding on a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceFlag {
    /// Submitted too long after (or before) the claimed time
    TimestampSkew { minutes: i64, limit_minutes: i64 },
    /// Claimed time is ahead of the server clock
    FutureTimestamp { minutes_ahead: i64 },
    /// No device location attached
    MissingGps,
    /// Coordinates out of range or the (0, 0) placeholder
    InvalidGps,
    /// Device location is too far from the debtor's recorded location
    FarFromDebtor { distance_meters: f64, limit_meters: f64 },
    /// Another live payment report already carries this reference
    DuplicateReference { reference: String },
}

impl EvidenceFlag {
    /// Short description shown to reviewers
    pub fn describe(&self) -> String {
        match self {
            EvidenceFlag::TimestampSkew { minutes, limit_minutes } => format!(
                "Reported {} minutes from the claimed time (limit {})",
                minutes, limit_minutes
            ),
            EvidenceFlag::FutureTimestamp { minutes_ahead } => {
                format!("Claimed time is {} minutes in the future", minutes_ahead)
            }
            EvidenceFlag::MissingGps => "No GPS location attached".to_string(),
            EvidenceFlag::InvalidGps => "GPS location is not a valid coordinate".to_string(),
            EvidenceFlag::FarFromDebtor { distance_meters, limit_meters } => format!(
                "Reported {:.0} m from the debtor location (limit {:.0} m)",
                distance_meters, limit_meters
            ),
            EvidenceFlag::DuplicateReference { reference } => {
                format!("Reference {} is already on another payment", reference)
            }
        }
    }
}

/// Great-circle distance between two points in meters
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Whether a coordinate is usable as evidence
pub fn is_valid_point(p: GeoPoint) -> bool {
    p.latitude.is_finite()
        && p.longitude.is_finite()
        && (-90.0..=90.0).contains(&p.latitude)
        && (-180.0..=180.0).contains(&p.longitude)
        && !(p.latitude == 0.0 && p.longitude == 0.0)
}

/// Compare the claimed event time with the intake time
pub fn check_timestamp(
    claimed: DateTime<Utc>,
    submitted_at: DateTime<Utc>,
    policy: &EvidencePolicy,
) -> Vec<EvidenceFlag> {
    let mut flags = Vec::new();

    if claimed > submitted_at {
        let ahead = minutes_between(claimed, submitted_at);
        if ahead > policy.future_tolerance_minutes {
            flags.push(EvidenceFlag::FutureTimestamp { minutes_ahead: ahead });
            return flags;
        }
    }

    let minutes = minutes_between(submitted_at, claimed);
    if minutes > policy.max_report_delay_minutes {
        flags.push(EvidenceFlag::TimestampSkew {
            minutes,
            limit_minutes: policy.max_report_delay_minutes,
        });
    }
    flags
}

/// Validate a device location and, when the debtor location is known, its distance
pub fn check_location(
    reported: Option<GeoPoint>,
    debtor: Option<GeoPoint>,
    policy: &EvidencePolicy,
) -> Vec<EvidenceFlag> {
    let Some(point) = reported else {
        return vec![EvidenceFlag::MissingGps];
    };
    if !is_valid_point(point) {
        return vec![EvidenceFlag::InvalidGps];
    }

    match debtor.filter(|d| is_valid_point(*d)) {
        Some(home) => {
            let distance = haversine_meters(point, home);
            if distance > policy.max_visit_distance_meters {
                vec![EvidenceFlag::FarFromDebtor {
                    distance_meters: distance,
                    limit_meters: policy.max_visit_distance_meters,
                }]
            } else {
                Vec::new()
            }
        }
        None => Vec::new(),
    }
}

/// Run all visit checks
pub fn assess_visit(
    visit: &NewVisitReport,
    asset: &Asset,
    submitted_at: DateTime<Utc>,
    policy: &EvidencePolicy,
) -> Vec<EvidenceFlag> {
    let mut flags = check_timestamp(visit.visited_at, submitted_at, policy);
    flags.extend(check_location(visit.location, asset.location, policy));
    flags
}

/// Run all payment checks
///
/// Payments are not tied to the debtor's address (mobile money and bank
/// transfers happen anywhere), so only coordinate validity is checked, and a
/// missing location only matters for cash handed to the collector.
pub fn assess_payment(
    payment: &NewPaymentReport,
    submitted_at: DateTime<Utc>,
    duplicate_reference: bool,
    policy: &EvidencePolicy,
) -> Vec<EvidenceFlag> {
    let mut flags = check_timestamp(payment.paid_at, submitted_at, policy);

    match payment.location {
        Some(point) if !is_valid_point(point) => flags.push(EvidenceFlag::InvalidGps),
        None if payment.method == PaymentMethod::Cash => flags.push(EvidenceFlag::MissingGps),
        _ => {}
    }

    if duplicate_reference {
        flags.push(EvidenceFlag::DuplicateReference {
            reference: payment.normalized_reference(),
        });
    }
    flags
}

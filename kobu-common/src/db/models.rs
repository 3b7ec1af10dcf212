//! Database models
//!
//! Money is integer cents. Timestamps are UTC. Record ids are UUIDv4 stored
//! as TEXT.

use crate::evidence::EvidenceFlag;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Implements `as_str`, `Display` and `FromStr` for a unit-only enum using
/// its snake_case wire name.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$($name::$variant),+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "Unknown {}: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Lifecycle of a loan case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Unassigned,
    Assigned,
    Promised,
    Settled,
    Closed,
}

wire_enum!(AssetStatus {
    Unassigned => "unassigned",
    Assigned => "assigned",
    Promised => "promised",
    Settled => "settled",
    Closed => "closed",
});

impl AssetStatus {
    /// Open cases count toward a collector's workload
    pub fn is_open(&self) -> bool {
        matches!(self, AssetStatus::Assigned | AssetStatus::Promised)
    }

    /// Settled and closed cases accept no further assignment or reports
    pub fn is_final(&self) -> bool {
        matches!(self, AssetStatus::Settled | AssetStatus::Closed)
    }
}

/// Manual review state of a visit or payment report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Approved,
    Rejected,
}

wire_enum!(ValidationStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// What happened on a field visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitOutcome {
    MetDebtor,
    PromiseToPay,
    DebtorAbsent,
    Refused,
    WrongAddress,
}

wire_enum!(VisitOutcome {
    MetDebtor => "met_debtor",
    PromiseToPay => "promise_to_pay",
    DebtorAbsent => "debtor_absent",
    Refused => "refused",
    WrongAddress => "wrong_address",
});

/// Channel a debtor paid through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Mpesa,
    Bank,
    Cash,
}

wire_enum!(PaymentMethod {
    Mpesa => "mpesa",
    Bank => "bank",
    Cash => "cash",
});

/// WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Build from two nullable columns; both must be present
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self { latitude, longitude }),
            _ => None,
        }
    }
}

/// A loan case under collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub guid: Uuid,
    pub account_number: String,
    pub debtor_name: String,
    pub debtor_phone: String,
    pub debtor_id_number: Option<String>,
    pub address: Option<String>,
    pub region: String,
    pub product: String,
    pub balance_cents: i64,
    pub collected_cents: i64,
    pub status: AssetStatus,
    pub collector_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// Remaining debt, never negative
    pub fn outstanding_cents(&self) -> i64 {
        (self.balance_cents - self.collected_cents).max(0)
    }
}

/// Fields supplied when registering a new case
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAsset {
    pub account_number: String,
    pub debtor_name: String,
    pub debtor_phone: String,
    #[serde(default)]
    pub debtor_id_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub region: String,
    pub product: String,
    pub balance_cents: i64,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub collector_id: Option<Uuid>,
}

impl NewAsset {
    pub fn validate(&self) -> Result<()> {
        require_text("account_number", &self.account_number)?;
        require_text("debtor_name", &self.debtor_name)?;
        require_text("debtor_phone", &self.debtor_phone)?;
        require_text("region", &self.region)?;
        require_text("product", &self.product)?;
        check_amount("balance_cents", self.balance_cents)
    }
}

/// Partial update of a case; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetUpdate {
    pub debtor_name: Option<String>,
    pub debtor_phone: Option<String>,
    pub debtor_id_number: Option<String>,
    pub address: Option<String>,
    pub region: Option<String>,
    pub product: Option<String>,
    pub balance_cents: Option<i64>,
    pub location: Option<GeoPoint>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<AssetStatus>,
}

/// A field collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collector {
    pub guid: Uuid,
    pub name: String,
    pub phone: String,
    pub region: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCollector {
    pub name: String,
    pub phone: String,
    pub region: String,
}

impl NewCollector {
    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("phone", &self.phone)?;
        require_text("region", &self.region)
    }
}

/// Field visit evidence submitted by a collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitReport {
    pub guid: Uuid,
    pub asset_id: Uuid,
    pub collector_id: Uuid,
    pub outcome: VisitOutcome,
    pub notes: String,
    pub visited_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub promised_amount_cents: Option<i64>,
    pub promised_date: Option<NaiveDate>,
    pub photo_ref: Option<String>,
    pub validation: ValidationStatus,
    pub flags: Vec<EvidenceFlag>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVisitReport {
    pub asset_id: Uuid,
    pub outcome: VisitOutcome,
    #[serde(default)]
    pub notes: String,
    pub visited_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub promised_amount_cents: Option<i64>,
    #[serde(default)]
    pub promised_date: Option<NaiveDate>,
    #[serde(default)]
    pub photo_ref: Option<String>,
}

impl NewVisitReport {
    pub fn validate(&self) -> Result<()> {
        if self.outcome == VisitOutcome::PromiseToPay {
            match self.promised_amount_cents {
                Some(amount) => check_amount("promised_amount_cents", amount)?,
                None => {
                    return Err(Error::InvalidInput(
                        "promise_to_pay requires a positive promised_amount_cents".to_string(),
                    ))
                }
            }
            if self.promised_date.is_none() {
                return Err(Error::InvalidInput(
                    "promise_to_pay requires promised_date".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Payment evidence submitted by a collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReport {
    pub guid: Uuid,
    pub asset_id: Uuid,
    pub collector_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: String,
    pub paid_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub receipt_ref: Option<String>,
    pub validation: ValidationStatus,
    pub flags: Vec<EvidenceFlag>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentReport {
    pub asset_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: String,
    pub paid_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub receipt_ref: Option<String>,
}

impl NewPaymentReport {
    pub fn validate(&self) -> Result<()> {
        check_amount("amount_cents", self.amount_cents)?;
        require_text("reference", &self.reference)
    }

    /// References are compared case-insensitively without surrounding space
    pub fn normalized_reference(&self) -> String {
        self.reference.trim().to_uppercase()
    }
}

/// Administrator decision on a pending report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn resulting_status(&self) -> ValidationStatus {
        match self {
            ReviewDecision::Approve => ValidationStatus::Approved,
            ReviewDecision::Reject => ValidationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub reviewer_id: Uuid,
    pub decision: ReviewDecision,
    pub note: Option<String>,
}

impl Review {
    pub fn validate(&self) -> Result<()> {
        if self.decision == ReviewDecision::Reject
            && self.note.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(Error::InvalidInput(
                "A rejection must include a note".to_string(),
            ));
        }
        Ok(())
    }
}

/// Largest single money amount accepted from clients (KES 1 trillion)
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000_000;

/// Money inputs must be positive and no larger than [`MAX_AMOUNT_CENTS`]
pub fn check_amount(field: &str, cents: i64) -> Result<()> {
    if cents <= 0 {
        return Err(Error::InvalidInput(format!(
            "{} must be greater than zero",
            field
        )));
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(Error::InvalidInput(format!(
            "{} must not exceed {}",
            field, MAX_AMOUNT_CENTS
        )));
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_wire_name() {
        for status in AssetStatus::all() {
            assert_eq!(status.as_str().parse::<AssetStatus>().unwrap(), *status);
        }
        assert!("bogus".parse::<AssetStatus>().is_err());
    }

    #[test]
    fn test_open_and_final_statuses() {
        assert!(AssetStatus::Assigned.is_open());
        assert!(AssetStatus::Promised.is_open());
        assert!(!AssetStatus::Unassigned.is_open());
        assert!(AssetStatus::Settled.is_final());
        assert!(AssetStatus::Closed.is_final());
        assert!(!AssetStatus::Promised.is_final());
    }

    #[test]
    fn test_outstanding_never_negative() {
        let mut asset = sample_asset();
        asset.collected_cents = asset.balance_cents + 500;
        assert_eq!(asset.outstanding_cents(), 0);
    }

    #[test]
    fn test_promise_requires_amount_and_date() {
        let mut visit = NewVisitReport {
            asset_id: Uuid::new_v4(),
            outcome: VisitOutcome::PromiseToPay,
            notes: String::new(),
            visited_at: Utc::now(),
            location: None,
            promised_amount_cents: None,
            promised_date: None,
            photo_ref: None,
        };
        assert!(visit.validate().is_err());
        visit.promised_amount_cents = Some(10_000);
        assert!(visit.validate().is_err());
        visit.promised_date = NaiveDate::from_ymd_opt(2026, 11, 1);
        assert!(visit.validate().is_ok());
    }

    #[test]
    fn test_amounts_are_bounded() {
        assert!(check_amount("amount_cents", 1).is_ok());
        assert!(check_amount("amount_cents", MAX_AMOUNT_CENTS).is_ok());
        assert!(check_amount("amount_cents", 0).is_err());
        assert!(check_amount("amount_cents", MAX_AMOUNT_CENTS + 1).is_err());
        assert!(check_amount("amount_cents", i64::MAX).is_err());
    }

    #[test]
    fn test_rejection_requires_note() {
        let mut review = Review {
            reviewer_id: Uuid::new_v4(),
            decision: ReviewDecision::Reject,
            note: Some("   ".to_string()),
        };
        assert!(review.validate().is_err());
        review.note = Some("Photo does not show premises".to_string());
        assert!(review.validate().is_ok());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&VisitOutcome::PromiseToPay).unwrap();
        assert_eq!(json, "\"promise_to_pay\"");
    }

    fn sample_asset() -> Asset {
        Asset {
            guid: Uuid::new_v4(),
            account_number: "LN-001".to_string(),
            debtor_name: "Jane Wanjiru".to_string(),
            debtor_phone: "+254700000001".to_string(),
            debtor_id_number: None,
            address: None,
            region: "Nairobi".to_string(),
            product: "Boda loan".to_string(),
            balance_cents: 10_000_00,
            collected_cents: 0,
            status: AssetStatus::Assigned,
            collector_id: None,
            assigned_at: None,
            location: None,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

//! Debtor letters

use crate::db::models::{Asset, VisitOutcome, VisitReport};
use crate::format::{format_date, format_kes};
use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::RangeInclusive;

/// Accepted demand letter notice periods, in days
pub const NOTICE_DAYS_RANGE: RangeInclusive<i64> = 1..=365;

/// A generated letter ready for printing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letter {
    /// `WK/<account>/<yyyymmdd>/<digest>`; the digest ties the reference to the exact text
    pub reference: String,
    pub subject: String,
    pub body: String,
}

fn letter_reference(account_number: &str, issued_on: NaiveDate, body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    let short: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    format!(
        "WK/{}/{}/{}",
        account_number,
        issued_on.format("%Y%m%d"),
        short
    )
}

/// Formal demand for the outstanding balance
///
/// Refused for cases with nothing outstanding, or when `notice_days` is
/// outside [`NOTICE_DAYS_RANGE`].
pub fn render_demand_letter(
    asset: &Asset,
    issued_on: NaiveDate,
    company: &str,
    notice_days: i64,
) -> Result<Letter> {
    let outstanding = asset.outstanding_cents();
    if outstanding == 0 {
        return Err(Error::Conflict(format!(
            "Case {} has no outstanding balance",
            asset.account_number
        )));
    }
    if !NOTICE_DAYS_RANGE.contains(&notice_days) {
        return Err(Error::InvalidInput(format!(
            "notice_days must be between {} and {}, got {}",
            NOTICE_DAYS_RANGE.start(),
            NOTICE_DAYS_RANGE.end(),
            notice_days
        )));
    }
    let deadline = issued_on
        .checked_add_signed(Duration::days(notice_days))
        .ok_or_else(|| Error::InvalidInput(format!("No payment deadline after {}", issued_on)))?;
    let subject = format!(
        "DEMAND FOR PAYMENT: ACCOUNT {}",
        asset.account_number
    );

    let mut body = String::new();
    body.push_str(&format!("{}\n\n", format_date(issued_on)));
    body.push_str(&format!("{}\n", asset.debtor_name));
    if let Some(address) = asset.address.as_deref().filter(|a| !a.trim().is_empty()) {
        body.push_str(&format!("{}\n", address.trim()));
    }
    body.push_str(&format!("{}\n\n", asset.region));
    body.push_str(&format!("Dear {},\n\n", asset.debtor_name));
    body.push_str(&format!("RE: {}\n\n", subject));
    body.push_str(&format!(
        "We act on behalf of the lender of your {} facility, account number {}.\n\n",
        asset.product, asset.account_number
    ));
    body.push_str(&format!(
        "Our records show an original balance of {}, of which {} has been received, \
         leaving {} outstanding.\n\n",
        format_kes(asset.balance_cents),
        format_kes(asset.collected_cents),
        format_kes(outstanding)
    ));
    body.push_str(&format!(
        "You are required to pay the outstanding amount in full on or before {}. \
         If you are unable to do so, contact our office to agree a repayment plan \
         before that date.\n\n",
        format_date(deadline)
    ));
    body.push_str(
        "If payment has already been made, please disregard this letter and share the \
         payment reference with our field officer.\n\n",
    );
    body.push_str(&format!("Yours faithfully,\n\n{}\n", company));

    Ok(Letter {
        reference: letter_reference(&asset.account_number, issued_on, &body),
        subject,
        body,
    })
}

/// Confirmation of a promise to pay recorded on a field visit
pub fn render_promise_acknowledgement(
    asset: &Asset,
    visit: &VisitReport,
    issued_on: NaiveDate,
    company: &str,
) -> Result<Letter> {
    let (amount, date) = match (visit.outcome, visit.promised_amount_cents, visit.promised_date) {
        (VisitOutcome::PromiseToPay, Some(amount), Some(date)) => (amount, date),
        _ => {
            return Err(Error::InvalidInput(format!(
                "Visit {} does not record a promise to pay",
                visit.guid
            )))
        }
    };
    let subject = format!(
        "ACKNOWLEDGEMENT OF PROMISE TO PAY: ACCOUNT {}",
        asset.account_number
    );

    let mut body = String::new();
    body.push_str(&format!("{}\n\n", format_date(issued_on)));
    body.push_str(&format!("Dear {},\n\n", asset.debtor_name));
    body.push_str(&format!("RE: {}\n\n", subject));
    body.push_str(&format!(
        "Thank you for meeting our field officer on {}. This letter confirms your \
         undertaking to pay {} towards account {} on or before {}.\n\n",
        format_date(crate::time::local_date(visit.visited_at)),
        format_kes(amount),
        asset.account_number,
        format_date(date)
    ));
    body.push_str(&format!(
        "The outstanding balance on the account is {}.\n\n",
        format_kes(asset.outstanding_cents())
    ));
    body.push_str(&format!("Yours faithfully,\n\n{}\n", company));

    Ok(Letter {
        reference: letter_reference(&asset.account_number, issued_on, &body),
        subject,
        body,
    })
}

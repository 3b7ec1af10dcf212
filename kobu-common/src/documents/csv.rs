//! CSV exports (RFC 4180 quoting, CRLF line endings)

use crate::dashboard::CollectorPerformance;
use crate::db::models::{Asset, PaymentReport};
use crate::format::format_amount;
use std::collections::HashMap;
use uuid::Uuid;

/// Minimal CSV builder
#[derive(Debug, Default)]
pub struct CsvWriter {
    out: String,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record
    pub fn row<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut first = true;
        for field in fields {
            if !first {
                self.out.push(',');
            }
            first = false;
            push_field(&mut self.out, field.as_ref());
        }
        self.out.push_str("\r\n");
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}

fn push_field(out: &mut String, field: &str) {
    if field.contains(&[',', '"', '\r', '\n'][..]) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Case list export; `collector_names` maps collector ids to display names
pub fn assets_csv(assets: &[Asset], collector_names: &HashMap<Uuid, String>) -> String {
    let mut csv = CsvWriter::new();
    csv.row([
        "account_number",
        "debtor_name",
        "debtor_phone",
        "region",
        "product",
        "status",
        "collector",
        "balance",
        "collected",
        "outstanding",
        "due_date",
    ]);
    for asset in assets {
        let collector = asset
            .collector_id
            .and_then(|id| collector_names.get(&id).cloned())
            .unwrap_or_default();
        csv.row([
            asset.account_number.clone(),
            asset.debtor_name.clone(),
            asset.debtor_phone.clone(),
            asset.region.clone(),
            asset.product.clone(),
            asset.status.to_string(),
            collector,
            format_amount(asset.balance_cents),
            format_amount(asset.collected_cents),
            format_amount(asset.outstanding_cents()),
            asset.due_date.map(|d| d.to_string()).unwrap_or_default(),
        ]);
    }
    csv.finish()
}

/// Collector performance export
pub fn collectors_csv(rows: &[CollectorPerformance]) -> String {
    let mut csv = CsvWriter::new();
    csv.row([
        "collector",
        "region",
        "active",
        "open_cases",
        "settled_cases",
        "portfolio_balance",
        "portfolio_collected",
        "recovery_rate_pct",
        "approved_visits",
        "payments_collected",
        "share_of_collections_pct",
    ]);
    for r in rows {
        csv.row([
            r.name.clone(),
            r.region.clone(),
            if r.active { "yes" } else { "no" }.to_string(),
            r.open_cases.to_string(),
            r.settled_cases.to_string(),
            format_amount(r.portfolio_balance_cents),
            format_amount(r.portfolio_collected_cents),
            format!("{:.2}", r.recovery_rate),
            r.approved_visits.to_string(),
            format_amount(r.payments_collected_cents),
            format!("{:.2}", r.share_of_collections),
        ]);
    }
    csv.finish()
}

/// Payment register export; `accounts` maps asset ids to account numbers
pub fn payments_csv(payments: &[PaymentReport], accounts: &HashMap<Uuid, String>) -> String {
    let mut csv = CsvWriter::new();
    csv.row([
        "paid_at",
        "account_number",
        "amount",
        "method",
        "reference",
        "validation",
        "submitted_at",
    ]);
    for p in payments {
        csv.row([
            p.paid_at.to_rfc3339(),
            accounts.get(&p.asset_id).cloned().unwrap_or_default(),
            format_amount(p.amount_cents),
            p.method.to_string(),
            p.reference.clone(),
            p.validation.to_string(),
            p.submitted_at.to_rfc3339(),
        ]);
    }
    csv.finish()
}

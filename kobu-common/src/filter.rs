//! List filters for cases and reports
//!
//! Filters are turned into a parameterised `WHERE` clause. Caller text is
//! only ever bound, never spliced into SQL.

use crate::db::models::{AssetStatus, ValidationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

/// Case list filter used by the admin and management case tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetFilter {
    pub status: Option<AssetStatus>,
    pub collector_id: Option<Uuid>,
    pub region: Option<String>,
    /// Substring of debtor name, account number or phone
    pub search: Option<String>,
    pub min_balance_cents: Option<i64>,
    pub max_balance_cents: Option<i64>,
    #[serde(default)]
    pub unassigned_only: bool,
    /// Restrict to cases counting toward workload (assigned or promised)
    #[serde(default)]
    pub open_only: bool,
}

impl AssetFilter {
    /// Filter for one collector's open caseload
    pub fn caseload(collector_id: Uuid) -> Self {
        Self {
            collector_id: Some(collector_id),
            open_only: true,
            ..Default::default()
        }
    }

    /// Append ` WHERE ...` for the `assets` table
    pub fn push_where<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        qb.push(" WHERE 1 = 1");

        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(collector) = self.collector_id {
            qb.push(" AND collector_id = ").push_bind(collector.to_string());
        }
        if self.unassigned_only {
            qb.push(" AND collector_id IS NULL");
        }
        if self.open_only {
            qb.push(" AND status IN ('assigned', 'promised')");
        }
        if let Some(region) = non_blank(&self.region) {
            qb.push(" AND lower(region) = lower(").push_bind(region).push(")");
        }
        if let Some(search) = non_blank(&self.search) {
            let pattern = like_pattern(search);
            qb.push(" AND (lower(debtor_name) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(account_number) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR debtor_phone LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(min) = self.min_balance_cents {
            qb.push(" AND balance_cents >= ").push_bind(min);
        }
        if let Some(max) = self.max_balance_cents {
            qb.push(" AND balance_cents <= ").push_bind(max);
        }
    }
}

/// Filter for the visit and payment review queues
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    pub validation: Option<ValidationStatus>,
    pub collector_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    /// Inclusive lower bound on submission time
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on submission time
    pub to: Option<DateTime<Utc>>,
}

impl ReportFilter {
    /// Append ` WHERE ...`; works for both report tables, which share these columns
    pub fn push_where<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        qb.push(" WHERE 1 = 1");

        if let Some(validation) = self.validation {
            qb.push(" AND validation = ").push_bind(validation.as_str());
        }
        if let Some(collector) = self.collector_id {
            qb.push(" AND collector_id = ").push_bind(collector.to_string());
        }
        if let Some(asset) = self.asset_id {
            qb.push(" AND asset_id = ").push_bind(asset.to_string());
        }
        if let Some(from) = self.from {
            qb.push(" AND submitted_at >= ").push_bind(from);
        }
        if let Some(to) = self.to {
            qb.push(" AND submitted_at < ").push_bind(to);
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Build a case-insensitive `LIKE` pattern matching `text` anywhere
///
/// Folds ASCII only, the same as SQLite's `lower()` on the column side.
pub fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.to_ascii_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_like_pattern_keeps_non_ascii_case() {
        assert_eq!(like_pattern("ÖMER Njoroge"), "%Ömer njoroge%");
    }

    #[test]
    fn test_empty_filter_has_no_conditions() {
        let filter = AssetFilter::default();
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM assets");
        filter.push_where(&mut qb);
        assert_eq!(qb.sql(), "SELECT * FROM assets WHERE 1 = 1");
    }

    #[test]
    fn test_search_text_is_bound_not_inlined() {
        let filter = AssetFilter {
            search: Some("'; DROP TABLE assets; --".to_string()),
            region: Some("  ".to_string()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM assets");
        filter.push_where(&mut qb);
        let sql = qb.sql();
        assert!(!sql.contains("DROP"));
        assert!(!sql.contains("region"), "blank region must be ignored");
        assert_eq!(sql.matches('?').count(), 3);
    }

    #[test]
    fn test_report_filter_binds_each_condition() {
        let filter = ReportFilter {
            validation: Some(ValidationStatus::Pending),
            collector_id: Some(Uuid::new_v4()),
            from: Some(Utc::now()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM visit_reports");
        filter.push_where(&mut qb);
        assert_eq!(qb.sql().matches('?').count(), 3);
    }
}

//! Runtime settings stored in the `settings` table

use crate::documents::NOTICE_DAYS_RANGE;
use crate::evidence::EvidencePolicy;
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Read a raw setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Read a setting and parse it, falling back to `default` when missing or unparsable
pub async fn get_parsed<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr + Copy + std::fmt::Display,
{
    match get_setting(pool, key).await? {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                warn!("Setting '{}' has unparsable value {:?}, using {}", key, raw, default);
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

/// Load the evidence heuristic thresholds
pub async fn load_evidence_policy(pool: &SqlitePool) -> Result<EvidencePolicy> {
    let defaults = EvidencePolicy::default();
    let policy = EvidencePolicy {
        max_report_delay_minutes: get_parsed(
            pool,
            "max_report_delay_minutes",
            defaults.max_report_delay_minutes,
        )
        .await?,
        max_visit_distance_meters: get_parsed(
            pool,
            "max_visit_distance_meters",
            defaults.max_visit_distance_meters,
        )
        .await?,
        future_tolerance_minutes: get_parsed(
            pool,
            "future_tolerance_minutes",
            defaults.future_tolerance_minutes,
        )
        .await?,
    };

    if policy.max_report_delay_minutes < 0
        || policy.future_tolerance_minutes < 0
        || policy.max_visit_distance_meters.is_nan()
        || policy.max_visit_distance_meters < 0.0
    {
        return Err(Error::Config(format!(
            "Evidence thresholds must not be negative: {:?}",
            policy
        )));
    }
    Ok(policy)
}

/// Notice period used when `demand_letter_notice_days` is missing
pub const DEFAULT_NOTICE_DAYS: i64 = 14;

/// Load the demand letter notice period
pub async fn load_notice_days(pool: &SqlitePool) -> Result<i64> {
    let days = get_parsed(pool, "demand_letter_notice_days", DEFAULT_NOTICE_DAYS).await?;
    if !NOTICE_DAYS_RANGE.contains(&days) {
        return Err(Error::Config(format!(
            "demand_letter_notice_days must be between {} and {}, got {}",
            NOTICE_DAYS_RANGE.start(),
            NOTICE_DAYS_RANGE.end(),
            days
        )));
    }
    Ok(days)
}

//! Collector queries

use crate::assignment::CollectorWorkload;
use crate::db::models::{Collector, NewCollector};
use crate::db::rows::uuid_col;
use crate::{time, uuid_utils, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

const COLLECTOR_COLUMNS: &str = "guid, name, phone, region, active, created_at";

fn collector_from_row(row: &SqliteRow) -> Result<Collector> {
    Ok(Collector {
        guid: uuid_col(row, "guid")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        region: row.try_get("region")?,
        active: row.try_get::<i64, _>("active")? != 0,
        created_at: row.try_get("created_at")?,
    })
}

/// Register a new collector (active)
pub async fn create_collector(pool: &SqlitePool, new: &NewCollector) -> Result<Collector> {
    new.validate()?;

    let collector = Collector {
        guid: uuid_utils::generate(),
        name: new.name.trim().to_string(),
        phone: new.phone.trim().to_string(),
        region: new.region.trim().to_string(),
        active: true,
        created_at: time::now(),
    };

    sqlx::query(
        "INSERT INTO collectors (guid, name, phone, region, active, created_at) VALUES (?, ?, ?, ?, 1, ?)",
    )
    .bind(collector.guid.to_string())
    .bind(&collector.name)
    .bind(&collector.phone)
    .bind(&collector.region)
    .bind(collector.created_at)
    .execute(pool)
    .await?;

    info!("Registered collector {} ({})", collector.name, collector.guid);
    Ok(collector)
}

/// Fetch one collector
pub async fn get_collector<'e, E>(exec: E, id: Uuid) -> Result<Collector>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM collectors WHERE guid = ?", COLLECTOR_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(exec)
        .await?
        .ok_or_else(|| Error::NotFound(format!("collector {}", id)))?;
    collector_from_row(&row)
}

/// All collectors ordered by name
pub async fn list_collectors(pool: &SqlitePool, include_inactive: bool) -> Result<Vec<Collector>> {
    let sql = if include_inactive {
        format!("SELECT {} FROM collectors ORDER BY name, guid", COLLECTOR_COLUMNS)
    } else {
        format!(
            "SELECT {} FROM collectors WHERE active = 1 ORDER BY name, guid",
            COLLECTOR_COLUMNS
        )
    };
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(collector_from_row).collect()
}

/// Activate or deactivate a collector
///
/// Deactivated collectors keep their cases but are skipped by automatic
/// assignment.
pub async fn set_collector_active(pool: &SqlitePool, id: Uuid, active: bool) -> Result<Collector> {
    let result = sqlx::query("UPDATE collectors SET active = ? WHERE guid = ?")
        .bind(active as i64)
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("collector {}", id)));
    }
    info!("Collector {} active = {}", id, active);
    get_collector(pool, id).await
}

/// Open case count for every active collector (collectors with none included)
pub async fn collector_workloads<'e, E>(exec: E) -> Result<Vec<CollectorWorkload>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT c.guid, c.name, c.region, COUNT(a.guid) AS open_cases
        FROM collectors c
        LEFT JOIN assets a
            ON a.collector_id = c.guid AND a.status IN ('assigned', 'promised')
        WHERE c.active = 1
        GROUP BY c.guid, c.name, c.region
        "#,
    )
    .fetch_all(exec)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CollectorWorkload {
                collector_id: uuid_col(row, "guid")?,
                name: row.try_get("name")?,
                region: row.try_get("region")?,
                open_cases: row.try_get("open_cases")?,
            })
        })
        .collect()
}

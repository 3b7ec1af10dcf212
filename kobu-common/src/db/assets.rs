//! Asset (loan case) queries

use crate::db::collectors::get_collector;
use crate::db::models::{check_amount, Asset, AssetStatus, AssetUpdate, NewAsset};
use crate::db::rows::{enum_col, opt_uuid_col, point_cols, uuid_col};
use crate::filter::AssetFilter;
use crate::{time, uuid_utils, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

pub(crate) const ASSET_COLUMNS: &str = "guid, account_number, debtor_name, debtor_phone, \
    debtor_id_number, address, region, product, balance_cents, collected_cents, status, \
    collector_id, assigned_at, latitude, longitude, due_date, created_at, updated_at";

pub(crate) fn asset_from_row(row: &SqliteRow) -> Result<Asset> {
    Ok(Asset {
        guid: uuid_col(row, "guid")?,
        account_number: row.try_get("account_number")?,
        debtor_name: row.try_get("debtor_name")?,
        debtor_phone: row.try_get("debtor_phone")?,
        debtor_id_number: row.try_get("debtor_id_number")?,
        address: row.try_get("address")?,
        region: row.try_get("region")?,
        product: row.try_get("product")?,
        balance_cents: row.try_get("balance_cents")?,
        collected_cents: row.try_get("collected_cents")?,
        status: enum_col(row, "status")?,
        collector_id: opt_uuid_col(row, "collector_id")?,
        assigned_at: row.try_get("assigned_at")?,
        location: point_cols(row)?,
        due_date: row.try_get("due_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Register a new case
///
/// A case created with a collector starts `assigned`, otherwise `unassigned`.
pub async fn create_asset(pool: &SqlitePool, new: &NewAsset) -> Result<Asset> {
    new.validate()?;

    let mut tx = pool.begin().await?;

    let account_number = new.account_number.trim().to_string();
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM assets WHERE account_number = ?)")
        .bind(&account_number)
        .fetch_one(&mut *tx)
        .await?;
    if taken {
        return Err(Error::Conflict(format!(
            "Account {} is already registered",
            account_number
        )));
    }

    if let Some(collector_id) = new.collector_id {
        let collector = get_collector(&mut *tx, collector_id).await?;
        if !collector.active {
            return Err(Error::Conflict(format!(
                "Collector {} is inactive",
                collector.name
            )));
        }
    }

    let now = time::now();
    let asset = Asset {
        guid: uuid_utils::generate(),
        account_number,
        debtor_name: new.debtor_name.trim().to_string(),
        debtor_phone: new.debtor_phone.trim().to_string(),
        debtor_id_number: new.debtor_id_number.clone(),
        address: new.address.clone(),
        region: new.region.trim().to_string(),
        product: new.product.trim().to_string(),
        balance_cents: new.balance_cents,
        collected_cents: 0,
        status: if new.collector_id.is_some() {
            AssetStatus::Assigned
        } else {
            AssetStatus::Unassigned
        },
        collector_id: new.collector_id,
        assigned_at: new.collector_id.map(|_| now),
        location: new.location,
        due_date: new.due_date,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO assets (guid, account_number, debtor_name, debtor_phone, debtor_id_number,
            address, region, product, balance_cents, collected_cents, status, collector_id,
            assigned_at, latitude, longitude, due_date, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(asset.guid.to_string())
    .bind(&asset.account_number)
    .bind(&asset.debtor_name)
    .bind(&asset.debtor_phone)
    .bind(&asset.debtor_id_number)
    .bind(&asset.address)
    .bind(&asset.region)
    .bind(&asset.product)
    .bind(asset.balance_cents)
    .bind(asset.collected_cents)
    .bind(asset.status.as_str())
    .bind(asset.collector_id.map(|c| c.to_string()))
    .bind(asset.assigned_at)
    .bind(asset.location.map(|p| p.latitude))
    .bind(asset.location.map(|p| p.longitude))
    .bind(asset.due_date)
    .bind(asset.created_at)
    .bind(asset.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Registered case {} ({})", asset.account_number, asset.guid);
    Ok(asset)
}

/// Fetch one case
pub async fn get_asset<'e, E>(exec: E, id: Uuid) -> Result<Asset>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM assets WHERE guid = ?", ASSET_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(exec)
        .await?
        .ok_or_else(|| Error::NotFound(format!("asset {}", id)))?;
    asset_from_row(&row)
}

/// Status a reopened case returns to
fn reopened_status(asset: &Asset) -> AssetStatus {
    if asset.collected_cents >= asset.balance_cents {
        AssetStatus::Settled
    } else if asset.collector_id.is_some() {
        AssetStatus::Assigned
    } else {
        AssetStatus::Unassigned
    }
}

/// Apply an [`AssetUpdate`] to a case in memory
///
/// Only `closed` may be set directly. Any other requested status on a closed
/// case reopens it into the status its balance and assignment imply; on an
/// open case it is refused because assignment, promises and payments drive it.
pub fn apply_update(asset: &mut Asset, update: &AssetUpdate) -> Result<()> {
    fn set_text(target: &mut String, field: &str, value: &Option<String>) -> Result<()> {
        if let Some(v) = value {
            if v.trim().is_empty() {
                return Err(Error::InvalidInput(format!("{} must not be empty", field)));
            }
            *target = v.trim().to_string();
        }
        Ok(())
    }

    set_text(&mut asset.debtor_name, "debtor_name", &update.debtor_name)?;
    set_text(&mut asset.debtor_phone, "debtor_phone", &update.debtor_phone)?;
    set_text(&mut asset.region, "region", &update.region)?;
    set_text(&mut asset.product, "product", &update.product)?;
    if update.debtor_id_number.is_some() {
        asset.debtor_id_number = update.debtor_id_number.clone();
    }
    if update.address.is_some() {
        asset.address = update.address.clone();
    }
    if update.location.is_some() {
        asset.location = update.location;
    }
    if update.due_date.is_some() {
        asset.due_date = update.due_date;
    }

    if let Some(balance) = update.balance_cents {
        check_amount("balance_cents", balance)?;
        asset.balance_cents = balance;
        if asset.status.is_open() && asset.collected_cents >= balance {
            asset.status = AssetStatus::Settled;
        }
    }

    match update.status {
        None => {}
        Some(AssetStatus::Closed) => asset.status = AssetStatus::Closed,
        Some(_) if asset.status == AssetStatus::Closed => asset.status = reopened_status(asset),
        Some(requested) if requested == asset.status => {}
        Some(requested) => {
            return Err(Error::InvalidInput(format!(
                "Status {} is set by the collection workflow, not by editing",
                requested
            )))
        }
    }

    Ok(())
}

/// Partially update a case
pub async fn update_asset(pool: &SqlitePool, id: Uuid, update: &AssetUpdate) -> Result<Asset> {
    let mut tx = pool.begin().await?;
    let mut asset = get_asset(&mut *tx, id).await?;

    apply_update(&mut asset, update)?;
    asset.updated_at = time::now();
    write_asset(&mut tx, &asset).await?;

    tx.commit().await?;
    info!("Updated case {} (status {})", asset.account_number, asset.status);
    Ok(asset)
}

/// Persist every mutable column of a case
pub(crate) async fn write_asset(conn: &mut SqliteConnection, asset: &Asset) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE assets SET debtor_name = ?, debtor_phone = ?, debtor_id_number = ?, address = ?,
            region = ?, product = ?, balance_cents = ?, collected_cents = ?, status = ?,
            collector_id = ?, assigned_at = ?, latitude = ?, longitude = ?, due_date = ?,
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&asset.debtor_name)
    .bind(&asset.debtor_phone)
    .bind(&asset.debtor_id_number)
    .bind(&asset.address)
    .bind(&asset.region)
    .bind(&asset.product)
    .bind(asset.balance_cents)
    .bind(asset.collected_cents)
    .bind(asset.status.as_str())
    .bind(asset.collector_id.map(|c| c.to_string()))
    .bind(asset.assigned_at)
    .bind(asset.location.map(|p| p.latitude))
    .bind(asset.location.map(|p| p.longitude))
    .bind(asset.due_date)
    .bind(asset.updated_at)
    .bind(asset.guid.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

/// Delete a case that has no reports attached
pub async fn delete_asset(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;
    let asset = get_asset(&mut *tx, id).await?;

    let reports: i64 = sqlx::query_scalar(
        r#"
        SELECT (SELECT COUNT(*) FROM visit_reports WHERE asset_id = ?1)
             + (SELECT COUNT(*) FROM payment_reports WHERE asset_id = ?1)
        "#,
    )
    .bind(id.to_string())
    .fetch_one(&mut *tx)
    .await?;
    if reports > 0 {
        return Err(Error::Conflict(format!(
            "Case {} has {} reports and cannot be deleted; close it instead",
            asset.account_number, reports
        )));
    }

    sqlx::query("DELETE FROM assets WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Deleted case {} ({})", asset.account_number, id);
    Ok(())
}

/// One page of cases matching `filter`, newest first
pub async fn list_assets(
    pool: &SqlitePool,
    filter: &AssetFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Asset>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM assets", ASSET_COLUMNS));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY created_at DESC, guid LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(asset_from_row).collect()
}

/// Every case matching `filter` (used by exports)
pub async fn list_all_assets(pool: &SqlitePool, filter: &AssetFilter) -> Result<Vec<Asset>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM assets", ASSET_COLUMNS));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY account_number");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(asset_from_row).collect()
}

/// Number of cases matching `filter`
pub async fn count_assets(pool: &SqlitePool, filter: &AssetFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM assets");
    filter.push_where(&mut qb);
    let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

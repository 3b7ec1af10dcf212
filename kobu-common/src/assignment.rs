//! Case assignment
//!
//! Bulk assignment writes one collector id onto a batch of cases. When the
//! administrator does not name a collector, the active collector with the
//! fewest open cases takes the whole batch.

use crate::db::assets::{get_asset, write_asset};
use crate::db::collectors::{collector_workloads, get_collector};
use crate::db::models::{Asset, AssetStatus, Collector};
use crate::{time, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// Current open caseload of one active collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorWorkload {
    pub collector_id: Uuid,
    pub name: String,
    pub region: String,
    pub open_cases: i64,
}

/// Assignment order: fewest open cases first, then name, then id
///
/// The order is total, so the choice is stable for a given database state.
pub fn compare_workloads(a: &CollectorWorkload, b: &CollectorWorkload) -> Ordering {
    a.open_cases
        .cmp(&b.open_cases)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.collector_id.cmp(&b.collector_id))
}

/// Sort workloads into assignment order
pub fn rank_workloads(workloads: &mut [CollectorWorkload]) {
    workloads.sort_by(compare_workloads);
}

/// Pick the collector with the lowest open case count
pub fn pick_least_loaded(workloads: &[CollectorWorkload]) -> Option<&CollectorWorkload> {
    workloads.iter().min_by(|a, b| compare_workloads(a, b))
}

/// Result of a bulk assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub collector: Collector,
    /// Whether the collector was chosen by workload rather than named
    pub auto_selected: bool,
    pub assets: Vec<Asset>,
}

/// Assign a batch of cases to one collector
///
/// All-or-nothing: an unknown, settled or closed case fails the whole batch.
/// Unassigned cases become `assigned`; open cases keep their status and move
/// to the new collector.
pub async fn assign_assets(
    pool: &SqlitePool,
    asset_ids: &[Uuid],
    collector_id: Option<Uuid>,
) -> Result<AssignmentOutcome> {
    if asset_ids.is_empty() {
        return Err(Error::InvalidInput("No cases selected".to_string()));
    }
    let mut seen = HashSet::new();
    let unique: Vec<Uuid> = asset_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    let mut tx = pool.begin().await?;

    let (collector, auto_selected) = match collector_id {
        Some(id) => {
            let collector = get_collector(&mut *tx, id).await?;
            if !collector.active {
                return Err(Error::Conflict(format!(
                    "Collector {} is inactive",
                    collector.name
                )));
            }
            (collector, false)
        }
        None => {
            let workloads = collector_workloads(&mut *tx).await?;
            let chosen = pick_least_loaded(&workloads)
                .ok_or_else(|| Error::Conflict("No active collectors to assign to".to_string()))?;
            debug!(
                "Least loaded collector is {} with {} open cases",
                chosen.name, chosen.open_cases
            );
            (get_collector(&mut *tx, chosen.collector_id).await?, true)
        }
    };

    let now = time::now();
    let mut assets = Vec::with_capacity(unique.len());
    for id in unique {
        let mut asset = get_asset(&mut *tx, id).await?;
        if asset.status.is_final() {
            return Err(Error::Conflict(format!(
                "Case {} is {} and cannot be assigned",
                asset.account_number, asset.status
            )));
        }
        if asset.status == AssetStatus::Unassigned {
            asset.status = AssetStatus::Assigned;
        }
        asset.collector_id = Some(collector.guid);
        asset.assigned_at = Some(now);
        asset.updated_at = now;
        write_asset(&mut tx, &asset).await?;
        assets.push(asset);
    }

    tx.commit().await?;

    info!(
        "Assigned {} cases to {} ({}){}",
        assets.len(),
        collector.name,
        collector.guid,
        if auto_selected { " by workload" } else { "" }
    );
    Ok(AssignmentOutcome {
        collector,
        auto_selected,
        assets,
    })
}

/// Take a case away from its collector
pub async fn unassign_asset(pool: &SqlitePool, asset_id: Uuid) -> Result<Asset> {
    let mut tx = pool.begin().await?;
    let mut asset = get_asset(&mut *tx, asset_id).await?;

    if asset.status.is_final() {
        return Err(Error::Conflict(format!(
            "Case {} is {} and cannot be unassigned",
            asset.account_number, asset.status
        )));
    }
    if asset.collector_id.is_none() {
        return Ok(asset);
    }

    asset.collector_id = None;
    asset.assigned_at = None;
    asset.status = AssetStatus::Unassigned;
    asset.updated_at = time::now();
    write_asset(&mut tx, &asset).await?;
    tx.commit().await?;

    info!("Unassigned case {}", asset.account_number);
    Ok(asset)
}

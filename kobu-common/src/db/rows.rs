//! Row decoding helpers shared by the query modules

use crate::db::models::GeoPoint;
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

pub(crate) fn uuid_col(row: &SqliteRow, col: &str) -> Result<Uuid> {
    let text: String = row.try_get(col)?;
    Uuid::parse_str(&text)
        .map_err(|e| Error::Internal(format!("Corrupt id in column {}: {} ({})", col, text, e)))
}

pub(crate) fn opt_uuid_col(row: &SqliteRow, col: &str) -> Result<Option<Uuid>> {
    let text: Option<String> = row.try_get(col)?;
    text.map(|t| {
        Uuid::parse_str(&t)
            .map_err(|e| Error::Internal(format!("Corrupt id in column {}: {} ({})", col, t, e)))
    })
    .transpose()
}

pub(crate) fn enum_col<T: FromStr<Err = Error>>(row: &SqliteRow, col: &str) -> Result<T> {
    let text: String = row.try_get(col)?;
    text.parse::<T>()
        .map_err(|e| Error::Internal(format!("Corrupt value in column {}: {}", col, e)))
}

pub(crate) fn point_cols(row: &SqliteRow) -> Result<Option<GeoPoint>> {
    Ok(GeoPoint::from_parts(
        row.try_get("latitude")?,
        row.try_get("longitude")?,
    ))
}

pub(crate) fn json_col<T: serde::de::DeserializeOwned>(row: &SqliteRow, col: &str) -> Result<T> {
    let text: String = row.try_get(col)?;
    Ok(serde_json::from_str(&text)?)
}

//! Row mapping helpers for `SQLite` queries.

use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use ocm_core::{Content, RepositoryError, Section};

pub fn storage_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

/// Read a text column holding JSON and decode it.
pub fn json_column<T: serde::de::DeserializeOwned>(
    row: &SqliteRow,
    column: &str,
) -> Result<T, RepositoryError> {
    let text: String = row.try_get(column).map_err(storage_error)?;
    serde_json::from_str(&text).map_err(|e| RepositoryError::Serialization(format!("{column}: {e}")))
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

pub fn row_to_section(row: &SqliteRow) -> Result<Section, RepositoryError> {
    json_column(row, "value")
}

pub fn row_to_content(row: &SqliteRow) -> Result<Content, RepositoryError> {
    json_column(row, "value")
}

/// The optional JSON layout column of a content list.
pub fn row_to_layout(row: &SqliteRow) -> Result<Option<Value>, RepositoryError> {
    let text: Option<String> = row.try_get("layout").map_err(storage_error)?;
    text.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| RepositoryError::Serialization(format!("layout: {e}")))
    })
    .transpose()
}

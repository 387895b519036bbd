use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use kaigi_core::Table;

/// Errors crossing the store boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("row not found in {table}: {id}")]
    NotFound { table: Table, id: Uuid },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Row-oriented data store: per-row create/read/update/delete, scoped by
/// meeting id filters.
///
/// Rows cross this boundary as JSON objects carrying at least an `id`.
/// Catalog rows with no `meeting_id` field (e.g. sales channels) match any
/// meeting filter. `fetch` returns siblings ordered per the table's sort
/// rule; everything else about ordering is the backend's business.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert a row, returning the stored image (id and timestamps filled
    /// in by the backend when absent).
    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError>;

    /// Update exactly one field of one row.
    async fn update_field(
        &self,
        table: Table,
        id: Uuid,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError>;

    /// Update several fields of one row in a single write.
    async fn update_fields(
        &self,
        table: Table,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Fetch all rows of `table` matching the meeting filter.
    async fn fetch(&self, table: Table, meeting_id: Uuid) -> Result<Vec<Value>, StoreError>;

    /// Fetch the single row of a per-meeting singleton table, if any.
    async fn fetch_one(&self, table: Table, meeting_id: Uuid)
        -> Result<Option<Value>, StoreError>;

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), StoreError>;
}

/// The `id` every stored row carries.
pub fn row_id(row: &Value) -> Option<Uuid> {
    row.get("id")?.as_str().and_then(|s| Uuid::parse_str(s).ok())
}

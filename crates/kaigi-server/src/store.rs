use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use kaigi_core::Table;
use kaigi_sync::{ChangeEvent, ChangeFeed, ChangeKind, RowStore, StoreError, Subscription};

use crate::collab::FeedHub;
use crate::db::Database;
use crate::error::AppError;

/// The durable row store: Postgres rows plus the change-notification
/// fan-out. Every mutation publishes the new row image to the table's
/// feed, which is what keeps connected clients converging.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
    feeds: Arc<FeedHub>,
}

impl PgStore {
    pub fn new(db: Database, feeds: Arc<FeedHub>) -> Self {
        Self { db, feeds }
    }

    pub fn feeds(&self) -> &Arc<FeedHub> {
        &self.feeds
    }
}

fn store_err(err: AppError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn stamp_new_row(row: &mut Value) -> Result<(), StoreError> {
    let obj = row
        .as_object_mut()
        .ok_or_else(|| StoreError::Backend("row must be a JSON object".to_string()))?;
    if !obj.contains_key("id") {
        obj.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    let now = Value::String(Utc::now().to_rfc3339());
    obj.entry("created_at").or_insert_with(|| now.clone());
    obj.entry("updated_at").or_insert(now);
    Ok(())
}

#[async_trait]
impl RowStore for PgStore {
    async fn insert(&self, table: Table, mut row: Value) -> Result<Value, StoreError> {
        stamp_new_row(&mut row)?;
        self.db.insert_row(table, &row).await.map_err(store_err)?;
        self.feeds
            .publish(ChangeEvent::new(ChangeKind::Insert, table, Some(row.clone())));
        Ok(row)
    }

    async fn update_field(
        &self,
        table: Table,
        id: Uuid,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut patch = Map::new();
        patch.insert(field.to_string(), value);
        self.update_fields(table, id, patch).await
    }

    async fn update_fields(
        &self,
        table: Table,
        id: Uuid,
        mut patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        patch.insert(
            "updated_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        let updated = self
            .db
            .update_row_fields(table, id, &patch)
            .await
            .map_err(store_err)?
            .ok_or(StoreError::NotFound { table, id })?;
        self.feeds
            .publish(ChangeEvent::new(ChangeKind::Update, table, Some(updated)));
        Ok(())
    }

    async fn fetch(&self, table: Table, meeting_id: Uuid) -> Result<Vec<Value>, StoreError> {
        self.db.fetch_rows(table, meeting_id).await.map_err(store_err)
    }

    async fn fetch_one(
        &self,
        table: Table,
        meeting_id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        self.db
            .fetch_one_row(table, meeting_id)
            .await
            .map_err(store_err)
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), StoreError> {
        let removed = self
            .db
            .delete_row(table, id)
            .await
            .map_err(store_err)?
            .ok_or(StoreError::NotFound { table, id })?;
        self.feeds
            .publish(ChangeEvent::new(ChangeKind::Delete, table, Some(removed)));
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for PgStore {
    async fn subscribe(&self, table: Table, meeting_id: Uuid) -> Result<Subscription, StoreError> {
        Ok(self.feeds.subscribe(table, meeting_id))
    }
}

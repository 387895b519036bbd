use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use kaigi_core::Table;

use crate::feed::{ChangeEvent, ChangeFeed, ChangeKind, Subscription};
use crate::store::{row_id, RowStore, StoreError};

const FEED_CAPACITY: usize = 256;

/// In-process backend implementing both the row store and the change feed.
/// Stands in for the hosted backend in tests and offline runs; every
/// mutation publishes a change event to the table's broadcast channel.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<Table, Vec<Value>>>,
    feeds: RwLock<HashMap<Table, broadcast::Sender<ChangeEvent>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, table: Table) -> broadcast::Sender<ChangeEvent> {
        {
            let feeds = self.feeds.read().unwrap();
            if let Some(tx) = feeds.get(&table) {
                return tx.clone();
            }
        }
        let mut feeds = self.feeds.write().unwrap();
        feeds
            .entry(table)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    fn publish(&self, kind: ChangeKind, table: Table, row: Option<Value>) {
        // no receivers is fine
        let _ = self.sender(table).send(ChangeEvent::new(kind, table, row));
    }

    fn matches_filter(row: &Value, meeting_id: Uuid) -> bool {
        match row.get("meeting_id").and_then(Value::as_str) {
            Some(mid) => Uuid::parse_str(mid).map(|m| m == meeting_id).unwrap_or(false),
            None => true,
        }
    }

    fn sort_rows(table: Table, rows: &mut [Value]) {
        if table.sorts_by_position() {
            rows.sort_by_key(|row| row.get("sort_order").and_then(Value::as_i64).unwrap_or(i64::MAX));
        } else if table.sorts_by_created() {
            rows.sort_by_key(|row| {
                row.get("created_at")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
            });
        }
    }
}

#[async_trait]
impl RowStore for MemoryBackend {
    async fn insert(&self, table: Table, mut row: Value) -> Result<Value, StoreError> {
        let obj = row
            .as_object_mut()
            .ok_or_else(|| StoreError::Backend("row must be a JSON object".to_string()))?;
        if !obj.contains_key("id") {
            obj.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        let now = Value::String(Utc::now().to_rfc3339());
        obj.entry("created_at").or_insert_with(|| now.clone());
        obj.entry("updated_at").or_insert(now);

        let stored = row.clone();
        self.tables.write().unwrap().entry(table).or_default().push(row);
        self.publish(ChangeKind::Insert, table, Some(stored.clone()));
        Ok(stored)
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
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let updated = {
            let mut tables = self.tables.write().unwrap();
            let rows = tables.entry(table).or_default();
            let row = rows
                .iter_mut()
                .find(|row| row_id(row) == Some(id))
                .ok_or(StoreError::NotFound { table, id })?;
            let Some(obj) = row.as_object_mut() else {
                return Err(StoreError::Backend("stored row is not an object".to_string()));
            };
            for (field, value) in patch {
                obj.insert(field, value);
            }
            obj.insert(
                "updated_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
            row.clone()
        };
        self.publish(ChangeKind::Update, table, Some(updated));
        Ok(())
    }

    async fn fetch(&self, table: Table, meeting_id: Uuid) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().unwrap();
        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| Self::matches_filter(row, meeting_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);
        Self::sort_rows(table, &mut rows);
        Ok(rows)
    }

    async fn fetch_one(
        &self,
        table: Table,
        meeting_id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.fetch(table, meeting_id).await?.into_iter().next())
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), StoreError> {
        let removed = {
            let mut tables = self.tables.write().unwrap();
            let rows = tables.entry(table).or_default();
            let idx = rows
                .iter()
                .position(|row| row_id(row) == Some(id))
                .ok_or(StoreError::NotFound { table, id })?;
            rows.remove(idx)
        };
        self.publish(ChangeKind::Delete, table, Some(removed));
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(&self, table: Table, meeting_id: Uuid) -> Result<Subscription, StoreError> {
        Ok(Subscription::from_broadcast(
            self.sender(table).subscribe(),
            meeting_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_fills_id_and_timestamps() {
        let backend = MemoryBackend::new();
        let meeting = Uuid::new_v4();
        let stored = backend
            .insert(Table::Agendas, json!({ "meeting_id": meeting, "title": "Kickoff" }))
            .await
            .unwrap();

        assert!(row_id(&stored).is_some());
        assert!(stored.get("created_at").is_some());
        assert!(stored.get("updated_at").is_some());
    }

    #[tokio::test]
    async fn test_fetch_is_meeting_scoped_and_sorted() {
        let backend = MemoryBackend::new();
        let meeting = Uuid::new_v4();

        backend
            .insert(
                Table::Agendas,
                json!({ "meeting_id": meeting, "title": "second", "sort_order": 1 }),
            )
            .await
            .unwrap();
        backend
            .insert(
                Table::Agendas,
                json!({ "meeting_id": meeting, "title": "first", "sort_order": 0 }),
            )
            .await
            .unwrap();
        backend
            .insert(
                Table::Agendas,
                json!({ "meeting_id": Uuid::new_v4(), "title": "other meeting" }),
            )
            .await
            .unwrap();

        let rows = backend.fetch(Table::Agendas, meeting).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], "first");
        assert_eq!(rows[1]["title"], "second");
    }

    #[tokio::test]
    async fn test_catalog_rows_match_any_meeting() {
        let backend = MemoryBackend::new();
        backend
            .insert(Table::SalesChannels, json!({ "name": "Web", "is_active": true }))
            .await
            .unwrap();

        let rows = backend.fetch(Table::SalesChannels, Uuid::new_v4()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_update_field_publishes_new_row() {
        let backend = MemoryBackend::new();
        let meeting = Uuid::new_v4();
        let stored = backend
            .insert(Table::Agendas, json!({ "meeting_id": meeting, "title": "before" }))
            .await
            .unwrap();
        let id = row_id(&stored).unwrap();

        let mut sub = backend.subscribe(Table::Agendas, meeting).await.unwrap();
        backend
            .update_field(Table::Agendas, id, "title", json!("after"))
            .await
            .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.row.unwrap()["title"], "after");
    }

    #[tokio::test]
    async fn test_update_unknown_row() {
        let backend = MemoryBackend::new();
        let err = backend
            .update_field(Table::Agendas, Uuid::new_v4(), "title", json!("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_publishes_row_image() {
        let backend = MemoryBackend::new();
        let meeting = Uuid::new_v4();
        let stored = backend
            .insert(Table::FreeTopics, json!({ "meeting_id": meeting, "content": "x" }))
            .await
            .unwrap();
        let id = row_id(&stored).unwrap();

        let mut sub = backend.subscribe(Table::FreeTopics, meeting).await.unwrap();
        backend.delete(Table::FreeTopics, id).await.unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(row_id(&event.row.unwrap()), Some(id));
        assert!(backend.fetch(Table::FreeTopics, meeting).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_ordered_by_created_at() {
        let backend = MemoryBackend::new();
        let meeting = Uuid::new_v4();

        backend
            .insert(
                Table::ChatMessages,
                json!({
                    "meeting_id": meeting,
                    "message": "later",
                    "created_at": "2025-06-02T10:00:05+00:00"
                }),
            )
            .await
            .unwrap();
        backend
            .insert(
                Table::ChatMessages,
                json!({
                    "meeting_id": meeting,
                    "message": "earlier",
                    "created_at": "2025-06-02T10:00:01+00:00"
                }),
            )
            .await
            .unwrap();

        let rows = backend.fetch(Table::ChatMessages, meeting).await.unwrap();
        assert_eq!(rows[0]["message"], "earlier");
        assert_eq!(rows[1]["message"], "later");
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use kaigi_core::Table;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-change notification. The row image is the new row where the
/// transport has it; deletes may arrive without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: Table,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<Value>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, table: Table, row: Option<Value>) -> Self {
        Self { kind, table, row }
    }

    /// Whether this event belongs to the given meeting's scope. Events
    /// without a row image (or whose rows carry no `meeting_id`, like
    /// catalog tables) pass every filter; consumers refetch idempotently.
    pub fn matches_meeting(&self, meeting_id: Uuid) -> bool {
        let Some(row) = &self.row else { return true };
        match row.get("meeting_id").and_then(Value::as_str) {
            Some(mid) => Uuid::parse_str(mid).map(|m| m == meeting_id).unwrap_or(false),
            None => true,
        }
    }
}

/// Change-notification feed, one subscription per table + meeting filter.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, table: Table, meeting_id: Uuid) -> Result<Subscription, StoreError>;
}

/// A live subscription. Dropping it stops delivery and releases the
/// underlying channel.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    forward: JoinHandle<()>,
}

impl Subscription {
    /// Adapt a broadcast receiver into a meeting-scoped subscription.
    pub fn from_broadcast(mut source: broadcast::Receiver<ChangeEvent>, meeting_id: Uuid) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let forward = tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        if event.matches_meeting(meeting_id) && tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // consumers refetch whole collections, so lost
                        // events only delay convergence
                        tracing::warn!(skipped, "change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { rx, forward }
    }

    /// Next matching event, or `None` once the feed closes.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.forward.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_meeting() {
        let meeting = Uuid::new_v4();
        let other = Uuid::new_v4();

        let scoped = ChangeEvent::new(
            ChangeKind::Insert,
            Table::Agendas,
            Some(json!({ "id": Uuid::new_v4(), "meeting_id": meeting })),
        );
        assert!(scoped.matches_meeting(meeting));
        assert!(!scoped.matches_meeting(other));

        // catalog row: no meeting_id
        let catalog = ChangeEvent::new(
            ChangeKind::Update,
            Table::SalesChannels,
            Some(json!({ "id": Uuid::new_v4(), "name": "Web" })),
        );
        assert!(catalog.matches_meeting(meeting));

        // delete without a row image
        let blind = ChangeEvent::new(ChangeKind::Delete, Table::Agendas, None);
        assert!(blind.matches_meeting(meeting));
    }

    #[test]
    fn test_event_wire_format() {
        let event = ChangeEvent::new(ChangeKind::Delete, Table::FreeTopics, None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "delete");
        assert_eq!(json["table"], "free_topics");
        assert!(json.get("row").is_none());
    }

    #[tokio::test]
    async fn test_subscription_filters_broadcast() {
        let meeting = Uuid::new_v4();
        let (tx, rx) = broadcast::channel(16);
        let mut sub = Subscription::from_broadcast(rx, meeting);

        tx.send(ChangeEvent::new(
            ChangeKind::Insert,
            Table::Agendas,
            Some(json!({ "id": Uuid::new_v4(), "meeting_id": Uuid::new_v4() })),
        ))
        .unwrap();
        tx.send(ChangeEvent::new(
            ChangeKind::Insert,
            Table::Agendas,
            Some(json!({ "id": Uuid::new_v4(), "meeting_id": meeting, "title": "mine" })),
        ))
        .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.row.unwrap()["title"], "mine");
    }
}

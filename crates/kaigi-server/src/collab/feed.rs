use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use kaigi_core::{Table, SYNCED_TABLES};
use kaigi_sync::{ChangeEvent, Subscription};

use crate::AppState;

const FEED_CAPACITY: usize = 256;

/// Per-table broadcast of row-change events. The store publishes here on
/// every mutation; WebSocket clients and in-process subscribers fan out
/// from the same channels.
#[derive(Default)]
pub struct FeedHub {
    senders: RwLock<HashMap<Table, broadcast::Sender<ChangeEvent>>>,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, table: Table) -> broadcast::Sender<ChangeEvent> {
        {
            let senders = self.senders.read().unwrap();
            if let Some(tx) = senders.get(&table) {
                return tx.clone();
            }
        }
        let mut senders = self.senders.write().unwrap();
        senders
            .entry(table)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    /// Publish an event; no receivers is fine.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender(event.table).send(event);
    }

    /// Meeting-scoped subscription on one table.
    pub fn subscribe(&self, table: Table, meeting_id: Uuid) -> Subscription {
        Subscription::from_broadcast(self.sender(table).subscribe(), meeting_id)
    }
}

/// WebSocket handler streaming a meeting's change events
async fn ws_handler(
    State(state): State<AppState>,
    Path(meeting_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, meeting_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, meeting_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();

    // merge every synced table's subscription into one stream
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ChangeEvent>();
    let mut forwards = Vec::with_capacity(SYNCED_TABLES.len());
    for table in SYNCED_TABLES {
        let mut sub = state.store.feeds().subscribe(table, meeting_id);
        let event_tx = event_tx.clone();
        forwards.push(tokio::spawn(async move {
            while let Some(event) = sub.next().await {
                if event_tx.send(event).is_err() {
                    break;
                }
            }
        }));
    }
    drop(event_tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!("Failed to encode change event: {}", err);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // the feed is one-way; the read half only watches for close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }
    for forward in forwards {
        forward.abort();
    }

    tracing::debug!("Feed connection closed for meeting {}", meeting_id);
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/feed/{meeting_id}", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaigi_sync::ChangeKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_hub_delivers_to_meeting_scoped_subscribers() {
        let hub = FeedHub::new();
        let meeting = Uuid::new_v4();
        let mut sub = hub.subscribe(Table::Agendas, meeting);

        hub.publish(ChangeEvent::new(
            ChangeKind::Insert,
            Table::Agendas,
            Some(json!({ "id": Uuid::new_v4(), "meeting_id": meeting, "title": "x" })),
        ));
        hub.publish(ChangeEvent::new(
            ChangeKind::Insert,
            Table::Agendas,
            Some(json!({ "id": Uuid::new_v4(), "meeting_id": Uuid::new_v4() })),
        ));

        let event = sub.next().await.unwrap();
        assert_eq!(event.row.unwrap()["title"], "x");
    }
}

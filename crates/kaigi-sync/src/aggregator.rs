use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use kaigi_core::{
    Agenda, Announcement, ChatMessage, Debate, DevProject, FreeTopic, SalesMetric, SalesStatus,
    Table, TimerState, SYNCED_TABLES,
};

use crate::error::SyncError;
use crate::feed::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::store::RowStore;

struct Channels {
    agendas: watch::Sender<Vec<Agenda>>,
    sales_metrics: watch::Sender<Vec<SalesMetric>>,
    sales_status: watch::Sender<Vec<SalesStatus>>,
    dev_projects: watch::Sender<Vec<DevProject>>,
    announcement: watch::Sender<Option<Announcement>>,
    free_topics: watch::Sender<Vec<FreeTopic>>,
    debate: watch::Sender<Option<Debate>>,
    chat: watch::Sender<Vec<ChatMessage>>,
}

impl Channels {
    fn new() -> Self {
        Self {
            agendas: watch::channel(Vec::new()).0,
            sales_metrics: watch::channel(Vec::new()).0,
            sales_status: watch::channel(Vec::new()).0,
            dev_projects: watch::channel(Vec::new()).0,
            announcement: watch::channel(None).0,
            free_topics: watch::channel(Vec::new()).0,
            debate: watch::channel(None).0,
            chat: watch::channel(Vec::new()).0,
        }
    }
}

/// Read side of the shared application state: one reactive channel per
/// collection, refreshed by the session's feed subscriptions.
#[derive(Clone)]
pub struct MeetingState {
    pub agendas: watch::Receiver<Vec<Agenda>>,
    pub sales_metrics: watch::Receiver<Vec<SalesMetric>>,
    pub sales_status: watch::Receiver<Vec<SalesStatus>>,
    pub dev_projects: watch::Receiver<Vec<DevProject>>,
    pub announcement: watch::Receiver<Option<Announcement>>,
    pub free_topics: watch::Receiver<Vec<FreeTopic>>,
    pub debate: watch::Receiver<Option<Debate>>,
    pub chat: watch::Receiver<Vec<ChatMessage>>,
}

/// Per-meeting subscription fan-out.
///
/// On open: one full fetch of every collection, then a change-feed
/// subscription per table. Any section change triggers a whole-collection
/// refetch (cheap at meeting scale, and idempotent under at-least-once
/// delivery); debate rows are applied directly; chat inserts append.
/// Dropping the session releases every subscription.
pub struct MeetingSession {
    store: Arc<dyn RowStore>,
    meeting_id: Uuid,
    channels: Arc<Channels>,
    tasks: Vec<JoinHandle<()>>,
}

impl MeetingSession {
    pub async fn open(
        store: Arc<dyn RowStore>,
        feed: &dyn ChangeFeed,
        meeting_id: Uuid,
    ) -> Result<Self, SyncError> {
        let channels = Arc::new(Channels::new());

        // the full fetch runs before the feed is relied upon
        try_join_all(
            SYNCED_TABLES
                .iter()
                .map(|&table| refresh_table(store.as_ref(), &channels, meeting_id, table)),
        )
        .await?;

        let mut tasks = Vec::with_capacity(SYNCED_TABLES.len());
        for table in SYNCED_TABLES {
            let mut sub = feed.subscribe(table, meeting_id).await?;
            let store = Arc::clone(&store);
            let channels = Arc::clone(&channels);
            tasks.push(tokio::spawn(async move {
                while let Some(event) = sub.next().await {
                    handle_event(store.as_ref(), &channels, meeting_id, table, event).await;
                }
            }));
        }

        Ok(Self {
            store,
            meeting_id,
            channels,
            tasks,
        })
    }

    pub fn meeting_id(&self) -> Uuid {
        self.meeting_id
    }

    /// Subscribe a view to the shared state.
    pub fn state(&self) -> MeetingState {
        MeetingState {
            agendas: self.channels.agendas.subscribe(),
            sales_metrics: self.channels.sales_metrics.subscribe(),
            sales_status: self.channels.sales_status.subscribe(),
            dev_projects: self.channels.dev_projects.subscribe(),
            announcement: self.channels.announcement.subscribe(),
            free_topics: self.channels.free_topics.subscribe(),
            debate: self.channels.debate.subscribe(),
            chat: self.channels.chat.subscribe(),
        }
    }

    /// Refetch every collection once, bypassing the feed.
    pub async fn refresh_all(&self) -> Result<(), SyncError> {
        for table in SYNCED_TABLES {
            refresh_table(self.store.as_ref(), &self.channels, self.meeting_id, table).await?;
        }
        Ok(())
    }

    /// The meeting's debate record, created lazily on first open of the
    /// debate view.
    pub async fn ensure_debate(&self) -> Result<Debate, SyncError> {
        if let Some(row) = self
            .store
            .fetch_one(Table::Debates, self.meeting_id)
            .await?
        {
            let debate: Debate = serde_json::from_value(row)?;
            self.channels.debate.send_replace(Some(debate.clone()));
            return Ok(debate);
        }

        let row = serde_json::json!({
            "meeting_id": self.meeting_id,
            "duration_minutes": 5,
            "timer_state": TimerState::default(),
        });
        let inserted = self.store.insert(Table::Debates, row).await?;
        let debate: Debate = serde_json::from_value(inserted)?;
        self.channels.debate.send_replace(Some(debate.clone()));
        Ok(debate)
    }

    /// Append a chat message; blank input is dropped.
    pub async fn send_chat(
        &self,
        user_name: &str,
        user_color: &str,
        message: &str,
    ) -> Result<(), SyncError> {
        let body = message.trim();
        if body.is_empty() {
            return Ok(());
        }
        let row = serde_json::json!({
            "meeting_id": self.meeting_id,
            "user_name": user_name,
            "user_color": user_color,
            "message": body,
        });
        self.store.insert(Table::ChatMessages, row).await?;
        Ok(())
    }
}

impl Drop for MeetingSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn handle_event(
    store: &dyn RowStore,
    channels: &Channels,
    meeting_id: Uuid,
    table: Table,
    event: ChangeEvent,
) {
    match table {
        // at most one debate per meeting: apply the delivered row directly
        Table::Debates => {
            if event.kind == ChangeKind::Delete {
                return;
            }
            if let Some(row) = event.row {
                match serde_json::from_value::<Debate>(row) {
                    Ok(debate) => {
                        channels.debate.send_replace(Some(debate));
                    }
                    Err(err) => tracing::warn!(%err, "undecodable debate row"),
                }
            }
        }
        // chat is append-only: push the new row, keep creation order
        Table::ChatMessages => {
            if event.kind != ChangeKind::Insert {
                return;
            }
            let Some(row) = event.row else { return };
            match serde_json::from_value::<ChatMessage>(row) {
                Ok(message) => {
                    channels.chat.send_modify(|messages| {
                        messages.push(message);
                        messages.sort_by_key(|m| m.created_at);
                    });
                }
                Err(err) => tracing::warn!(%err, "undecodable chat message"),
            }
        }
        // everything else: refetch the whole collection
        _ => {
            if let Err(err) = refresh_table(store, channels, meeting_id, table).await {
                tracing::warn!(table = %table, %err, "refetch after change event failed");
            }
        }
    }
}

async fn refresh_table(
    store: &dyn RowStore,
    channels: &Channels,
    meeting_id: Uuid,
    table: Table,
) -> Result<(), SyncError> {
    match table {
        Table::Agendas => {
            let rows = store.fetch(table, meeting_id).await?;
            channels.agendas.send_replace(decode_rows(table, rows));
        }
        Table::SalesMetrics => {
            let rows = store.fetch(table, meeting_id).await?;
            channels.sales_metrics.send_replace(decode_rows(table, rows));
        }
        Table::SalesStatus => {
            let rows = store.fetch(table, meeting_id).await?;
            channels.sales_status.send_replace(decode_rows(table, rows));
        }
        Table::DevProjects => {
            let rows = store.fetch(table, meeting_id).await?;
            channels.dev_projects.send_replace(decode_rows(table, rows));
        }
        Table::Announcements => {
            let row = store.fetch_one(table, meeting_id).await?;
            channels
                .announcement
                .send_replace(row.and_then(|r| decode_row(table, r)));
        }
        Table::FreeTopics => {
            let rows = store.fetch(table, meeting_id).await?;
            channels.free_topics.send_replace(decode_rows(table, rows));
        }
        Table::Debates => {
            let row = store.fetch_one(table, meeting_id).await?;
            channels
                .debate
                .send_replace(row.and_then(|r| decode_row(table, r)));
        }
        Table::ChatMessages => {
            let rows = store.fetch(table, meeting_id).await?;
            channels.chat.send_replace(decode_rows(table, rows));
        }
        other => {
            tracing::debug!(table = %other, "table is not part of the meeting session");
        }
    }
    Ok(())
}

fn decode_row<T: DeserializeOwned>(table: Table, row: Value) -> Option<T> {
    match serde_json::from_value(row) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::warn!(table = %table, %err, "dropping undecodable row");
            None
        }
    }
}

fn decode_rows<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| decode_row(table, row))
        .collect()
}

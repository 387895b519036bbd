use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use kaigi_core::{Table, Tick, TimerState};

use crate::feed::{ChangeFeed, ChangeKind};
use crate::store::{row_id, RowStore, StoreError};

/// Client view of the shared debate countdown.
///
/// The canonical state lives on the debate row; every transition here is a
/// persisted write, never a peer message. Between writes the local 1 Hz
/// tick projects `remaining` downward without re-deriving from
/// `started_at`, so a client joining mid-countdown resynchronizes on the
/// next persisted update.
pub struct SharedTimer {
    store: Arc<dyn RowStore>,
    debate_id: Uuid,
    state_tx: Arc<watch::Sender<TimerState>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SharedTimer {
    /// Attach to a debate's timer: subscribe to the row's updates and start
    /// the local tick.
    pub async fn attach(
        store: Arc<dyn RowStore>,
        feed: &dyn ChangeFeed,
        meeting_id: Uuid,
        debate_id: Uuid,
        initial: TimerState,
    ) -> Result<Self, StoreError> {
        let state_tx = Arc::new(watch::channel(initial).0);
        let mut sub = feed.subscribe(Table::Debates, meeting_id).await?;

        let feed_tx = Arc::clone(&state_tx);
        let feed_task = tokio::spawn(async move {
            while let Some(event) = sub.next().await {
                if event.kind != ChangeKind::Update {
                    continue;
                }
                let Some(row) = event.row else { continue };
                if row_id(&row) != Some(debate_id) {
                    continue;
                }
                let Some(raw) = row.get("timer_state") else { continue };
                match serde_json::from_value::<TimerState>(raw.clone()) {
                    Ok(state) => {
                        feed_tx.send_replace(state);
                    }
                    Err(err) => tracing::warn!(%err, "undecodable timer_state on debate row"),
                }
            }
        });

        let tick_tx = Arc::clone(&state_tx);
        let tick_store = Arc::clone(&store);
        let tick_task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let mut outcome = Tick::Idle;
                tick_tx.send_if_modified(|state| {
                    outcome = state.tick();
                    outcome != Tick::Idle
                });
                if outcome == Tick::Finished {
                    // converge the canonical record; every client racing to
                    // zero writes the same terminal state
                    let terminal = tick_tx.borrow().clone();
                    match serde_json::to_value(&terminal) {
                        Ok(json) => {
                            if let Err(err) = tick_store
                                .update_field(Table::Debates, debate_id, "timer_state", json)
                                .await
                            {
                                tracing::warn!(%err, "zero-crossing stop write failed");
                            }
                        }
                        Err(err) => tracing::warn!(%err, "timer state serialization failed"),
                    }
                }
            }
        });

        Ok(Self {
            store,
            debate_id,
            state_tx,
            tasks: vec![feed_task, tick_task],
        })
    }

    /// The state as this client currently projects it.
    pub fn current(&self) -> TimerState {
        self.state_tx.borrow().clone()
    }

    pub fn state(&self) -> watch::Receiver<TimerState> {
        self.state_tx.subscribe()
    }

    /// Start the countdown at the given duration.
    pub async fn start(&self, minutes: u32) -> Result<(), StoreError> {
        let state = TimerState::started(minutes, Utc::now());
        let mut patch = Map::new();
        patch.insert("timer_state".to_string(), serde_json::to_value(&state)?);
        patch.insert("duration_minutes".to_string(), Value::from(minutes));
        self.store
            .update_fields(Table::Debates, self.debate_id, patch)
            .await
    }

    /// End the debate: zeroes `remaining` rather than preserving it.
    pub async fn stop(&self) -> Result<(), StoreError> {
        let state = self.current().stopped();
        self.write_state(&state).await
    }

    /// Add one minute to both remaining and total; legal in any status.
    pub async fn extend(&self) -> Result<(), StoreError> {
        let state = self.current().extended();
        self.write_state(&state).await
    }

    /// Reset to a new duration. Callers disable this while running; the
    /// transition itself is not guarded.
    pub async fn set_duration(&self, minutes: u32) -> Result<(), StoreError> {
        let state = TimerState::with_duration(minutes);
        let mut patch = Map::new();
        patch.insert("timer_state".to_string(), serde_json::to_value(&state)?);
        patch.insert("duration_minutes".to_string(), Value::from(minutes));
        self.store
            .update_fields(Table::Debates, self.debate_id, patch)
            .await
    }

    async fn write_state(&self, state: &TimerState) -> Result<(), StoreError> {
        self.store
            .update_field(
                Table::Debates,
                self.debate_id,
                "timer_state",
                serde_json::to_value(state)?,
            )
            .await
    }
}

impl Drop for SharedTimer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

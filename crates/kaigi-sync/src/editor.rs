use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use kaigi_core::{parse_numeric, CoreError, FieldKey, FieldValue, Table};

use crate::store::{row_id, RowStore};

/// Quiet period after the last keystroke before a field is committed.
pub const QUIET_PERIOD: Duration = Duration::from_millis(500);

struct PendingCommit {
    value: Value,
    timer: JoinHandle<()>,
}

struct Inner {
    rows: Vec<Value>,
    pending: HashMap<FieldKey, PendingCommit>,
}

/// Optimistic editor for one table's rows within a meeting view.
///
/// Edits replace the displayed value immediately and are committed to the
/// store only after the quiet period; a burst of edits to one field is
/// coalesced into a single write carrying the final value. Authoritative
/// snapshots from the aggregator are merged through [`apply_snapshot`],
/// which leaves fields with a commit still pending untouched.
///
/// [`apply_snapshot`]: FieldEditor::apply_snapshot
pub struct FieldEditor {
    store: Arc<dyn RowStore>,
    table: Table,
    quiet_period: Duration,
    inner: Arc<Mutex<Inner>>,
    rows_tx: watch::Sender<Vec<Value>>,
}

impl FieldEditor {
    pub fn new(store: Arc<dyn RowStore>, table: Table) -> Self {
        Self::with_quiet_period(store, table, QUIET_PERIOD)
    }

    pub fn with_quiet_period(store: Arc<dyn RowStore>, table: Table, quiet_period: Duration) -> Self {
        Self {
            store,
            table,
            quiet_period,
            inner: Arc::new(Mutex::new(Inner {
                rows: Vec::new(),
                pending: HashMap::new(),
            })),
            rows_tx: watch::channel(Vec::new()).0,
        }
    }

    /// The rows as currently displayed: latest snapshot plus any optimistic
    /// local edits.
    pub fn rows(&self) -> watch::Receiver<Vec<Value>> {
        self.rows_tx.subscribe()
    }

    /// Apply a text edit optimistically and schedule its commit.
    pub fn edit(&self, key: FieldKey, value: FieldValue) {
        let json = value.to_json();
        self.apply_local(&key, json.clone());
        self.schedule_commit(key, json);
    }

    /// Apply raw input to a numeric field. Empty input clears the display
    /// without committing (never written as zero); non-numeric input is
    /// rejected without touching any state.
    pub fn edit_numeric(&self, key: FieldKey, raw: &str) -> Result<(), CoreError> {
        match parse_numeric(raw)? {
            Some(n) => self.edit(key, FieldValue::Number(n)),
            None => {
                self.cancel_pending(&key);
                self.apply_local(&key, Value::Null);
            }
        }
        Ok(())
    }

    /// Merge an authoritative snapshot. Fields with a pending commit keep
    /// their optimistic value so an in-flight local edit is never clobbered
    /// by a stale refresh; everything else takes the snapshot.
    pub fn apply_snapshot(&self, snapshot: Vec<Value>) {
        let mut inner = self.inner.lock().unwrap();
        let mut rows = snapshot;
        for row in &mut rows {
            let Some(id) = row_id(row) else { continue };
            for (key, commit) in &inner.pending {
                if key.entity_id == id {
                    if let Some(obj) = row.as_object_mut() {
                        obj.insert(key.field.clone(), commit.value.clone());
                    }
                }
            }
        }
        inner.rows = rows.clone();
        drop(inner);
        self.rows_tx.send_replace(rows);
    }

    /// Whether a commit is still waiting on its quiet period.
    pub fn has_pending(&self, key: &FieldKey) -> bool {
        self.inner.lock().unwrap().pending.contains_key(key)
    }

    fn apply_local(&self, key: &FieldKey, value: Value) {
        let mut inner = self.inner.lock().unwrap();
        let Some(row) = inner
            .rows
            .iter_mut()
            .find(|row| row_id(row) == Some(key.entity_id))
        else {
            tracing::debug!(entity = %key.entity_id, "edit for a row not yet loaded");
            return;
        };
        if let Some(obj) = row.as_object_mut() {
            obj.insert(key.field.clone(), value);
        }
        let rows = inner.rows.clone();
        drop(inner);
        self.rows_tx.send_replace(rows);
    }

    fn cancel_pending(&self, key: &FieldKey) {
        if let Some(prev) = self.inner.lock().unwrap().pending.remove(key) {
            prev.timer.abort();
        }
    }

    fn schedule_commit(&self, key: FieldKey, value: Value) {
        let mut inner = self.inner.lock().unwrap();
        // cancel-and-restart: only the latest value of a burst survives
        if let Some(prev) = inner.pending.remove(&key) {
            prev.timer.abort();
        }

        let store = Arc::clone(&self.store);
        let table = self.table;
        let quiet = self.quiet_period;
        let inner_ref = Arc::clone(&self.inner);
        let task_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let value = {
                let mut inner = inner_ref.lock().unwrap();
                match inner.pending.remove(&task_key) {
                    Some(commit) => commit.value,
                    // superseded while we were waking up
                    None => return,
                }
            };
            // detached: teardown aborts quiet-period timers, not a commit
            // that has already fired
            tokio::spawn(async move {
                if let Err(err) = store
                    .update_field(table, task_key.entity_id, &task_key.field, value)
                    .await
                {
                    tracing::warn!(
                        table = %table,
                        entity = %task_key.entity_id,
                        field = %task_key.field,
                        %err,
                        "field commit failed; next refresh will correct the view"
                    );
                }
            });
        });

        inner.pending.insert(key, PendingCommit { value, timer });
    }
}

impl Drop for FieldEditor {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        for (_, commit) in inner.pending.drain() {
            commit.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    use crate::memory::MemoryBackend;
    use crate::store::StoreError;

    /// Store wrapper counting single-field commits.
    struct CountingStore {
        backend: MemoryBackend,
        updates: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                backend: MemoryBackend::new(),
                updates: AtomicUsize::new(0),
            }
        }

        fn update_count(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RowStore for CountingStore {
        async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
            self.backend.insert(table, row).await
        }

        async fn update_field(
            &self,
            table: Table,
            id: Uuid,
            field: &str,
            value: Value,
        ) -> Result<(), StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.backend.update_field(table, id, field, value).await
        }

        async fn update_fields(
            &self,
            table: Table,
            id: Uuid,
            patch: serde_json::Map<String, Value>,
        ) -> Result<(), StoreError> {
            self.backend.update_fields(table, id, patch).await
        }

        async fn fetch(&self, table: Table, meeting_id: Uuid) -> Result<Vec<Value>, StoreError> {
            self.backend.fetch(table, meeting_id).await
        }

        async fn fetch_one(
            &self,
            table: Table,
            meeting_id: Uuid,
        ) -> Result<Option<Value>, StoreError> {
            self.backend.fetch_one(table, meeting_id).await
        }

        async fn delete(&self, table: Table, id: Uuid) -> Result<(), StoreError> {
            self.backend.delete(table, id).await
        }
    }

    async fn seeded_editor() -> (Arc<CountingStore>, FieldEditor, Uuid, Uuid) {
        let store = Arc::new(CountingStore::new());
        let meeting = Uuid::new_v4();
        let row = store
            .insert(
                Table::Agendas,
                json!({ "meeting_id": meeting, "title": "before", "leads_count": 5 }),
            )
            .await
            .unwrap();
        let id = row_id(&row).unwrap();

        let editor = FieldEditor::new(Arc::clone(&store) as Arc<dyn RowStore>, Table::Agendas);
        editor.apply_snapshot(store.fetch(Table::Agendas, meeting).await.unwrap());
        (store, editor, meeting, id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_applies_optimistically_before_commit() {
        let (store, editor, _meeting, id) = seeded_editor().await;

        editor.edit(FieldKey::new(id, "title"), FieldValue::from("after"));

        let rows = editor.rows();
        assert_eq!(rows.borrow()[0]["title"], "after");
        // nothing written yet: quiet period still running
        assert_eq!(store.update_count(), 0);
        assert!(editor.has_pending(&FieldKey::new(id, "title")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_commits_once_with_final_value() {
        let (store, editor, meeting, id) = seeded_editor().await;
        let key = FieldKey::new(id, "title");

        editor.edit(key.clone(), FieldValue::from("a"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        editor.edit(key.clone(), FieldValue::from("ab"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        editor.edit(key.clone(), FieldValue::from("abc"));

        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(store.update_count(), 1);
        let rows = store.fetch(Table::Agendas, meeting).await.unwrap();
        assert_eq!(rows[0]["title"], "abc");
        assert!(!editor.has_pending(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_quiet_periods_commit_separately() {
        let (store, editor, meeting, id) = seeded_editor().await;
        let key = FieldKey::new(id, "title");

        editor.edit(key.clone(), FieldValue::from("first"));
        tokio::time::sleep(Duration::from_millis(700)).await;
        editor.edit(key.clone(), FieldValue::from("second"));
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(store.update_count(), 2);
        let rows = store.fetch(Table::Agendas, meeting).await.unwrap();
        assert_eq!(rows[0]["title"], "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_skips_pending_fields() {
        let (_store, editor, _meeting, id) = seeded_editor().await;

        editor.edit(FieldKey::new(id, "title"), FieldValue::from("local edit"));

        // stale refresh arrives while the commit is pending
        editor.apply_snapshot(vec![json!({
            "id": id,
            "title": "stale",
            "detail": "fresh detail"
        })]);

        let rows = editor.rows();
        let snapshot = rows.borrow();
        assert_eq!(snapshot[0]["title"], "local edit");
        assert_eq!(snapshot[0]["detail"], "fresh detail");
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_applies_after_commit_lands() {
        let (_store, editor, _meeting, id) = seeded_editor().await;

        editor.edit(FieldKey::new(id, "title"), FieldValue::from("local edit"));
        tokio::time::sleep(Duration::from_millis(700)).await;

        editor.apply_snapshot(vec![json!({ "id": id, "title": "authoritative" })]);
        let rows = editor.rows();
        assert_eq!(rows.borrow()[0]["title"], "authoritative");
    }

    #[tokio::test(start_paused = true)]
    async fn test_numeric_burst_commits_final_number() {
        let (store, editor, meeting, id) = seeded_editor().await;
        let key = FieldKey::new(id, "leads_count");

        editor.edit_numeric(key.clone(), "12").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        editor.edit_numeric(key.clone(), "123").unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(store.update_count(), 1);
        let rows = store.fetch(Table::Agendas, meeting).await.unwrap();
        assert_eq!(rows[0]["leads_count"], 123);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_numeric_clears_without_committing_zero() {
        let (store, editor, meeting, id) = seeded_editor().await;
        let key = FieldKey::new(id, "leads_count");

        editor.edit_numeric(key.clone(), "").unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(store.update_count(), 0);
        let rows = editor.rows();
        assert!(rows.borrow()[0]["leads_count"].is_null());
        // the store still has the old value
        let stored = store.fetch(Table::Agendas, meeting).await.unwrap();
        assert_eq!(stored[0]["leads_count"], 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_cancels_a_pending_numeric_commit() {
        let (store, editor, _meeting, id) = seeded_editor().await;
        let key = FieldKey::new(id, "leads_count");

        editor.edit_numeric(key.clone(), "12").unwrap();
        editor.edit_numeric(key.clone(), "").unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(store.update_count(), 0);
        assert!(!editor.has_pending(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_numeric_input_rejected() {
        let (store, editor, _meeting, id) = seeded_editor().await;
        let key = FieldKey::new(id, "leads_count");

        assert!(editor.edit_numeric(key.clone(), "12x").is_err());
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(store.update_count(), 0);
        let rows = editor.rows();
        assert_eq!(rows.borrow()[0]["leads_count"], 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_quiet_period_timers() {
        let (store, editor, _meeting, id) = seeded_editor().await;

        editor.edit(FieldKey::new(id, "title"), FieldValue::from("doomed"));
        drop(editor);
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(store.update_count(), 0);
    }
}

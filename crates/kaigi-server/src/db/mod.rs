use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use kaigi_core::Table;

use crate::error::AppError;

/// Database connection wrapper.
///
/// Every collection is stored as a document table: the canonical row image
/// lives in a `data` jsonb column, with `id` and `meeting_id` lifted out
/// for filtering. The JSON object a client edits is exactly what lands on
/// disk.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Columns a client may touch through the field-update path. Everything
/// else (ids, timestamps, status) moves through dedicated endpoints.
pub fn editable_columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Agendas => &[
            "title",
            "detail",
            "content",
            "action_items",
            "agenda_number",
            "sort_order",
        ],
        Table::SalesMetrics => &["leads_count", "appointments_count", "contracts_count"],
        Table::SalesStatus => &[
            "company_name",
            "status_text",
            "next_action",
            "next_action_date",
            "sort_order",
        ],
        Table::DevProjects => &[
            "project_type",
            "project_name",
            "signal",
            "temperature",
            "status_text",
            "sort_order",
        ],
        Table::Announcements => &["content"],
        Table::FreeTopics => &["content", "sort_order"],
        Table::Debates => &[
            "theme",
            "pro_side",
            "con_side",
            "memo",
            "duration_minutes",
            "timer_state",
        ],
        _ => &[],
    }
}

fn order_clause(table: Table) -> &'static str {
    if table.sorts_by_position() {
        " ORDER BY (data->>'sort_order')::bigint NULLS LAST, data->>'created_at'"
    } else if table.sorts_by_created() {
        " ORDER BY data->>'created_at'"
    } else {
        ""
    }
}

impl Database {
    /// Connect to the database
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Insert a row image; `id` (and `meeting_id` where present) must
    /// already be set on it.
    pub async fn insert_row(&self, table: Table, row: &Value) -> Result<(), AppError> {
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| AppError::BadRequest("row is missing an id".to_string()))?;
        let meeting_id = row
            .get("meeting_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok());

        let sql = format!(
            "INSERT INTO {} (id, meeting_id, data) VALUES ($1, $2, $3)",
            table.as_str()
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(meeting_id)
            .bind(row)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All rows matching the meeting filter; catalog rows (no meeting id)
    /// match every filter.
    pub async fn fetch_rows(
        &self,
        table: Table,
        meeting_id: Uuid,
    ) -> Result<Vec<Value>, AppError> {
        let sql = format!(
            "SELECT data FROM {} WHERE meeting_id = $1 OR meeting_id IS NULL{}",
            table.as_str(),
            order_clause(table)
        );
        let rows = sqlx::query_scalar::<_, Value>(&sql)
            .bind(meeting_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    pub async fn fetch_one_row(
        &self,
        table: Table,
        meeting_id: Uuid,
    ) -> Result<Option<Value>, AppError> {
        Ok(self.fetch_rows(table, meeting_id).await?.into_iter().next())
    }

    /// One row by primary key.
    pub async fn get_row(&self, table: Table, id: Uuid) -> Result<Option<Value>, AppError> {
        let sql = format!("SELECT data FROM {} WHERE id = $1", table.as_str());
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Merge a top-level patch into a row's image, returning the new image.
    pub async fn update_row_fields(
        &self,
        table: Table,
        id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let sql = format!(
            "UPDATE {} SET data = data || $2::jsonb WHERE id = $1 RETURNING data",
            table.as_str()
        );
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .bind(Value::Object(patch.clone()))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Delete a row, returning the removed image.
    pub async fn delete_row(&self, table: Table, id: Uuid) -> Result<Option<Value>, AppError> {
        let sql = format!("DELETE FROM {} WHERE id = $1 RETURNING data", table.as_str());
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Every meeting, newest date first.
    pub async fn list_meetings(&self) -> Result<Vec<Value>, AppError> {
        let rows = sqlx::query_scalar::<_, Value>(
            "SELECT data FROM meetings ORDER BY data->>'meeting_date' DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use kaigi_core::Table;
use kaigi_sync::RowStore;

use crate::db::editable_columns;
use crate::error::AppError;
use crate::AppState;

fn parse_table(raw: &str) -> Result<Table, AppError> {
    raw.parse::<Table>()
        .map_err(|err| AppError::BadRequest(err.to_string()))
}

/// Section tables accept row-level writes; meetings, insights and reports
/// only move through their dedicated endpoints.
fn writable(table: Table) -> Result<Table, AppError> {
    if matches!(table, Table::Meetings | Table::AiInsights | Table::Reports) {
        return Err(AppError::BadRequest(format!(
            "table {} is not writable through the row API",
            table
        )));
    }
    Ok(table)
}

/// Fetch a meeting's rows for one table
async fn list_rows(
    State(state): State<AppState>,
    Path((meeting_id, table)): Path<(Uuid, String)>,
) -> Result<Json<Vec<Value>>, AppError> {
    let table = parse_table(&table)?;
    Ok(Json(state.store.fetch(table, meeting_id).await?))
}

/// Insert a row into a meeting's table
async fn insert_row(
    State(state): State<AppState>,
    Path((meeting_id, table)): Path<(Uuid, String)>,
    Json(mut row): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let table = writable(parse_table(&table)?)?;
    let obj = row
        .as_object_mut()
        .ok_or_else(|| AppError::BadRequest("row must be a JSON object".to_string()))?;
    // the path, not the body, decides which meeting a row belongs to
    if table != Table::SalesChannels {
        obj.insert(
            "meeting_id".to_string(),
            Value::String(meeting_id.to_string()),
        );
    }
    let stored = state.store.insert(table, row).await?;
    Ok(Json(stored))
}

/// Request body for a single-field update
#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub field: String,
    pub value: Value,
}

/// Update exactly one field of one row (the debounced-commit write path)
async fn update_field(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, Uuid)>,
    Json(req): Json<UpdateFieldRequest>,
) -> Result<Json<Value>, AppError> {
    let table = writable(parse_table(&table)?)?;
    if !editable_columns(table).contains(&req.field.as_str()) {
        return Err(AppError::BadRequest(format!(
            "field {:?} is not editable on table {}",
            req.field, table
        )));
    }
    state
        .store
        .update_field(table, id, &req.field, req.value)
        .await?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// Delete a row; chat is append-only
async fn delete_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let table = writable(parse_table(&table)?)?;
    if table == Table::ChatMessages {
        return Err(AppError::BadRequest(
            "chat messages cannot be deleted".to_string(),
        ));
    }
    state.store.delete(table, id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Request body for a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_name: String,
    pub user_color: String,
    pub message: String,
}

/// Append a chat message
async fn post_chat(
    State(state): State<AppState>,
    Path(meeting_id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Value>, AppError> {
    let body = req.message.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("message is empty".to_string()));
    }
    let row = serde_json::json!({
        "meeting_id": meeting_id,
        "user_name": req.user_name,
        "user_color": req.user_color,
        "message": body,
    });
    let stored = state.store.insert(Table::ChatMessages, row).await?;
    Ok(Json(stored))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/meetings/{meeting_id}/tables/{table}",
            get(list_rows).post(insert_row),
        )
        .route(
            "/api/tables/{table}/rows/{id}",
            patch(update_field).delete(delete_row),
        )
        .route("/api/meetings/{meeting_id}/chat", post(post_chat))
}

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use kaigi_core::{Meeting, Table};
use kaigi_sync::RowStore;

use crate::error::AppError;
use crate::AppState;

/// Request to create a new meeting
#[derive(Debug, Deserialize)]
pub struct CreateMeetingRequest {
    pub meeting_date: NaiveDate,
}

pub(crate) async fn load_meeting(state: &AppState, id: Uuid) -> Result<Meeting, AppError> {
    let row = state
        .db
        .get_row(Table::Meetings, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Meeting {} not found", id)))?;
    Ok(serde_json::from_value(row)?)
}

fn as_patch(meeting: &Meeting) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(meeting)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal("meeting did not serialize to an object".to_string())),
    }
}

/// List all meetings, newest first
async fn list_meetings(State(state): State<AppState>) -> Result<Json<Vec<Meeting>>, AppError> {
    let rows = state.db.list_meetings().await?;
    let meetings = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<Meeting>(row) {
            Ok(meeting) => Some(meeting),
            Err(err) => {
                tracing::warn!("Skipping undecodable meeting row: {}", err);
                None
            }
        })
        .collect();
    Ok(Json(meetings))
}

/// Create a new draft meeting
async fn create_meeting(
    State(state): State<AppState>,
    Json(req): Json<CreateMeetingRequest>,
) -> Result<Json<Meeting>, AppError> {
    let meeting = Meeting::new(req.meeting_date);
    state
        .store
        .insert(Table::Meetings, serde_json::to_value(&meeting)?)
        .await?;
    Ok(Json(meeting))
}

/// Get a meeting by ID
async fn get_meeting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meeting>, AppError> {
    Ok(Json(load_meeting(&state, id).await?))
}

/// Start a meeting (draft -> in_progress); fires insight generation
async fn start_meeting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meeting>, AppError> {
    let mut meeting = load_meeting(&state, id).await?;
    meeting
        .start()
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    state
        .store
        .update_fields(Table::Meetings, id, as_patch(&meeting)?)
        .await?;

    // generation is a side effect of the transition; its failure never
    // fails the transition itself
    let task_state = state.clone();
    tokio::spawn(async move {
        if let Err(err) = crate::api::generate_insights_for(&task_state, id).await {
            tracing::warn!("Insight generation after start failed: {}", err);
        }
    });

    Ok(Json(meeting))
}

/// Complete a meeting (in_progress -> completed); fires report generation
async fn complete_meeting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meeting>, AppError> {
    let mut meeting = load_meeting(&state, id).await?;
    meeting
        .complete()
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    state
        .store
        .update_fields(Table::Meetings, id, as_patch(&meeting)?)
        .await?;

    let task_state = state.clone();
    tokio::spawn(async move {
        if let Err(err) = crate::api::generate_report_for(&task_state, id).await {
            tracing::warn!("Report generation after completion failed: {}", err);
        }
    });

    Ok(Json(meeting))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/meetings", get(list_meetings).post(create_meeting))
        .route("/api/meetings/{meeting_id}", get(get_meeting))
        .route("/api/meetings/{meeting_id}/start", post(start_meeting))
        .route("/api/meetings/{meeting_id}/complete", post(complete_meeting))
}

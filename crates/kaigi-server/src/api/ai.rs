use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use kaigi_core::Table;
use kaigi_sync::RowStore;

use crate::ai::{insight_prompt, report_prompt, MeetingSnapshot};
use crate::api::meetings::load_meeting;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub meeting_id: Uuid,
}

fn decode<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect()
}

fn decode_one<T: serde::de::DeserializeOwned>(row: Option<Value>) -> Option<T> {
    row.and_then(|r| serde_json::from_value(r).ok())
}

async fn load_snapshot(state: &AppState, meeting_id: Uuid) -> Result<MeetingSnapshot, AppError> {
    let meeting = load_meeting(state, meeting_id).await?;

    Ok(MeetingSnapshot {
        meeting,
        agendas: decode(state.store.fetch(Table::Agendas, meeting_id).await?),
        sales_metrics: decode(state.store.fetch(Table::SalesMetrics, meeting_id).await?),
        sales_status: decode(state.store.fetch(Table::SalesStatus, meeting_id).await?),
        dev_projects: decode(state.store.fetch(Table::DevProjects, meeting_id).await?),
        announcement: decode_one(state.store.fetch_one(Table::Announcements, meeting_id).await?),
        free_topics: decode(state.store.fetch(Table::FreeTopics, meeting_id).await?),
        debate: decode_one(state.store.fetch_one(Table::Debates, meeting_id).await?),
    })
}

/// Generate insight bullets for a meeting and store them.
pub(crate) async fn generate_insights_for(
    state: &AppState,
    meeting_id: Uuid,
) -> Result<Value, AppError> {
    let snapshot = load_snapshot(state, meeting_id).await?;
    let prompt = insight_prompt(&snapshot);
    let text = state.generator.generate(&prompt).await.map_err(|err| {
        tracing::error!("Insight generation failed: {}", err);
        AppError::Generation
    })?;

    let row = json!({
        "meeting_id": meeting_id,
        "section_type": "general",
        "insight_type": "summary",
        "title": "AI Summary",
        "content": text,
        "priority": 1,
    });
    let stored = state.store.insert(Table::AiInsights, row).await?;
    Ok(stored)
}

/// Generate the final report for a meeting and store it.
pub(crate) async fn generate_report_for(
    state: &AppState,
    meeting_id: Uuid,
) -> Result<Value, AppError> {
    let snapshot = load_snapshot(state, meeting_id).await?;
    let prompt = report_prompt(&snapshot);
    let text = state.generator.generate(&prompt).await.map_err(|err| {
        tracing::error!("Report generation failed: {}", err);
        AppError::Generation
    })?;

    let row = json!({
        "meeting_id": meeting_id,
        "content": text,
        "generated_at": Utc::now().to_rfc3339(),
    });
    let stored = state.store.insert(Table::Reports, row).await?;
    Ok(stored)
}

async fn generate_insights(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<Value>, AppError> {
    let insight = generate_insights_for(&state, req.meeting_id).await?;
    Ok(Json(json!({ "success": true, "insight": insight })))
}

async fn generate_report(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<Value>, AppError> {
    let report = generate_report_for(&state, req.meeting_id).await?;
    Ok(Json(json!({ "success": true, "report": report })))
}

/// Latest generated report for a meeting; missing is a rendered 404, not
/// an error
async fn get_report(
    State(state): State<AppState>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let rows = state.store.fetch(Table::Reports, meeting_id).await?;
    rows.into_iter()
        .max_by_key(|row| {
            row.get("generated_at")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Report for meeting {} not found", meeting_id)))
}

/// All generated insights for a meeting
async fn list_insights(
    State(state): State<AppState>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<Vec<Value>>, AppError> {
    Ok(Json(state.store.fetch(Table::AiInsights, meeting_id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/generate-insights", post(generate_insights))
        .route("/api/generate-report", post(generate_report))
        .route("/api/meetings/{meeting_id}/report", get(get_report))
        .route("/api/meetings/{meeting_id}/insights", get(list_insights))
}

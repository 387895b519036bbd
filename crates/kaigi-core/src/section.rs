use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An agenda item, numbered and ordered within the meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agenda {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub agenda_number: i32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_items: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which funnel a sales channel reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsType {
    Leads,
    Attack,
}

/// Catalog row describing a sales channel; not meeting-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesChannel {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub metrics_type: MetricsType,
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Monthly funnel counts for one channel in one meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesMetric {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub channel_id: Uuid,
    pub year_month: String,
    #[serde(default)]
    pub leads_count: i64,
    #[serde(default)]
    pub appointments_count: i64,
    #[serde(default)]
    pub contracts_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_channel: Option<SalesChannel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-deal pipeline status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesStatus {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action_date: Option<NaiveDate>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Client,
    Internal,
}

/// Health signal on a dev project; wire values follow the product's
/// Japanese labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectSignal {
    #[serde(rename = "インシデント")]
    Incident,
    #[serde(rename = "順調")]
    OnTrack,
    #[serde(rename = "要調整")]
    NeedsAdjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectTemperature {
    #[serde(rename = "普通")]
    Normal,
    #[serde(rename = "良好")]
    Good,
}

/// One row per tracked development project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevProject {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub project_type: ProjectType,
    pub project_name: String,
    pub signal: ProjectSignal,
    pub temperature: ProjectTemperature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Free-form announcement; at most one per meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub meeting_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeTopic {
    pub id: Uuid,
    pub meeting_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

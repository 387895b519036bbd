use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generated insight for one section of a meeting. Write-once per
/// generation, read-many.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiInsight {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub section_type: String,
    pub insight_type: String,
    pub title: String,
    pub content: String,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

/// Generated end-of-meeting report, keyed by meeting id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

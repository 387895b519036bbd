use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only chat entry; no edit, no delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub user_name: String,
    pub user_color: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        meeting_id: Uuid,
        user_name: impl Into<String>,
        user_color: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            meeting_id,
            user_name: user_name.into(),
            user_color: user_color.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

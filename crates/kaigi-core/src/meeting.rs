use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

/// Lifecycle of a meeting: draft -> in_progress -> completed, monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Draft,
    InProgress,
    Completed,
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeetingStatus::Draft => write!(f, "draft"),
            MeetingStatus::InProgress => write!(f, "in_progress"),
            MeetingStatus::Completed => write!(f, "completed"),
        }
    }
}

impl MeetingStatus {
    /// Whether the lifecycle permits moving from `self` to `next`.
    /// No back-transitions, no skipping.
    pub fn can_transition_to(self, next: MeetingStatus) -> bool {
        matches!(
            (self, next),
            (MeetingStatus::Draft, MeetingStatus::InProgress)
                | (MeetingStatus::InProgress, MeetingStatus::Completed)
        )
    }
}

/// Top-level meeting record; every section entity references one by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub meeting_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Create a new draft meeting for the given date.
    pub fn new(meeting_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            meeting_date,
            start_time: None,
            end_time: None,
            participants: None,
            status: MeetingStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start the meeting (draft -> in_progress), stamping `start_time`.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(MeetingStatus::InProgress)?;
        self.start_time = Some(self.updated_at);
        Ok(())
    }

    /// Complete the meeting (in_progress -> completed), stamping `end_time`.
    pub fn complete(&mut self) -> Result<(), CoreError> {
        self.transition(MeetingStatus::Completed)?;
        self.end_time = Some(self.updated_at);
        Ok(())
    }

    fn transition(&mut self, next: MeetingStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting() -> Meeting {
        Meeting::new(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
    }

    #[test]
    fn test_new_meeting_is_draft() {
        let m = meeting();
        assert_eq!(m.status, MeetingStatus::Draft);
        assert!(m.start_time.is_none());
        assert!(m.end_time.is_none());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut m = meeting();
        m.start().unwrap();
        assert_eq!(m.status, MeetingStatus::InProgress);
        assert!(m.start_time.is_some());

        m.complete().unwrap();
        assert_eq!(m.status, MeetingStatus::Completed);
        assert!(m.end_time.is_some());
    }

    #[test]
    fn test_cannot_complete_draft() {
        let mut m = meeting();
        let err = m.complete().unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: "draft".to_string(),
                to: "completed".to_string(),
            }
        );
        assert_eq!(m.status, MeetingStatus::Draft);
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut m = meeting();
        m.start().unwrap();
        assert!(m.start().is_err());
        assert_eq!(m.status, MeetingStatus::InProgress);
    }

    #[test]
    fn test_no_back_transitions() {
        assert!(!MeetingStatus::Completed.can_transition_to(MeetingStatus::InProgress));
        assert!(!MeetingStatus::InProgress.can_transition_to(MeetingStatus::Draft));
        assert!(!MeetingStatus::Completed.can_transition_to(MeetingStatus::Draft));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&MeetingStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let s: MeetingStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(s, MeetingStatus::Completed);
    }
}

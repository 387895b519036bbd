use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback duration (seconds) when a record carries no total.
const DEFAULT_TOTAL_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Stopped,
    Running,
    /// Reserved; no transition produces it.
    Paused,
}

/// Canonical countdown state, persisted on the debate row. The persisted
/// record is the only synchronization channel between clients; each client
/// projects `remaining` forward locally while `status` is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub remaining: u32,
    #[serde(default)]
    pub total_duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Outcome of one local 1 Hz tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not running; nothing happened.
    Idle,
    /// One second consumed.
    Decremented,
    /// The countdown crossed zero: status is now stopped and the caller
    /// must persist the convergent stop() write.
    Finished,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            status: TimerStatus::Stopped,
            remaining: DEFAULT_TOTAL_SECS,
            total_duration: DEFAULT_TOTAL_SECS,
            started_at: None,
        }
    }
}

impl TimerState {
    /// State written by start(durationMinutes).
    pub fn started(minutes: u32, now: DateTime<Utc>) -> Self {
        let secs = minutes * 60;
        Self {
            status: TimerStatus::Running,
            remaining: secs,
            total_duration: secs,
            started_at: Some(now),
        }
    }

    /// State written by an explicit stop: remaining is zeroed rather than
    /// preserved (end-of-debate semantics, not pause).
    pub fn stopped(&self) -> Self {
        Self {
            status: TimerStatus::Stopped,
            remaining: 0,
            total_duration: if self.total_duration == 0 {
                DEFAULT_TOTAL_SECS
            } else {
                self.total_duration
            },
            started_at: None,
        }
    }

    /// "+1 minute": legal in any status.
    pub fn extended(&self) -> Self {
        Self {
            remaining: self.remaining + 60,
            total_duration: self.total_duration + 60,
            ..self.clone()
        }
    }

    /// State written by setDuration(minutes); only meaningful while not
    /// running, which the caller enforces.
    pub fn with_duration(minutes: u32) -> Self {
        let secs = minutes * 60;
        Self {
            status: TimerStatus::Stopped,
            remaining: secs,
            total_duration: secs,
            started_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Advance the local projection by one second. The zero check runs
    /// before the decrement, so a countdown of N seconds finishes on tick
    /// N + 1, transitioning locally to stopped.
    pub fn tick(&mut self) -> Tick {
        if self.status != TimerStatus::Running {
            return Tick::Idle;
        }
        if self.remaining == 0 {
            self.status = TimerStatus::Stopped;
            return Tick::Finished;
        }
        self.remaining -= 1;
        Tick::Decremented
    }
}

/// One debate record per meeting, created lazily the first time the debate
/// view finds none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debate {
    pub id: Uuid,
    pub meeting_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pro_side: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub con_side: Option<String>,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default)]
    pub timer_state: TimerState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stopped_five_minutes() {
        let t = TimerState::default();
        assert_eq!(t.status, TimerStatus::Stopped);
        assert_eq!(t.remaining, 300);
        assert_eq!(t.total_duration, 300);
    }

    #[test]
    fn test_start_five_minutes() {
        let t = TimerState::started(5, Utc::now());
        assert_eq!(t.status, TimerStatus::Running);
        assert_eq!(t.remaining, 300);
        assert_eq!(t.total_duration, 300);
        assert!(t.started_at.is_some());
    }

    #[test]
    fn test_stop_zeroes_remaining_keeps_total() {
        let mut t = TimerState::started(5, Utc::now());
        t.remaining = 123;
        let stopped = t.stopped();
        assert_eq!(stopped.status, TimerStatus::Stopped);
        assert_eq!(stopped.remaining, 0);
        assert_eq!(stopped.total_duration, 300);
    }

    #[test]
    fn test_stop_defaults_missing_total() {
        let t = TimerState {
            status: TimerStatus::Running,
            remaining: 10,
            total_duration: 0,
            started_at: None,
        };
        assert_eq!(t.stopped().total_duration, 300);
    }

    #[test]
    fn test_extend() {
        let t = TimerState {
            status: TimerStatus::Running,
            remaining: 45,
            total_duration: 300,
            started_at: None,
        };
        let e = t.extended();
        assert_eq!(e.remaining, 105);
        assert_eq!(e.total_duration, 360);
        assert_eq!(e.status, TimerStatus::Running);
    }

    #[test]
    fn test_extend_while_stopped() {
        let e = TimerState::default().stopped().extended();
        assert_eq!(e.status, TimerStatus::Stopped);
        assert_eq!(e.remaining, 60);
        assert_eq!(e.total_duration, 360);
    }

    #[test]
    fn test_set_duration_overrides_everything() {
        let t = TimerState::with_duration(3);
        assert_eq!(t.status, TimerStatus::Stopped);
        assert_eq!(t.remaining, 180);
        assert_eq!(t.total_duration, 180);
    }

    #[test]
    fn test_tick_counts_down() {
        let mut t = TimerState::started(1, Utc::now());
        assert_eq!(t.tick(), Tick::Decremented);
        assert_eq!(t.remaining, 59);
    }

    #[test]
    fn test_tick_finishes_one_past_zero() {
        let mut t = TimerState::started(5, Utc::now());
        for _ in 0..300 {
            assert_eq!(t.tick(), Tick::Decremented);
        }
        assert_eq!(t.remaining, 0);
        assert_eq!(t.status, TimerStatus::Running);

        // tick 301 crosses zero
        assert_eq!(t.tick(), Tick::Finished);
        assert_eq!(t.status, TimerStatus::Stopped);
        assert_eq!(t.remaining, 0);
    }

    #[test]
    fn test_tick_while_stopped_is_idle() {
        let mut t = TimerState::default();
        assert_eq!(t.tick(), Tick::Idle);
        assert_eq!(t.remaining, 300);
    }

    #[test]
    fn test_remaining_never_exceeds_total() {
        let mut t = TimerState::started(2, Utc::now());
        assert!(t.remaining <= t.total_duration);
        t.tick();
        let e = t.extended();
        assert!(e.remaining <= e.total_duration);
        assert!(t.stopped().remaining <= t.stopped().total_duration);
    }

    #[test]
    fn test_wire_format_camel_case() {
        let t = TimerState::started(1, Utc::now());
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["totalDuration"], 60);
        assert!(json.get("startedAt").is_some());
        assert!(json.get("total_duration").is_none());

        // records written before totalDuration existed still deserialize
        let old: TimerState =
            serde_json::from_str(r#"{"status":"stopped","remaining":0}"#).unwrap();
        assert_eq!(old.total_duration, 0);
    }
}

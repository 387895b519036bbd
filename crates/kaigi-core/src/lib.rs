pub mod chat;
pub mod debate;
pub mod error;
pub mod field;
pub mod insight;
pub mod meeting;
pub mod presence;
pub mod section;
pub mod table;

pub use chat::ChatMessage;
pub use debate::{Debate, Tick, TimerState, TimerStatus};
pub use error::CoreError;
pub use field::{parse_numeric, FieldKey, FieldValue};
pub use insight::{AiInsight, Report};
pub use meeting::{Meeting, MeetingStatus};
pub use presence::{PresenceRecord, Roster, DEFAULT_SECTION, PRESENCE_PALETTE};
pub use section::{
    Agenda, Announcement, DevProject, FreeTopic, MetricsType, ProjectSignal, ProjectTemperature,
    ProjectType, SalesChannel, SalesMetric, SalesStatus,
};
pub use table::{Table, SYNCED_TABLES};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Every synchronized collection, by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Meetings,
    Agendas,
    SalesChannels,
    SalesMetrics,
    SalesStatus,
    DevProjects,
    Announcements,
    FreeTopics,
    Debates,
    ChatMessages,
    AiInsights,
    Reports,
}

/// The section tables plus debate and chat: everything a meeting session
/// keeps a live subscription on.
pub const SYNCED_TABLES: [Table; 8] = [
    Table::Agendas,
    Table::SalesMetrics,
    Table::SalesStatus,
    Table::DevProjects,
    Table::Announcements,
    Table::FreeTopics,
    Table::Debates,
    Table::ChatMessages,
];

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Meetings => "meetings",
            Table::Agendas => "agendas",
            Table::SalesChannels => "sales_channels",
            Table::SalesMetrics => "sales_metrics",
            Table::SalesStatus => "sales_status",
            Table::DevProjects => "dev_projects",
            Table::Announcements => "announcements",
            Table::FreeTopics => "free_topics",
            Table::Debates => "debates",
            Table::ChatMessages => "chat_messages",
            Table::AiInsights => "ai_insights",
            Table::Reports => "reports",
        }
    }

    /// Sibling rows are returned in explicit `sort_order`; insertion order is
    /// not guaranteed by the store.
    pub fn sorts_by_position(self) -> bool {
        matches!(
            self,
            Table::Agendas | Table::SalesChannels | Table::SalesStatus | Table::DevProjects | Table::FreeTopics
        )
    }

    /// Chat is the one append-only feed, ordered by creation time.
    pub fn sorts_by_created(self) -> bool {
        self == Table::ChatMessages
    }

    /// Tables with at most one row per meeting.
    pub fn singleton_per_meeting(self) -> bool {
        matches!(self, Table::Announcements | Table::Debates)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meetings" => Ok(Table::Meetings),
            "agendas" => Ok(Table::Agendas),
            "sales_channels" => Ok(Table::SalesChannels),
            "sales_metrics" => Ok(Table::SalesMetrics),
            "sales_status" => Ok(Table::SalesStatus),
            "dev_projects" => Ok(Table::DevProjects),
            "announcements" => Ok(Table::Announcements),
            "free_topics" => Ok(Table::FreeTopics),
            "debates" => Ok(Table::Debates),
            "chat_messages" => Ok(Table::ChatMessages),
            "ai_insights" => Ok(Table::AiInsights),
            "reports" => Ok(Table::Reports),
            other => Err(CoreError::UnknownTable(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for table in [
            Table::Meetings,
            Table::Agendas,
            Table::SalesChannels,
            Table::SalesMetrics,
            Table::SalesStatus,
            Table::DevProjects,
            Table::Announcements,
            Table::FreeTopics,
            Table::Debates,
            Table::ChatMessages,
            Table::AiInsights,
            Table::Reports,
        ] {
            assert_eq!(table.as_str().parse::<Table>().unwrap(), table);
            let json = serde_json::to_string(&table).unwrap();
            assert_eq!(json, format!("\"{}\"", table.as_str()));
        }
    }

    #[test]
    fn test_unknown_table() {
        assert!("workbooks".parse::<Table>().is_err());
    }

    #[test]
    fn test_ordering_rules() {
        assert!(Table::Agendas.sorts_by_position());
        assert!(!Table::SalesMetrics.sorts_by_position());
        assert!(Table::ChatMessages.sorts_by_created());
        assert!(Table::Debates.singleton_per_meeting());
        assert!(Table::Announcements.singleton_per_meeting());
        assert!(!Table::FreeTopics.singleton_per_meeting());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Display colors participants are assigned from, at random, on join.
pub const PRESENCE_PALETTE: [&str; 8] = [
    "#E74C3C", "#3498DB", "#2ECC71", "#9B59B6", "#F39C12", "#1ABC9C", "#E67E22", "#95A5A6",
];

/// The section a participant lands in when first joining.
pub const DEFAULT_SECTION: &str = "agenda";

/// Ephemeral record of who is viewing/editing what. Never persisted; its
/// lifecycle is bound to channel membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub participant_id: Uuid,
    pub name: String,
    pub color: String,
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl PresenceRecord {
    /// Fresh record for a participant entering the meeting.
    pub fn joining(participant_id: Uuid, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            participant_id,
            name: name.into(),
            color: color.into(),
            section: DEFAULT_SECTION.to_string(),
            field: None,
        }
    }

    /// Re-publication of this record with a refreshed editing location.
    pub fn at(&self, section: impl Into<String>, field: Option<String>) -> Self {
        Self {
            section: section.into(),
            field,
            ..self.clone()
        }
    }
}

/// The live set of participants: the union, keyed by participant id, of the
/// most recent record each currently-connected participant published.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    records: HashMap<Uuid, PresenceRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a participant's latest record.
    pub fn publish(&mut self, record: PresenceRecord) {
        self.records.insert(record.participant_id, record);
    }

    /// Drop a participant (explicit leave or transport timeout).
    pub fn remove(&mut self, participant_id: Uuid) -> Option<PresenceRecord> {
        self.records.remove(&participant_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, participant_id: Uuid) -> Option<&PresenceRecord> {
        self.records.get(&participant_id)
    }

    /// Stable snapshot for broadcasting, ordered by name then id.
    pub fn to_vec(&self) -> Vec<PresenceRecord> {
        let mut out: Vec<_> = self.records.values().cloned().collect();
        out.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.participant_id.cmp(&b.participant_id))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_joiners_roster_of_two() {
        let mut roster = Roster::new();
        roster.publish(PresenceRecord::joining(Uuid::new_v4(), "Aya", "#E74C3C"));
        roster.publish(PresenceRecord::joining(Uuid::new_v4(), "Ben", "#3498DB"));
        assert_eq!(roster.len(), 2);

        let names: Vec<_> = roster.to_vec().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Aya", "Ben"]);
    }

    #[test]
    fn test_republish_replaces_not_duplicates() {
        let id = Uuid::new_v4();
        let mut roster = Roster::new();
        let me = PresenceRecord::joining(id, "Aya", "#E74C3C");
        roster.publish(me.clone());
        roster.publish(me.at("debate", Some("theme".to_string())));

        assert_eq!(roster.len(), 1);
        let current = roster.get(id).unwrap();
        assert_eq!(current.section, "debate");
        assert_eq!(current.field.as_deref(), Some("theme"));
    }

    #[test]
    fn test_leave_shrinks_roster() {
        let id = Uuid::new_v4();
        let mut roster = Roster::new();
        roster.publish(PresenceRecord::joining(id, "Aya", "#E74C3C"));
        roster.publish(PresenceRecord::joining(Uuid::new_v4(), "Ben", "#3498DB"));

        roster.remove(id);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.to_vec()[0].name, "Ben");
    }

    #[test]
    fn test_joining_defaults() {
        let r = PresenceRecord::joining(Uuid::new_v4(), "Aya", "#E74C3C");
        assert_eq!(r.section, DEFAULT_SECTION);
        assert!(r.field.is_none());
    }
}

use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use uuid::Uuid;

use kaigi_core::{PresenceRecord, Roster, PRESENCE_PALETTE};

struct MeetingPresence {
    roster: Roster,
    tx: watch::Sender<Vec<PresenceRecord>>,
}

impl MeetingPresence {
    fn new() -> Self {
        Self {
            roster: Roster::new(),
            tx: watch::channel(Vec::new()).0,
        }
    }

    fn broadcast(&self) {
        self.tx.send_replace(self.roster.to_vec());
    }
}

/// Per-meeting ephemeral presence transport. Keeps the latest record per
/// currently-joined participant and rebroadcasts the roster on every
/// join/update/leave. Nothing here touches durable storage.
#[derive(Default)]
pub struct PresenceHub {
    meetings: RwLock<HashMap<Uuid, MeetingPresence>>,
}

impl PresenceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant; membership lasts until the returned handle
    /// is dropped (explicit leave or disconnect).
    pub fn join(self: &Arc<Self>, meeting_id: Uuid, record: PresenceRecord) -> PresenceHandle {
        let participant_id = record.participant_id;
        let mut meetings = self.meetings.write().unwrap();
        let presence = meetings.entry(meeting_id).or_insert_with(MeetingPresence::new);
        presence.roster.publish(record);
        presence.broadcast();
        PresenceHandle {
            hub: Arc::clone(self),
            meeting_id,
            participant_id,
        }
    }

    /// Replace a participant's record (editing-location updates are plain
    /// re-publications).
    pub fn publish(&self, meeting_id: Uuid, record: PresenceRecord) {
        let mut meetings = self.meetings.write().unwrap();
        if let Some(presence) = meetings.get_mut(&meeting_id) {
            presence.roster.publish(record);
            presence.broadcast();
        }
    }

    fn leave(&self, meeting_id: Uuid, participant_id: Uuid) {
        let mut meetings = self.meetings.write().unwrap();
        if let Some(presence) = meetings.get_mut(&meeting_id) {
            presence.roster.remove(participant_id);
            presence.broadcast();
        }
    }

    /// Live roster for a meeting.
    pub fn roster(&self, meeting_id: Uuid) -> watch::Receiver<Vec<PresenceRecord>> {
        let mut meetings = self.meetings.write().unwrap();
        meetings
            .entry(meeting_id)
            .or_insert_with(MeetingPresence::new)
            .tx
            .subscribe()
    }
}

/// Channel membership; dropping it removes the participant from the roster.
pub struct PresenceHandle {
    hub: Arc<PresenceHub>,
    meeting_id: Uuid,
    participant_id: Uuid,
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        self.hub.leave(self.meeting_id, self.participant_id);
    }
}

/// A participant's own view of the presence channel: generates the session
/// identity and color on join, republishes on navigation.
pub struct PresenceChannel {
    hub: Arc<PresenceHub>,
    meeting_id: Uuid,
    me: PresenceRecord,
    _membership: PresenceHandle,
}

impl PresenceChannel {
    /// Join a meeting's channel under a fresh session id and a random
    /// palette color. The id does not survive a reload.
    pub fn join(hub: Arc<PresenceHub>, meeting_id: Uuid, name: &str) -> Self {
        let participant_id = Uuid::new_v4();
        let color = PRESENCE_PALETTE[rand::thread_rng().gen_range(0..PRESENCE_PALETTE.len())];
        let me = PresenceRecord::joining(participant_id, name, color);
        let membership = hub.join(meeting_id, me.clone());
        Self {
            hub,
            meeting_id,
            me,
            _membership: membership,
        }
    }

    /// Move this participant's editing location.
    pub fn update_section(&mut self, section: &str, field: Option<&str>) {
        self.me = self.me.at(section, field.map(str::to_string));
        self.hub.publish(self.meeting_id, self.me.clone());
    }

    pub fn me(&self) -> &PresenceRecord {
        &self.me
    }

    pub fn roster(&self) -> watch::Receiver<Vec<PresenceRecord>> {
        self.hub.roster(self.meeting_id)
    }
}

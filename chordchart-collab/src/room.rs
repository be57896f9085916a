//! Current-room bookkeeping.
//!
//! A session is in at most one room. The room becomes current as soon as the
//! join is sent; `room_joined` then replaces the roster wholesale, while
//! `user_joined`/`user_left` patch it.

use crate::protocol::Participant;

/// The current room and who is in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: String,
    pub participants: Vec<Participant>,
}

impl RoomInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            participants: Vec::new(),
        }
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }
}

/// Room lifecycle events delivered to `on_room` subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Server confirmed the join; carries the full roster.
    Joined(RoomInfo),
    /// This session left the room (explicitly, by switching, or on disconnect).
    Left { room_id: String },
    ParticipantJoined {
        room_id: String,
        participant: Participant,
    },
    ParticipantLeft { room_id: String, user_id: String },
}

#[derive(Debug, Default)]
pub struct RoomSession {
    current: Option<RoomInfo>,
    rejoin: Option<String>,
}

impl RoomSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&RoomInfo> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|room| room.id.as_str())
    }

    pub fn is_current(&self, room_id: &str) -> bool {
        self.current_id() == Some(room_id)
    }

    /// Make `room_id` current with an empty roster.
    pub fn enter(&mut self, room_id: &str) {
        self.current = Some(RoomInfo::new(room_id));
    }

    /// Leave the current room, returning it.
    pub fn take(&mut self) -> Option<RoomInfo> {
        self.current.take()
    }

    /// Replace the roster from a `room_joined` confirmation.
    ///
    /// Returns the updated room, or `None` if `room_id` is not current.
    pub fn apply_joined(
        &mut self,
        room_id: &str,
        participants: Vec<Participant>,
    ) -> Option<&RoomInfo> {
        let room = self.current.as_mut().filter(|room| room.id == room_id)?;
        room.participants = participants;
        Some(&*room)
    }

    /// Add or refresh a participant. Returns `false` if `room_id` is not current.
    pub fn add_participant(&mut self, room_id: &str, participant: Participant) -> bool {
        let Some(room) = self.current.as_mut().filter(|room| room.id == room_id) else {
            return false;
        };
        match room
            .participants
            .iter_mut()
            .find(|p| p.user_id == participant.user_id)
        {
            Some(existing) => *existing = participant,
            None => room.participants.push(participant),
        }
        true
    }

    /// Remove a participant. Returns `false` if `room_id` is not current.
    pub fn remove_participant(&mut self, room_id: &str, user_id: &str) -> bool {
        let Some(room) = self.current.as_mut().filter(|room| room.id == room_id) else {
            return false;
        };
        room.participants.retain(|p| p.user_id != user_id);
        true
    }

    /// Remember a room to re-join once the session is ready again.
    pub fn set_rejoin(&mut self, room_id: Option<String>) {
        self.rejoin = room_id;
    }

    pub fn take_rejoin(&mut self) -> Option<String> {
        self.rejoin.take()
    }
}

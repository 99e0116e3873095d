//! # Room Registry
//!
//! Authoritative map of room name to room state: the shared secret set by
//! whoever created the room, and the set of currently connected members.
//!
//! The registry itself is plain data. It is owned by the
//! [`SignalingRelay`](crate::relay::SignalingRelay) actor, whose mailbox
//! serializes every mutation, so create-or-authenticate is atomic and two
//! concurrent first-joins can never both win with different secrets.

use std::collections::{hash_map::Entry, HashMap};

use thiserror::Error;
use tracing::{debug, error, trace};
use uuid::Uuid;

use huddle_protocol::RoomId;

/// Identity of one live connection, assigned by the transport layer.
pub type ConnectionId = Uuid;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("room & password required")]
    MissingCredentials,

    #[error("wrong password")]
    WrongPassword,
}

#[derive(Debug)]
pub struct Member {
    pub role: String,
}

/// A single password-gated room.
///
/// The secret is fixed by the first successful join and immutable afterwards.
#[derive(Debug)]
pub struct Room {
    secret: String,
    members: HashMap<ConnectionId, Member>,
}

impl Room {
    fn locked_with(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            members: HashMap::new(),
        }
    }
}

/// All rooms known to this process.
///
/// Rooms are created implicitly on first join and never destroyed: a room
/// whose last member left stays in the map, keeping its secret, until the
/// process exits. Known limitation, kept on purpose.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    /// Not an authorization check: an existing room is returned untouched.
    fn create_or_get(&mut self, room_id: &RoomId, secret: &str) -> (&mut Room, bool) {
        match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(Room::locked_with(secret)), true),
        }
    }

    /// First join wins: an unknown room is created with the caller's secret,
    /// an existing one only accepts the secret it was created with.
    ///
    /// Returns whether the room was created.
    pub fn create_or_authenticate(
        &mut self,
        room_id: &RoomId,
        secret: &str,
    ) -> Result<bool, JoinError> {
        let (room, created) = self.create_or_get(room_id, secret);
        if created {
            debug!("room created: {}", room_id);
        } else if room.secret != secret {
            return Err(JoinError::WrongPassword);
        }
        Ok(created)
    }

    /// `true` iff the room exists and the secret matches exactly.
    pub fn authenticate(&self, room_id: &RoomId, secret: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|room| room.secret == secret)
            .unwrap_or(false)
    }

    /// Idempotent: re-adding a member replaces its role.
    pub fn add_member(&mut self, room_id: &RoomId, connection_id: ConnectionId, role: impl Into<String>) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.members.insert(connection_id, Member { role: role.into() });
        } else {
            error!("tried to add member to unknown room {:?}", room_id);
        }
    }

    /// No-op if the member (or the room) is absent. The room survives even
    /// when its last member is removed.
    pub fn remove_member(&mut self, room_id: &RoomId, connection_id: &ConnectionId) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            if let Some(member) = room.members.remove(connection_id) {
                trace!("removed {} ({}) from {}", connection_id, member.role, room_id);
            }
        }
    }

    /// Relay fan-out target set: everyone in the room but the sender.
    pub fn members_except(&self, room_id: &RoomId, connection_id: &ConnectionId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| {
                room.members
                    .keys()
                    .filter(|member| *member != connection_id)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Notification fan-out target set: the whole room.
    pub fn all_members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map(|room| room.members.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::from("r1")
    }

    #[test]
    fn first_join_creates_the_room() {
        let mut registry = RoomRegistry::default();
        assert_eq!(registry.create_or_authenticate(&room(), "p"), Ok(true));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn first_secret_becomes_canonical() {
        let mut registry = RoomRegistry::default();
        registry.create_or_authenticate(&room(), "winner").unwrap();

        assert_eq!(
            registry.create_or_authenticate(&room(), "loser"),
            Err(JoinError::WrongPassword)
        );
        assert_eq!(registry.create_or_authenticate(&room(), "winner"), Ok(false));
    }

    #[test]
    fn authenticate_rejects_unknown_rooms() {
        let registry = RoomRegistry::default();
        assert!(!registry.authenticate(&room(), "p"));
    }

    #[test]
    fn authenticate_matches_exactly() {
        let mut registry = RoomRegistry::default();
        registry.create_or_authenticate(&room(), "p").unwrap();
        assert!(registry.authenticate(&room(), "p"));
        assert!(!registry.authenticate(&room(), "P"));
        assert!(!registry.authenticate(&room(), ""));
    }

    #[test]
    fn add_member_is_idempotent_and_replaces_the_role() {
        let mut registry = RoomRegistry::default();
        registry.create_or_authenticate(&room(), "p").unwrap();

        let member = ConnectionId::new_v4();
        registry.add_member(&room(), member, "viewer");
        registry.add_member(&room(), member, "presenter");

        assert_eq!(registry.member_count(&room()), 1);
        let role = &registry.rooms[&room()].members[&member].role;
        assert_eq!(role, "presenter");
    }

    #[test]
    fn remove_member_tolerates_absent_members() {
        let mut registry = RoomRegistry::default();
        registry.create_or_authenticate(&room(), "p").unwrap();
        registry.remove_member(&room(), &ConnectionId::new_v4());
        registry.remove_member(&RoomId::from("nowhere"), &ConnectionId::new_v4());
    }

    #[test]
    fn empty_rooms_survive_and_keep_their_secret() {
        let mut registry = RoomRegistry::default();
        registry.create_or_authenticate(&room(), "p").unwrap();

        let member = ConnectionId::new_v4();
        registry.add_member(&room(), member, "presenter");
        registry.remove_member(&room(), &member);

        assert_eq!(registry.member_count(&room()), 0);
        assert_eq!(registry.room_count(), 1);
        assert!(registry.authenticate(&room(), "p"));
    }

    #[test]
    fn members_except_excludes_only_the_sender() {
        let mut registry = RoomRegistry::default();
        registry.create_or_authenticate(&room(), "p").unwrap();

        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();
        let c = ConnectionId::new_v4();
        registry.add_member(&room(), a, "presenter");
        registry.add_member(&room(), b, "viewer");
        registry.add_member(&room(), c, "viewer");

        let mut others = registry.members_except(&room(), &a);
        others.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(others, expected);
    }

    #[test]
    fn lone_member_relays_to_nobody() {
        let mut registry = RoomRegistry::default();
        registry.create_or_authenticate(&room(), "p").unwrap();

        let a = ConnectionId::new_v4();
        registry.add_member(&room(), a, "presenter");
        assert!(registry.members_except(&room(), &a).is_empty());
    }

    #[test]
    fn all_members_includes_everyone() {
        let mut registry = RoomRegistry::default();
        registry.create_or_authenticate(&room(), "p").unwrap();

        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();
        registry.add_member(&room(), a, "presenter");
        registry.add_member(&room(), b, "viewer");

        assert_eq!(registry.all_members(&room()).len(), 2);
        assert!(registry.all_members(&RoomId::from("nowhere")).is_empty());
    }
}

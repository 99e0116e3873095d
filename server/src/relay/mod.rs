//! # Signaling Relay
//!
//! One instance binding many connections to rooms.
//!
//! Owns the [`RoomRegistry`] and the per-connection session bindings, and
//! fans negotiation messages out to everyone else in the sender's room.
//! Runs as a [`hannibal::Service`], so all of this state is only ever
//! touched from one mailbox.

use std::collections::HashMap;

use hannibal::Sender;
use prometheus::IntGauge;
use tracing::{debug, trace};

use huddle_protocol::RoomId;

use crate::registry::{ConnectionId, JoinError, RoomRegistry};

mod actor;
pub mod command;
pub mod message;

use self::message::Outbound;

pub struct SignalingRelay {
    registry: RoomRegistry,
    /// at most one room per connection
    bindings: HashMap<ConnectionId, RoomId>,
    connections: HashMap<ConnectionId, Sender<Outbound>>,
    open_rooms: Option<IntGauge>,
    bound_connections: Option<IntGauge>,
}

impl Default for SignalingRelay {
    fn default() -> Self {
        Self {
            registry: RoomRegistry::default(),
            bindings: HashMap::new(),
            connections: HashMap::new(),
            open_rooms: None,
            bound_connections: None,
        }
    }
}

impl SignalingRelay {
    /// Create-or-authenticate, then move the binding.
    ///
    /// A connection that was already bound somewhere else is taken out of its
    /// old room first, so membership and binding never diverge.
    fn join(
        &mut self,
        connection_id: ConnectionId,
        room: RoomId,
        password: &str,
        role: String,
    ) -> Result<(), JoinError> {
        if room.is_empty() || password.is_empty() {
            return Err(JoinError::MissingCredentials);
        }

        self.registry.create_or_authenticate(&room, password)?;

        if let Some(previous) = self.bindings.insert(connection_id, room.clone()) {
            if previous != room {
                debug!("{} moves from {} to {}", connection_id, previous, room);
                self.registry.remove_member(&previous, &connection_id);
            }
        }
        self.registry.add_member(&room, connection_id, role);
        Ok(())
    }

    /// Everyone the sender's message goes to, or `None` for unbound senders.
    fn signal_targets(&self, connection_id: &ConnectionId) -> Option<Vec<ConnectionId>> {
        let room = self.bindings.get(connection_id)?;
        Some(self.registry.members_except(room, connection_id))
    }

    /// Everyone currently bound to the room; file events have no sender to
    /// exclude.
    fn broadcast_targets(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.registry.all_members(room)
    }

    /// Unconditional cleanup, safe to run twice for the same connection.
    fn disconnect(&mut self, connection_id: &ConnectionId) {
        self.connections.remove(connection_id);
        if let Some(room) = self.bindings.remove(connection_id) {
            trace!("{} left {}", connection_id, room);
            self.registry.remove_member(&room, connection_id);
        }
    }

    fn update_gauges(&self) {
        if let Some(gauge) = &self.open_rooms {
            gauge.set(self.registry.room_count() as i64);
        }
        if let Some(gauge) = &self.bound_connections {
            gauge.set(self.bindings.len() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(relay: &mut SignalingRelay, id: ConnectionId, room: &str, password: &str) -> Result<(), JoinError> {
        relay.join(id, RoomId::from(room), password, "guest".into())
    }

    #[test]
    fn join_requires_room_and_password() {
        let mut relay = SignalingRelay::default();
        let id = ConnectionId::new_v4();
        assert_eq!(join(&mut relay, id, "", "p"), Err(JoinError::MissingCredentials));
        assert_eq!(join(&mut relay, id, "r1", ""), Err(JoinError::MissingCredentials));
        assert!(relay.signal_targets(&id).is_none());
    }

    #[test]
    fn rejected_join_leaves_no_binding() {
        let mut relay = SignalingRelay::default();
        let creator = ConnectionId::new_v4();
        let intruder = ConnectionId::new_v4();

        join(&mut relay, creator, "r1", "p").unwrap();
        assert_eq!(join(&mut relay, intruder, "r1", "wrong"), Err(JoinError::WrongPassword));

        assert!(relay.signal_targets(&intruder).is_none());
        assert!(!relay.broadcast_targets(&RoomId::from("r1")).contains(&intruder));
    }

    #[test]
    fn signals_from_unbound_connections_go_nowhere() {
        let relay = SignalingRelay::default();
        assert!(relay.signal_targets(&ConnectionId::new_v4()).is_none());
    }

    #[test]
    fn signals_reach_everyone_but_the_sender() {
        let mut relay = SignalingRelay::default();
        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();
        join(&mut relay, a, "r1", "p").unwrap();
        join(&mut relay, b, "r1", "p").unwrap();

        assert_eq!(relay.signal_targets(&a), Some(vec![b]));
        assert_eq!(relay.signal_targets(&b), Some(vec![a]));
    }

    #[test]
    fn rooms_do_not_leak_into_each_other() {
        let mut relay = SignalingRelay::default();
        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();
        join(&mut relay, a, "r1", "p").unwrap();
        join(&mut relay, b, "r2", "q").unwrap();

        assert_eq!(relay.signal_targets(&a), Some(vec![]));
        assert_eq!(relay.signal_targets(&b), Some(vec![]));
    }

    #[test]
    fn rejoining_moves_the_membership() {
        let mut relay = SignalingRelay::default();
        let mover = ConnectionId::new_v4();
        let resident = ConnectionId::new_v4();
        join(&mut relay, resident, "r1", "p").unwrap();
        join(&mut relay, mover, "r1", "p").unwrap();

        join(&mut relay, mover, "r2", "q").unwrap();

        // no stale entry left behind in r1
        assert_eq!(relay.signal_targets(&resident), Some(vec![]));
        assert_eq!(relay.broadcast_targets(&RoomId::from("r2")), vec![mover]);
    }

    #[test]
    fn rejoining_the_same_room_is_harmless() {
        let mut relay = SignalingRelay::default();
        let a = ConnectionId::new_v4();
        join(&mut relay, a, "r1", "p").unwrap();
        join(&mut relay, a, "r1", "p").unwrap();

        assert_eq!(relay.broadcast_targets(&RoomId::from("r1")), vec![a]);
    }

    #[test]
    fn disconnect_clears_binding_and_membership() {
        let mut relay = SignalingRelay::default();
        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();
        join(&mut relay, a, "r1", "p").unwrap();
        join(&mut relay, b, "r1", "p").unwrap();

        relay.disconnect(&a);

        assert!(relay.signal_targets(&a).is_none());
        // b relays to nobody now: the member set minus b is empty
        assert_eq!(relay.signal_targets(&b), Some(vec![]));
        assert_eq!(relay.broadcast_targets(&RoomId::from("r1")), vec![b]);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut relay = SignalingRelay::default();
        let a = ConnectionId::new_v4();
        join(&mut relay, a, "r1", "p").unwrap();

        relay.disconnect(&a);
        relay.disconnect(&a);
        relay.disconnect(&ConnectionId::new_v4());
    }

    #[test]
    fn broadcasts_cover_the_room_at_call_time_only() {
        let mut relay = SignalingRelay::default();
        let early = ConnectionId::new_v4();
        join(&mut relay, early, "r1", "p").unwrap();

        assert_eq!(relay.broadcast_targets(&RoomId::from("r1")), vec![early]);

        // a later join is not targeted retroactively by anything already sent
        let late = ConnectionId::new_v4();
        join(&mut relay, late, "r1", "p").unwrap();
        let mut now = relay.broadcast_targets(&RoomId::from("r1"));
        now.sort();
        let mut expected = vec![early, late];
        expected.sort();
        assert_eq!(now, expected);
    }

    #[test]
    fn broadcast_to_an_empty_or_unknown_room_is_a_no_op() {
        let relay = SignalingRelay::default();
        assert!(relay.broadcast_targets(&RoomId::from("r1")).is_empty());
    }
}

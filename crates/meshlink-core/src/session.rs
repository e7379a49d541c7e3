//! Session state and its single-owner controller
//!
//! [`SessionController`] owns the combined session state (roster, log,
//! connection status) and is its only writer. Transport events, sends, the
//! settle timer and teardown are all applied through it as discrete reducer
//! steps, each returning a [`Reaction`]: the network effects to execute and
//! the app events to relay. Because each step is synchronous and runs to
//! completion, read-modify-write on the roster is atomic relative to the
//! event loop driving it.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channel::{AppEvent, Effect};
use crate::config::SessionConfig;
use crate::errors::{MeshlinkResult, SessionError};
use crate::protocol::connection::{ConnectionStatus, StatusEvent};
use crate::protocol::distributor::{Draft, MessageDistributor};
use crate::protocol::message::{Message, Origin};
use crate::protocol::message_log::MessageLog;
use crate::protocol::presence::{Peer, PresenceProtocol};
use crate::protocol::wire::{ChannelName, PresencePayload};
use crate::transport::TransportEvent;
use crate::types::{DisplayName, MessageId, PeerId, RoomId, SystemTimeSource, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Reaction
// ----------------------------------------------------------------------------

/// Output of one reducer step
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub effects: Vec<Effect>,
    pub events: Vec<AppEvent>,
}

impl Reaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn event(&mut self, event: AppEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, other: Reaction) {
        self.effects.extend(other.effects);
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.events.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Session Context
// ----------------------------------------------------------------------------

/// Session-scoped context constructed at join and lent to the protocols
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub room: RoomId,
    pub local_name: DisplayName,
    pub joined_at: Timestamp,
    pub config: SessionConfig,
    /// Peers whose presence has been received; gates the handshake reply
    known_peers: HashSet<PeerId>,
}

impl SessionContext {
    pub fn new(room: RoomId, local_name: DisplayName, joined_at: Timestamp, config: SessionConfig) -> Self {
        Self {
            room,
            local_name,
            joined_at,
            config,
            known_peers: HashSet::new(),
        }
    }

    /// Our presence payload, carrying the display name at the time of the call
    pub fn local_presence(&self) -> PresencePayload {
        PresencePayload {
            display_name: self.local_name.as_str().to_string(),
            joined_at: self.joined_at,
        }
    }

    pub fn is_known(&self, peer_id: &PeerId) -> bool {
        self.known_peers.contains(peer_id)
    }

    /// Mark a peer as known; returns `true` if it was not known before
    pub(crate) fn mark_known(&mut self, peer_id: PeerId) -> bool {
        self.known_peers.insert(peer_id)
    }

    pub(crate) fn forget(&mut self, peer_id: &PeerId) -> bool {
        self.known_peers.remove(peer_id)
    }
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Combined session state; cloned out as a read-only snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    room_id: RoomId,
    local_display_name: String,
    status: ConnectionStatus,
    peers: HashMap<PeerId, Peer>,
    log: MessageLog,
}

/// Read-only view handed to the presentation layer
pub type SessionSnapshot = SessionState;

impl SessionState {
    pub fn new(room_id: RoomId, local_display_name: &DisplayName) -> Self {
        Self {
            room_id,
            local_display_name: local_display_name.as_str().to_string(),
            status: ConnectionStatus::Connecting,
            peers: HashMap::new(),
            log: MessageLog::new(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn local_display_name(&self) -> &str {
        &self.local_display_name
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn peers(&self) -> &HashMap<PeerId, Peer> {
        &self.peers
    }

    pub fn peer(&self, peer_id: &PeerId) -> Option<&Peer> {
        self.peers.get(peer_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Display names of connected peers, sorted for stable presentation
    pub fn peer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.peers.values().map(|p| p.display_name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Log in local arrival order
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn is_local(&self, message: &Message) -> bool {
        message.origin == Origin::Local
    }

    // -- writes, reachable only through the controller and the protocols --

    pub(crate) fn append(&mut self, message: Message) -> AppEvent {
        let message = Arc::new(message);
        self.log.push(Arc::clone(&message));
        AppEvent::MessageAppended { message }
    }

    pub(crate) fn upsert_peer(&mut self, peer: Peer) -> AppEvent {
        self.peers.insert(peer.id, peer.clone());
        AppEvent::PeerUpdated { peer }
    }

    pub(crate) fn remove_peer(&mut self, peer_id: &PeerId) -> Option<Peer> {
        self.peers.remove(peer_id)
    }

    fn set_status(&mut self, status: ConnectionStatus) -> AppEvent {
        self.status = status;
        AppEvent::StatusChanged { status }
    }
}

// ----------------------------------------------------------------------------
// Session Controller
// ----------------------------------------------------------------------------

/// Single owner of a session's state
#[derive(Debug)]
pub struct SessionController<T: TimeSource = SystemTimeSource> {
    context: SessionContext,
    state: SessionState,
    time_source: T,
    torn_down: bool,
}

impl SessionController<SystemTimeSource> {
    pub fn with_system_time(room: RoomId, local_name: DisplayName, config: SessionConfig) -> Self {
        Self::new(room, local_name, config, SystemTimeSource)
    }
}

impl<T: TimeSource> SessionController<T> {
    /// Create the state owner for a freshly joined room
    pub fn new(room: RoomId, local_name: DisplayName, config: SessionConfig, time_source: T) -> Self {
        let joined_at = time_source.now();
        let state = SessionState::new(room.clone(), &local_name);
        info!("Session created for room {} as {}", room, local_name);

        Self {
            context: SessionContext::new(room, local_name, joined_at, config),
            state,
            time_source,
            torn_down: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// React to a transport event
    ///
    /// Failures here are peer-caused and never fatal: they are logged and the
    /// step produces whatever partial reaction it had.
    pub fn on_transport_event(&mut self, event: TransportEvent) -> Reaction {
        if self.torn_down {
            debug!("Discarding {:?} after teardown", event);
            return Reaction::new();
        }

        let now = self.time_source.now();
        match event {
            TransportEvent::PeerConnected { peer_id } => {
                PresenceProtocol::on_peer_connect(&self.context, peer_id).unwrap_or_else(|e| {
                    warn!("Failed to announce presence to {}: {}", peer_id, e);
                    Reaction::new()
                })
            }
            TransportEvent::PeerDisconnected { peer_id } => PresenceProtocol::on_peer_disconnect(
                &mut self.context,
                &mut self.state,
                peer_id,
                now,
            ),
            TransportEvent::PayloadReceived {
                channel: ChannelName::Presence,
                payload,
                from,
            } => match PresencePayload::decode(&payload) {
                Ok(presence) => {
                    PresenceProtocol::on_presence(&mut self.context, &mut self.state, from, presence, now)
                        .unwrap_or_else(|e| {
                            warn!("Failed to complete handshake with {}: {}", from, e);
                            Reaction::new()
                        })
                }
                Err(e) => {
                    warn!("Dropping undecodable presence from {}: {}", from, e);
                    Reaction::new()
                }
            },
            TransportEvent::PayloadReceived {
                channel: ChannelName::Message,
                payload,
                from,
            } => MessageDistributor::on_message(&mut self.state, &payload, from),
        }
    }

    /// Append a local message and broadcast it
    ///
    /// Validation happens before any mutation; on rejection the log, roster
    /// and network are untouched.
    pub fn send(&mut self, draft: Draft) -> MeshlinkResult<(MessageId, Reaction)> {
        if self.torn_down {
            return Err(SessionError::TornDown.into());
        }
        let now = self.time_source.now();
        MessageDistributor::send(&self.context, &mut self.state, draft, now)
    }

    /// Settle delay elapsed: become `Connected` and broadcast our presence once
    pub fn settle(&mut self) -> MeshlinkResult<Reaction> {
        if self.torn_down {
            return Ok(Reaction::new());
        }

        let status = self.state.status().transition(StatusEvent::SettleElapsed)?;
        let mut reaction = Reaction::new();
        reaction.event(self.state.set_status(status));
        info!("Session for room {} is {}", self.context.room, status);

        reaction.extend(PresenceProtocol::bootstrap(&self.context)?);
        Ok(reaction)
    }

    /// Leave the room; subsequent writes are discarded. Idempotent.
    pub fn tear_down(&mut self) -> Reaction {
        let mut reaction = Reaction::new();
        if self.torn_down {
            return reaction;
        }
        self.torn_down = true;
        info!("Leaving room {}", self.context.room);

        reaction.effect(Effect::LeaveMesh);
        reaction.event(AppEvent::SessionClosed);
        reaction
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::MessageKind;
    use crate::types::MockTimeSource;

    fn controller(name: &str) -> SessionController<MockTimeSource> {
        SessionController::new(
            RoomId::new("LocalNet").unwrap(),
            DisplayName::new(name).unwrap(),
            SessionConfig::default(),
            MockTimeSource::new_at(1_000),
        )
    }

    fn presence_from(name: &str) -> Vec<u8> {
        PresencePayload {
            display_name: name.to_string(),
            joined_at: Timestamp::new(500),
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn test_new_session_is_connecting_and_empty() {
        let session = controller("Alice");
        assert_eq!(session.state().status(), ConnectionStatus::Connecting);
        assert_eq!(session.state().peer_count(), 0);
        assert!(session.state().log().is_empty());
        assert_eq!(session.state().local_display_name(), "Alice");
    }

    #[test]
    fn test_settle_connects_with_zero_peers_and_bootstraps() {
        let mut session = controller("Alice");
        let reaction = session.settle().unwrap();

        assert_eq!(session.state().status(), ConnectionStatus::Connected);
        assert_eq!(
            reaction.events,
            vec![AppEvent::StatusChanged {
                status: ConnectionStatus::Connected
            }]
        );
        assert!(matches!(
            reaction.effects.as_slice(),
            [Effect::Send {
                channel: ChannelName::Presence,
                target: None,
                ..
            }]
        ));

        // The transition fires once
        assert!(session.settle().is_err());
    }

    #[test]
    fn test_undecodable_payloads_are_dropped() {
        let mut session = controller("Alice");
        let from = PeerId::new([9; 8]);

        for channel in [ChannelName::Presence, ChannelName::Message] {
            let reaction = session.on_transport_event(TransportEvent::PayloadReceived {
                channel,
                payload: b"\xff garbage".to_vec(),
                from,
            });
            assert!(reaction.is_empty());
        }
        assert!(session.state().log().is_empty());
        assert_eq!(session.state().peer_count(), 0);
    }

    #[test]
    fn test_teardown_discards_late_writes() {
        let mut session = controller("Alice");
        let reaction = session.tear_down();
        assert_eq!(reaction.effects, vec![Effect::LeaveMesh]);
        assert_eq!(reaction.events, vec![AppEvent::SessionClosed]);
        assert!(session.tear_down().is_empty());

        let bob = PeerId::new([2; 8]);
        let reaction = session.on_transport_event(TransportEvent::PayloadReceived {
            channel: ChannelName::Presence,
            payload: presence_from("Bob"),
            from: bob,
        });
        assert!(reaction.is_empty());
        assert!(session.settle().unwrap().is_empty());
        assert!(matches!(
            session.send(Draft::text("late")),
            Err(crate::MeshlinkError::Session(SessionError::TornDown))
        ));
        assert!(session.state().log().is_empty());
        assert_eq!(session.state().peer_count(), 0);
    }

    #[test]
    fn test_snapshot_is_detached_from_live_state() {
        let mut session = controller("Alice");
        let before = session.snapshot();
        session.send(Draft::text("hello")).unwrap();

        assert!(before.log().is_empty());
        assert_eq!(session.state().log().len(), 1);
        assert_eq!(session.state().log()[0].kind, MessageKind::Text);
    }

    #[test]
    fn test_peer_names_sorted() {
        let mut session = controller("Alice");
        for (byte, name) in [(3u8, "Carol"), (2u8, "Bob")] {
            session.on_transport_event(TransportEvent::PayloadReceived {
                channel: ChannelName::Presence,
                payload: presence_from(name),
                from: PeerId::new([byte; 8]),
            });
        }
        assert_eq!(session.state().peer_names(), vec!["Bob", "Carol"]);
    }

    #[test]
    fn test_snapshot_with_peers_serializes_to_json() {
        let mut session = controller("Alice");
        let bob = PeerId::new([0, 0, 0, 0, 0, 0, 0, 2]);
        session.on_transport_event(TransportEvent::PayloadReceived {
            channel: ChannelName::Presence,
            payload: presence_from("Bob"),
            from: bob,
        });

        let value = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(value["peers"]["0000000000000002"]["display_name"], "Bob");
        assert_eq!(value["log"][0]["content"], "Bob connected.");
    }
}

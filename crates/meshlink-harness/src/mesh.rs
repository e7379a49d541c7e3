//! In-memory mesh transport
//!
//! [`LocalMesh`] implements [`MeshTransport`] inside one process. Every
//! session joined through the same mesh with the same app id and room sees the
//! others as connected peers:
//!
//! - joining fires `PeerConnected` on both sides of every new pair
//! - a send reaches the target, or every other member of the room
//! - leaving fires `PeerDisconnected` at the remaining members and closes the
//!   leaver's event stream
//!
//! Each member has an unbounded inbox drained into its bounded event stream
//! by a forwarding task. Senders never wait on a receiver, so sessions that
//! broadcast to each other at the same time cannot stall one another, and
//! roster events are never dropped. Payloads are delivered in send order per
//! receiver. There is no loss, so tests that need loss or reordering drive
//! the core reducer directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use hashbrown::HashMap;
use meshlink_core::{
    channel::{create_transport_event_channel, TransportEventSender},
    ChannelConfig, ChannelName, MeshConfig, MeshLink, MeshTransport, MeshlinkError, PeerId, Result,
    RoomId, TransportError, TransportEvent, TransportSession,
};
use smallvec::SmallVec;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type RoomKey = (String, String);
type Inbox = mpsc::UnboundedSender<TransportEvent>;
type Members = HashMap<PeerId, Inbox>;

#[derive(Debug)]
struct MeshState {
    available: bool,
    next_peer: u64,
    rooms: HashMap<RoomKey, Members>,
}

fn lock(state: &Mutex<MeshState>) -> MutexGuard<'_, MeshState> {
    // A panic while holding the lock cannot leave the maps half-updated
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Move queued events into a member's stream at the pace it drains them
///
/// Ends once the member leaves and its inbox is dropped, which closes the
/// member's event stream after everything queued has been delivered.
async fn forward(
    peer_id: PeerId,
    mut queued: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: TransportEventSender,
) {
    while let Some(event) = queued.recv().await {
        if outbound.send(event).await.is_err() {
            debug!("{} dropped its event stream", peer_id);
            return;
        }
    }
    debug!("Event stream of {} closed", peer_id);
}

// ----------------------------------------------------------------------------
// Local Mesh
// ----------------------------------------------------------------------------

/// Shared in-process mesh; clones refer to the same mesh
#[derive(Debug, Clone)]
pub struct LocalMesh {
    state: Arc<Mutex<MeshState>>,
    channels: ChannelConfig,
}

impl Default for LocalMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalMesh {
    pub fn new() -> Self {
        Self::with_channel_config(ChannelConfig::testing())
    }

    /// Mesh whose per-member event streams are sized from `channels`
    pub fn with_channel_config(channels: ChannelConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(MeshState {
                available: true,
                next_peer: 1,
                rooms: HashMap::new(),
            })),
            channels,
        }
    }

    /// Make subsequent joins fail with `TransportUnavailable`
    pub fn set_available(&self, available: bool) {
        lock(&self.state).available = available;
    }

    /// Number of sessions currently joined to `room` under the default app id
    pub fn peer_count(&self, room: &RoomId) -> usize {
        self.peer_count_for(&MeshConfig::default(), room)
    }

    pub fn peer_count_for(&self, config: &MeshConfig, room: &RoomId) -> usize {
        let key = (config.app_id.clone(), room.as_str().to_string());
        lock(&self.state).rooms.get(&key).map_or(0, |members| members.len())
    }
}

#[async_trait]
impl MeshTransport for LocalMesh {
    async fn join(&self, room: &RoomId, config: &MeshConfig) -> Result<TransportSession> {
        let key: RoomKey = (config.app_id.clone(), room.as_str().to_string());
        let (outbound, events) = create_transport_event_channel(&self.channels);
        let (inbox, queued) = mpsc::unbounded_channel();

        let (local_peer_id, existing) = {
            let mut state = lock(&self.state);
            if !state.available {
                warn!("Join of room {} rejected: local mesh is offline", room);
                return Err(MeshlinkError::transport_unavailable("local mesh is offline"));
            }

            let local_peer_id = PeerId::new(state.next_peer.to_be_bytes());
            state.next_peer += 1;

            let members = state.rooms.entry(key.clone()).or_default();
            for (peer_id, peer_inbox) in members.iter() {
                let _ = peer_inbox.send(TransportEvent::PeerConnected {
                    peer_id: local_peer_id,
                });
                let _ = inbox.send(TransportEvent::PeerConnected { peer_id: *peer_id });
            }
            let existing = members.len();
            members.insert(local_peer_id, inbox);
            (local_peer_id, existing)
        };
        tokio::spawn(forward(local_peer_id, queued, outbound));
        info!("{} joined room {} ({} already present)", local_peer_id, room, existing);

        Ok(TransportSession {
            local_peer_id,
            link: Box::new(LocalLink {
                state: Arc::clone(&self.state),
                key,
                local_peer_id,
                left: AtomicBool::new(false),
            }),
            events,
        })
    }
}

// ----------------------------------------------------------------------------
// Local Link
// ----------------------------------------------------------------------------

/// Outbound half of a [`LocalMesh`] membership
#[derive(Debug)]
struct LocalLink {
    state: Arc<Mutex<MeshState>>,
    key: RoomKey,
    local_peer_id: PeerId,
    left: AtomicBool,
}

#[async_trait]
impl MeshLink for LocalLink {
    async fn send(&self, channel: ChannelName, payload: Vec<u8>, target: Option<PeerId>) -> Result<()> {
        if self.left.load(Ordering::SeqCst) {
            return Err(TransportError::Closed.into());
        }

        let state = lock(&self.state);
        let recipients: SmallVec<[&Inbox; 8]> = state
            .rooms
            .get(&self.key)
            .map(|members| {
                members
                    .iter()
                    .filter(|(id, _)| **id != self.local_peer_id)
                    .filter(|(id, _)| target.map_or(true, |t| t == **id))
                    .map(|(_, inbox)| inbox)
                    .collect()
            })
            .unwrap_or_default();
        if let (Some(target), true) = (target, recipients.is_empty()) {
            return Err(TransportError::SendFailed {
                channel: channel.to_string(),
                reason: format!("{} is not in the room", target),
            }
            .into());
        }
        debug!(
            "{} delivering {} bytes on {} to {} peer(s)",
            self.local_peer_id,
            payload.len(),
            channel,
            recipients.len()
        );

        for inbox in recipients {
            // A receiver that dropped its stream is not an error for the sender
            let _ = inbox.send(TransportEvent::PayloadReceived {
                channel,
                payload: payload.clone(),
                from: self.local_peer_id,
            });
        }
        Ok(())
    }

    fn connected_peers(&self) -> SmallVec<[PeerId; 8]> {
        let state = lock(&self.state);
        state
            .rooms
            .get(&self.key)
            .map(|members| {
                members
                    .keys()
                    .copied()
                    .filter(|id| *id != self.local_peer_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn leave(&self) {
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }

        let remaining = {
            let mut state = lock(&self.state);
            let Some(members) = state.rooms.get_mut(&self.key) else {
                return;
            };
            members.remove(&self.local_peer_id);
            for (peer_id, inbox) in members.iter() {
                let event = TransportEvent::PeerDisconnected {
                    peer_id: self.local_peer_id,
                };
                if inbox.send(event).is_err() {
                    debug!("{} is no longer listening", peer_id);
                }
            }
            let remaining = members.len();
            if remaining == 0 {
                state.rooms.remove(&self.key);
            }
            remaining
        };
        info!("{} left room {} ({} remaining)", self.local_peer_id, self.key.1, remaining);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

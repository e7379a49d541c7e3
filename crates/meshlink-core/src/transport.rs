//! Mesh transport contract
//!
//! The transport itself (discovery, signaling, NAT traversal, wire encryption)
//! lives outside this crate. It is consumed only through the narrow interface
//! defined here:
//!
//! - [`MeshTransport::join`] attaches to a room and yields a [`TransportSession`]
//! - peer lifecycle and inbound payloads arrive as [`TransportEvent`]s, with
//!   connect always preceding disconnect for the same peer
//! - [`MeshLink::send`] is best-effort: no acknowledgment, no retry, no
//!   ordering across peers, and peers connected after the send completes do
//!   not receive it

use async_trait::async_trait;
use smallvec::SmallVec;

use crate::channel::TransportEventReceiver;
use crate::config::MeshConfig;
use crate::errors::Result;
use crate::protocol::wire::ChannelName;
use crate::types::{PeerId, RoomId};

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Events emitted by a joined transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer connected; fired at most once per logical connection
    PeerConnected { peer_id: PeerId },
    /// A previously connected peer went away
    PeerDisconnected { peer_id: PeerId },
    /// A payload arrived on a named channel
    PayloadReceived {
        channel: ChannelName,
        payload: Vec<u8>,
        from: PeerId,
    },
}

impl TransportEvent {
    /// The remote peer this event concerns
    pub fn peer_id(&self) -> PeerId {
        match self {
            TransportEvent::PeerConnected { peer_id } => *peer_id,
            TransportEvent::PeerDisconnected { peer_id } => *peer_id,
            TransportEvent::PayloadReceived { from, .. } => *from,
        }
    }
}

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// Entry point into the mesh
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Join a room; fails with `TransportUnavailable` if the mesh cannot be established
    async fn join(&self, room: &RoomId, config: &MeshConfig) -> Result<TransportSession>;
}

/// Outbound half of a joined session
#[async_trait]
pub trait MeshLink: Send + Sync {
    /// Send on a channel; `target: None` broadcasts to all currently connected peers
    ///
    /// Must not wait for receivers to drain their event streams: the caller is
    /// usually a session task that is itself a receiver.
    async fn send(&self, channel: ChannelName, payload: Vec<u8>, target: Option<PeerId>)
        -> Result<()>;

    /// Peers currently connected according to the transport
    fn connected_peers(&self) -> SmallVec<[PeerId; 8]>;

    /// Detach from the room and stop event delivery. Idempotent.
    fn leave(&self);
}

/// A joined room: our transport identity, the outbound link and the event stream
pub struct TransportSession {
    pub local_peer_id: PeerId,
    pub link: Box<dyn MeshLink>,
    pub events: TransportEventReceiver,
}

impl core::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransportSession")
            .field("local_peer_id", &self.local_peer_id)
            .finish_non_exhaustive()
    }
}

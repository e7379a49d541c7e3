//! Presence handshake
//!
//! The transport only tells us that a peer connected, not who it is. Display
//! identities are exchanged with a two-step announce/reply handshake on the
//! `presence` channel:
//!
//! 1. On connect we unicast our presence to the new peer. The peer is not
//!    recorded yet because its identity is still unknown.
//! 2. On the first presence from a peer we record it and unicast ours back,
//!    so the initiator learns our identity too.
//! 3. Presence from an already known peer only refreshes the stored record.
//!    It never triggers another reply, which would loop forever between two
//!    synchronized peers.
//!
//! A one-shot broadcast after the settle delay covers peers whose connect
//! event preceded this session's readiness.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::{AppEvent, Effect};
use crate::errors::Result;
use crate::protocol::message::Message;
use crate::protocol::wire::{ChannelName, PresencePayload};
use crate::session::{Reaction, SessionContext, SessionState};
use crate::types::{PeerId, Timestamp};

/// A connected peer whose display identity is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub display_name: String,
    pub joined_at: Timestamp,
}

/// Presence protocol reactions
pub struct PresenceProtocol;

impl PresenceProtocol {
    /// Start the handshake with a newly connected peer
    pub fn on_peer_connect(context: &SessionContext, peer_id: PeerId) -> Result<Reaction> {
        debug!("Peer {} connected, announcing presence", peer_id);
        let mut reaction = Reaction::new();
        reaction.effect(Effect::unicast(
            ChannelName::Presence,
            context.local_presence().encode()?,
            peer_id,
        ));
        Ok(reaction)
    }

    /// Record or refresh a peer from its presence payload
    pub fn on_presence(
        context: &mut SessionContext,
        state: &mut SessionState,
        from: PeerId,
        payload: PresencePayload,
        now: Timestamp,
    ) -> Result<Reaction> {
        let mut reaction = Reaction::new();
        let peer = Peer {
            id: from,
            display_name: payload.display_name,
            joined_at: payload.joined_at,
        };

        if context.is_known(&from) {
            debug!("Refreshing presence for {} ({})", peer.display_name, from);
            reaction.event(state.upsert_peer(peer));
            return Ok(reaction);
        }

        // Encode before touching state so a failure leaves the peer unknown
        let reply = context.local_presence().encode()?;
        context.mark_known(from);

        debug!("Handshake complete with {} ({})", peer.display_name, from);
        let notice = Message::system_notice(format!("{} connected.", peer.display_name), now);
        reaction.event(state.upsert_peer(peer));
        reaction.event(state.append(notice));
        reaction.effect(Effect::unicast(ChannelName::Presence, reply, from));
        Ok(reaction)
    }

    /// Forget a departed peer and note it in the log
    pub fn on_peer_disconnect(
        context: &mut SessionContext,
        state: &mut SessionState,
        peer_id: PeerId,
        now: Timestamp,
    ) -> Reaction {
        let mut reaction = Reaction::new();
        context.forget(&peer_id);

        let display_name = state
            .remove_peer(&peer_id)
            .map(|peer| peer.display_name)
            .unwrap_or_else(|| context.config.unknown_peer_label.clone());
        debug!("Peer {} ({}) disconnected", display_name, peer_id);

        let notice = Message::system_notice(format!("{} disconnected.", display_name), now);
        reaction.event(AppEvent::PeerRemoved {
            peer_id,
            display_name,
        });
        reaction.event(state.append(notice));
        reaction
    }

    /// One-shot broadcast of our presence to everyone connected right now
    pub fn bootstrap(context: &SessionContext) -> Result<Reaction> {
        let mut reaction = Reaction::new();
        reaction.effect(Effect::broadcast(
            ChannelName::Presence,
            context.local_presence().encode()?,
        ));
        Ok(reaction)
    }
}

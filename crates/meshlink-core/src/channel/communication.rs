//! Channel Communication Protocol Types
//!
//! All traffic between the session handle, the controller task and the
//! transport flows through these message types:
//!
//! - `Command`: handle → controller (user intents)
//! - `TransportEvent`: transport → controller (see [`crate::transport`])
//! - `Effect`: controller → transport (network side effects only)
//! - `AppEvent`: controller → presentation (state changes only)

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::errors::MeshlinkResult;
use crate::protocol::connection::ConnectionStatus;
use crate::protocol::distributor::Draft;
use crate::protocol::message::Message;
use crate::protocol::presence::Peer;
use crate::protocol::wire::ChannelName;
use crate::types::{MessageId, PeerId};

// ----------------------------------------------------------------------------
// Command: Handle → Controller
// ----------------------------------------------------------------------------

/// Commands sent from a session handle to the controller task
#[derive(Debug)]
pub enum Command {
    /// Append a local message and broadcast it; replies once the echo is in the log
    Send {
        draft: Draft,
        reply: oneshot::Sender<MeshlinkResult<MessageId>>,
    },
    /// Leave the room and tear the session down
    Leave { reply: oneshot::Sender<()> },
}

// ----------------------------------------------------------------------------
// Effect: Controller → Transport
// ----------------------------------------------------------------------------

/// Network side effects produced by the reducer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Send an encoded payload; `target: None` broadcasts to every connected peer
    Send {
        channel: ChannelName,
        payload: Vec<u8>,
        target: Option<PeerId>,
    },
    /// Detach from the mesh
    LeaveMesh,
}

impl Effect {
    pub fn unicast(channel: ChannelName, payload: Vec<u8>, target: PeerId) -> Self {
        Effect::Send {
            channel,
            payload,
            target: Some(target),
        }
    }

    pub fn broadcast(channel: ChannelName, payload: Vec<u8>) -> Self {
        Effect::Send {
            channel,
            payload,
            target: None,
        }
    }
}

// ----------------------------------------------------------------------------
// AppEvent: Controller → Presentation
// ----------------------------------------------------------------------------

/// State changes relayed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    /// A message (chat or notice) was appended to the log
    MessageAppended { message: Arc<Message> },
    /// A peer was recorded or its presence refreshed
    PeerUpdated { peer: Peer },
    /// A peer left the room
    PeerRemoved {
        peer_id: PeerId,
        display_name: String,
    },
    /// Connection status changed
    StatusChanged { status: ConnectionStatus },
    /// The session was torn down; no further events follow
    SessionClosed,
}

//! MeshLink Protocol Module
//!
//! - `wire`: Channel names and JSON payloads
//! - `message`: Log entries and their origin
//! - `message_log`: Chunked append-only log shared with snapshots
//! - `presence`: Display-identity handshake
//! - `distributor`: Local echo, broadcast and receipt of chat messages
//! - `connection`: Session status state machine

pub mod connection;
pub mod distributor;
pub mod message;
pub mod message_log;
pub mod presence;
pub mod wire;

pub use connection::{ConnectionStatus, StateTransitionError, StatusEvent};
pub use distributor::{AttachmentKind, Draft, MessageDistributor};
pub use message::{Message, MessageKind, Origin, SYSTEM_DISPLAY_NAME};
pub use message_log::MessageLog;
pub use presence::{Peer, PresenceProtocol};
pub use wire::{ChannelName, MessagePayload, PresencePayload};

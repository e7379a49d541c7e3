//! MeshLink Core
//!
//! Presence and message synchronization for a serverless chat room. Peers
//! reach each other through a [`transport::MeshTransport`]; this crate owns
//! everything above it: the presence handshake, the append-only message log,
//! the connection status machine and media encoding.
//!
//! All session state is mutated by a single owner, [`SessionController`],
//! which turns inputs into a [`Reaction`] of network effects and app events.
//! Driving it from an async task lives in `meshlink-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod media;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{AppEvent, Command, Effect};
pub use config::{ChannelConfig, MeshConfig, MeshlinkConfig, SessionConfig, MAX_ATTACHMENT_BYTES};
pub use errors::{MediaError, MeshlinkError, MeshlinkResult, Result, SendError, SessionError, TransportError};
pub use media::{AudioRecorder, DataUrlEncoder, MediaBlob, MediaEncoder, Microphone};
pub use protocol::{
    AttachmentKind, ChannelName, ConnectionStatus, Draft, Message, MessageKind, MessageLog, Origin,
    Peer,
};
pub use session::{Reaction, SessionController, SessionSnapshot, SessionState};
pub use transport::{MeshLink, MeshTransport, TransportEvent, TransportSession};
pub use types::{DisplayName, MessageId, PeerId, RoomId, SystemTimeSource, TimeSource, Timestamp};

#[cfg(any(test, feature = "testing"))]
pub use types::MockTimeSource;

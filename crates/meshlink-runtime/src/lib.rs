//! MeshLink Runtime
//!
//! This crate drives a `meshlink-core` session against a live transport:
//! - `SessionBuilder`: validates identity, joins the room and spawns the task
//! - `SessionTask`: the single owner of session state, one per room
//! - `SessionHandle`: sends, snapshots, app events and leave
//!
//! `meshlink-core` stays free of task orchestration; everything that needs a
//! Tokio runtime lives here.

pub mod builder;
pub mod handle;
pub mod tasks;

pub use builder::SessionBuilder;
pub use handle::{SendOutcome, SessionHandle};
pub use tasks::SessionTask;

// Re-export core types for convenience
pub use meshlink_core::{
    channel::{AppEventReceiver, ChannelError},
    AppEvent, AttachmentKind, ConnectionStatus, Message, MessageKind, MeshlinkConfig,
    MeshlinkError, MeshlinkResult, Origin, Peer, PeerId, SessionSnapshot,
};

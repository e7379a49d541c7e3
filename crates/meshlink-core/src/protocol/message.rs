//! Chat log entries
//!
//! A [`Message`] is immutable once appended to the session log. Its
//! [`Origin`] is fixed at construction: `Local` for our own sends and
//! `Remote(peer)` for anything that arrived over the transport, where the peer
//! is always the transport-supplied sender id.

use serde::{Deserialize, Serialize};

use crate::protocol::wire::MessagePayload;
use crate::types::{MessageId, PeerId, Timestamp};

/// Display name attached to locally generated notices
pub const SYSTEM_DISPLAY_NAME: &str = "System";

// ----------------------------------------------------------------------------
// Message Kind and Origin
// ----------------------------------------------------------------------------

/// Kind of content carried by a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Audio,
    #[serde(rename = "system")]
    SystemNotice,
}

impl MessageKind {
    /// Kinds that carry an encoded blob and are subject to the size ceiling
    pub fn is_attachment(&self) -> bool {
        matches!(self, MessageKind::Image | MessageKind::File | MessageKind::Audio)
    }
}

/// Where a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    Local,
    Remote(PeerId),
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// An entry in the session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub origin: Origin,
    pub display_name: String,
    /// Text, or an opaque encoded blob for attachments
    pub content: String,
    pub attachment_name: Option<String>,
    pub timestamp: Timestamp,
    pub kind: MessageKind,
}

impl Message {
    /// Build a message authored by this session
    pub fn local(
        display_name: &str,
        kind: MessageKind,
        content: String,
        attachment_name: Option<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            origin: Origin::Local,
            display_name: display_name.to_string(),
            content,
            attachment_name,
            timestamp,
            kind,
        }
    }

    /// Build a purely local notice about a roster change
    pub fn system_notice(content: String, timestamp: Timestamp) -> Self {
        Self {
            id: MessageId::generate(),
            origin: Origin::Local,
            display_name: SYSTEM_DISPLAY_NAME.to_string(),
            content,
            attachment_name: None,
            timestamp,
            kind: MessageKind::SystemNotice,
        }
    }

    /// Build a log entry from a payload received from `from`
    ///
    /// Any origin the sender claims is ignored; the transport sender id wins.
    /// A fresh local id is assigned so replayed payloads stay distinct entries.
    pub fn from_remote(payload: MessagePayload, from: PeerId) -> Self {
        Self {
            id: MessageId::generate(),
            origin: Origin::Remote(from),
            display_name: payload.origin_display_name,
            content: payload.content,
            attachment_name: payload.attachment_name,
            timestamp: payload.timestamp,
            kind: payload.kind,
        }
    }

    /// Wire representation broadcast on the message channel
    pub fn to_payload(&self) -> MessagePayload {
        MessagePayload {
            id: self.id.to_string(),
            origin_display_name: self.display_name.clone(),
            content: self.content.clone(),
            attachment_name: self.attachment_name.clone(),
            timestamp: self.timestamp,
            kind: self.kind,
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }
}

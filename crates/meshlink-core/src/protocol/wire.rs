//! Wire payloads for the two logical channels
//!
//! Both channels carry JSON objects with camelCase field names:
//!
//! | Channel    | Payload                                                         |
//! |------------|-----------------------------------------------------------------|
//! | `message`  | `{id, originDisplayName, content, attachmentName?, timestamp, kind}` |
//! | `presence` | `{displayName, joinedAt}`                                       |
//!
//! Payloads are not validated beyond what is needed to decode them.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::protocol::message::MessageKind;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Channel Names
// ----------------------------------------------------------------------------

/// Logical channels multiplexed over the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelName {
    Message,
    Presence,
}

impl ChannelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelName::Message => "message",
            ChannelName::Presence => "presence",
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Presence Payload
// ----------------------------------------------------------------------------

/// Handshake payload announcing a display identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub display_name: String,
    pub joined_at: Timestamp,
}

impl PresencePayload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

// ----------------------------------------------------------------------------
// Message Payload
// ----------------------------------------------------------------------------

/// Chat payload broadcast on the message channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Sender-side token; informational only, receivers assign their own id
    pub id: String,
    pub origin_display_name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    pub timestamp: Timestamp,
    pub kind: MessageKind,
}

impl MessagePayload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

//! Message distribution
//!
//! Outgoing user intents become a local echo plus a broadcast on the
//! `message` channel; incoming payloads become `Remote` log entries.
//!
//! There is no deduplication and no causal ordering. A message reaches exactly
//! the peers that were connected when it was broadcast; nobody catches up later.

use tracing::{debug, warn};

use crate::channel::Effect;
use crate::errors::{MeshlinkResult, SendError};
use crate::protocol::message::{Message, MessageKind};
use crate::protocol::wire::{ChannelName, MessagePayload};
use crate::session::{Reaction, SessionContext, SessionState};
use crate::types::{MessageId, PeerId, Timestamp};

// ----------------------------------------------------------------------------
// Draft
// ----------------------------------------------------------------------------

/// Attachment flavours a user can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    File,
    Audio,
}

impl From<AttachmentKind> for MessageKind {
    fn from(kind: AttachmentKind) -> Self {
        match kind {
            AttachmentKind::Image => MessageKind::Image,
            AttachmentKind::File => MessageKind::File,
            AttachmentKind::Audio => MessageKind::Audio,
        }
    }
}

/// An outgoing message that has not been validated yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    kind: MessageKind,
    content: String,
    attachment_name: Option<String>,
    /// Size of the blob before transport encoding
    raw_size: usize,
}

impl Draft {
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            kind: MessageKind::Text,
            raw_size: content.len(),
            content,
            attachment_name: None,
        }
    }

    /// An encoded attachment; `raw_size` is the blob size before encoding
    pub fn attachment(
        kind: AttachmentKind,
        encoded: String,
        attachment_name: Option<String>,
        raw_size: usize,
    ) -> Self {
        Self {
            kind: kind.into(),
            content: encoded,
            attachment_name,
            raw_size,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn raw_size(&self) -> usize {
        self.raw_size
    }
}

// ----------------------------------------------------------------------------
// Distributor
// ----------------------------------------------------------------------------

/// Message distributor reactions
pub struct MessageDistributor;

impl MessageDistributor {
    /// Check a blob size against the attachment ceiling
    pub fn check_attachment_size(raw_size: usize, max: usize) -> Result<(), SendError> {
        if raw_size > max {
            return Err(SendError::PayloadTooLarge {
                max,
                actual: raw_size,
            });
        }
        Ok(())
    }

    /// Reject drafts that must not reach the log
    pub fn validate(draft: &Draft, max_attachment_bytes: usize) -> Result<(), SendError> {
        if draft.kind.is_attachment() {
            Self::check_attachment_size(draft.raw_size, max_attachment_bytes)?;
        } else if draft.content.trim().is_empty() {
            return Err(SendError::EmptyMessage);
        }
        Ok(())
    }

    /// Echo a draft into the log, then broadcast it
    ///
    /// The echo never waits on the network. With no peers connected the
    /// broadcast reaches nobody but the echo still happens.
    pub fn send(
        context: &SessionContext,
        state: &mut SessionState,
        draft: Draft,
        now: Timestamp,
    ) -> MeshlinkResult<(MessageId, Reaction)> {
        Self::validate(&draft, context.config.max_attachment_bytes)?;

        let message = Message::local(
            context.local_name.as_str(),
            draft.kind,
            draft.content,
            draft.attachment_name,
            now,
        );
        let payload = message.to_payload().encode()?;
        let id = message.id;

        let mut reaction = Reaction::new();
        reaction.event(state.append(message));
        reaction.effect(Effect::broadcast(ChannelName::Message, payload));
        debug!("Queued {:?} message {} for broadcast", draft.kind, id);
        Ok((id, reaction))
    }

    /// Append a payload received from `from`
    pub fn on_message(state: &mut SessionState, payload: &[u8], from: PeerId) -> Reaction {
        let mut reaction = Reaction::new();
        match MessagePayload::decode(payload) {
            Ok(payload) => {
                reaction.event(state.append(Message::from_remote(payload, from)));
            }
            Err(e) => warn!("Dropping undecodable message from {}: {}", from, e),
        }
        reaction
    }
}

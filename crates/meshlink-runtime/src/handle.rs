//! Session Handle
//!
//! The user-facing side of a joined session. Every write is forwarded to the
//! controller task as a [`Command`]; reads come from the published snapshot.

use meshlink_core::{
    channel::{AppEventReceiver, CommandSender},
    media::prepare_attachment,
    AttachmentKind, AudioRecorder, Command, Draft, MediaBlob, MediaEncoder, MeshlinkError, MeshlinkResult,
    MessageId, PeerId, RoomId, SessionError, SessionSnapshot,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of a send that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Echoed into the local log and handed to the transport
    Echoed(MessageId),
    /// The session was already torn down; nothing happened
    Discarded,
}

impl SendOutcome {
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            SendOutcome::Echoed(id) => Some(*id),
            SendOutcome::Discarded => None,
        }
    }
}

/// Handle to a joined session
pub struct SessionHandle {
    local_peer_id: PeerId,
    room: RoomId,
    max_attachment_bytes: usize,
    command_sender: CommandSender,
    snapshots: watch::Receiver<SessionSnapshot>,
    app_event_receiver: Option<AppEventReceiver>,
    task_handle: Option<JoinHandle<MeshlinkResult<()>>>,
}

impl SessionHandle {
    pub(crate) fn new(
        local_peer_id: PeerId,
        room: RoomId,
        max_attachment_bytes: usize,
        command_sender: CommandSender,
        snapshots: watch::Receiver<SessionSnapshot>,
        app_event_receiver: AppEventReceiver,
        task_handle: JoinHandle<MeshlinkResult<()>>,
    ) -> Self {
        Self {
            local_peer_id,
            room,
            max_attachment_bytes,
            command_sender,
            snapshots,
            app_event_receiver: Some(app_event_receiver),
            task_handle: Some(task_handle),
        }
    }

    /// Our identity on the transport
    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Check if the controller task is still running
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    // ------------------------------------------------------------------------
    // Sends
    // ------------------------------------------------------------------------

    /// Send a text message; blank text is rejected with `EmptyMessage`
    pub async fn send_text(&self, text: impl Into<String>) -> MeshlinkResult<SendOutcome> {
        self.send_draft(Draft::text(text)).await
    }

    /// Encode and send a file or image
    ///
    /// The size ceiling is checked before encoding begins.
    pub async fn send_attachment(
        &self,
        blob: MediaBlob,
        encoder: &dyn MediaEncoder,
    ) -> MeshlinkResult<SendOutcome> {
        let draft = prepare_attachment(blob, encoder, self.max_attachment_bytes).await?;
        self.send_draft(draft).await
    }

    /// Stop a running recording and send it as a voice note
    pub async fn send_voice_note(
        &self,
        recorder: &mut AudioRecorder,
        encoder: &dyn MediaEncoder,
    ) -> MeshlinkResult<SendOutcome> {
        let media = recorder.stop(encoder).await?;
        self.send_draft(media.into_draft(AttachmentKind::Audio, None)).await
    }

    async fn send_draft(&self, draft: Draft) -> MeshlinkResult<SendOutcome> {
        let (reply, response) = oneshot::channel();
        if self.command_sender.send(Command::Send { draft, reply }).await.is_err() {
            debug!("Send after teardown discarded");
            return Ok(SendOutcome::Discarded);
        }

        match response.await {
            Ok(Ok(id)) => Ok(SendOutcome::Echoed(id)),
            Ok(Err(MeshlinkError::Session(SessionError::TornDown))) | Err(_) => {
                debug!("Send after teardown discarded");
                Ok(SendOutcome::Discarded)
            }
            Ok(Err(e)) => Err(e),
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Current session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified whenever a new snapshot is published
    pub fn watch_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Leave the room and wait for the controller task to stop. Idempotent.
    pub async fn leave(&mut self) -> MeshlinkResult<()> {
        let Some(task_handle) = self.task_handle.take() else {
            return Ok(());
        };
        info!("Leaving room {}", self.room);

        let (reply, done) = oneshot::channel();
        if self.command_sender.send(Command::Leave { reply }).await.is_ok() {
            let _ = done.await;
        }

        match task_handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Session task ended abnormally: {}", e);
                Err(MeshlinkError::channel_error(format!("Session task panicked: {}", e)))
            }
        }
    }
}

impl core::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("local_peer_id", &self.local_peer_id)
            .field("room", &self.room)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

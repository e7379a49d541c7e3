//! Session Builder API
//!
//! Joins a room over a [`MeshTransport`] and spawns the controller task,
//! returning a [`SessionHandle`] for sends, snapshots and leave.

use std::time::Duration;

use meshlink_core::{
    channel::{create_app_event_channel, create_command_channel},
    DisplayName, MeshTransport, MeshlinkConfig, MeshlinkResult, RoomId, SessionController,
    SystemTimeSource, TimeSource,
};
use tokio::sync::watch;
use tracing::{error, info};

use crate::handle::SessionHandle;
use crate::tasks::SessionTask;

// ----------------------------------------------------------------------------
// Session Builder
// ----------------------------------------------------------------------------

/// Builder for joining a room
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    display_name: String,
    room: String,
    config: MeshlinkConfig,
}

impl SessionBuilder {
    /// Start building a session for `display_name` in `room`
    pub fn new(display_name: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            room: room.into(),
            config: MeshlinkConfig::default(),
        }
    }

    /// Set the MeshLink configuration
    pub fn with_config(mut self, config: MeshlinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the delay before the presence bootstrap and `Connected`
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.session.settle_delay = delay;
        self
    }

    /// Join the room on the wall clock
    pub async fn join(self, transport: &dyn MeshTransport) -> MeshlinkResult<SessionHandle> {
        self.join_with_time_source(transport, SystemTimeSource).await
    }

    /// Join the room, stamping presence and messages from `time_source`
    ///
    /// Nothing is spawned unless the transport join succeeds.
    pub async fn join_with_time_source<T>(
        self,
        transport: &dyn MeshTransport,
        time_source: T,
    ) -> MeshlinkResult<SessionHandle>
    where
        T: TimeSource + Send + 'static,
    {
        let room = RoomId::new(&self.room)?;
        let display_name = DisplayName::new(&self.display_name)?;

        let session = transport.join(&room, &self.config.mesh).await.map_err(|e| {
            error!("Failed to join room {}: {}", room, e);
            e
        })?;
        info!("Joined room {} as {} ({})", room, display_name, session.local_peer_id);

        let controller = SessionController::new(
            room.clone(),
            display_name,
            self.config.session.clone(),
            time_source,
        );
        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&self.config.channels);
        let (snapshot_sender, snapshot_receiver) = watch::channel(controller.snapshot());

        let task = SessionTask::new(
            controller,
            session.link,
            command_receiver,
            session.events,
            app_event_sender,
            snapshot_sender,
            self.config.session.settle_delay,
        );
        let task_handle = tokio::spawn(task.run());

        Ok(SessionHandle::new(
            session.local_peer_id,
            room,
            self.config.session.max_attachment_bytes,
            command_sender,
            snapshot_receiver,
            app_event_receiver,
            task_handle,
        ))
    }
}

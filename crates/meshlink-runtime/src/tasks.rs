//! Session controller task
//!
//! One task per joined room owns the [`SessionController`] and is the only
//! place its reducer steps run. The task multiplexes three inputs with
//! `tokio::select!`:
//!
//! - commands from the [`SessionHandle`](crate::SessionHandle)
//! - transport events from the joined mesh
//! - the one-shot settle timer
//!
//! Each step's [`Reaction`] is applied in a fixed order: publish the new
//! snapshot, relay app events, then execute network effects. A local echo is
//! therefore visible before its broadcast leaves the process.

use std::time::Duration;

use meshlink_core::{
    channel::{AppEventSender, ChannelError, CommandReceiver, NonBlockingSend, TransportEventReceiver},
    Command, Effect, MeshLink, MeshlinkResult, Reaction, SessionController,
    SessionSnapshot, TimeSource,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

/// Drives a session controller from its inputs until the session is left
pub struct SessionTask<T: TimeSource> {
    controller: SessionController<T>,
    link: Box<dyn MeshLink>,
    command_receiver: CommandReceiver,
    transport_events: TransportEventReceiver,
    app_event_sender: AppEventSender,
    snapshot_sender: watch::Sender<SessionSnapshot>,
    settle_delay: Duration,
}

impl<T: TimeSource> SessionTask<T> {
    pub fn new(
        controller: SessionController<T>,
        link: Box<dyn MeshLink>,
        command_receiver: CommandReceiver,
        transport_events: TransportEventReceiver,
        app_event_sender: AppEventSender,
        snapshot_sender: watch::Sender<SessionSnapshot>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            controller,
            link,
            command_receiver,
            transport_events,
            app_event_sender,
            snapshot_sender,
            settle_delay,
        }
    }

    /// Run until `Leave`, the last handle is dropped, or the transport closes
    pub async fn run(mut self) -> MeshlinkResult<()> {
        info!("Session task starting for room {}", self.controller.context().room);

        let settle = tokio::time::sleep(self.settle_delay);
        tokio::pin!(settle);
        let mut settled = false;

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(Command::Send { draft, reply }) => {
                            match self.controller.send(draft) {
                                Ok((id, reaction)) => {
                                    self.apply(reaction).await;
                                    let _ = reply.send(Ok(id));
                                }
                                Err(e) => {
                                    debug!("Send rejected: {}", e);
                                    let _ = reply.send(Err(e));
                                }
                            }
                        }
                        Some(Command::Leave { reply }) => {
                            let reaction = self.controller.tear_down();
                            self.apply(reaction).await;
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            info!("All session handles dropped, leaving room");
                            let reaction = self.controller.tear_down();
                            self.apply(reaction).await;
                            break;
                        }
                    }
                }

                event = self.transport_events.recv() => {
                    match event {
                        Some(event) => {
                            let reaction = self.controller.on_transport_event(event);
                            self.apply(reaction).await;
                        }
                        None => {
                            warn!("Transport event stream closed, tearing session down");
                            let reaction = self.controller.tear_down();
                            self.apply(reaction).await;
                            break;
                        }
                    }
                }

                _ = &mut settle, if !settled => {
                    settled = true;
                    match self.controller.settle() {
                        Ok(reaction) => self.apply(reaction).await,
                        Err(e) => warn!("Settle step failed: {}", e),
                    }
                }
            }
        }

        info!("Session task stopped");
        Ok(())
    }

    /// Publish state, relay events, then perform network effects
    async fn apply(&mut self, reaction: Reaction) {
        if !reaction.events.is_empty() {
            self.snapshot_sender.send_replace(self.controller.snapshot());
        }

        for event in reaction.events {
            match self.app_event_sender.try_send_non_blocking(event) {
                Ok(()) => {}
                Err(ChannelError::ChannelFull) => {
                    warn!("App event channel full, dropping event; snapshots remain current")
                }
                // Nobody is listening; snapshots are still published
                Err(ChannelError::ChannelClosed) => {}
            }
        }

        for effect in reaction.effects {
            Self::execute(self.link.as_ref(), effect).await;
        }
    }

    /// Best-effort effect execution; failures are logged and never retried
    async fn execute(link: &dyn MeshLink, effect: Effect) {
        match effect {
            Effect::Send {
                channel,
                payload,
                target,
            } => {
                debug!("Sending {} bytes on {} to {:?}", payload.len(), channel, target);
                if let Err(e) = link.send(channel, payload, target).await {
                    warn!("Send on {} failed: {}", channel, e);
                }
            }
            Effect::LeaveMesh => link.leave(),
        }
    }
}

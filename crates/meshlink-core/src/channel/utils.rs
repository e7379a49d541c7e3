//! Channel aliases and constructors
//!
//! Every channel is a bounded Tokio mpsc channel sized from [`ChannelConfig`].

use core::fmt;

use crate::channel::communication::{AppEvent, Command};
use crate::config::ChannelConfig;
use crate::transport::TransportEvent;

#[derive(Debug, PartialEq, Eq)]
pub enum ChannelError {
    ChannelFull,
    ChannelClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ChannelFull => write!(f, "Channel buffer is full"),
            ChannelError::ChannelClosed => write!(f, "Channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;
pub type TransportEventSender = tokio::sync::mpsc::Sender<TransportEvent>;
pub type TransportEventReceiver = tokio::sync::mpsc::Receiver<TransportEvent>;
pub type AppEventSender = tokio::sync::mpsc::Sender<AppEvent>;
pub type AppEventReceiver = tokio::sync::mpsc::Receiver<AppEvent>;

pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    tokio::sync::mpsc::channel(config.command_buffer_size)
}

pub fn create_transport_event_channel(
    config: &ChannelConfig,
) -> (TransportEventSender, TransportEventReceiver) {
    tokio::sync::mpsc::channel(config.event_buffer_size)
}

pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    tokio::sync::mpsc::channel(config.app_event_buffer_size)
}

/// Send without awaiting buffer space
pub trait NonBlockingSend<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl<T> NonBlockingSend<T> for tokio::sync::mpsc::Sender<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError> {
        self.try_send(message).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}

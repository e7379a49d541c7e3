//! Channel Module
//!
//! This module contains the channel infrastructure between the session handle,
//! the controller task, the transport and the presentation layer:
//! - `communication`: Commands, effects and app events
//! - `utils`: Channel aliases and constructors

pub mod communication;
pub mod utils;

pub use communication::{AppEvent, Command, Effect};

pub use crate::config::ChannelConfig;

pub use utils::{
    create_app_event_channel, create_command_channel, create_transport_event_channel,
    AppEventReceiver, AppEventSender, ChannelError, CommandReceiver, CommandSender,
    NonBlockingSend, TransportEventReceiver, TransportEventSender,
};

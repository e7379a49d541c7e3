//! Error types for the MeshLink core
//!
//! This module contains the error types used by the synchronization layer:
//! transport failures, rejected sends, media capture failures and session
//! lifecycle errors, unified under `MeshlinkError`.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Errors surfaced by the mesh transport contract
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not available: {reason}")]
    TransportUnavailable { reason: String },
    #[error("Send failed on channel {channel}: {reason}")]
    SendFailed { channel: String, reason: String },
    #[error("Transport link closed")]
    Closed,
}

/// Reasons a send is rejected before any state mutation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendError {
    #[error("Payload too large (max {max} bytes, got {actual})")]
    PayloadTooLarge { max: usize, actual: usize },
    #[error("Message is empty")]
    EmptyMessage,
}

/// Media encoding and capture errors
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Media encoding failed: {reason}")]
    Encoding { reason: String },
    #[error("Microphone unavailable: {reason}")]
    MicrophoneUnavailable { reason: String },
    #[error("Recorder state invalid: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Session lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session has been torn down")]
    TornDown,
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for MeshLink
#[derive(Debug, thiserror::Error)]
pub enum MeshlinkError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Send rejected: {0}")]
    Send(#[from] SendError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Wire format error: {0}")]
    Wire(#[from] serde_json::Error),

    #[error("State transition error: {0}")]
    StateTransition(#[from] crate::protocol::connection::StateTransitionError),

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Channel communication error between the handle and the controller task
    #[error("Channel error: {message}")]
    Channel { message: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl MeshlinkError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        MeshlinkError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        MeshlinkError::Channel {
            message: message.into(),
        }
    }

    /// Create a transport unavailable error
    pub fn transport_unavailable<T: Into<String>>(reason: T) -> Self {
        MeshlinkError::Transport(TransportError::TransportUnavailable {
            reason: reason.into(),
        })
    }

    /// Create a payload too large error
    pub fn payload_too_large(max: usize, actual: usize) -> Self {
        MeshlinkError::Send(SendError::PayloadTooLarge { max, actual })
    }

    /// Whether this error was a local rejection that left state untouched
    pub fn is_rejection(&self) -> bool {
        matches!(self, MeshlinkError::Send(_) | MeshlinkError::Media(_))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, MeshlinkError>;
pub type MeshlinkResult<T> = Result<T>;

//! Centralized Configuration Management
//!
//! This module consolidates the configuration structures used by the MeshLink
//! core and runtime so that every component reads its constants from one place.

use core::time::Duration;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Application id shared by every client so they discover each other
pub const DEFAULT_APP_ID: &str = "meshlink-demo-app";

/// Size ceiling for attachment payloads (2 MiB)
pub const MAX_ATTACHMENT_BYTES: usize = 2 * 1024 * 1024;

/// Delay after join before the session reports itself connected
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Name used in notices for peers that never completed a handshake
pub const UNKNOWN_PEER_LABEL: &str = "Unknown Device";

// ----------------------------------------------------------------------------
// Mesh Configuration
// ----------------------------------------------------------------------------

/// Configuration handed to the transport on join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Application namespace; rooms only match within the same app id
    pub app_id: String,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Configuration for a chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Delay before the one-shot presence bootstrap and `Connected` transition
    pub settle_delay: Duration,
    /// Ceiling on attachment size, checked before any echo or network send
    pub max_attachment_bytes: usize,
    /// Display name used when a departing peer never announced itself
    pub unknown_peer_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_attachment_bytes: MAX_ATTACHMENT_BYTES,
            unknown_peer_label: UNKNOWN_PEER_LABEL.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create configuration optimized for testing (short settle delay)
    pub fn testing() -> Self {
        Self {
            settle_delay: Duration::from_millis(10),
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the channels between handle, controller and transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (handle → controller)
    pub command_buffer_size: usize,
    /// Buffer size for transport event channels (transport → controller)
    pub event_buffer_size: usize,
    /// Buffer size for AppEvent channels (controller → presentation)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,   // user intents are infrequent
            event_buffer_size: 128,    // network events can be bursty
            app_event_buffer_size: 64, // UI updates need responsiveness
        }
    }
}

impl ChannelConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            app_event_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Aggregate Configuration
// ----------------------------------------------------------------------------

/// Complete MeshLink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshlinkConfig {
    pub mesh: MeshConfig,
    pub session: SessionConfig,
    pub channels: ChannelConfig,
}

impl MeshlinkConfig {
    pub fn testing() -> Self {
        Self {
            mesh: MeshConfig::default(),
            session: SessionConfig::testing(),
            channels: ChannelConfig::testing(),
        }
    }
}

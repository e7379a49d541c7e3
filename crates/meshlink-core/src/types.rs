//! Core types for MeshLink
//!
//! Newtypes for the identifiers and values that flow through the presence and
//! message layers, so that room names, display names and transport peer ids
//! cannot be confused with one another.

use core::fmt;
use core::ops::Deref;
use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::MeshlinkError;

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Opaque transport identifier for a connected peer
///
/// Serializes as a hex string so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId([u8; 8]);

impl PeerId {
    /// Create a new PeerId from 8 bytes
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Create PeerId from the first 8 bytes of a longer identifier
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut id = [0u8; 8];
        let len = core::cmp::min(bytes.len(), 8);
        id[..len].copy_from_slice(&bytes[..len]);
        Self(id)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for PeerId {
    type Err = MeshlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean_str = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(clean_str)
            .map_err(|_| MeshlinkError::config_error("Invalid hex in PeerId"))?;

        if bytes.len() != 8 {
            return Err(MeshlinkError::config_error("PeerId must be exactly 8 bytes"));
        }

        Ok(Self::from_bytes(&bytes))
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        hex_str.parse().map_err(serde::de::Error::custom)
    }
}

impl Deref for PeerId {
    type Target = [u8; 8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ----------------------------------------------------------------------------
// Message Identifier
// ----------------------------------------------------------------------------

/// Locally generated message token, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(uuid::Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Room and Display Name
// ----------------------------------------------------------------------------

/// Default room joined when none is given
pub const DEFAULT_ROOM: &str = "LocalNet";

/// User-supplied room identifier ("frequency"); trimmed and never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(room: impl AsRef<str>) -> Result<Self, MeshlinkError> {
        let trimmed = room.as_ref().trim();
        if trimmed.is_empty() {
            return Err(MeshlinkError::config_error("Room id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self(DEFAULT_ROOM.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local display identity; trimmed and never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(name: impl AsRef<str>) -> Result<Self, MeshlinkError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(MeshlinkError::config_error("Display name must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the current wall-clock timestamp
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Get duration since another timestamp
    pub fn duration_since(&self, other: Self) -> core::time::Duration {
        core::time::Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Source of timestamps for presence records and messages
///
/// The session controller is generic over this so tests can drive time
/// deterministically.
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(any(test, feature = "testing"))]
mod mock_time {
    use super::{TimeSource, Timestamp};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Mock time source for deterministic testing
    #[derive(Debug, Clone, Default)]
    pub struct MockTimeSource {
        current_time: Arc<AtomicU64>,
    }

    impl MockTimeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_at(start_time: u64) -> Self {
            Self {
                current_time: Arc::new(AtomicU64::new(start_time)),
            }
        }

        /// Advance time by the specified number of milliseconds
        pub fn advance(&self, millis: u64) {
            self.current_time.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl TimeSource for MockTimeSource {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.current_time.load(Ordering::SeqCst))
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub use mock_time::MockTimeSource;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_hex_roundtrip() {
        let peer_id = PeerId::new([1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(peer_id.to_string(), "0102030405060708");
        assert_eq!("0x0102030405060708".parse::<PeerId>().unwrap(), peer_id);
        assert!("0102".parse::<PeerId>().is_err());
        assert!("zz".parse::<PeerId>().is_err());
    }

    #[test]
    fn test_peer_id_serializes_as_hex() {
        let peer_id = PeerId::new([0, 0, 0, 0, 0, 0, 0, 2]);
        let json = serde_json::to_string(&peer_id).unwrap();
        assert_eq!(json, "\"0000000000000002\"");
        assert_eq!(serde_json::from_str::<PeerId>(&json).unwrap(), peer_id);
        assert!(serde_json::from_str::<PeerId>("[0,0,0,0,0,0,0,2]").is_err());
    }

    #[test]
    fn test_peer_id_from_long_bytes() {
        let from_long = PeerId::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(from_long.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_room_and_name_are_trimmed() {
        assert_eq!(RoomId::new("  LocalNet ").unwrap().as_str(), "LocalNet");
        assert_eq!(DisplayName::new("\tAlice\n").unwrap().as_str(), "Alice");
        assert!(RoomId::new("   ").is_err());
        assert!(DisplayName::new("").is_err());
        assert_eq!(RoomId::default().as_str(), DEFAULT_ROOM);
    }

    #[test]
    fn test_mock_time_source_advances() {
        let time = MockTimeSource::new_at(1_000);
        assert_eq!(time.now().as_millis(), 1_000);
        time.advance(250);
        assert_eq!(time.now().as_millis(), 1_250);
        assert_eq!(
            time.now().duration_since(Timestamp::new(1_000)),
            core::time::Duration::from_millis(250)
        );
    }

    #[test]
    fn test_message_ids_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }
}

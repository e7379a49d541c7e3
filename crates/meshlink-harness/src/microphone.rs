//! Scripted microphone for voice-note tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use meshlink_core::media::{CaptureStream, Microphone};
use meshlink_core::MediaError;

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Microphone that either yields a fixed recording or refuses access
#[derive(Debug, Clone)]
pub struct ScriptedMicrophone {
    recording: Option<Vec<u8>>,
    counters: Arc<Counters>,
}

impl ScriptedMicrophone {
    /// Every capture yields `recording`
    pub fn granted(recording: impl Into<Vec<u8>>) -> Self {
        Self {
            recording: Some(recording.into()),
            counters: Arc::default(),
        }
    }

    /// Every acquisition fails as if permission was denied
    pub fn denied() -> Self {
        Self {
            recording: None,
            counters: Arc::default(),
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// True when every acquired capture has been released
    pub fn is_idle(&self) -> bool {
        self.acquisitions() == self.releases()
    }
}

#[async_trait]
impl Microphone for ScriptedMicrophone {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, MediaError> {
        let Some(recording) = &self.recording else {
            return Err(MediaError::MicrophoneUnavailable {
                reason: "permission denied".to_string(),
            });
        };

        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedCapture {
            recording: recording.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedCapture {
    recording: Vec<u8>,
    counters: Arc<Counters>,
}

impl CaptureStream for ScriptedCapture {
    fn stop(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.recording)
    }

    fn release(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

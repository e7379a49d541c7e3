//! Media capture and transport encoding
//!
//! Attachments travel as strings. [`MediaEncoder`] turns a blob into that
//! string form; [`DataUrlEncoder`] produces `data:<mime>;base64,<payload>`
//! URLs. [`AudioRecorder`] is the voice-note state machine
//! `Idle → Recording → Stopping → Idle`, holding the microphone as a scoped
//! resource that is released on every exit from `Recording`.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, error};

use crate::errors::{MediaError, MeshlinkResult};
use crate::protocol::distributor::{AttachmentKind, Draft, MessageDistributor};

/// MIME type recorded voice notes are tagged with
pub const VOICE_NOTE_MIME: &str = "audio/webm";

// ----------------------------------------------------------------------------
// Media Blob
// ----------------------------------------------------------------------------

/// Raw media to be encoded and sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub mime: String,
    pub data: Vec<u8>,
    pub name: Option<String>,
}

impl MediaBlob {
    pub fn new(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            data,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Load a file, guessing its MIME type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| MediaError::Encoding {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        Ok(Self {
            mime: mime.essence_str().to_string(),
            data,
            name,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Images are shown inline; everything else is a downloadable file
    pub fn attachment_kind(&self) -> AttachmentKind {
        if self.mime.starts_with("image/") {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        }
    }
}

// ----------------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------------

/// Blob-to-string encoding capability
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Deterministically encode a blob; fails with `MediaError::Encoding` on unreadable input
    async fn encode(&self, blob: &MediaBlob) -> Result<String, MediaError>;
}

/// Encodes blobs as base64 data URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlEncoder;

#[async_trait]
impl MediaEncoder for DataUrlEncoder {
    async fn encode(&self, blob: &MediaBlob) -> Result<String, MediaError> {
        let valid_mime = blob
            .mime
            .split_once('/')
            .map(|(ty, sub)| !ty.is_empty() && !sub.is_empty())
            .unwrap_or(false)
            && !blob.mime.contains([';', ',', ' ']);
        if !valid_mime {
            return Err(MediaError::Encoding {
                reason: format!("unreadable MIME type {:?}", blob.mime),
            });
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(&blob.data);
        Ok(format!("data:{};base64,{}", blob.mime, encoded))
    }
}

/// Check the ceiling, then encode a blob into a sendable draft
///
/// The size check runs first so oversized blobs are never encoded.
pub async fn prepare_attachment(
    blob: MediaBlob,
    encoder: &dyn MediaEncoder,
    max_attachment_bytes: usize,
) -> MeshlinkResult<Draft> {
    MessageDistributor::check_attachment_size(blob.len(), max_attachment_bytes)?;

    let kind = blob.attachment_kind();
    let encoded = encoder.encode(&blob).await.map_err(|e| {
        error!("Failed to encode attachment {:?}: {}", blob.name, e);
        e
    })?;
    Ok(Draft::attachment(kind, encoded, blob.name, blob.data.len()))
}

// ----------------------------------------------------------------------------
// Microphone
// ----------------------------------------------------------------------------

/// Source of microphone captures
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Acquire the device and start capturing; fails e.g. on denied permission
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, MediaError>;
}

/// An acquired, recording microphone
pub trait CaptureStream: Send {
    /// Stop capturing and take the recorded buffer
    fn stop(&mut self) -> Vec<u8>;

    /// Release the device; called exactly once
    fn release(&mut self);
}

/// Holds an acquired microphone and releases it when dropped
pub struct MicrophoneGuard {
    stream: Box<dyn CaptureStream>,
}

impl MicrophoneGuard {
    fn new(stream: Box<dyn CaptureStream>) -> Self {
        Self { stream }
    }

    fn stop(mut self) -> Vec<u8> {
        self.stream.stop()
    }
}

impl Drop for MicrophoneGuard {
    fn drop(&mut self) {
        self.stream.release();
    }
}

impl core::fmt::Debug for MicrophoneGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MicrophoneGuard").finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Audio Recorder
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
enum RecorderState {
    #[default]
    Idle,
    Recording(MicrophoneGuard),
    Stopping,
}

impl RecorderState {
    fn name(&self) -> &'static str {
        match self {
            RecorderState::Idle => "Idle",
            RecorderState::Recording(_) => "Recording",
            RecorderState::Stopping => "Stopping",
        }
    }
}

/// Returns the recorder to `Idle` when `stop` finishes or is cancelled
struct ResetToIdle<'a>(&'a mut RecorderState);

impl Drop for ResetToIdle<'_> {
    fn drop(&mut self) {
        *self.0 = RecorderState::Idle;
    }
}

/// A finished, encoded voice note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMedia {
    pub encoded: String,
    pub raw_size: usize,
}

impl EncodedMedia {
    pub fn into_draft(self, kind: AttachmentKind, name: Option<String>) -> Draft {
        Draft::attachment(kind, self.encoded, name, self.raw_size)
    }
}

/// Voice-note capture state machine
#[derive(Debug, Default)]
pub struct AudioRecorder {
    state: RecorderState,
}

impl AudioRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording(_))
    }

    /// `Idle → Recording`; on acquisition failure the recorder stays `Idle`
    pub async fn start(&mut self, microphone: &dyn Microphone) -> Result<(), MediaError> {
        if !matches!(self.state, RecorderState::Idle) {
            return Err(MediaError::InvalidState {
                expected: "Idle",
                actual: self.state.name(),
            });
        }

        let stream = microphone.acquire().await?;
        self.state = RecorderState::Recording(MicrophoneGuard::new(stream));
        debug!("Voice note recording started");
        Ok(())
    }

    /// `Recording → Stopping → Idle`, returning the encoded capture
    ///
    /// The microphone is released before encoding begins, so an encoding
    /// failure cannot leak it.
    pub async fn stop(&mut self, encoder: &dyn MediaEncoder) -> Result<EncodedMedia, MediaError> {
        let guard = match core::mem::replace(&mut self.state, RecorderState::Stopping) {
            RecorderState::Recording(guard) => guard,
            other => {
                let actual = other.name();
                self.state = other;
                return Err(MediaError::InvalidState {
                    expected: "Recording",
                    actual,
                });
            }
        };

        let data = guard.stop();
        let reset = ResetToIdle(&mut self.state);
        let blob = MediaBlob::new(VOICE_NOTE_MIME, data);
        let result = encoder.encode(&blob).await;
        drop(reset);

        match result {
            Ok(encoded) => {
                debug!("Voice note captured ({} bytes)", blob.len());
                Ok(EncodedMedia {
                    encoded,
                    raw_size: blob.len(),
                })
            }
            Err(e) => {
                error!("Failed to encode voice note: {}", e);
                Err(e)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

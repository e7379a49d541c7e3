//! Integration tests for the session runtime
//!
//! Sessions run as real controller tasks over the in-memory `LocalMesh`.
//! Tokio time is paused, so settle delays elapse instantly and
//! deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use meshlink_core::{
    AudioRecorder, ChannelConfig, DataUrlEncoder, MediaBlob, MediaEncoder, MediaError, MeshlinkConfig,
    MockTimeSource, RoomId, SendError, TransportError, MAX_ATTACHMENT_BYTES,
};
use meshlink_harness::{LocalMesh, ScriptedMicrophone};
use meshlink_runtime::{
    AppEvent, ConnectionStatus, MeshlinkError, MessageKind, Origin, SendOutcome, SessionBuilder,
    SessionHandle, SessionSnapshot,
};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn join(mesh: &LocalMesh, name: &str) -> SessionHandle {
    init_tracing();
    SessionBuilder::new(name, "LocalNet")
        .with_config(MeshlinkConfig::testing())
        .settle_delay(Duration::from_secs(1))
        .join(mesh)
        .await
        .expect("join should succeed")
}

async fn wait_until(handle: &SessionHandle, mut predicate: impl FnMut(&SessionSnapshot) -> bool) {
    let mut snapshots = handle.watch_snapshots();
    let reached = tokio::time::timeout(Duration::from_secs(30), snapshots.wait_for(|s| predicate(s)))
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false);
    assert!(reached, "condition never reached; last snapshot: {:?}", handle.snapshot());
}

fn notices(snapshot: &SessionSnapshot) -> Vec<String> {
    snapshot
        .log()
        .iter()
        .filter(|m| m.kind == MessageKind::SystemNotice)
        .map(|m| m.content.clone())
        .collect()
}

/// Encoder that counts invocations
#[derive(Default)]
struct CountingEncoder {
    calls: AtomicUsize,
}

#[async_trait]
impl MediaEncoder for CountingEncoder {
    async fn encode(&self, blob: &MediaBlob) -> Result<String, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DataUrlEncoder.encode(blob).await
    }
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_local_net_scenario() {
    let mesh = LocalMesh::new();

    let mut alice = join(&mesh, "Alice").await;
    wait_until(&alice, |s| s.status() == ConnectionStatus::Connected).await;
    assert_eq!(alice.snapshot().peer_count(), 0);

    let mut bob = join(&mesh, "Bob").await;
    wait_until(&alice, |s| s.peer_names() == ["Bob"]).await;
    wait_until(&bob, |s| s.peer_names() == ["Alice"]).await;
    wait_until(&bob, |s| s.status() == ConnectionStatus::Connected).await;
    assert_eq!(notices(&alice.snapshot()), vec!["Bob connected."]);
    assert_eq!(notices(&bob.snapshot()), vec!["Alice connected."]);

    // The echo is in the snapshot by the time the send returns
    let outcome = alice.send_text("hi").await.unwrap();
    let id = outcome.message_id().unwrap();
    let echoed = alice.snapshot().log().last().cloned().unwrap();
    assert_eq!(echoed.id, id);
    assert_eq!(echoed.origin, Origin::Local);

    wait_until(&bob, |s| s.log().iter().any(|m| m.content == "hi")).await;
    let received = bob.snapshot().log().last().cloned().unwrap();
    assert_eq!(received.origin, Origin::Remote(alice.local_peer_id()));
    assert_eq!(received.display_name, "Alice");
    assert_eq!(received.kind, MessageKind::Text);

    bob.leave().await.unwrap();
    wait_until(&alice, |s| s.peer_count() == 0).await;
    assert_eq!(
        notices(&alice.snapshot()),
        vec!["Bob connected.", "Bob disconnected."]
    );

    alice.leave().await.unwrap();
    assert_eq!(mesh.peer_count(&RoomId::default()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_senders_with_small_buffers() {
    const COUNT: usize = 300;
    let channels = ChannelConfig {
        command_buffer_size: 4,
        event_buffer_size: 4,
        app_event_buffer_size: 4,
    };
    let mesh = LocalMesh::with_channel_config(channels.clone());
    let mut config = MeshlinkConfig::testing();
    config.channels = channels;

    let mut sessions = Vec::new();
    for name in ["Alice", "Bob"] {
        let mut handle = SessionBuilder::new(name, "LocalNet")
            .with_config(config.clone())
            .join(&mesh)
            .await
            .unwrap();
        drop(handle.take_app_event_receiver());
        sessions.push(handle);
    }
    for handle in &sessions {
        wait_until(handle, |s| s.peer_count() == 1).await;
    }

    let senders: Vec<_> = sessions
        .into_iter()
        .map(|handle| {
            tokio::spawn(async move {
                for i in 0..COUNT {
                    handle.send_text(format!("message {i}")).await.unwrap();
                }
                handle
            })
        })
        .collect();

    let mut sessions = Vec::new();
    for sender in senders {
        let handle = tokio::time::timeout(Duration::from_secs(30), sender)
            .await
            .expect("senders stalled")
            .unwrap();
        sessions.push(handle);
    }

    for handle in &sessions {
        wait_until(handle, |s| {
            s.log()
                .iter()
                .filter(|m| m.kind == MessageKind::Text && matches!(m.origin, Origin::Remote(_)))
                .count()
                == COUNT
        })
        .await;
    }
    for mut handle in sessions {
        tokio::time::timeout(Duration::from_secs(5), handle.leave())
            .await
            .expect("leave stalled")
            .unwrap();
    }
    assert_eq!(mesh.peer_count(&RoomId::default()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_settle_bootstraps_with_zero_peers() {
    let mesh = LocalMesh::new();
    let mut alice = join(&mesh, "Alice").await;
    let mut events = alice.take_app_event_receiver().unwrap();
    assert!(alice.take_app_event_receiver().is_none());

    assert_eq!(alice.snapshot().status(), ConnectionStatus::Connecting);
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert_eq!(
        event,
        Some(AppEvent::StatusChanged {
            status: ConnectionStatus::Connected
        })
    );
    assert_eq!(alice.snapshot().peer_count(), 0);
    alice.leave().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_join_failure_spawns_nothing() {
    let mesh = LocalMesh::new();
    mesh.set_available(false);

    let result = SessionBuilder::new("Alice", "LocalNet").join(&mesh).await;
    assert!(matches!(
        result,
        Err(MeshlinkError::Transport(TransportError::TransportUnavailable { .. }))
    ));
    assert_eq!(mesh.peer_count(&RoomId::default()), 0);

    mesh.set_available(true);
    let mut alice = join(&mesh, "Alice").await;
    assert!(alice.is_running());
    alice.leave().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_blank_identity_rejected() {
    let mesh = LocalMesh::new();
    for (name, room) in [("  ", "LocalNet"), ("Alice", "")] {
        let result = SessionBuilder::new(name, room).join(&mesh).await;
        assert!(matches!(result, Err(MeshlinkError::Configuration { .. })));
    }
    assert_eq!(mesh.peer_count(&RoomId::default()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_rejections_leave_log_untouched() {
    let mesh = LocalMesh::new();
    let mut alice = join(&mesh, "Alice").await;
    let encoder = CountingEncoder::default();

    let blank = alice.send_text(" \t ").await;
    assert!(matches!(blank, Err(MeshlinkError::Send(SendError::EmptyMessage))));

    let oversized = MediaBlob::new("image/png", vec![0; MAX_ATTACHMENT_BYTES + 1]);
    let result = alice.send_attachment(oversized, &encoder).await;
    assert!(matches!(
        result,
        Err(MeshlinkError::Send(SendError::PayloadTooLarge { .. }))
    ));
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    assert!(alice.snapshot().log().is_empty());

    let at_limit = MediaBlob::new("application/zip", vec![0; MAX_ATTACHMENT_BYTES]).with_name("big.zip");
    let outcome = alice.send_attachment(at_limit, &encoder).await.unwrap();
    assert!(matches!(outcome, SendOutcome::Echoed(_)));
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);

    let last = alice.snapshot().log().last().cloned().unwrap();
    assert_eq!(last.kind, MessageKind::File);
    assert_eq!(last.attachment_name.as_deref(), Some("big.zip"));
    alice.leave().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_attachments_and_voice_notes_reach_peers() {
    let mesh = LocalMesh::new();
    let mut alice = join(&mesh, "Alice").await;
    let mut bob = join(&mesh, "Bob").await;
    wait_until(&bob, |s| s.peer_count() == 1).await;

    let image = MediaBlob::new("image/png", b"png".to_vec()).with_name("dot.png");
    alice.send_attachment(image, &DataUrlEncoder).await.unwrap();

    let microphone = ScriptedMicrophone::granted(vec![1, 2, 3, 4]);
    let mut recorder = AudioRecorder::new();
    recorder.start(&microphone).await.unwrap();
    alice.send_voice_note(&mut recorder, &DataUrlEncoder).await.unwrap();
    assert!(microphone.is_idle());
    assert_eq!(recorder.state_name(), "Idle");

    wait_until(&bob, |s| s.log().iter().any(|m| m.kind == MessageKind::Audio)).await;
    let log = bob.snapshot().log().to_vec();
    let image = log.iter().find(|m| m.kind == MessageKind::Image).unwrap();
    assert_eq!(image.content, "data:image/png;base64,cG5n");
    assert_eq!(image.attachment_name.as_deref(), Some("dot.png"));
    let audio = log.iter().find(|m| m.kind == MessageKind::Audio).unwrap();
    assert!(audio.content.starts_with("data:audio/webm;base64,"));

    alice.leave().await.unwrap();
    bob.leave().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_denied_microphone_sends_nothing() {
    let mesh = LocalMesh::new();
    let mut alice = join(&mesh, "Alice").await;
    let microphone = ScriptedMicrophone::denied();
    let mut recorder = AudioRecorder::new();

    let err = recorder.start(&microphone).await.unwrap_err();
    assert!(matches!(err, MediaError::MicrophoneUnavailable { .. }));

    let result = alice.send_voice_note(&mut recorder, &DataUrlEncoder).await;
    assert!(matches!(result, Err(MeshlinkError::Media(MediaError::InvalidState { .. }))));
    assert!(alice.snapshot().log().is_empty());
    alice.leave().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_leave_is_idempotent_and_discards_late_sends() {
    let mesh = LocalMesh::new();
    let mut alice = join(&mesh, "Alice").await;
    let mut events = alice.take_app_event_receiver().unwrap();

    alice.leave().await.unwrap();
    alice.leave().await.unwrap();
    assert!(!alice.is_running());

    assert_eq!(alice.send_text("anyone?").await.unwrap(), SendOutcome::Discarded);
    assert!(alice.snapshot().log().is_empty());

    let mut saw_closed = false;
    while let Some(event) = events.recv().await {
        saw_closed |= event == AppEvent::SessionClosed;
    }
    assert!(saw_closed);
}

#[tokio::test(start_paused = true)]
async fn test_messages_use_session_time_source() {
    let mesh = LocalMesh::new();
    let mut alice = SessionBuilder::new("Alice", "LocalNet")
        .with_config(MeshlinkConfig::testing())
        .join_with_time_source(&mesh, MockTimeSource::new_at(42_000))
        .await
        .unwrap();

    alice.send_text("tick").await.unwrap();
    let message = alice.snapshot().log().last().cloned().unwrap();
    assert_eq!(message.timestamp.as_millis(), 42_000);
    alice.leave().await.unwrap();
}

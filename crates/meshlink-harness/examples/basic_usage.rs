//! Basic Harness Usage Example
//!
//! Two sessions chat in the "LocalNet" room over an in-memory mesh, trade an
//! image and a voice note, then one of them leaves.

use std::time::Duration;

use meshlink_core::{AudioRecorder, DataUrlEncoder, MediaBlob, MessageKind, Origin, RoomId};
use meshlink_harness::{LocalMesh, ScriptedMicrophone};
use meshlink_runtime::{AppEvent, SessionBuilder, SessionSnapshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let _ = tracing_subscriber::fmt::try_init();

    println!("MeshLink Harness - Basic Usage Example");
    println!("======================================");

    let mesh = LocalMesh::new();
    let settle = Duration::from_millis(200);

    let mut alice = SessionBuilder::new("Alice", "LocalNet")
        .settle_delay(settle)
        .join(&mesh)
        .await?;
    let mut bob = SessionBuilder::new("Bob", "LocalNet")
        .settle_delay(settle)
        .join(&mesh)
        .await?;
    let mut alice_events = alice
        .take_app_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("app events already taken"))?;

    tokio::time::sleep(settle * 2).await;
    println!(
        "\n{} peers in {}",
        mesh.peer_count(&RoomId::default()),
        alice.room()
    );

    alice.send_text("hi").await?;
    let image = MediaBlob::new("image/png", vec![0x89, b'P', b'N', b'G']).with_name("dot.png");
    bob.send_attachment(image, &DataUrlEncoder).await?;

    let microphone = ScriptedMicrophone::granted(vec![0u8; 64]);
    let mut recorder = AudioRecorder::new();
    recorder.start(&microphone).await?;
    bob.send_voice_note(&mut recorder, &DataUrlEncoder).await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    print_log("Bob", &bob.snapshot());

    bob.leave().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    print_log("Alice", &alice.snapshot());

    println!("\nEvents seen by Alice:");
    while let Ok(event) = alice_events.try_recv() {
        match event {
            AppEvent::MessageAppended { message } => {
                println!("   {:?} from {}", message.kind, message.display_name)
            }
            AppEvent::PeerUpdated { peer } => println!("   peer updated: {}", peer.display_name),
            AppEvent::PeerRemoved { display_name, .. } => println!("   peer removed: {}", display_name),
            AppEvent::StatusChanged { status } => println!("   status: {}", status),
            AppEvent::SessionClosed => println!("   session closed"),
        }
    }

    alice.leave().await?;
    println!("\nDone.");
    Ok(())
}

fn print_log(owner: &str, snapshot: &SessionSnapshot) {
    println!(
        "\n{}'s log ({}, {} peers):",
        owner,
        snapshot.status(),
        snapshot.peer_count()
    );
    for message in snapshot.log() {
        let who = match (message.origin, message.kind) {
            (_, MessageKind::SystemNotice) => "system".to_string(),
            (Origin::Local, _) => "me".to_string(),
            (Origin::Remote(_), _) => message.display_name.clone(),
        };
        let body = if message.kind.is_attachment() {
            format!("<{:?} {:?}>", message.kind, message.attachment_name)
        } else {
            message.content.clone()
        };
        println!("   [{}] {}", who, body);
    }
}

//! Property-based tests for roster convergence and log invariants
//!
//! These tests verify that the handshake converges under arbitrary delivery
//! orders, that the log only ever grows, and that the attachment ceiling is
//! applied exactly at its boundary.


use meshlink_core::protocol::MessageDistributor;
use meshlink_core::{AttachmentKind, Draft, SendError, MAX_ATTACHMENT_BYTES};
use proptest::prelude::*;
use test_utils::{notices, ManualMesh};

const NAMES: [&str; 4] = ["Alice", "Bob", "Carol", "Dave"];

/// Build a fully connected mesh of `size` sessions and deliver in the given order
fn converge(size: usize, picks: &[usize]) -> ManualMesh {
    let mut mesh = ManualMesh::new();
    for name in &NAMES[..size] {
        mesh.add(name);
    }
    for a in 0..size {
        for b in (a + 1)..size {
            mesh.connect(a, b);
        }
    }
    for &pick in picks {
        mesh.deliver_at(pick);
    }
    mesh.drain();
    mesh
}

proptest! {
    /// Property: every session learns every other display name exactly once,
    /// whatever order the transport delivers events in
    #[test]
    fn roster_converges_under_any_order(
        size in 2usize..=4,
        picks in prop::collection::vec(any::<usize>(), 0..64),
    ) {
        let mesh = converge(size, &picks);

        for index in 0..size {
            let session = &mesh.node(index).session;
            let mut expected: Vec<&str> = NAMES[..size]
                .iter()
                .copied()
                .filter(|name| *name != NAMES[index])
                .collect();
            expected.sort_unstable();
            prop_assert_eq!(session.state().peer_names(), expected);

            let connected = notices(session);
            prop_assert_eq!(connected.len(), size - 1);
            prop_assert!(connected.iter().all(|n| n.ends_with(" connected.")));
        }
    }

    /// Property: interleaved sends and deliveries never remove log entries
    #[test]
    fn log_never_shrinks(
        steps in prop::collection::vec((any::<bool>(), any::<usize>()), 1..48),
    ) {
        let mut mesh = converge(2, &[]);
        let mut previous = [0usize; 2];

        for (step, (send, pick)) in steps.into_iter().enumerate() {
            if send {
                mesh.send_text(pick % 2, &format!("message {step}"));
            } else {
                mesh.deliver_at(pick);
            }
            for (index, last_len) in previous.iter_mut().enumerate() {
                let len = mesh.node(index).session.state().log().len();
                prop_assert!(len >= *last_len);
                *last_len = len;
            }
        }
    }

    /// Property: every sent message lands once at its sender and once at each peer
    #[test]
    fn each_message_delivered_once(
        texts in prop::collection::vec("[a-z][a-z ]{0,15}", 1..12),
        picks in prop::collection::vec(any::<usize>(), 0..64),
    ) {
        let mut mesh = converge(3, &[]);
        for (i, text) in texts.iter().enumerate() {
            mesh.send_text(i % 3, text);
        }
        for pick in picks {
            mesh.deliver_at(pick);
        }
        mesh.drain();

        for index in 0..3 {
            let chat = mesh
                .node(index)
                .session
                .state()
                .log()
                .iter()
                .filter(|m| !matches!(m.kind, meshlink_core::MessageKind::SystemNotice))
                .count();
            prop_assert_eq!(chat, texts.len());
        }
    }

    /// Property: attachments are accepted exactly up to the ceiling
    #[test]
    fn attachment_ceiling_is_inclusive(raw_size in 0usize..=(2 * MAX_ATTACHMENT_BYTES)) {
        let draft = Draft::attachment(AttachmentKind::File, String::new(), None, raw_size);
        let result = MessageDistributor::validate(&draft, MAX_ATTACHMENT_BYTES);

        if raw_size <= MAX_ATTACHMENT_BYTES {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(
                result,
                Err(SendError::PayloadTooLarge { max: MAX_ATTACHMENT_BYTES, actual: raw_size })
            );
        }
    }
}

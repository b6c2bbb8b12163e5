//! End-to-end protocol flows that only need the core crate.

use mostro_core::chat;
use mostro_core::crypto;
use mostro_core::giftwrap::{unwrap_event, wrap_message};
use mostro_core::keys::{seed_path, KeyRing};
use mostro_core::message::{self, Payload};
use mostro_core::order::OrderKind;

const COORDINATOR_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Flip one character mid-way through a base64 blob.
fn corrupt(content: &str) -> String {
    let at = content.len() / 2;
    let replacement = if content.as_bytes()[at] == b'x' { "y" } else { "x" };
    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..at]);
    out.push_str(replacement);
    out.push_str(&content[at + 1..]);
    out
}

#[test]
fn generate_and_reload_yields_identical_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = seed_path(dir.path());

    // First launch: a fresh seed.
    let (ring, was_new) = KeyRing::load_or_create(&path).unwrap();
    assert!(was_new);
    let identity = ring.identity_keypair().unwrap();
    let trade = ring.trade_keypair(1).unwrap();
    drop(ring);

    // Simulated restart: reload from disk.
    let (reloaded, was_new) = KeyRing::load_or_create(&path).unwrap();
    assert!(!was_new);
    assert_eq!(
        reloaded.identity_keypair().unwrap().public_bytes(),
        identity.public_bytes()
    );
    assert_eq!(
        reloaded.trade_keypair(1).unwrap().public_bytes(),
        trade.public_bytes()
    );
}

#[test]
fn gift_wrap_round_trip_with_inner_signature() {
    let user = KeyRing::generate().unwrap();
    let identity = user.identity_keypair().unwrap();
    let trade = user.trade_keypair(1).unwrap();
    let coordinator = KeyRing::import(COORDINATOR_MNEMONIC)
        .unwrap()
        .identity_keypair()
        .unwrap();

    let original = message::new_order(
        OrderKind::Sell,
        "ars",
        5_555,
        None,
        None,
        0,
        "Mostro",
        0,
        None,
        message::new_request_id(),
        1,
    );

    let wrap = wrap_message(&original, &trade, Some(&identity), &coordinator.public_hex()).unwrap();
    let unwrapped = unwrap_event(&wrap, &coordinator).unwrap();

    assert_eq!(unwrapped.message, original);

    let signature = unwrapped.inner_signature.expect("signed inner payload");
    let hash = crypto::sha256(original.to_json().unwrap().as_bytes());
    assert!(crypto::verify_sig(&hash, &signature, &trade.public_hex()));
}

#[test]
fn malformed_wraps_do_not_poison_a_batch() {
    let user = KeyRing::generate().unwrap();
    let trade = user.trade_keypair(1).unwrap();
    let coordinator = KeyRing::import(COORDINATOR_MNEMONIC)
        .unwrap()
        .identity_keypair()
        .unwrap();

    let make_wrap = |fiat: i64| {
        let message = message::new_order(
            OrderKind::Buy,
            "usd",
            fiat,
            None,
            None,
            0,
            "bank",
            0,
            None,
            message::new_request_id(),
            1,
        );
        wrap_message(&message, &trade, None, &coordinator.public_hex()).unwrap()
    };

    let good_one = make_wrap(100);
    let mut corrupted = make_wrap(200);
    corrupted.content = corrupt(&corrupted.content);
    let good_two = make_wrap(300);

    let unwrapped: Vec<_> = [good_one, corrupted, good_two]
        .iter()
        .filter_map(|wrap| unwrap_event(wrap, &coordinator).ok())
        .collect();

    assert_eq!(unwrapped.len(), 2);
    let fiats: Vec<i64> = unwrapped
        .iter()
        .map(|gift| match gift.message.payload() {
            Some(Payload::Order(order)) => order.fiat_amount,
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    assert_eq!(fiats, vec![100, 300]);
}

#[test]
fn take_sell_payload_shapes() {
    let order_id = uuid::Uuid::new_v4();

    let with_invoice = message::take_sell(
        order_id,
        Some("lnbc1invoice".to_string()),
        Some(15),
        1,
        1,
    );
    match with_invoice.payload() {
        Some(Payload::PaymentRequest(None, invoice, Some(15))) => {
            assert_eq!(invoice, "lnbc1invoice");
        }
        other => panic!("unexpected payload {other:?}"),
    }

    let range_pick = message::take_sell(order_id, None, Some(15), 1, 1);
    assert_eq!(range_pick.payload(), Some(&Payload::Amount(15)));

    let plain = message::take_sell(order_id, None, None, 1, 1);
    assert!(plain.payload().is_none());
}

#[test]
fn chat_is_authenticated_end_to_end() {
    let alice_ring = KeyRing::generate().unwrap();
    let bob_ring = KeyRing::generate().unwrap();
    let alice = alice_ring.trade_keypair(1).unwrap();
    let bob = bob_ring.trade_keypair(1).unwrap();

    // Both sides derive the same routing identity.
    let shared_a = chat::shared_identity(&alice, &bob.public_hex()).unwrap();
    let shared_b = chat::shared_identity(&bob, &alice.public_hex()).unwrap();
    assert_eq!(shared_a.public_hex(), shared_b.public_hex());

    let wrap = chat::wrap_chat_message("hello", &alice, &shared_a).unwrap();
    let received = chat::unwrap_chat_message(&wrap, &shared_b).unwrap();
    assert_eq!(received.text, "hello");
    assert_eq!(received.author_pubkey, alice.public_hex());

    // A corrupted wrap yields nothing: filter_map drops it silently.
    let mut corrupted = wrap.clone();
    corrupted.content = corrupt(&corrupted.content);
    let visible: Vec<_> = [corrupted]
        .iter()
        .filter_map(|event| chat::unwrap_chat_message(event, &shared_b).ok())
        .collect();
    assert!(visible.is_empty());
}

//! # Stage Runtime: The Decode Stage on Tokio
//!
//! Runs `InboundCompressionStage` as a task on a paused clock so the
//! advertisement timers fire deterministically.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Duration;
use wirec::compression::KindConfig;
use wirec::transport::ChannelAssociation;
use wirec::{
    inbound_node, ActorRef, CompressionConfig, InboundNode, Manifest, NodeIdentity,
    OutboundEncoder,
};

fn node(origin_id: u64) -> NodeIdentity {
    NodeIdentity::new("sys", format!("10.0.0.{}:2552", origin_id).parse().unwrap(), origin_id)
}

fn fast_config() -> CompressionConfig {
    let kind = KindConfig { max: 16, advertisement_interval_ms: 100 };
    CompressionConfig {
        actor_refs: kind.clone(),
        manifests: kind,
        ..CompressionConfig::default()
    }
}

/// Verifies that the timers advertise and the stage decodes the resulting codes.
#[tokio::test(start_paused = true)]
async fn test_stage_advertises_on_schedule() {
    let t = Instant::now();

    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let InboundNode { associations, stage, inbound_tx, control_tx, mut decoded_rx } =
        inbound_node(node(1), &fast_config()).unwrap();
    let (advert_tx, mut adverts) = mpsc::unbounded_channel();
    associations.associate(node(2), advert_tx);
    let mut sender = OutboundEncoder::new(node(2), Arc::new(ChannelAssociation::new(node(1), control_tx)));

    let stage = tokio::spawn(stage.run());
    let hot = ActorRef::new("/user/hot");
    let ping = Manifest::new("Ping");

    // 1. Literal traffic
    for _ in 0..5 {
        inbound_tx
            .send(sender.encode(Some(&hot), Some(&ping), Bytes::from_static(b"x")))
            .await
            .unwrap();
        let decoded = decoded_rx.recv().await.unwrap();
        assert_eq!(decoded.recipient, Some(hot.clone()));
    }

    // 2. Both timers fire at 100ms; the paused clock advances on its own
    let start = tokio::time::Instant::now();
    for _ in 0..2 {
        let frame = adverts.recv().await.unwrap();
        sender.on_control_frame(&frame).unwrap();
    }
    assert!(start.elapsed() >= Duration::from_millis(100));

    // 3. Compressed traffic decodes to the same values
    let envelope = sender.encode(Some(&hot), Some(&ping), Bytes::from_static(b"y"));
    assert!(envelope.recipient.is_compressed());
    assert!(envelope.manifest.is_compressed());
    inbound_tx.send(envelope).await.unwrap();
    let decoded = decoded_rx.recv().await.unwrap();
    assert_eq!(decoded.recipient, Some(hot));
    assert_eq!(decoded.manifest, Some(ping));

    // 4. Closing the inbound side stops the stage
    drop(inbound_tx);
    let stats = stage.await.unwrap();
    assert_eq!(stats.decoded, 6);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.dropped, 0);

    let overhead = t.elapsed();
    println!("test_stage_advertises_on_schedule: Testing Overhead = {:?}", overhead);
}

/// Verifies that a quarantined origin is pruned before any advertisement.
#[tokio::test(start_paused = true)]
async fn test_stage_stops_advertising_quarantined_origin() {
    let t = Instant::now();

    let InboundNode { associations, stage, inbound_tx, control_tx: _control_tx, mut decoded_rx } =
        inbound_node(node(1), &fast_config()).unwrap();
    let (advert_tx, mut adverts) = mpsc::unbounded_channel();
    let association = associations.associate(node(2), advert_tx);

    let stage = tokio::spawn(stage.run());
    let envelope = wirec::WireEnvelope {
        origin: node(2),
        recipient: wirec::WireField::Literal(ActorRef::new("/user/a")),
        manifest: wirec::WireField::Absent,
        payload: Bytes::new(),
    };
    inbound_tx.send(envelope).await.unwrap();
    decoded_rx.recv().await.unwrap();

    association.quarantine();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(adverts.try_recv().is_err());

    drop(inbound_tx);
    let stats = stage.await.unwrap();
    assert_eq!(stats.decoded, 1);

    let overhead = t.elapsed();
    println!("test_stage_stops_advertising_quarantined_origin: Testing Overhead = {:?}", overhead);
}

/// Verifies that hits recorded before the handshake survive the prune sweep.
#[tokio::test(start_paused = true)]
async fn test_hits_before_handshake_are_advertised() {
    let t = Instant::now();

    let InboundNode { associations, stage, inbound_tx, control_tx: _control_tx, mut decoded_rx } =
        inbound_node(node(1), &fast_config()).unwrap();
    let stage = tokio::spawn(stage.run());

    // 1. Traffic arrives while the handshake is still running
    let envelope = wirec::WireEnvelope {
        origin: node(2),
        recipient: wirec::WireField::Literal(ActorRef::new("/user/early")),
        manifest: wirec::WireField::Absent,
        payload: Bytes::new(),
    };
    inbound_tx.send(envelope).await.unwrap();
    decoded_rx.recv().await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    // 2. Handshake completes; the next tick advertises the early hits
    let (advert_tx, mut adverts) = mpsc::unbounded_channel();
    associations.associate(node(2), advert_tx);
    let frame = adverts.recv().await.unwrap();
    match wirec::transport::ControlCodec::decode(&frame).unwrap() {
        wirec::ControlMessage::ActorRefAdvertisement(adv) => {
            assert!(adv.table.get(&ActorRef::new("/user/early")).is_some());
        }
        other => panic!("unexpected {:?}", other),
    }

    drop(inbound_tx);
    stage.await.unwrap();

    let overhead = t.elapsed();
    println!("test_hits_before_handshake_are_advertised: Testing Overhead = {:?}", overhead);
}

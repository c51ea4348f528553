//! End-to-end tests driving the full gateway -> queue -> engine path with raw
//! topic payloads, the way a transport binding would.

use std::sync::Arc;

use vaultwatch_core::{
    CommandPublisher, Engine, FusionRules, Gateway, IngestQueue, Label, OverflowPolicy,
    TopicConfig,
};

struct NullPublisher;

impl CommandPublisher for NullPublisher {
    fn publish(&self, _topic: &str, _payload: &[u8]) {}
}

fn rig() -> (Gateway, Engine) {
    let queue = Arc::new(IngestQueue::new(256, OverflowPolicy::DropOldest));
    let gateway = Gateway::new(
        TopicConfig::default(),
        Arc::clone(&queue),
        Arc::new(NullPublisher),
    );
    let engine = Engine::new(FusionRules::default(), queue);
    (gateway, engine)
}

#[test]
fn nearby_activity_from_status_distance_motion() {
    let (gateway, mut engine) = rig();
    gateway.deliver("data/status/kontrol", b"Aman");
    gateway.deliver("data/dist/kontrol", b"15");
    gateway.deliver("data/pir/kontrol", b"1");

    let summary = engine.drain_and_apply();
    assert_eq!(summary.applied, 3);

    let snap = engine.snapshot();
    assert_eq!(snap.episodes.len(), 1);
    let ep = &snap.episodes[0];
    assert_eq!(ep.distance_cm, Some(15.0));
    assert_eq!(ep.motion, Some(true));
    assert_eq!(ep.fused_label, Label::NearbyActivity);
}

#[test]
fn breach_status_beats_recognized_face() {
    let (gateway, mut engine) = rig();
    gateway.deliver("data/status/kontrol", b"Brangkas Dibuka Paksa");
    gateway.deliver("ai/face/result", b"ANGGI_FACES");

    engine.drain_and_apply();
    let snap = engine.snapshot();
    assert_eq!(snap.episodes[0].fused_label, Label::Breach);
}

#[test]
fn face_result_with_empty_timeline_is_dropped() {
    let (gateway, mut engine) = rig();
    gateway.deliver("ai/face/result", b"X");

    let summary = engine.drain_and_apply();
    assert_eq!(summary.applied, 0);
    assert_eq!(summary.dropped_no_episode, 1);

    let snap = engine.snapshot();
    assert!(snap.episodes.is_empty());
    assert_eq!(snap.health.no_episode_dropped, 1);
}

#[test]
fn unrecognized_face_makes_episode_suspicious() {
    let (gateway, mut engine) = rig();
    gateway.deliver("data/status/kontrol", b"Aman");
    gateway.deliver("ai/face/result", b"OTHER_FACES");

    engine.drain_and_apply();
    let snap = engine.snapshot();
    assert_eq!(snap.episodes[0].fused_label, Label::Suspicious);
}

#[test]
fn timeline_length_tracks_status_events_exactly() {
    let (gateway, mut engine) = rig();
    for i in 0..10 {
        gateway.deliver("data/status/kontrol", format!("status-{i}").as_bytes());
        // Interleave noise that must not open or merge episodes.
        gateway.deliver("data/dist/kontrol", b"40");
        gateway.deliver("data/pir/kontrol", b"0");
    }
    engine.drain_and_apply();
    assert_eq!(engine.timeline().len(), 10);
}

#[test]
fn late_readings_attach_to_newest_episode() {
    let (gateway, mut engine) = rig();
    gateway.deliver("data/status/kontrol", b"Aman");
    engine.drain_and_apply();

    gateway.deliver("data/status/kontrol", b"Terbuka Secara Aman");
    gateway.deliver("ai/voice/result", b"DEVI_VOICE");
    engine.drain_and_apply();

    let snap = engine.snapshot();
    assert_eq!(snap.episodes.len(), 2);
    // The first episode is untouched history.
    assert_eq!(snap.episodes[0].voice_label, "Menunggu...");
    assert_eq!(snap.episodes[1].voice_label, "DEVI_VOICE");
    assert_eq!(snap.episodes[1].fused_label, Label::SafeAuthorized);
}

#[test]
fn undecodable_payloads_never_reach_the_timeline() {
    let (gateway, mut engine) = rig();
    gateway.deliver("data/status/kontrol", b"Aman");
    gateway.deliver("data/dist/kontrol", b"not-a-number");
    gateway.deliver("data/status/kontrol", &[0xff, 0x00, 0xfe]);

    engine.drain_and_apply();
    let snap = engine.snapshot();
    assert_eq!(snap.episodes.len(), 1);
    assert!(snap.episodes[0].distance_cm.is_none());
    assert_eq!(snap.health.decode_failures, 2);
}

#[test]
fn media_urls_are_cache_busted_and_last_write_wins() {
    let (gateway, mut engine) = rig();
    gateway.deliver("/iot/camera/photo", b"http://cam/a.jpg");
    gateway.deliver("/iot/camera/photo", b"http://cam/b.jpg");
    engine.drain_and_apply();

    let snap = engine.snapshot();
    let photo = snap.auxiliary.latest_photo_url.unwrap();
    assert!(photo.starts_with("http://cam/b.jpg?t="));
}

#[test]
fn export_matches_snapshot() {
    let (gateway, mut engine) = rig();
    gateway.deliver("data/status/kontrol", b"Aman");
    gateway.deliver("data/dist/kontrol", b"15");
    engine.drain_and_apply();

    let snap = engine.snapshot();
    let csv = vaultwatch_core::export::timeline_csv(&snap.episodes);
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.lines().nth(1).unwrap().ends_with("nearby-activity"));
}

//! The fusion engine.
//!
//! [`Engine`] is the single explicit owner of all mutable engine state: the
//! episode timeline, auxiliary media URLs, the inference sub-logs with their
//! high-water marks, and the consumer end of the ingestion queue. It is
//! constructed once at startup and driven from one thread; the transport side
//! only ever touches the queue.
//!
//! Applying events performs no I/O and never blocks, so every transform in
//! here is deterministic and unit-testable. The one exception is
//! [`Engine::backfill`], which reads the external inference log and is called
//! from the same poll thread between drains.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backfill::{self, InferenceLogEntry};
use crate::event::{EventKind, InboundEvent};
use crate::fusion::{FusionRules, Label};
use crate::ingest::{IngestHealth, IngestQueue};
use crate::timeline::{ApplyError, Episode, EpisodePatch, Timeline};

/// Last-write-wins media URLs, independent of the timeline.
///
/// URLs are cache-busted with the event's decode timestamp so a poller always
/// refetches the newest media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryState {
    pub latest_photo_url: Option<String>,
    pub latest_audio_url: Option<String>,
}

/// One episode as seen by the snapshot reader, with its derived label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRow {
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub distance_cm: Option<f64>,
    pub motion: Option<bool>,
    pub face_label: String,
    pub voice_label: String,
    pub fused_label: Label,
}

/// Read-only view handed to the external UI once per poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub episodes: Vec<EpisodeRow>,
    pub auxiliary: AuxiliaryState,
    pub face_log: Vec<InferenceLogEntry>,
    pub voice_log: Vec<InferenceLogEntry>,
    pub health: IngestHealth,
}

/// Outcome of one queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Events applied to the timeline or auxiliary state.
    pub applied: usize,
    /// Events dropped because no episode was open yet.
    pub dropped_no_episode: usize,
}

/// Outcome of one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub face_admitted: usize,
    pub voice_admitted: usize,
}

/// Single-threaded event applier and state owner.
pub struct Engine {
    rules: FusionRules,
    queue: Arc<IngestQueue>,
    timeline: Timeline,
    auxiliary: AuxiliaryState,
    face_log: Vec<InferenceLogEntry>,
    voice_log: Vec<InferenceLogEntry>,
    face_hwm: Option<DateTime<Utc>>,
    voice_hwm: Option<DateTime<Utc>>,
}

impl Engine {
    pub fn new(rules: FusionRules, queue: Arc<IngestQueue>) -> Self {
        Self {
            rules,
            queue,
            timeline: Timeline::new(),
            auxiliary: AuxiliaryState::default(),
            face_log: Vec::new(),
            voice_log: Vec::new(),
            face_hwm: None,
            voice_hwm: None,
        }
    }

    /// Apply one decoded event.
    ///
    /// Status events open a new episode; sensor and identity events patch the
    /// latest one; media URLs update auxiliary state regardless of episodes.
    /// A patch with no open episode is dropped and counted, never fatal.
    pub fn apply(&mut self, event: InboundEvent) -> Result<(), ApplyError> {
        let result = match event.kind {
            EventKind::StatusChanged { text } => {
                let id = self
                    .timeline
                    .open_episode(text, event.timestamp, &self.rules.pending_label);
                debug!(episode = id, "episode opened");
                Ok(())
            }
            EventKind::DistanceReading { cm } => {
                self.timeline.patch_latest(EpisodePatch::Distance(cm))
            }
            EventKind::MotionReading { motion } => {
                self.timeline.patch_latest(EpisodePatch::Motion(motion))
            }
            EventKind::FaceResult { label } => {
                self.timeline.patch_latest(EpisodePatch::Face(label))
            }
            EventKind::VoiceResult { label } => {
                self.timeline.patch_latest(EpisodePatch::Voice(label))
            }
            EventKind::PhotoUrl { url } => {
                self.auxiliary.latest_photo_url = Some(cache_busted(&url, event.timestamp));
                Ok(())
            }
            EventKind::AudioUrl { url } => {
                self.auxiliary.latest_audio_url = Some(cache_busted(&url, event.timestamp));
                Ok(())
            }
        };

        if result.is_err() {
            self.queue
                .stats()
                .no_episode_dropped
                .fetch_add(1, Ordering::Relaxed);
            debug!("dropped reading that arrived before the first status event");
        }
        result
    }

    /// Drain the queue completely and apply every event in dequeue order.
    ///
    /// Called once per poll cycle from the consumer thread.
    pub fn drain_and_apply(&mut self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        for event in self.queue.drain() {
            match self.apply(event) {
                Ok(()) => summary.applied += 1,
                Err(ApplyError::NoActiveEpisode) => summary.dropped_no_episode += 1,
            }
        }
        summary
    }

    /// Pull strictly-newer entries from the external inference log into the
    /// face/voice sub-logs, advancing the high-water marks.
    pub fn backfill(&mut self, path: &Path) -> BackfillSummary {
        let batch = backfill::read_new(path, self.face_hwm, self.voice_hwm);
        let summary = BackfillSummary {
            face_admitted: batch.face.len(),
            voice_admitted: batch.voice.len(),
        };

        if let Some(last) = batch.face.last() {
            self.face_hwm = Some(last.timestamp);
        }
        if let Some(last) = batch.voice.last() {
            self.voice_hwm = Some(last.timestamp);
        }
        self.face_log.extend(batch.face);
        self.voice_log.extend(batch.voice);
        summary
    }

    /// Classify one episode with this engine's rules.
    pub fn classify(&self, episode: &Episode) -> Label {
        self.rules.classify(episode)
    }

    /// The timeline, oldest episode first.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Auxiliary media URLs.
    pub fn auxiliary(&self) -> &AuxiliaryState {
        &self.auxiliary
    }

    /// Admitted face inference results, oldest first.
    pub fn face_log(&self) -> &[InferenceLogEntry] {
        &self.face_log
    }

    /// Admitted voice inference results, oldest first.
    pub fn voice_log(&self) -> &[InferenceLogEntry] {
        &self.voice_log
    }

    /// Build the read-only view the UI polls once per render cycle.
    ///
    /// Labels are recomputed here: classification is a pure function of
    /// episode fields, and every episode but the newest is immutable, so
    /// recomputation yields the same label the episode had when it stopped
    /// being latest.
    pub fn snapshot(&self) -> Snapshot {
        let episodes = self
            .timeline
            .all()
            .iter()
            .map(|ep| EpisodeRow {
                timestamp: ep.timestamp,
                status: ep.status.clone(),
                distance_cm: ep.distance_cm,
                motion: ep.motion,
                face_label: ep.face_label.clone(),
                voice_label: ep.voice_label.clone(),
                fused_label: self.rules.classify(ep),
            })
            .collect();

        Snapshot {
            episodes,
            auxiliary: self.auxiliary.clone(),
            face_log: self.face_log.clone(),
            voice_log: self.voice_log.clone(),
            health: self.queue.stats().sample(),
        }
    }
}

fn cache_busted(url: &str, at: DateTime<Utc>) -> String {
    format!("{url}?t={}", at.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::OverflowPolicy;

    fn engine() -> Engine {
        let queue = Arc::new(IngestQueue::new(64, OverflowPolicy::DropOldest));
        Engine::new(FusionRules::default(), queue)
    }

    fn status(text: &str) -> InboundEvent {
        InboundEvent::now(EventKind::StatusChanged {
            text: text.to_string(),
        })
    }

    #[test]
    fn status_event_opens_episode() {
        let mut engine = engine();
        engine.apply(status("Aman")).unwrap();
        engine.apply(status("Terbuka Secara Aman")).unwrap();
        assert_eq!(engine.timeline().len(), 2);
    }

    #[test]
    fn readings_enrich_the_latest_episode() {
        let mut engine = engine();
        engine.apply(status("Aman")).unwrap();
        engine
            .apply(InboundEvent::now(EventKind::DistanceReading { cm: 15.0 }))
            .unwrap();
        engine
            .apply(InboundEvent::now(EventKind::MotionReading { motion: true }))
            .unwrap();

        let ep = engine.timeline().latest().unwrap();
        assert_eq!(ep.distance_cm, Some(15.0));
        assert_eq!(ep.motion, Some(true));
        assert_eq!(engine.classify(ep), Label::NearbyActivity);
    }

    #[test]
    fn reading_before_first_status_is_dropped() {
        let mut engine = engine();
        let err = engine
            .apply(InboundEvent::now(EventKind::FaceResult {
                label: "X".to_string(),
            }))
            .unwrap_err();
        assert_eq!(err, ApplyError::NoActiveEpisode);
        assert!(engine.timeline().is_empty());
        assert_eq!(engine.snapshot().health.no_episode_dropped, 1);
    }

    #[test]
    fn media_urls_update_without_an_episode() {
        let mut engine = engine();
        engine
            .apply(InboundEvent::now(EventKind::PhotoUrl {
                url: "http://cam/latest.jpg".to_string(),
            }))
            .unwrap();
        engine
            .apply(InboundEvent::now(EventKind::AudioUrl {
                url: "http://mic/latest.wav".to_string(),
            }))
            .unwrap();

        let aux = engine.auxiliary();
        let photo = aux.latest_photo_url.as_deref().unwrap();
        assert!(photo.starts_with("http://cam/latest.jpg?t="));
        assert!(aux.latest_audio_url.as_deref().unwrap().contains("?t="));
        assert!(engine.timeline().is_empty());
    }

    #[test]
    fn drain_applies_in_dequeue_order() {
        let queue = Arc::new(IngestQueue::new(64, OverflowPolicy::DropOldest));
        let mut engine = Engine::new(FusionRules::default(), Arc::clone(&queue));

        queue.push(status("Aman"));
        queue.push(InboundEvent::now(EventKind::DistanceReading { cm: 10.0 }));
        queue.push(status("Terbuka Secara Aman"));
        queue.push(InboundEvent::now(EventKind::DistanceReading { cm: 3.0 }));

        let summary = engine.drain_and_apply();
        assert_eq!(summary.applied, 4);
        assert_eq!(summary.dropped_no_episode, 0);

        // The second distance reading landed on the second episode.
        let all = engine.timeline().all();
        assert_eq!(all[0].distance_cm, Some(10.0));
        assert_eq!(all[1].distance_cm, Some(3.0));
    }

    #[test]
    fn snapshot_labels_every_episode() {
        let mut engine = engine();
        engine.apply(status("Brangkas Dibuka Paksa")).unwrap();
        engine.apply(status("Aman")).unwrap();
        engine
            .apply(InboundEvent::now(EventKind::MotionReading { motion: true }))
            .unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.episodes.len(), 2);
        assert_eq!(snap.episodes[0].fused_label, Label::Breach);
        assert_eq!(snap.episodes[1].fused_label, Label::MotionDetected);
    }

    #[test]
    fn snapshot_is_stable_across_reads() {
        let mut engine = engine();
        engine.apply(status("Aman")).unwrap();
        let first = engine.snapshot();
        let second = engine.snapshot();
        assert_eq!(first.episodes[0].fused_label, second.episodes[0].fused_label);
        assert_eq!(first.episodes.len(), second.episodes.len());
    }

    #[test]
    fn backfill_advances_marks_and_is_idempotent() {
        use std::io::Write;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(
            br#"{"face": [{"Timestamp": "2024-05-01 10:00:00", "Hasil Prediksi": "ANGGI_FACES", "Akurasi (%)": 90.0, "Keterangan": "cam"}],
                 "voice": [{"Timestamp": "2024-05-01 10:01:00", "Hasil Prediksi": "Not_User", "Akurasi (%)": 60.0, "Keterangan": "mic"}]}"#,
        )
        .unwrap();

        let mut engine = engine();
        let first = engine.backfill(&path);
        assert_eq!(first.face_admitted, 1);
        assert_eq!(first.voice_admitted, 1);

        let second = engine.backfill(&path);
        assert_eq!(second.face_admitted, 0);
        assert_eq!(second.voice_admitted, 0);
        assert_eq!(engine.face_log().len(), 1);
        assert_eq!(engine.voice_log().len(), 1);
    }
}

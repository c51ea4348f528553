//! Transport gateway: payload decoding and outbound commands.
//!
//! The gateway sits between the pub/sub transport binding and the ingestion
//! queue. Inbound, it maps a raw `(topic, payload)` delivery to a typed
//! [`InboundEvent`] and enqueues it; outbound, it publishes control commands
//! through a fire-and-forget [`CommandPublisher`] seam. Connection handling,
//! QoS, and reconnects belong to the transport binding, not here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::event::{EventKind, InboundEvent};
use crate::ingest::IngestQueue;

/// Payload published on the camera trigger topic.
pub const CAMERA_TRIGGER_TOKEN: &str = "capture";
/// Payload published on the alarm control topic to silence the alarm.
pub const ALARM_OFF: &str = "OFF";

/// Inbound/outbound topic names.
///
/// Defaults match the deployed enclosure firmware; all of them are plain
/// transport-level strings and carry no structure the engine relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Enclosure status text.
    #[serde(default = "default_status_topic")]
    pub status: String,
    /// Ultrasonic distance sensor.
    #[serde(default = "default_distance_topic")]
    pub distance: String,
    /// PIR motion sensor.
    #[serde(default = "default_motion_topic")]
    pub motion: String,
    /// Face inference results.
    #[serde(default = "default_face_result_topic")]
    pub face_result: String,
    /// Voice inference results.
    #[serde(default = "default_voice_result_topic")]
    pub voice_result: String,
    /// Latest camera photo URL.
    #[serde(default = "default_photo_url_topic")]
    pub photo_url: String,
    /// Latest audio recording URL.
    #[serde(default = "default_audio_url_topic")]
    pub audio_url: String,
    /// Outbound: ask the camera to take a photo.
    #[serde(default = "default_camera_trigger_topic")]
    pub camera_trigger: String,
    /// Outbound: alarm on/off commands.
    #[serde(default = "default_alarm_control_topic")]
    pub alarm_control: String,
}

fn default_status_topic() -> String {
    "data/status/kontrol".to_string()
}

fn default_distance_topic() -> String {
    "data/dist/kontrol".to_string()
}

fn default_motion_topic() -> String {
    "data/pir/kontrol".to_string()
}

fn default_face_result_topic() -> String {
    "ai/face/result".to_string()
}

fn default_voice_result_topic() -> String {
    "ai/voice/result".to_string()
}

fn default_photo_url_topic() -> String {
    "/iot/camera/photo".to_string()
}

fn default_audio_url_topic() -> String {
    "data/audio/link".to_string()
}

fn default_camera_trigger_topic() -> String {
    "/iot/camera/trigger".to_string()
}

fn default_alarm_control_topic() -> String {
    "data/alarm/kontrol".to_string()
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            status: default_status_topic(),
            distance: default_distance_topic(),
            motion: default_motion_topic(),
            face_result: default_face_result_topic(),
            voice_result: default_voice_result_topic(),
            photo_url: default_photo_url_topic(),
            audio_url: default_audio_url_topic(),
            camera_trigger: default_camera_trigger_topic(),
            alarm_control: default_alarm_control_topic(),
        }
    }
}

impl TopicConfig {
    /// All inbound topics the transport binding should subscribe to.
    pub fn subscriptions(&self) -> Vec<&str> {
        vec![
            &self.status,
            &self.distance,
            &self.motion,
            &self.face_result,
            &self.voice_result,
            &self.photo_url,
            &self.audio_url,
        ]
    }
}

/// Failure to turn a raw payload into a typed event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload bytes were not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    /// Payload did not parse as the expected numeric type.
    #[error("invalid numeric payload {payload:?} on topic {topic}")]
    InvalidNumber { topic: String, payload: String },
    /// Topic is not one the gateway subscribes to.
    #[error("unknown topic {0}")]
    UnknownTopic(String),
}

/// Fire-and-forget outbound publish seam.
///
/// Implemented by the transport binding. Delivery guarantees belong to the
/// transport; from the engine's perspective a publish is at-most-once and
/// never reports failure.
pub trait CommandPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]);
}

/// Decodes inbound deliveries onto the ingestion queue and publishes outbound
/// commands.
pub struct Gateway {
    topics: TopicConfig,
    queue: Arc<IngestQueue>,
    publisher: Arc<dyn CommandPublisher>,
}

impl Gateway {
    pub fn new(
        topics: TopicConfig,
        queue: Arc<IngestQueue>,
        publisher: Arc<dyn CommandPublisher>,
    ) -> Self {
        Self {
            topics,
            queue,
            publisher,
        }
    }

    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }

    /// Decode one raw delivery into a typed event, stamped with the current time.
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Result<InboundEvent, DecodeError> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| DecodeError::NotUtf8)?
            .trim();

        let kind = if topic == self.topics.status {
            EventKind::StatusChanged {
                text: text.to_string(),
            }
        } else if topic == self.topics.distance {
            let cm: f64 = text.parse().map_err(|_| DecodeError::InvalidNumber {
                topic: topic.to_string(),
                payload: text.to_string(),
            })?;
            EventKind::DistanceReading { cm }
        } else if topic == self.topics.motion {
            let raw: i64 = text.parse().map_err(|_| DecodeError::InvalidNumber {
                topic: topic.to_string(),
                payload: text.to_string(),
            })?;
            EventKind::MotionReading { motion: raw != 0 }
        } else if topic == self.topics.face_result {
            EventKind::FaceResult {
                label: text.to_string(),
            }
        } else if topic == self.topics.voice_result {
            EventKind::VoiceResult {
                label: text.to_string(),
            }
        } else if topic == self.topics.photo_url {
            EventKind::PhotoUrl {
                url: text.to_string(),
            }
        } else if topic == self.topics.audio_url {
            EventKind::AudioUrl {
                url: text.to_string(),
            }
        } else {
            return Err(DecodeError::UnknownTopic(topic.to_string()));
        };

        Ok(InboundEvent::now(kind))
    }

    /// Decode and enqueue one delivery. Called on the transport thread.
    ///
    /// Decode failures drop the message and bump the health counter; they are
    /// never surfaced to the transport binding. Non-UTF-8 payloads in
    /// particular are dropped without a warning, matching the deployed
    /// behavior this engine replaces.
    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        match self.decode(topic, payload) {
            Ok(event) => {
                trace!(topic, kind = event.kind.name(), "event enqueued");
                self.queue.push(event);
            }
            Err(DecodeError::NotUtf8) => {
                self.queue
                    .stats()
                    .decode_failures
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                trace!(topic, "dropped non-UTF-8 payload");
            }
            Err(err) => {
                self.queue
                    .stats()
                    .decode_failures
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                warn!(topic, error = %err, "dropped undecodable payload");
            }
        }
    }

    /// Publish a raw command on an outbound topic.
    pub fn publish_command(&self, topic: &str, payload: &[u8]) {
        debug!(topic, "publishing command");
        self.publisher.publish(topic, payload);
    }

    /// Ask the camera to take a photo.
    pub fn trigger_camera(&self) {
        let topic = self.topics.camera_trigger.clone();
        self.publish_command(&topic, CAMERA_TRIGGER_TOKEN.as_bytes());
    }

    /// Silence the alarm.
    pub fn silence_alarm(&self) {
        let topic = self.topics.alarm_control.clone();
        self.publish_command(&topic, ALARM_OFF.as_bytes());
    }
}

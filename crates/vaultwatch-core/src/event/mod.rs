//! Inbound event types.
//!
//! Events are the fundamental data unit flowing through vaultwatch. Each one
//! corresponds to a single message on an inbound transport topic: a status
//! change from the enclosure controller, a raw sensor reading, an ML inference
//! result, or a freshly uploaded media URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A decoded inbound message.
///
/// The timestamp is assigned by the [`Gateway`](crate::gateway::Gateway) at
/// decode time; any timestamp inside the payload is ignored. No global
/// ordering is assumed beyond per-topic FIFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// When the gateway decoded this message.
    pub timestamp: DateTime<Utc>,
    /// Classified kind of message.
    pub kind: EventKind,
}

impl InboundEvent {
    /// Wrap a kind with the current decode time.
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Classification of an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// The enclosure controller reported a new status. Opens a new episode.
    ///
    /// The status vocabulary is controller-defined and not a closed set;
    /// downstream matching is substring-based against configured markers.
    StatusChanged {
        /// Free-form status text from the controller.
        text: String,
    },
    /// Ultrasonic distance reading in centimeters.
    DistanceReading {
        /// Measured distance. A reading of `0` is a known sensor failure mode.
        cm: f64,
    },
    /// PIR motion sensor reading.
    MotionReading {
        /// Whether motion was detected.
        motion: bool,
    },
    /// Face identity result from the ML inference service.
    FaceResult {
        /// Predicted identity label (e.g. `"ANGGI_FACES"`, `"OTHER_FACES"`).
        label: String,
    },
    /// Voice identity result from the ML inference service.
    VoiceResult {
        /// Predicted identity label (e.g. `"Not_User"`).
        label: String,
    },
    /// URL of the most recent camera photo.
    PhotoUrl {
        /// Base URL without cache-busting query.
        url: String,
    },
    /// URL of the most recent microphone recording.
    AudioUrl {
        /// Base URL without cache-busting query.
        url: String,
    },
}

impl EventKind {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::StatusChanged { .. } => "status",
            EventKind::DistanceReading { .. } => "distance",
            EventKind::MotionReading { .. } => "motion",
            EventKind::FaceResult { .. } => "face-result",
            EventKind::VoiceResult { .. } => "voice-result",
            EventKind::PhotoUrl { .. } => "photo-url",
            EventKind::AudioUrl { .. } => "audio-url",
        }
    }
}

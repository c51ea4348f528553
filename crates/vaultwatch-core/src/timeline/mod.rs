//! Episode timeline.
//!
//! An append-only, index-addressable sequence of vault-access episodes. An
//! episode opens when the controller publishes a status change and is enriched
//! by subsequent sensor/ML readings until the next status change opens a new
//! one. Only the most recently opened episode is mutable; everything earlier
//! is immutable history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of an episode within the timeline.
pub type EpisodeId = usize;

/// One vault-access window, from a status event to the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Creation time, assigned by the gateway at decode time.
    pub timestamp: DateTime<Utc>,
    /// Free-form status text from the enclosure controller.
    pub status: String,
    /// Ultrasonic distance in cm; absent until a distance reading arrives.
    pub distance_cm: Option<f64>,
    /// PIR motion flag; absent until a motion reading arrives.
    pub motion: Option<bool>,
    /// Face identity label; starts as the configured pending placeholder.
    pub face_label: String,
    /// Voice identity label; starts as the configured pending placeholder.
    pub voice_label: String,
}

impl Episode {
    /// Create a fresh episode with identity fields set to the pending placeholder.
    pub fn open(status: String, timestamp: DateTime<Utc>, pending_label: &str) -> Self {
        Self {
            timestamp,
            status,
            distance_cm: None,
            motion: None,
            face_label: pending_label.to_string(),
            voice_label: pending_label.to_string(),
        }
    }
}

/// A single-field update targeting the most recent episode.
///
/// Identity patches overwrite unconditionally: within one episode the last
/// inference result wins.
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodePatch {
    Distance(f64),
    Motion(bool),
    Face(String),
    Voice(String),
}

/// Failure to attach a reading to an episode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// A sensor/ML reading arrived before any status event opened an episode.
    ///
    /// Legitimate at process start (sensor noise precedes the first status
    /// message); the caller drops the reading and keeps going.
    #[error("no active episode to patch")]
    NoActiveEpisode,
}

/// Append-only ordered sequence of episodes.
#[derive(Debug, Default)]
pub struct Timeline {
    episodes: Vec<Episode>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new episode. Always appends, always succeeds.
    ///
    /// The previously-latest episode becomes immutable from this point on.
    pub fn open_episode(
        &mut self,
        status: String,
        timestamp: DateTime<Utc>,
        pending_label: &str,
    ) -> EpisodeId {
        self.episodes
            .push(Episode::open(status, timestamp, pending_label));
        self.episodes.len() - 1
    }

    /// Patch a field of the most recent episode.
    ///
    /// Never creates an episode; with an empty timeline the patch fails softly
    /// with [`ApplyError::NoActiveEpisode`].
    pub fn patch_latest(&mut self, patch: EpisodePatch) -> Result<(), ApplyError> {
        let episode = self.episodes.last_mut().ok_or(ApplyError::NoActiveEpisode)?;
        match patch {
            EpisodePatch::Distance(cm) => episode.distance_cm = Some(cm),
            EpisodePatch::Motion(flag) => episode.motion = Some(flag),
            EpisodePatch::Face(label) => episode.face_label = label,
            EpisodePatch::Voice(label) => episode.voice_label = label,
        }
        Ok(())
    }

    /// All episodes in creation order.
    pub fn all(&self) -> &[Episode] {
        &self.episodes
    }

    /// The most recent episode, if any.
    pub fn latest(&self) -> Option<&Episode> {
        self.episodes.last()
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

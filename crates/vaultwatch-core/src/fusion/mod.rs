//! Episode classification ("fusion") rule.
//!
//! Combines an episode's accumulated status, identity, and proximity signals
//! into a single security label via a strict priority cascade. The cascade
//! ordering is deliberate: proximity and motion are weak positive signals and
//! only decide an episode when no stronger status or identity signal already
//! resolved it.

use serde::{Deserialize, Serialize};

use crate::timeline::Episode;

/// Security label derived for one episode. First match in the cascade wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Status text contains the forced-open marker.
    Breach,
    /// Face or voice identity matched an unauthorized sentinel.
    Suspicious,
    /// Status text contains the safely-opened marker.
    SafeAuthorized,
    /// Distance reading present, nonzero, and below the near threshold.
    NearbyActivity,
    /// PIR motion reading present and set.
    MotionDetected,
    /// No signal resolved the episode.
    Nominal,
}

impl Label {
    /// Stable string form used in exports and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Breach => "breach",
            Label::Suspicious => "suspicious",
            Label::SafeAuthorized => "safe-authorized",
            Label::NearbyActivity => "nearby-activity",
            Label::MotionDetected => "motion-detected",
            Label::Nominal => "nominal",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configurable inputs of the classification cascade.
///
/// The enclosure controller's status vocabulary evolved across firmware
/// revisions without a shared contract, so breach/safe markers are matched by
/// substring against configured text instead of a closed enum. Identity
/// sentinels are matched by equality. Defaults mirror the deployed controller
/// and inference services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionRules {
    /// Substrings of the status text that mean the vault was forced open.
    #[serde(default = "default_breach_markers")]
    pub breach_markers: Vec<String>,
    /// Substrings of the status text that mean the vault was opened legitimately.
    #[serde(default = "default_safe_open_markers")]
    pub safe_open_markers: Vec<String>,
    /// Face labels that mean the face was not recognized as an authorized user.
    #[serde(default = "default_unknown_face_labels")]
    pub unknown_face_labels: Vec<String>,
    /// Voice labels that mean the speaker was not recognized as an authorized user.
    #[serde(default = "default_unauthorized_voice_labels")]
    pub unauthorized_voice_labels: Vec<String>,
    /// Strict upper bound (cm) below which a distance reading counts as nearby.
    #[serde(default = "default_near_distance_cm")]
    pub near_distance_cm: f64,
    /// Placeholder identity label assigned when an episode opens, before any
    /// inference result arrives. Never treated as a sentinel match.
    #[serde(default = "default_pending_label")]
    pub pending_label: String,
}

fn default_breach_markers() -> Vec<String> {
    vec!["Brangkas Dibuka Paksa".to_string()]
}

fn default_safe_open_markers() -> Vec<String> {
    vec!["Terbuka Secara Aman".to_string()]
}

fn default_unknown_face_labels() -> Vec<String> {
    vec!["Unknown".to_string(), "OTHER_FACES".to_string()]
}

fn default_unauthorized_voice_labels() -> Vec<String> {
    vec!["Not_User".to_string()]
}

fn default_near_distance_cm() -> f64 {
    25.0
}

fn default_pending_label() -> String {
    "Menunggu...".to_string()
}

impl Default for FusionRules {
    fn default() -> Self {
        Self {
            breach_markers: default_breach_markers(),
            safe_open_markers: default_safe_open_markers(),
            unknown_face_labels: default_unknown_face_labels(),
            unauthorized_voice_labels: default_unauthorized_voice_labels(),
            near_distance_cm: default_near_distance_cm(),
            pending_label: default_pending_label(),
        }
    }
}

impl FusionRules {
    /// Classify one episode. Pure: same episode fields, same label.
    ///
    /// Priority, first match wins:
    /// 1. breach marker in status
    /// 2. unauthorized face or voice identity
    /// 3. safe-open marker in status
    /// 4. distance present, `> 0`, `< near_distance_cm` (zero readings are a
    ///    sensor failure mode and must not count as proximity)
    /// 5. motion present and set
    /// 6. nominal
    pub fn classify(&self, episode: &Episode) -> Label {
        if contains_any(&episode.status, &self.breach_markers) {
            return Label::Breach;
        }
        if self.unknown_face_labels.iter().any(|l| *l == episode.face_label)
            || self
                .unauthorized_voice_labels
                .iter()
                .any(|l| *l == episode.voice_label)
        {
            return Label::Suspicious;
        }
        if contains_any(&episode.status, &self.safe_open_markers) {
            return Label::SafeAuthorized;
        }
        if let Some(cm) = episode.distance_cm {
            if cm > 0.0 && cm < self.near_distance_cm {
                return Label::NearbyActivity;
            }
        }
        if episode.motion == Some(true) {
            return Label::MotionDetected;
        }
        Label::Nominal
    }
}

fn contains_any(haystack: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| haystack.contains(m.as_str()))
}

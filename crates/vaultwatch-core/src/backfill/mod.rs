//! Inference-log backfill.
//!
//! The face/voice inference services append their results to an external JSON
//! log (`results.json`): `{"face": [entry...], "voice": [entry...]}`. The
//! engine mirrors those entries into its in-memory face/voice sub-logs so the
//! UI can render history across restarts. A per-sub-log high-water-mark
//! timestamp makes re-reads idempotent: only strictly-newer entries are
//! admitted.
//!
//! A missing or unreadable log means "no new entries", never a fatal error;
//! the file legitimately does not exist before the first inference runs.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Timestamp format used by the inference services.
const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One admitted face/voice inference result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceLogEntry {
    /// When the inference service produced the result.
    pub timestamp: DateTime<Utc>,
    /// Predicted identity label.
    pub predicted_label: String,
    /// Model confidence, 0-100.
    pub confidence_percent: f64,
    /// Free-form note from the inference service (e.g. source filename).
    pub processing_note: String,
}

/// On-disk entry shape, field names as written by the inference services.
#[derive(Debug, Deserialize)]
struct RawLogEntry {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Hasil Prediksi")]
    predicted_label: String,
    #[serde(rename = "Akurasi (%)")]
    confidence_percent: f64,
    #[serde(rename = "Keterangan", default)]
    processing_note: String,
}

/// On-disk log shape.
#[derive(Debug, Default, Deserialize)]
struct RawResultLog {
    #[serde(default)]
    face: Vec<RawLogEntry>,
    #[serde(default)]
    voice: Vec<RawLogEntry>,
}

/// Entries admitted by one backfill pass.
#[derive(Debug, Default)]
pub struct BackfillBatch {
    pub face: Vec<InferenceLogEntry>,
    pub voice: Vec<InferenceLogEntry>,
}

/// Read the result log and return entries strictly newer than the given
/// high-water marks.
///
/// Entries with unparseable timestamps are skipped with a warning. Read or
/// parse failure of the file itself yields an empty batch.
pub fn read_new(
    path: &Path,
    face_hwm: Option<DateTime<Utc>>,
    voice_hwm: Option<DateTime<Utc>>,
) -> BackfillBatch {
    let raw = match read_log(path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no backfill data");
            return BackfillBatch::default();
        }
    };

    BackfillBatch {
        face: admit(raw.face, face_hwm),
        voice: admit(raw.voice, voice_hwm),
    }
}

fn read_log(path: &Path) -> anyhow::Result<RawResultLog> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn admit(raw: Vec<RawLogEntry>, hwm: Option<DateTime<Utc>>) -> Vec<InferenceLogEntry> {
    let mut admitted = Vec::new();
    for entry in raw {
        let timestamp = match NaiveDateTime::parse_from_str(&entry.timestamp, LOG_TIME_FORMAT) {
            Ok(naive) => naive.and_utc(),
            Err(_) => {
                warn!(raw = %entry.timestamp, "skipping log entry with bad timestamp");
                continue;
            }
        };
        if let Some(hwm) = hwm {
            if timestamp <= hwm {
                continue;
            }
        }
        admitted.push(InferenceLogEntry {
            timestamp,
            predicted_label: entry.predicted_label,
            confidence_percent: entry.confidence_percent,
            processing_note: entry.processing_note,
        });
    }
    admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("results.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    const SAMPLE: &str = r#"{
        "face": [
            {"Timestamp": "2024-05-01 10:00:00", "Hasil Prediksi": "ANGGI_FACES", "Akurasi (%)": 91.2, "Status": "Selesai", "Keterangan": "Diproses dari cam1.jpg"},
            {"Timestamp": "2024-05-01 10:05:00", "Hasil Prediksi": "OTHER_FACES", "Akurasi (%)": 55.0, "Status": "Selesai", "Keterangan": "Diproses dari cam2.jpg"}
        ],
        "voice": [
            {"Timestamp": "2024-05-01 10:02:00", "Hasil Prediksi": "Not_User", "Akurasi (%)": 70.1, "Status": "Selesai", "Keterangan": "Diproses dari mic.wav"}
        ]
    }"#;

    #[test]
    fn reads_both_sub_logs() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, SAMPLE);

        let batch = read_new(&path, None, None);
        assert_eq!(batch.face.len(), 2);
        assert_eq!(batch.voice.len(), 1);
        assert_eq!(batch.face[0].predicted_label, "ANGGI_FACES");
        assert!((batch.face[0].confidence_percent - 91.2).abs() < f64::EPSILON);
        assert_eq!(batch.voice[0].processing_note, "Diproses dari mic.wav");
    }

    #[test]
    fn high_water_mark_admits_strictly_newer_only() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, SAMPLE);

        let first = read_new(&path, None, None);
        let face_hwm = first.face.last().map(|e| e.timestamp);
        let voice_hwm = first.voice.last().map(|e| e.timestamp);

        // Unchanged file, updated marks: nothing new.
        let second = read_new(&path, face_hwm, voice_hwm);
        assert!(second.face.is_empty());
        assert!(second.voice.is_empty());
    }

    #[test]
    fn entry_equal_to_mark_is_not_readmitted() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, SAMPLE);

        let hwm = NaiveDateTime::parse_from_str("2024-05-01 10:00:00", LOG_TIME_FORMAT)
            .unwrap()
            .and_utc();
        let batch = read_new(&path, Some(hwm), None);
        assert_eq!(batch.face.len(), 1);
        assert_eq!(batch.face[0].predicted_label, "OTHER_FACES");
    }

    #[test]
    fn missing_file_is_empty_batch() {
        let dir = TempDir::new().unwrap();
        let batch = read_new(&dir.path().join("nope.json"), None, None);
        assert!(batch.face.is_empty());
        assert!(batch.voice.is_empty());
    }

    #[test]
    fn unparseable_file_is_empty_batch() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, "not json at all");
        let batch = read_new(&path, None, None);
        assert!(batch.face.is_empty());
        assert!(batch.voice.is_empty());
    }

    #[test]
    fn bad_timestamps_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            r#"{"face": [
                {"Timestamp": "yesterday-ish", "Hasil Prediksi": "X", "Akurasi (%)": 1.0, "Keterangan": ""},
                {"Timestamp": "2024-05-01 11:00:00", "Hasil Prediksi": "Y", "Akurasi (%)": 2.0, "Keterangan": ""}
            ], "voice": []}"#,
        );
        let batch = read_new(&path, None, None);
        assert_eq!(batch.face.len(), 1);
        assert_eq!(batch.face[0].predicted_label, "Y");
    }

    #[test]
    fn missing_sub_log_key_defaults_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, r#"{"face": []}"#);
        let batch = read_new(&path, None, None);
        assert!(batch.face.is_empty());
        assert!(batch.voice.is_empty());
    }
}

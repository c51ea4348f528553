//! Flat tabular export of engine state for offline analysis.
//!
//! Pure read-side formatting: the caller takes a [`Snapshot`] and turns its
//! pieces into CSV text. Status text and labels are free-form, so fields are
//! quoted whenever they contain a delimiter.

use crate::backfill::InferenceLogEntry;
use crate::engine::EpisodeRow;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render the episode timeline as CSV, one row per episode.
pub fn timeline_csv(episodes: &[EpisodeRow]) -> String {
    let mut out = String::from("Timestamp,Status,Distance (cm),Motion,Face,Voice,Fused Label\n");
    for ep in episodes {
        let row = [
            ep.timestamp.format(TIME_FORMAT).to_string(),
            ep.status.clone(),
            ep.distance_cm.map(|cm| cm.to_string()).unwrap_or_default(),
            ep.motion
                .map(|m| if m { "1" } else { "0" }.to_string())
                .unwrap_or_default(),
            ep.face_label.clone(),
            ep.voice_label.clone(),
            ep.fused_label.to_string(),
        ];
        push_row(&mut out, &row);
    }
    out
}

/// Render one inference sub-log as CSV, one row per admitted entry.
pub fn inference_csv(entries: &[InferenceLogEntry]) -> String {
    let mut out = String::from("Timestamp,Predicted Label,Confidence (%),Note\n");
    for entry in entries {
        let row = [
            entry.timestamp.format(TIME_FORMAT).to_string(),
            entry.predicted_label.clone(),
            entry.confidence_percent.to_string(),
            entry.processing_note.clone(),
        ];
        push_row(&mut out, &row);
    }
    out
}

fn push_row(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape(field));
    }
    out.push('\n');
}

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

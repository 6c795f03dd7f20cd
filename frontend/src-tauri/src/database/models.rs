use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// `recording_status` row, the durable record behind `RecordingStatusRow`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecordingStatusModel {
    pub id: String,
    pub audio_path: String,
    pub needs_transcription: bool,
    pub needs_summary: bool,
    pub needs_action_items: bool,
    pub created_at: String,
}

impl From<RecordingStatusModel> for crate::meeting::handlers::RecordingStatusRow {
    fn from(model: RecordingStatusModel) -> Self {
        Self {
            id: model.id,
            needs_transcription: model.needs_transcription,
            needs_summary: model.needs_summary,
            needs_action_items: model.needs_action_items,
            audio_path: model.audio_path,
        }
    }
}

use async_trait::async_trait;

use crate::database::manager::DatabaseManager;
use crate::database::models::RecordingStatusModel;
use crate::error::DetectorError;
use crate::meeting::handlers::{Catalog, RecordingStatusRow};

/// The one concrete, non-test implementation of `Catalog`: queries the
/// `recording_status` table the sqlite pool owns.
#[async_trait]
impl Catalog for DatabaseManager {
    async fn recordings_needing_transcription(&self) -> Result<Vec<RecordingStatusRow>, DetectorError> {
        let rows: Vec<RecordingStatusModel> = sqlx::query_as(
            "SELECT id, audio_path, needs_transcription, needs_summary, needs_action_items, created_at \
             FROM recording_status WHERE needs_transcription = 1",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| DetectorError::HandlerFailure(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn recordings_needing_ai_generation(
        &self,
        need_summary: bool,
        need_actions: bool,
    ) -> Result<Vec<RecordingStatusRow>, DetectorError> {
        let rows: Vec<RecordingStatusModel> = sqlx::query_as(
            "SELECT id, audio_path, needs_transcription, needs_summary, needs_action_items, created_at \
             FROM recording_status WHERE (? AND needs_summary = 1) OR (? AND needs_action_items = 1)",
        )
        .bind(need_summary)
        .bind(need_actions)
        .fetch_all(self.pool())
        .await
        .map_err(|e| DetectorError::HandlerFailure(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

use async_trait::async_trait;

use crate::error::DetectorError;
use crate::meeting::events::DetectorState;

/// Metadata an external capture layer reports back after finalising a
/// recording.
#[derive(Debug, Clone)]
pub struct RecordingMetadata {
    pub duration_secs: f64,
    pub file_size_bytes: u64,
}

/// Capability interface the detector drives to start/stop capture and
/// notify the embedder. Object-safe so the Tauri shell can hand the
/// detector an `Arc<dyn RecordingController>` without the detector owning
/// its concrete type, breaking the cyclic reference that a closure-stored
/// delegate would otherwise create.
#[async_trait]
pub trait RecordingController: Send + Sync {
    /// Begins capture to a file for `app_name`, returning the path the
    /// external recorder chose. May fail with permission-denied or I/O
    /// error.
    async fn start_recording(&self, app_name: &str) -> Result<String, DetectorError>;

    /// Finalises capture.
    async fn stop_recording(&self) -> Result<RecordingMetadata, DetectorError>;

    /// Fire-and-forget notification to the UI.
    async fn state_changed(&self, new_state: DetectorState);

    /// Fire-and-forget notification to the UI.
    async fn error(&self, err: DetectorError);
}

/// Capability interface driving the downstream processing queue. Kept
/// separate from `RecordingController` per the capability-set split in the
/// source design notes: the detector never needs transcription/AI handlers,
/// only the queue does.
#[async_trait]
pub trait ProcessingHandlers: Send + Sync {
    async fn transcribe(&self, recording_id: &str, audio_path: &str) -> Result<(), DetectorError>;
    async fn generate_ai(&self, recording_id: &str) -> Result<(), DetectorError>;
}

/// A row from the external durable catalog, trimmed to the columns the
/// queue's resume logic reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStatusRow {
    pub id: String,
    pub needs_transcription: bool,
    pub needs_summary: bool,
    pub needs_action_items: bool,
    pub audio_path: String,
}

/// Resume-time queries against the durable recording catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn recordings_needing_transcription(&self) -> Result<Vec<RecordingStatusRow>, DetectorError>;
    async fn recordings_needing_ai_generation(
        &self,
        need_summary: bool,
        need_actions: bool,
    ) -> Result<Vec<RecordingStatusRow>, DetectorError>;
}

/// A no-op `RecordingController` used by tests and as a safe placeholder
/// before the embedder wires up the real capture layer.
pub struct NullRecordingController;

#[async_trait]
impl RecordingController for NullRecordingController {
    async fn start_recording(&self, app_name: &str) -> Result<String, DetectorError> {
        Ok(format!("/dev/null/{app_name}"))
    }

    async fn stop_recording(&self) -> Result<RecordingMetadata, DetectorError> {
        Ok(RecordingMetadata {
            duration_secs: 0.0,
            file_size_bytes: 0,
        })
    }

    async fn state_changed(&self, _new_state: DetectorState) {}

    async fn error(&self, _err: DetectorError) {}
}

/// A no-op `ProcessingHandlers` used when the embedder hasn't wired up a
/// real transcription/summarization backend yet. Logs and reports success
/// so queued work drains instead of accumulating forever.
pub struct NullProcessingHandlers;

#[async_trait]
impl ProcessingHandlers for NullProcessingHandlers {
    async fn transcribe(&self, recording_id: &str, _audio_path: &str) -> Result<(), DetectorError> {
        log::warn!("transcribe called for {recording_id} with no transcription backend configured");
        Ok(())
    }

    async fn generate_ai(&self, recording_id: &str) -> Result<(), DetectorError> {
        log::warn!("generate_ai called for {recording_id} with no AI backend configured");
        Ok(())
    }
}

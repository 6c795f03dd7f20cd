use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::{error as log_error, info as log_info, warn as log_warn};
use tauri::{AppHandle, Wry};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::DetectorConfig;
use crate::crash::CrashPersistence;
use crate::database::manager::DatabaseManager;
use crate::error::DetectorError;
use crate::meeting::events::DetectorState;
use crate::meeting::handlers::{RecordingController, RecordingMetadata};
use crate::notifications::commands::{
    show_recording_started_notification, show_recording_stopped_notification,
    show_system_error_notification, NotificationManagerState,
};
use crate::queue::ProcessingQueue;

struct ActiveRecording {
    id: String,
    audio_path: String,
    started_at_secs: u64,
}

/// The `RecordingController` the desktop shell injects into the detector.
/// Actual audio capture is an external collaborator this crate doesn't own:
/// this controller allocates the recording's identity and destination path,
/// records a `recording_status` row and enqueues the recording onto the
/// processing queue so the same session picks it up immediately instead of
/// waiting for the next app restart, and adapts detector lifecycle events
/// into OS notifications.
pub struct AppRecordingController {
    app_handle: AppHandle<Wry>,
    notification_state: NotificationManagerState<Wry>,
    db_manager: Arc<DatabaseManager>,
    queue: Arc<ProcessingQueue>,
    crash_log: Arc<CrashPersistence>,
    current: Mutex<Option<ActiveRecording>>,
}

impl AppRecordingController {
    pub fn new(
        app_handle: AppHandle<Wry>,
        notification_state: NotificationManagerState<Wry>,
        db_manager: Arc<DatabaseManager>,
        queue: Arc<ProcessingQueue>,
        crash_log: Arc<CrashPersistence>,
    ) -> Self {
        Self {
            app_handle,
            notification_state,
            db_manager,
            queue,
            crash_log,
            current: Mutex::new(None),
        }
    }

    fn recordings_dir(&self) -> std::path::PathBuf {
        use tauri::Manager;
        self.app_handle
            .path()
            .app_data_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join("recordings")
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl RecordingController for AppRecordingController {
    async fn start_recording(&self, app_name: &str) -> Result<String, DetectorError> {
        let dir = self.recordings_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            return Err(DetectorError::HandlerFailure(format!(
                "could not create recordings directory: {e}"
            )));
        }

        let id = Uuid::new_v4().to_string();
        let audio_path = dir.join(format!("{id}.wav")).to_string_lossy().to_string();

        *self.current.lock().await = Some(ActiveRecording {
            id,
            audio_path: audio_path.clone(),
            started_at_secs: now_secs(),
        });

        if let Err(e) =
            show_recording_started_notification(&self.app_handle, &self.notification_state, app_name).await
        {
            log_warn!("failed to show recording-started notification: {e}");
        }

        Ok(audio_path)
    }

    async fn stop_recording(&self) -> Result<RecordingMetadata, DetectorError> {
        let active = self.current.lock().await.take().ok_or_else(|| {
            DetectorError::InvariantViolation("stop_recording called with no active recording".to_string())
        })?;

        let duration_secs = (now_secs().saturating_sub(active.started_at_secs)) as f64;
        let file_size_bytes = std::fs::metadata(&active.audio_path).map(|m| m.len()).unwrap_or(0);

        let config = DetectorConfig::load().await;
        let needs_transcription = config.auto_transcribe;
        let needs_summary = config.auto_generate_summary;
        let needs_action_items = config.auto_generate_action_items;

        let insert_result = sqlx::query(
            "INSERT INTO recording_status (id, audio_path, needs_transcription, needs_summary, needs_action_items) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&active.id)
        .bind(&active.audio_path)
        .bind(needs_transcription)
        .bind(needs_summary)
        .bind(needs_action_items)
        .execute(self.db_manager.pool())
        .await;

        if let Err(e) = insert_result {
            log_error!("failed to record recording_status row for {}: {e}", active.id);
        } else {
            if needs_transcription {
                self.queue
                    .enqueue_transcription(active.id.clone(), active.audio_path.clone())
                    .await;
            }
            if needs_summary || needs_action_items {
                self.queue.enqueue_ai_generation(active.id.clone()).await;
            }
        }

        if let Err(e) = show_recording_stopped_notification(&self.app_handle, &self.notification_state).await {
            log_warn!("failed to show recording-stopped notification: {e}");
        }

        log_info!(
            "recording {} finalised: {:.1}s, {} bytes",
            active.id,
            duration_secs,
            file_size_bytes
        );

        Ok(RecordingMetadata { duration_secs, file_size_bytes })
    }

    async fn state_changed(&self, new_state: DetectorState) {
        log_info!("detector state changed: {new_state:?}");
    }

    async fn error(&self, err: DetectorError) {
        log_error!("detector reported error: {err}");
        self.crash_log.log_error(&err.to_string()).await;
        if let Err(e) = show_system_error_notification(&self.notification_state, err.to_string()).await {
            log_warn!("failed to show system-error notification: {e}");
        }
    }
}

use std::sync::Arc;

use crate::crash::CrashPersistence;
use crate::database::manager::DatabaseManager;
use crate::meeting::MeetingDetector;
use crate::queue::ProcessingQueue;

/// Tauri-managed application state: the orchestrator's long-lived actors,
/// held as `Arc`s so `#[tauri::command]` handlers can clone a reference
/// cheaply out of `tauri::State`.
pub struct AppState {
    pub detector: Arc<MeetingDetector>,
    pub queue: Arc<ProcessingQueue>,
    pub db_manager: Arc<DatabaseManager>,
    pub crash_log: Arc<CrashPersistence>,
}

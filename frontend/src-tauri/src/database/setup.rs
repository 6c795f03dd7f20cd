use log::info;
use tauri::{AppHandle, Emitter};

use super::manager::DatabaseManager;

/// Initializes the recording-status database on app startup. Detects first
/// launch (no database file yet) purely to let the front end show an
/// onboarding flow; the database itself is always created/opened so the
/// processing queue has a catalog to resume from on every launch.
pub async fn initialize_database_on_startup(app: &AppHandle) -> Result<DatabaseManager, String> {
    let is_first_launch = DatabaseManager::is_first_launch(app)
        .await
        .map_err(|e| format!("Failed to check first launch status: {}", e))?;

    if is_first_launch {
        info!("First launch detected - will notify window when ready");

        let app_handle = app.clone();
        tauri::async_runtime::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = app_handle.emit("first-launch-detected", ()) {
                log::warn!("failed to emit first-launch-detected event: {e}");
            }
            info!("Emitted first-launch-detected after delay");
        });
    }

    let db_manager = DatabaseManager::new_from_app_handle(app)
        .await
        .map_err(|e| format!("Failed to initialize database manager: {}", e))?;

    info!("Database initialized successfully");
    Ok(db_manager)
}

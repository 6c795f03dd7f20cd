#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

// Performance optimization: conditional logging macros for hot paths (the
// 1 s mic/window-title poll ticks), compiled out entirely in release builds.
#[cfg(debug_assertions)]
macro_rules! perf_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! perf_debug {
    ($($arg:tt)*) => {};
}

#[cfg(debug_assertions)]
macro_rules! perf_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! perf_trace {
    ($($arg:tt)*) => {};
}

pub(crate) use perf_debug;
pub(crate) use perf_trace;

pub mod app_recording_controller;
pub mod config;
pub mod crash;
pub mod database;
pub mod error;
pub mod meeting;
pub mod notifications;
pub mod queue;
pub mod state;

use std::sync::Arc;

use app_recording_controller::AppRecordingController;
use config::DetectorConfig;
use crash::CrashPersistence;
use log::{error as log_error, info as log_info};
use meeting::bridge::SystemEventBridge;
use meeting::events::{DetectorState, SystemEvent};
use meeting::handlers::NullProcessingHandlers;
use meeting::MeetingDetector;
use notifications::commands::NotificationManagerState;
use queue::ProcessingQueue;
use state::AppState;
use tauri::{AppHandle, Emitter, Manager, State, Wry};

#[tauri::command]
async fn get_detector_state(state: State<'_, AppState>) -> Result<DetectorState, String> {
    Ok(state.detector.state().await)
}

#[tauri::command]
async fn force_start_recording(state: State<'_, AppState>, app_name: String) -> Result<(), String> {
    state
        .detector
        .force_start_recording(&app_name)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn force_stop_recording(state: State<'_, AppState>) -> Result<(), String> {
    state.detector.force_stop_recording().await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn reset_recording_state(state: State<'_, AppState>) -> Result<(), String> {
    state.detector.reset_recording_state().await;
    Ok(())
}

#[tauri::command]
async fn get_detector_configuration() -> DetectorConfig {
    DetectorConfig::load().await
}

#[tauri::command]
async fn update_detector_configuration(
    state: State<'_, AppState>,
    config: DetectorConfig,
) -> Result<(), String> {
    config.save().await.map_err(|e| e.to_string())?;
    state.detector.update_configuration(config).await;
    Ok(())
}

#[tauri::command]
async fn get_queue_status(state: State<'_, AppState>) -> Result<queue::processing_queue::QueueStatus, String> {
    Ok(state.queue.get_status().await)
}

#[tauri::command]
async fn read_crash_log(state: State<'_, AppState>, last_n_lines: Option<usize>) -> Result<Vec<String>, String> {
    match last_n_lines {
        Some(n) => state.crash_log.read_last_n_lines(n).await.map_err(|e| e.to_string()),
        None => state
            .crash_log
            .read_all()
            .await
            .map(|content| content.lines().map(String::from).collect())
            .map_err(|e| e.to_string()),
    }
}

/// Spawns a background task that forwards the queue's own status-change
/// stream into a Tauri event so the front end can subscribe instead of
/// polling `get_queue_status`.
fn spawn_queue_status_forwarder(app_handle: AppHandle<Wry>, queue: Arc<ProcessingQueue>) {
    tauri::async_runtime::spawn(async move {
        let Some(mut rx) = queue.take_status_receiver().await else {
            log_error!("queue status receiver already taken; status events will not be forwarded");
            return;
        };

        while let Some((kind, status)) = rx.recv().await {
            if let Err(e) = app_handle.emit("queue-status-changed", (kind, status)) {
                log_error!("failed to emit queue-status-changed: {e}");
            }
        }
    });
}

pub fn run() {
    log::set_max_level(log::LevelFilter::Info);

    tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .manage(Arc::new(tokio::sync::RwLock::new(
            None::<notifications::manager::NotificationManager<Wry>>,
        )) as NotificationManagerState<Wry>)
        .setup(|app| {
            log_info!("Application setup starting...");

            let app_handle = app.handle().clone();

            // Notification system: default consent/permission on first launch,
            // matching the teacher's "ready immediately" desktop-app posture.
            let notif_app_handle = app_handle.clone();
            tauri::async_runtime::spawn(async move {
                let notif_state = notif_app_handle.state::<NotificationManagerState<Wry>>();
                match notifications::commands::initialize_notification_manager(notif_app_handle.clone()).await {
                    Ok(manager) => {
                        if let Err(e) = manager.set_consent(true).await {
                            log_error!("Failed to set initial notification consent: {}", e);
                        }
                        if let Err(e) = manager.request_permission().await {
                            log_error!("Failed to request initial notification permission: {}", e);
                        }
                        let mut state_lock = notif_state.write().await;
                        *state_lock = Some(manager);
                        log_info!("Notification system initialized");
                    }
                    Err(e) => log_error!("Failed to initialize notification manager: {}", e),
                }
            });

            // Database, detector, queue, and crash persistence all need to be
            // up before the UI can issue commands, so this part of setup runs
            // to completion synchronously.
            let db_manager = tauri::async_runtime::block_on(
                database::setup::initialize_database_on_startup(&app_handle),
            )
            .expect("failed to initialize database");
            let db_manager = Arc::new(db_manager);

            let crash_log = tauri::async_runtime::block_on(CrashPersistence::init())
                .expect("failed to initialize crash persistence");

            let detector_config = tauri::async_runtime::block_on(DetectorConfig::load());

            let processing_queue = ProcessingQueue::new();
            tauri::async_runtime::block_on(
                processing_queue.start(Arc::new(NullProcessingHandlers)),
            );
            tauri::async_runtime::block_on(
                processing_queue.resume_incomplete_work(db_manager.as_ref(), &detector_config),
            );
            spawn_queue_status_forwarder(app_handle.clone(), processing_queue.clone());

            let notification_state = app_handle.state::<NotificationManagerState<Wry>>().inner().clone();
            let controller = Arc::new(AppRecordingController::new(
                app_handle.clone(),
                notification_state,
                db_manager.clone(),
                processing_queue.clone(),
                crash_log.clone(),
            ));

            let detector = MeetingDetector::new(detector_config.clone(), controller);
            tauri::async_runtime::block_on(detector.start());

            let bridge = Arc::new(SystemEventBridge::new(detector.clone()));

            app.manage(AppState {
                detector: detector.clone(),
                queue: processing_queue,
                db_manager,
                crash_log,
            });
            app.manage(bridge);

            log_info!("Application setup complete");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_detector_state,
            force_start_recording,
            force_stop_recording,
            reset_recording_state,
            get_detector_configuration,
            update_detector_configuration,
            get_queue_status,
            read_crash_log,
            // Notification system commands
            notifications::commands::get_notification_settings,
            notifications::commands::set_notification_settings,
            notifications::commands::request_notification_permission,
            notifications::commands::show_notification,
            notifications::commands::show_test_notification,
            notifications::commands::is_dnd_active,
            notifications::commands::get_system_dnd_status,
            notifications::commands::set_manual_dnd,
            notifications::commands::set_notification_consent,
            notifications::commands::clear_notifications,
            notifications::commands::is_notification_system_ready,
            notifications::commands::get_notification_stats,
        ])
        .on_window_event(|window, event| {
            // Window focus is a reasonable cross-platform proxy for "the
            // user is back at the machine"; a real macOS build would also
            // observe NSWorkspace sleep/wake notifications directly.
            if let tauri::WindowEvent::Focused(true) = event {
                let app_handle = window.app_handle().clone();
                tauri::async_runtime::spawn(async move {
                    let bridge = app_handle.state::<Arc<SystemEventBridge>>().inner().clone();
                    bridge.dispatch(SystemEvent::DidWake).await;
                });
            }
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            if let tauri::RunEvent::Exit = event {
                log_info!("Application exiting, cleaning up resources...");
                tauri::async_runtime::block_on(async {
                    if let Some(app_state) = app_handle.try_state::<AppState>() {
                        app_state.detector.stop().await;
                        app_state.queue.stop().await;

                        if let Err(e) = app_state.db_manager.cleanup().await {
                            log_error!("Failed to cleanup database: {}", e);
                        }

                        app_state.crash_log.shutdown().await;
                    } else {
                        log::warn!("AppState not available at exit, skipping orchestrator shutdown");
                    }
                });
                log_info!("Application cleanup complete");
            }
        });
}

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{info as log_info, warn as log_warn};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::meeting::apps::MeetingAppCatalog;
use crate::meeting::coordinator::DetectionCoordinator;
use crate::meeting::events::{DetectionSource, DetectorState, MicrophoneEvent, ProcessSetDiff, WindowTitleEvent};
use crate::meeting::grace_timer::GraceTimer;
use crate::meeting::handlers::RecordingController;
use crate::meeting::mic_monitor::{self, MicrophoneMonitor};
use crate::meeting::process_monitor::{self, ProcessMonitor};
use crate::meeting::window_title_monitor::{WindowTitleMonitor, UngrantedWindowTitleProbe, DEFAULT_TARGET_PROCESS};

/// Events the internal run loop selects over. Everything the detector reacts
/// to — signal-source deltas, grace-timer expiry, wake notifications —
/// funnels through this single channel so state transitions stay
/// linearisable without nested locking between sources and the detector.
enum Internal {
    ProcessDiff(ProcessSetDiff),
    Mic(MicrophoneEvent),
    WindowTitle(WindowTitleEvent),
    GraceExpired(u64),
    WakeRescan,
}

struct Inner {
    state: DetectorState,
    running_meeting_apps: HashSet<String>,
    current_recording_bundle_id: Option<String>,
    coordinator: DetectionCoordinator,
    grace_generation: Option<u64>,
    config: DetectorConfig,
}

impl Inner {
    fn new(config: DetectorConfig) -> Self {
        Self {
            state: DetectorState::Idle,
            running_meeting_apps: HashSet::new(),
            current_recording_bundle_id: None,
            coordinator: DetectionCoordinator::new(),
            grace_generation: None,
            config,
        }
    }
}

/// Top-level meeting-detection state machine. Owns the three signal
/// sources, the coordinator, and the grace-period timer; all public methods
/// serialise through a single internal mutex, matching the single-owner
/// actor shape used elsewhere in this codebase.
pub struct MeetingDetector {
    inner: Mutex<Inner>,
    catalog: Arc<MeetingAppCatalog>,
    controller: Arc<dyn RecordingController>,
    process_monitor: Arc<ProcessMonitor>,
    mic_monitor: Arc<MicrophoneMonitor>,
    window_title_monitor: Arc<WindowTitleMonitor>,
    grace_timer: GraceTimer,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: Mutex<Option<mpsc::UnboundedReceiver<Internal>>>,
    run_loop: Mutex<Option<JoinHandle<()>>>,
    stop_signal: Arc<Notify>,
    started: std::sync::atomic::AtomicBool,
}

impl MeetingDetector {
    pub fn new(config: DetectorConfig, controller: Arc<dyn RecordingController>) -> Arc<Self> {
        let catalog = Arc::new(MeetingAppCatalog::new(
            &config.enabled_apps,
            &config.browser_apps,
            config.custom_apps.clone(),
        ));
        let process_monitor = Arc::new(ProcessMonitor::new(process_monitor::default_probe(), catalog.clone()));
        let mic_monitor = Arc::new(MicrophoneMonitor::new(mic_monitor::default_probe()));
        let window_title_monitor = Arc::new(WindowTitleMonitor::new(
            Arc::new(UngrantedWindowTitleProbe::default()),
            DEFAULT_TARGET_PROCESS,
        ));

        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            inner: Mutex::new(Inner::new(config)),
            catalog,
            controller,
            process_monitor,
            mic_monitor,
            window_title_monitor,
            grace_timer: GraceTimer::new(),
            internal_tx,
            internal_rx: Mutex::new(Some(internal_rx)),
            run_loop: Mutex::new(None),
            stop_signal: Arc::new(Notify::new()),
            started: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub async fn state(&self) -> DetectorState {
        self.inner.lock().await.state.clone()
    }

    /// Idempotent. Wires the signal sources' event streams into the
    /// detector's run loop *before* starting the sources, per the ordering
    /// obligation that the first delta batch must never be dropped.
    pub async fn start(self: &Arc<Self>) {
        if self.started.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        let mut rx = self.internal_rx.lock().await.take().expect("run loop started at most once");
        let this = Arc::clone(self);
        let stop_signal = self.stop_signal.clone();

        *self.run_loop.lock().await = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_signal.notified() => break,
                    event = rx.recv() => {
                        match event {
                            Some(event) => this.handle_internal(event).await,
                            None => break,
                        }
                    }
                }
            }
        }));

        self.start_process_scan().await;
    }

    async fn start_process_scan(self: &Arc<Self>) {
        let mut rx = self.process_monitor.start().await;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            while let Some(diff) = rx.recv().await {
                if tx.send(Internal::ProcessDiff(diff)).is_err() {
                    break;
                }
            }
        });
    }

    /// Idempotent. Cancels every owned task and awaits their termination,
    /// then transitions to `Idle`.
    pub async fn stop(self: &Arc<Self>) {
        if !self.started.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        self.grace_timer.cancel();
        self.process_monitor.stop().await;
        self.mic_monitor.stop().await;
        self.window_title_monitor.stop().await;

        self.stop_signal.notify_one();
        if let Some(handle) = self.run_loop.lock().await.take() {
            let _ = handle.await;
        }

        let mut inner = self.inner.lock().await;
        inner.state = DetectorState::Idle;
        inner.running_meeting_apps.clear();
        inner.current_recording_bundle_id = None;
        inner.coordinator.reset();
    }

    /// Sleeps 2s for apps to re-hydrate after wake, then rescans.
    pub async fn handle_system_wake(self: &Arc<Self>) {
        tokio::time::sleep(Duration::from_secs(2)).await;
        let _ = self.internal_tx.send(Internal::WakeRescan);
    }

    pub async fn force_start_recording(self: &Arc<Self>, app_name: &str) -> Result<(), DetectorError> {
        let should_start = {
            let mut inner = self.inner.lock().await;
            inner.coordinator.register(DetectionSource::Manual);
            matches!(inner.state, DetectorState::Idle | DetectorState::Monitoring { .. })
        };

        if should_start {
            self.begin_recording(app_name).await;
        }
        Ok(())
    }

    pub async fn force_stop_recording(self: &Arc<Self>) -> Result<(), DetectorError> {
        self.end_recording().await;
        Ok(())
    }

    /// The embedder stopped recording externally (e.g. via the menu bar).
    /// Must not issue a redundant stop-handler call, but must re-arm
    /// monitoring for the next activation.
    pub async fn reset_recording_state(self: &Arc<Self>) {
        self.grace_timer.cancel();
        let mut inner = self.inner.lock().await;
        inner.current_recording_bundle_id = None;
        inner.grace_generation = None;
        inner.coordinator.reset();

        inner.state = if inner.running_meeting_apps.is_empty() {
            DetectorState::Idle
        } else {
            DetectorState::Monitoring {
                apps: join_apps(&inner.running_meeting_apps),
            }
        };
        let state = inner.state.clone();
        drop(inner);
        self.controller.state_changed(state).await;
    }

    /// Hot-applicable; the grace period change only affects the *next*
    /// deactivation since a live grace timer is not rescheduled.
    pub async fn update_configuration(&self, new_config: DetectorConfig) {
        self.inner.lock().await.config = new_config;
    }

    /// Whether a `ScreenUnlocked` notification should trigger a rescan.
    /// `DidWake` always triggers one regardless of this setting.
    pub async fn check_on_wake(&self) -> bool {
        self.inner.lock().await.config.check_on_wake
    }

    async fn handle_internal(self: &Arc<Self>, event: Internal) {
        match event {
            Internal::ProcessDiff(diff) => self.on_process_diff(diff).await,
            Internal::Mic(event) => self.on_mic_event(event).await,
            Internal::WindowTitle(event) => self.on_window_title_event(event).await,
            Internal::GraceExpired(generation) => self.on_grace_expired(generation).await,
            Internal::WakeRescan => self.on_wake_rescan().await,
        }
    }

    async fn on_process_diff(self: &Arc<Self>, diff: ProcessSetDiff) {
        let was_empty;
        let now_empty;
        {
            let mut inner = self.inner.lock().await;
            was_empty = inner.running_meeting_apps.is_empty();
            for app in diff.added {
                inner.running_meeting_apps.insert(app);
            }
            for app in diff.removed {
                inner.running_meeting_apps.remove(&app);
            }
            now_empty = inner.running_meeting_apps.is_empty();
        }

        if was_empty && !now_empty {
            self.enter_monitoring().await;
        } else if !was_empty && now_empty {
            self.transition_to_idle_from_any().await;
        } else if !now_empty {
            // Keep the displayed app list current without forcing a phase change.
            let mut inner = self.inner.lock().await;
            if let DetectorState::Monitoring { .. } = inner.state {
                inner.state = DetectorState::Monitoring {
                    apps: join_apps(&inner.running_meeting_apps),
                };
            }
        }
    }

    async fn enter_monitoring(self: &Arc<Self>) {
        let apps = {
            let mut inner = self.inner.lock().await;
            inner.state = DetectorState::Monitoring {
                apps: join_apps(&inner.running_meeting_apps),
            };
            inner.state.clone()
        };
        self.controller.state_changed(apps).await;

        let polling_interval = Duration::from_secs_f64(
            self.inner.lock().await.config.microphone_polling_interval_secs,
        );

        let mut rx = self.mic_monitor.start(polling_interval).await;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if tx.send(Internal::Mic(event)).is_err() {
                    break;
                }
            }
        });

        let (window_enabled, window_interval) = {
            let inner = self.inner.lock().await;
            (
                inner.config.enable_window_title_detection,
                Duration::from_secs_f64(inner.config.window_title_polling_interval_secs),
            )
        };
        if window_enabled {
            let mut rx = self.window_title_monitor.start(window_interval).await;
            let tx = self.internal_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if tx.send(Internal::WindowTitle(event)).is_err() {
                        break;
                    }
                }
            });
        }

        // Inject synthetic activations for any client already using the
        // mic before we started polling, so a meeting already in progress
        // is picked up immediately.
        for usage in self.mic_monitor.snapshot() {
            if self.catalog.match_bundle_id(&usage.bundle_id).is_some() || self.catalog.is_browser(&usage.bundle_id) {
                let _ = self.internal_tx.send(Internal::Mic(MicrophoneEvent::Activated(usage)));
            }
        }
    }

    async fn on_mic_event(self: &Arc<Self>, event: MicrophoneEvent) {
        match event {
            MicrophoneEvent::NoChange => {}
            MicrophoneEvent::Activated(usage) => {
                let bundle_id = self.resolve_recording_bundle_id(&usage.bundle_id);
                let Some(bundle_id) = bundle_id else { return };

                let in_grace = matches!(self.inner.lock().await.state, DetectorState::EndingMeeting { .. });
                if in_grace {
                    self.grace_timer.cancel();
                    let mut inner = self.inner.lock().await;
                    inner.grace_generation = None;
                    inner.state = DetectorState::Recording { app: bundle_id };
                    let state = inner.state.clone();
                    drop(inner);
                    self.controller.state_changed(state).await;
                    return;
                }

                let should_start = {
                    let mut inner = self.inner.lock().await;
                    let started = inner.coordinator.register(DetectionSource::MicrophoneActive);
                    matches!(inner.state, DetectorState::Monitoring { .. }) && started
                };

                if should_start {
                    self.begin_recording(&bundle_id).await;
                }
            }
            MicrophoneEvent::Deactivated(usage) => {
                let bundle_id = self.resolve_recording_bundle_id(&usage.bundle_id);
                let Some(bundle_id) = bundle_id else { return };

                let recording = {
                    let mut inner = self.inner.lock().await;
                    inner.coordinator.remove(DetectionSource::MicrophoneActive);
                    matches!(&inner.state, DetectorState::Recording { app } if *app == bundle_id)
                };

                if recording {
                    self.enter_ending_meeting(bundle_id).await;
                }
            }
        }
    }

    async fn on_window_title_event(self: &Arc<Self>, event: WindowTitleEvent) {
        match event {
            WindowTitleEvent::MeetingDetected { title } => {
                let should_start = {
                    let mut inner = self.inner.lock().await;
                    let started = inner.coordinator.register(DetectionSource::WindowTitle);
                    matches!(inner.state, DetectorState::Monitoring { .. }) && started
                };

                if should_start {
                    self.begin_recording(&title).await;
                }
            }
            WindowTitleEvent::MeetingEnded => {
                self.inner.lock().await.coordinator.remove(DetectionSource::WindowTitle);
            }
        }
    }

    async fn on_grace_expired(self: &Arc<Self>, generation: u64) {
        if !self.grace_timer.is_current(generation) {
            return;
        }

        let (no_other_source, current_app) = {
            let inner = self.inner.lock().await;
            (!inner.coordinator.has_active(), inner.current_recording_bundle_id.clone())
        };

        if !no_other_source {
            return;
        }

        let _ = current_app;
        self.end_recording().await;
    }

    async fn on_wake_rescan(self: &Arc<Self>) {
        let should_monitor = {
            let inner = self.inner.lock().await;
            inner.state == DetectorState::Idle && !inner.running_meeting_apps.is_empty()
        };

        if should_monitor {
            self.enter_monitoring().await;
        }
    }

    async fn begin_recording(self: &Arc<Self>, app_name: &str) {
        {
            let mut inner = self.inner.lock().await;
            inner.state = DetectorState::MeetingDetected { app: app_name.to_string() };
        }
        self.controller
            .state_changed(DetectorState::MeetingDetected { app: app_name.to_string() })
            .await;

        match self.controller.start_recording(app_name).await {
            Ok(_path) => {
                log_info!("recording started for {app_name}");
                let mut inner = self.inner.lock().await;
                inner.current_recording_bundle_id = Some(app_name.to_string());
                inner.state = DetectorState::Recording { app: app_name.to_string() };
                let state = inner.state.clone();
                drop(inner);
                self.controller.state_changed(state).await;
            }
            Err(err) => {
                log_warn!("recording start failed for {app_name}: {err}");
                let mut inner = self.inner.lock().await;
                inner.state = DetectorState::Monitoring {
                    apps: join_apps(&inner.running_meeting_apps),
                };
                let state = inner.state.clone();
                drop(inner);
                self.controller.state_changed(state).await;
                self.controller.error(err).await;
            }
        }
    }

    async fn enter_ending_meeting(self: &Arc<Self>, app: String) {
        {
            let mut inner = self.inner.lock().await;
            inner.state = DetectorState::EndingMeeting { app: app.clone() };
        }
        self.controller.state_changed(DetectorState::EndingMeeting { app: app.clone() }).await;

        let grace = Duration::from_secs_f64(self.inner.lock().await.config.mic_deactivation_grace_period_secs);
        let generation = self.grace_timer.arm(grace, self.internal_tx_for_grace());
        self.inner.lock().await.grace_generation = Some(generation);
    }

    fn internal_tx_for_grace(&self) -> mpsc::UnboundedSender<u64> {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let forward = self.internal_tx.clone();
        tokio::spawn(async move {
            if let Some(generation) = rx.recv().await {
                let _ = forward.send(Internal::GraceExpired(generation));
            }
        });
        tx
    }

    /// Called when the grace timer expires with no other active source, or
    /// when the process set becomes empty while recording.
    async fn end_recording(self: &Arc<Self>) {
        let was_recording = matches!(
            self.inner.lock().await.state,
            DetectorState::Recording { .. } | DetectorState::EndingMeeting { .. } | DetectorState::MeetingDetected { .. }
        );

        if was_recording {
            match self.controller.stop_recording().await {
                Ok(_metadata) => log_info!("recording stopped"),
                Err(err) => {
                    log_warn!("stop-handler failed: {err}");
                    self.controller.error(err).await;
                }
            }
        }

        let mut inner = self.inner.lock().await;
        inner.current_recording_bundle_id = None;
        inner.grace_generation = None;
        inner.coordinator.reset();
        inner.state = if inner.running_meeting_apps.is_empty() {
            DetectorState::Idle
        } else {
            DetectorState::Monitoring { apps: join_apps(&inner.running_meeting_apps) }
        };
        let state = inner.state.clone();
        drop(inner);
        self.controller.state_changed(state).await;
    }

    /// Process-set empty while in any non-idle state: stops mic monitoring
    /// and, if a recording was in progress, calls the stop handler first.
    async fn transition_to_idle_from_any(self: &Arc<Self>) {
        self.mic_monitor.stop().await;
        self.window_title_monitor.stop().await;
        self.grace_timer.cancel();
        self.end_recording().await;
    }

    /// Browser helper processes resolve to the browser's bundle-id prefix,
    /// not the helper's full id; everything else is its own activating
    /// bundle id.
    fn resolve_recording_bundle_id(&self, bundle_id: &str) -> Option<String> {
        if let Some(app) = self.catalog.match_bundle_id(bundle_id) {
            return Some(app.bundle_id.clone().unwrap_or_else(|| app.id.clone()));
        }
        if self.catalog.is_browser(bundle_id) {
            return Some(bundle_id.to_string());
        }
        None
    }
}

fn join_apps(apps: &HashSet<String>) -> String {
    let mut names: Vec<&String> = apps.iter().collect();
    names.sort();
    names.into_iter().cloned().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meeting::events::DetectorState;
    use crate::meeting::handlers::{NullRecordingController, RecordingMetadata};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct RecordingController {
        starts: AtomicUsize,
        stops: AtomicUsize,
        states: AsyncMutex<Vec<DetectorState>>,
    }

    impl RecordingController {
        fn new() -> Self {
            Self {
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                states: AsyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl crate::meeting::handlers::RecordingController for RecordingController {
        async fn start_recording(&self, app_name: &str) -> Result<String, DetectorError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(format!("/rec/{app_name}.wav"))
        }

        async fn stop_recording(&self) -> Result<RecordingMetadata, DetectorError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(RecordingMetadata { duration_secs: 1.0, file_size_bytes: 1 })
        }

        async fn state_changed(&self, new_state: DetectorState) {
            self.states.lock().await.push(new_state);
        }

        async fn error(&self, _err: DetectorError) {}
    }

    #[tokio::test]
    async fn starts_idle() {
        let detector = MeetingDetector::new(DetectorConfig::default(), Arc::new(NullRecordingController));
        assert_eq!(detector.state().await, DetectorState::Idle);
    }

    #[tokio::test]
    async fn start_stop_is_idempotent() {
        let detector = MeetingDetector::new(DetectorConfig::default(), Arc::new(NullRecordingController));
        detector.start().await;
        detector.start().await;
        detector.stop().await;
        detector.stop().await;
        assert_eq!(detector.state().await, DetectorState::Idle);
    }

    #[tokio::test]
    async fn force_start_and_stop_recording() {
        let controller = Arc::new(RecordingController::new());
        let detector = MeetingDetector::new(DetectorConfig::default(), controller.clone());
        detector.start().await;

        detector.force_start_recording("Zoom").await.unwrap();
        assert_eq!(controller.starts.load(Ordering::SeqCst), 1);

        detector.force_stop_recording().await.unwrap();
        assert_eq!(controller.stops.load(Ordering::SeqCst), 1);

        detector.stop().await;
    }

    #[tokio::test]
    async fn reset_recording_state_does_not_call_stop_handler() {
        let controller = Arc::new(RecordingController::new());
        let detector = MeetingDetector::new(DetectorConfig::default(), controller.clone());
        detector.start().await;
        detector.force_start_recording("Zoom").await.unwrap();

        detector.reset_recording_state().await;
        assert_eq!(controller.stops.load(Ordering::SeqCst), 0, "reset must not issue a redundant stop-handler call");

        detector.stop().await;
    }
}

use std::sync::Arc;
use std::time::Duration;

use regex::RegexSet;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::meeting::events::WindowTitleEvent;

pub const DEFAULT_TARGET_PROCESS: &str = "zoom.us";

const LOBBY_PATTERNS: &[&str] = &["(?i)zoom cloud meetings", "(?i)settings", "(?i)join meeting"];
const MEETING_PATTERNS: &[&str] = &["(?i)zoom meeting", "(?i)meeting id:", "(?i)waiting room"];
const MEETING_SUFFIXES: &[&str] = &[" - Zoom", " | Zoom"];

/// Whether an observed window title indicates a lobby, an active meeting,
/// or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TitleClass {
    Lobby,
    Meeting,
    Other,
}

/// Classifies a window title per the ordered rules: bare "Zoom" is a lobby,
/// lobby patterns beat meeting patterns, meeting patterns beat suffix
/// matches, everything else is not-a-meeting.
fn classify(title: &str, lobby: &RegexSet, meeting: &RegexSet) -> TitleClass {
    if title == "Zoom" {
        return TitleClass::Lobby;
    }
    if lobby.is_match(title) {
        return TitleClass::Lobby;
    }
    if meeting.is_match(title) {
        return TitleClass::Meeting;
    }
    if MEETING_SUFFIXES.iter().any(|suffix| title.ends_with(suffix)) {
        return TitleClass::Meeting;
    }
    TitleClass::Other
}

/// Isolates the OS-facing accessibility-gated window enumeration.
pub trait WindowTitleProbe: Send + Sync {
    /// `true` once the accessibility grant needed to read other apps'
    /// window titles has been obtained.
    fn has_accessibility_grant(&self) -> bool;
    /// Titles of all windows belonging to `process_name`. Empty if the
    /// process is not running.
    fn window_titles(&self, process_name: &str) -> Vec<String>;
}

/// Stub used off macOS, and on macOS before the grant is obtained. Reports
/// no accessibility grant so the monitor disables itself cleanly instead of
/// polling forever for nothing.
#[derive(Default)]
pub struct UngrantedWindowTitleProbe;

impl WindowTitleProbe for UngrantedWindowTitleProbe {
    fn has_accessibility_grant(&self) -> bool {
        false
    }

    fn window_titles(&self, _process_name: &str) -> Vec<String> {
        Vec::new()
    }
}

// No AXIsProcessTrusted()-backed probe is wired up yet: reading another
// app's window titles needs an Accessibility-framework binding this crate
// doesn't carry, so macOS gets the same `UngrantedWindowTitleProbe` as every
// other platform rather than a probe that claims to check a grant it never
// actually queries.

/// Polls the window titles of a target process and emits `MeetingDetected`
/// / `MeetingEnded` per the classification rules. Requires an OS
/// accessibility grant; disables itself cleanly when absent.
pub struct WindowTitleMonitor {
    probe: Arc<dyn WindowTitleProbe>,
    target_process: String,
    lobby_set: RegexSet,
    meeting_set: RegexSet,
    currently_meeting: Mutex<bool>,
    stop_signal: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WindowTitleMonitor {
    pub fn new(probe: Arc<dyn WindowTitleProbe>, target_process: impl Into<String>) -> Self {
        Self {
            probe,
            target_process: target_process.into(),
            lobby_set: RegexSet::new(LOBBY_PATTERNS).expect("lobby patterns are valid regex"),
            meeting_set: RegexSet::new(MEETING_PATTERNS).expect("meeting patterns are valid regex"),
            currently_meeting: Mutex::new(false),
            stop_signal: Arc::new(Notify::new()),
            task: Mutex::new(None),
        }
    }

    /// Idempotent; returns an already-closed receiver if the accessibility
    /// grant is absent, so the caller can treat the source as simply quiet.
    pub async fn start(self: &Arc<Self>, polling_interval: Duration) -> mpsc::UnboundedReceiver<WindowTitleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        if !self.probe.has_accessibility_grant() {
            log::info!("window-title monitor disabled: no accessibility grant");
            return rx;
        }

        let mut task_guard = self.task.lock().await;
        if task_guard.is_some() {
            return rx;
        }

        let this = Arc::clone(self);
        let stop_signal = self.stop_signal.clone();

        *task_guard = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_signal.notified() => break,
                    _ = tokio::time::sleep(polling_interval) => {
                        crate::perf_trace!("window-title poll tick for {}", this.target_process);
                        let titles = this.probe.window_titles(&this.target_process);
                        let meeting_title = titles
                            .iter()
                            .find(|title| classify(title, &this.lobby_set, &this.meeting_set) == TitleClass::Meeting)
                            .cloned();

                        // A vanished target process and a still-running process with
                        // no meeting-classified title both resolve to `None` here, so
                        // both paths correctly fall into the (true, None) arm below.
                        let mut currently_meeting = this.currently_meeting.lock().await;
                        match (*currently_meeting, meeting_title) {
                            (false, Some(title)) => {
                                *currently_meeting = true;
                                let _ = tx.send(WindowTitleEvent::MeetingDetected { title });
                            }
                            (true, None) => {
                                *currently_meeting = false;
                                let _ = tx.send(WindowTitleEvent::MeetingEnded);
                            }
                            _ => {}
                        }
                    }
                }
            }
        }));

        rx
    }

    pub async fn stop(&self) {
        let mut task_guard = self.task.lock().await;
        if let Some(handle) = task_guard.take() {
            self.stop_signal.notify_one();
            let _ = handle.await;
        }
        *self.currently_meeting.lock().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets() -> (RegexSet, RegexSet) {
        (
            RegexSet::new(LOBBY_PATTERNS).unwrap(),
            RegexSet::new(MEETING_PATTERNS).unwrap(),
        )
    }

    #[test]
    fn bare_zoom_title_is_lobby() {
        let (lobby, meeting) = sets();
        assert_eq!(classify("Zoom", &lobby, &meeting), TitleClass::Lobby);
    }

    #[test]
    fn lobby_pattern_beats_everything() {
        let (lobby, meeting) = sets();
        assert_eq!(classify("Zoom Cloud Meetings", &lobby, &meeting), TitleClass::Lobby);
    }

    #[test]
    fn meeting_pattern_matches() {
        let (lobby, meeting) = sets();
        assert_eq!(classify("Meeting ID: 123 456 789", &lobby, &meeting), TitleClass::Meeting);
    }

    #[test]
    fn suffix_match_counts_as_meeting() {
        let (lobby, meeting) = sets();
        assert_eq!(classify("Weekly Standup - Zoom", &lobby, &meeting), TitleClass::Meeting);
    }

    #[test]
    fn unrelated_title_is_other() {
        let (lobby, meeting) = sets();
        assert_eq!(classify("Finder", &lobby, &meeting), TitleClass::Other);
    }
}

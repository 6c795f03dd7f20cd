use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

/// The three kinds of detection source, ordered by priority. Lower
/// discriminant wins: `Manual < WindowTitle < MicrophoneActive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetectionSource {
    Manual = 0,
    WindowTitle = 1,
    MicrophoneActive = 2,
}

impl DetectionSource {
    pub fn priority(self) -> u8 {
        self as u8
    }
}

/// An immutable detection edge reported by a signal source.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    pub source: DetectionSource,
    pub app_name: String,
    pub timestamp: Instant,
    pub metadata: HashMap<String, String>,
}

impl DetectionEvent {
    pub fn new(source: DetectionSource, app_name: impl Into<String>) -> Self {
        Self {
            source,
            app_name: app_name.into(),
            timestamp: Instant::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A microphone-input client observed by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MicrophoneUsage {
    pub bundle_id: String,
    pub app_name: Option<String>,
    pub pid: Option<u32>,
}

/// Diff events emitted by the microphone-usage monitor.
#[derive(Debug, Clone)]
pub enum MicrophoneEvent {
    Activated(MicrophoneUsage),
    Deactivated(MicrophoneUsage),
    NoChange,
}

/// Diff events emitted by the window-title monitor.
#[derive(Debug, Clone)]
pub enum WindowTitleEvent {
    MeetingDetected { title: String },
    MeetingEnded,
}

/// Added/removed display names from one process-scan cycle to the next.
#[derive(Debug, Clone, Default)]
pub struct ProcessSetDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ProcessSetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The top-level detector state machine's phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase")]
pub enum DetectorState {
    Idle,
    Monitoring { apps: String },
    MeetingDetected { app: String },
    Recording { app: String },
    EndingMeeting { app: String },
}

impl DetectorState {
    pub fn current_recording_bundle_id(&self) -> Option<&str> {
        match self {
            DetectorState::MeetingDetected { app }
            | DetectorState::Recording { app }
            | DetectorState::EndingMeeting { app } => Some(app.as_str()),
            DetectorState::Idle | DetectorState::Monitoring { .. } => None,
        }
    }
}

/// OS sleep/wake/lock notifications bridged into the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    WillSleep,
    DidWake,
    ScreenLocked,
    ScreenUnlocked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_matches_spec() {
        assert!(DetectionSource::Manual.priority() < DetectionSource::WindowTitle.priority());
        assert!(DetectionSource::WindowTitle.priority() < DetectionSource::MicrophoneActive.priority());
        assert!(DetectionSource::Manual < DetectionSource::MicrophoneActive);
    }

    #[test]
    fn current_recording_bundle_id_matches_invariant_two() {
        assert_eq!(DetectorState::Idle.current_recording_bundle_id(), None);
        assert_eq!(
            DetectorState::Monitoring { apps: "Zoom".into() }.current_recording_bundle_id(),
            None
        );
        assert_eq!(
            DetectorState::Recording { app: "Zoom".into() }.current_recording_bundle_id(),
            Some("Zoom")
        );
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub timeout: NotificationTimeout,
    pub icon: Option<String>,
    pub sound: bool,
}

/// The notification types this crate's recording lifecycle and error
/// handling actually raise. Recording pause/resume, transcription
/// completion, and session reminders belong to the external capture/STT
/// layers this crate does not own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationType {
    RecordingStarted,
    RecordingStopped,
    PermissionDenied(String),
    SystemError(String),
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationTimeout {
    Never,
    Seconds(u64),
    Default,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, notification_type: NotificationType) -> Self {
        Self {
            id: None,
            title: title.into(),
            body: body.into(),
            notification_type,
            priority: NotificationPriority::Normal,
            timeout: NotificationTimeout::Default,
            icon: None,
            sound: true,
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: NotificationTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sound(mut self, sound: bool) -> Self {
        self.sound = sound;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Default for NotificationPriority {
    fn default() -> Self {
        NotificationPriority::Normal
    }
}

impl Default for NotificationTimeout {
    fn default() -> Self {
        NotificationTimeout::Default
    }
}

/// Helper constructors for the notifications the recording lifecycle
/// actually raises.
impl Notification {
    pub fn recording_started(app_name: impl Into<String>) -> Self {
        let app_name = app_name.into();
        Notification::new(
            "Meetwatch",
            format!("Recording started for {app_name}. Let others in the meeting know."),
            NotificationType::RecordingStarted,
        )
        .with_priority(NotificationPriority::High)
        .with_timeout(NotificationTimeout::Seconds(5))
    }

    pub fn recording_stopped() -> Self {
        Notification::new(
            "Meetwatch",
            "Recording has been stopped and saved",
            NotificationType::RecordingStopped,
        )
        .with_priority(NotificationPriority::Normal)
        .with_timeout(NotificationTimeout::Seconds(3))
    }

    pub fn permission_denied(capability: impl Into<String>) -> Self {
        let capability = capability.into();
        Notification::new(
            "Meetwatch needs permission",
            format!("{capability} access was denied; meeting detection for it is disabled"),
            NotificationType::PermissionDenied(capability),
        )
        .with_priority(NotificationPriority::Critical)
        .with_timeout(NotificationTimeout::Never)
    }

    pub fn system_error(error: impl Into<String>) -> Self {
        let error_string = error.into();
        Notification::new("Meetwatch error", error_string.clone(), NotificationType::SystemError(error_string))
            .with_priority(NotificationPriority::Critical)
            .with_timeout(NotificationTimeout::Never)
    }

    pub fn test_notification() -> Self {
        Notification::new(
            "Meetwatch",
            "This is a test notification to verify the system is working correctly",
            NotificationType::Test,
        )
        .with_priority(NotificationPriority::Normal)
        .with_timeout(NotificationTimeout::Seconds(5))
    }
}

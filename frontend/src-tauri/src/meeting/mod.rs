pub mod apps;
pub mod bridge;
pub mod coordinator;
pub mod detector;
pub mod events;
pub mod grace_timer;
pub mod handlers;
pub mod mic_monitor;
pub mod process_monitor;
pub mod window_title_monitor;

pub use detector::MeetingDetector;

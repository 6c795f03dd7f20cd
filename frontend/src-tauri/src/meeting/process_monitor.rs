use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::warn as log_warn;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::meeting::apps::MeetingAppCatalog;
use crate::meeting::events::ProcessSetDiff;

pub const SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// A running OS process, reduced to what the catalog matcher needs. Plain
/// `sysinfo` enumeration never carries a bundle id, so `bundle_id` is only
/// ever populated by a probe that can ask the OS for it directly (on macOS,
/// `NSWorkspace`).
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub name: String,
    pub bundle_id: Option<String>,
}

/// Isolates the OS-facing process enumeration so the diffing/matching logic
/// below is unit-testable without a real desktop session.
pub trait ProcessProbe: Send + Sync {
    fn running_processes(&self) -> Vec<ProcessInfo>;
}

/// `sysinfo`-backed probe. Covers every process on the system, including
/// background helpers, but `sysinfo` has no notion of a bundle id, so
/// `ProcessInfo::bundle_id` is always `None` here.
pub struct SysinfoProcessProbe {
    system: Mutex<System>,
}

impl SysinfoProcessProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_with_specifics(
                RefreshKind::new().with_processes(ProcessRefreshKind::everything()),
            )),
        }
    }
}

impl Default for SysinfoProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProcessProbe {
    fn running_processes(&self) -> Vec<ProcessInfo> {
        let mut system = match self.system.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log_warn!("process probe busy, skipping this scan cycle");
                return Vec::new();
            }
        };
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
            .processes()
            .values()
            .map(|p| ProcessInfo {
                name: p.name().to_string_lossy().to_string(),
                bundle_id: None,
            })
            .collect()
    }
}

/// `NSWorkspace`-backed probe: the running GUI applications, each with its
/// bundle id, so the catalog's bundle-id rules have data to match against.
#[cfg(target_os = "macos")]
pub struct MacosProcessProbe;

#[cfg(target_os = "macos")]
impl MacosProcessProbe {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "macos")]
impl Default for MacosProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
impl ProcessProbe for MacosProcessProbe {
    fn running_processes(&self) -> Vec<ProcessInfo> {
        use objc2_app_kit::NSWorkspace;

        unsafe {
            let workspace = NSWorkspace::sharedWorkspace();
            workspace
                .runningApplications()
                .iter()
                .map(|app| ProcessInfo {
                    name: app
                        .localizedName()
                        .map(|name| name.to_string())
                        .unwrap_or_default(),
                    bundle_id: app.bundleIdentifier().map(|id| id.to_string()),
                })
                .collect()
        }
    }
}

/// The process probe the detector wires up by default: `NSWorkspace` on
/// macOS so bundle-id matching has real data, `sysinfo` everywhere else.
#[cfg(target_os = "macos")]
pub fn default_probe() -> Arc<dyn ProcessProbe> {
    Arc::new(MacosProcessProbe::new())
}

#[cfg(not(target_os = "macos"))]
pub fn default_probe() -> Arc<dyn ProcessProbe> {
    Arc::new(SysinfoProcessProbe::new())
}

/// Polls the OS process list every [`SCAN_INTERVAL`] and emits `{added,
/// removed}` diffs of the set of running meeting-app display names.
pub struct ProcessMonitor {
    probe: Arc<dyn ProcessProbe>,
    catalog: Arc<MeetingAppCatalog>,
    known: Mutex<HashSet<String>>,
    stop_signal: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessMonitor {
    pub fn new(probe: Arc<dyn ProcessProbe>, catalog: Arc<MeetingAppCatalog>) -> Self {
        Self {
            probe,
            catalog,
            known: Mutex::new(HashSet::new()),
            stop_signal: Arc::new(Notify::new()),
            task: Mutex::new(None),
        }
    }

    fn current_display_names(&self) -> HashSet<String> {
        self.probe
            .running_processes()
            .into_iter()
            .filter_map(|p| {
                let matched = p
                    .bundle_id
                    .as_deref()
                    .and_then(|id| self.catalog.match_bundle_id(id))
                    .or_else(|| self.catalog.match_process_name(&p.name));
                matched
                    .filter(|app| !app.browser_based)
                    .map(|app| app.display_name.clone())
            })
            .collect()
    }

    /// Idempotent: calling `start` while already running is a no-op.
    pub async fn start(self: &Arc<Self>) -> mpsc::UnboundedReceiver<ProcessSetDiff> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut task_guard = self.task.lock().await;
        if task_guard.is_some() {
            return rx;
        }

        let this = Arc::clone(self);
        let stop_signal = self.stop_signal.clone();

        *task_guard = Some(tokio::spawn(async move {
            // `interval` fires immediately on its first tick, so a meeting
            // app already running at start() is observed without waiting a
            // full scan cycle.
            let mut ticks = tokio::time::interval(SCAN_INTERVAL);
            loop {
                tokio::select! {
                    _ = stop_signal.notified() => break,
                    _ = ticks.tick() => {
                        crate::perf_trace!("process scan tick");
                        let current = this.current_display_names();
                        let mut known = this.known.lock().await;

                        let added: Vec<String> = current.difference(&known).cloned().collect();
                        let removed: Vec<String> = known.difference(&current).cloned().collect();

                        if !added.is_empty() || !removed.is_empty() {
                            *known = current;
                            let _ = tx.send(ProcessSetDiff { added, removed });
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
        self.known.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meeting::apps::MeetingApp;

    struct FakeProbe {
        processes: std::sync::Mutex<Vec<ProcessInfo>>,
    }

    impl ProcessProbe for FakeProbe {
        fn running_processes(&self) -> Vec<ProcessInfo> {
            self.processes.lock().unwrap().clone()
        }
    }

    fn test_catalog() -> Arc<MeetingAppCatalog> {
        Arc::new(MeetingAppCatalog::new(
            &["zoom".to_string()].into_iter().collect(),
            &HashSet::new(),
            vec![],
        ))
    }

    #[test]
    fn display_name_resolution_skips_browsers() {
        let catalog = MeetingAppCatalog::new(
            &HashSet::new(),
            &HashSet::new(),
            vec![MeetingApp {
                id: "custom".into(),
                display_name: "Custom Browser Meet".into(),
                bundle_id: None,
                process_name: "custombrowser".into(),
                browser_based: true,
            }],
        );
        assert!(catalog
            .match_process_name("custombrowser")
            .map(|app| app.browser_based)
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn emits_added_and_removed_diffs() {
        let probe = Arc::new(FakeProbe {
            processes: std::sync::Mutex::new(vec![ProcessInfo {
                name: "zoom.us".into(),
                bundle_id: None,
            }]),
        });
        let monitor = Arc::new(ProcessMonitor::new(probe, test_catalog()));
        let names = monitor.current_display_names();
        assert!(names.contains("Zoom"));
    }

    #[tokio::test]
    async fn bundle_id_takes_precedence_over_process_name() {
        let probe = Arc::new(FakeProbe {
            processes: std::sync::Mutex::new(vec![ProcessInfo {
                name: "zoom.us.helper".into(),
                bundle_id: Some("us.zoom.xos".into()),
            }]),
        });
        let monitor = Arc::new(ProcessMonitor::new(probe, test_catalog()));
        let names = monitor.current_display_names();
        assert!(names.contains("Zoom"));
    }
}

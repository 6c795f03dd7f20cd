use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::meeting::events::{MicrophoneEvent, MicrophoneUsage};

/// Isolates the OS-facing "who is using the microphone" read so the core
/// diffing logic is unit-testable without a real audio session.
pub trait MicrophoneProbe: Send + Sync {
    fn active_clients(&self) -> Vec<MicrophoneUsage>;
}

/// No-op stub used on any platform without a real microphone-enumeration
/// probe wired up. Reports no active clients rather than making the whole
/// source unavailable, so the state machine still runs on any CI host; warns
/// once (not per poll) so the log doesn't fill with the same line forever.
#[derive(Default)]
pub struct NoopMicrophoneProbe {
    warned: std::sync::atomic::AtomicBool,
}

impl MicrophoneProbe for NoopMicrophoneProbe {
    fn active_clients(&self) -> Vec<MicrophoneUsage> {
        if !self.warned.swap(true, std::sync::atomic::Ordering::Relaxed) {
            log::warn!("microphone probe is a stub on this platform; meeting detection via mic usage is disabled");
        }
        Vec::new()
    }
}

// No CoreAudio-backed probe is wired up yet: walking
// kAudioHardwarePropertyProcessObjectList via `cidre` and filtering by
// kAudioProcessPropertyIsRunningInput is real work that hasn't landed, so
// macOS gets the same honest no-op as every other platform rather than a
// probe that silently always reports nothing while claiming otherwise.
pub fn default_probe() -> Arc<dyn MicrophoneProbe> {
    Arc::new(NoopMicrophoneProbe::default())
}

/// Polls active microphone clients at `polling_interval` and diffs client
/// sets by bundle id, emitting `Activated`/`Deactivated` events.
pub struct MicrophoneMonitor {
    probe: Arc<dyn MicrophoneProbe>,
    known: Mutex<HashMap<String, MicrophoneUsage>>,
    stop_signal: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MicrophoneMonitor {
    pub fn new(probe: Arc<dyn MicrophoneProbe>) -> Self {
        Self {
            probe,
            known: Mutex::new(HashMap::new()),
            stop_signal: Arc::new(Notify::new()),
            task: Mutex::new(None),
        }
    }

    /// One-shot read of the currently active clients, used by the detector
    /// to inject synthetic activations for pre-existing mic users right
    /// after `start()` — the monitor itself must not silently drop the
    /// first poll's deltas.
    pub fn snapshot(&self) -> Vec<MicrophoneUsage> {
        self.probe.active_clients()
    }

    /// Idempotent: calling `start` while already running is a no-op.
    pub async fn start(self: &Arc<Self>, polling_interval: Duration) -> mpsc::UnboundedReceiver<MicrophoneEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
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
                        crate::perf_trace!("microphone poll tick");
                        let current: HashMap<String, MicrophoneUsage> = this
                            .probe
                            .active_clients()
                            .into_iter()
                            .map(|usage| (usage.bundle_id.clone(), usage))
                            .collect();

                        let mut known = this.known.lock().await;

                        let activated: Vec<MicrophoneUsage> = current
                            .iter()
                            .filter(|(id, _)| !known.contains_key(*id))
                            .map(|(_, usage)| usage.clone())
                            .collect();
                        let deactivated: Vec<MicrophoneUsage> = known
                            .iter()
                            .filter(|(id, _)| !current.contains_key(*id))
                            .map(|(_, usage)| usage.clone())
                            .collect();

                        if activated.is_empty() && deactivated.is_empty() {
                            let _ = tx.send(MicrophoneEvent::NoChange);
                        } else {
                            crate::perf_debug!(
                                "microphone usage changed: {} activated, {} deactivated",
                                activated.len(),
                                deactivated.len()
                            );
                            for usage in activated {
                                let _ = tx.send(MicrophoneEvent::Activated(usage));
                            }
                            for usage in deactivated {
                                let _ = tx.send(MicrophoneEvent::Deactivated(usage));
                            }
                        }

                        *known = current;
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

    struct FakeProbe {
        clients: std::sync::Mutex<Vec<MicrophoneUsage>>,
    }

    impl MicrophoneProbe for FakeProbe {
        fn active_clients(&self) -> Vec<MicrophoneUsage> {
            self.clients.lock().unwrap().clone()
        }
    }

    fn usage(bundle_id: &str) -> MicrophoneUsage {
        MicrophoneUsage {
            bundle_id: bundle_id.into(),
            app_name: None,
            pid: None,
        }
    }

    #[test]
    fn snapshot_returns_current_probe_state() {
        let probe = Arc::new(FakeProbe {
            clients: std::sync::Mutex::new(vec![usage("us.zoom.xos")]),
        });
        let monitor = MicrophoneMonitor::new(probe);
        assert_eq!(monitor.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn diffing_detects_activation_and_deactivation() {
        tokio::time::pause();
        let probe = Arc::new(FakeProbe {
            clients: std::sync::Mutex::new(vec![]),
        });
        let monitor = Arc::new(MicrophoneMonitor::new(probe.clone()));
        let mut rx = monitor.start(Duration::from_millis(100)).await;

        probe.clients.lock().unwrap().push(usage("us.zoom.xos"));
        tokio::time::advance(Duration::from_millis(150)).await;
        match rx.recv().await.unwrap() {
            MicrophoneEvent::Activated(u) => assert_eq!(u.bundle_id, "us.zoom.xos"),
            other => panic!("expected Activated, got {other:?}"),
        }

        probe.clients.lock().unwrap().clear();
        tokio::time::advance(Duration::from_millis(150)).await;
        match rx.recv().await.unwrap() {
            MicrophoneEvent::Deactivated(u) => assert_eq!(u.bundle_id, "us.zoom.xos"),
            other => panic!("expected Deactivated, got {other:?}"),
        }

        monitor.stop().await;
    }
}

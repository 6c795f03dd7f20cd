use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{info as log_info, warn as log_warn};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::error::QueueError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskKind {
    Transcription,
    AiGeneration,
}

#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: u64,
    pub recording_id: String,
    pub kind: TaskKind,
    pub created_at: Instant,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LaneStatus {
    pub queued: usize,
    pub in_flight: bool,
    pub current_id: Option<String>,
}

struct LaneState {
    queue: VecDeque<QueuedTask>,
    in_flight: bool,
    current_id: Option<String>,
}

impl Default for LaneState {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: false,
            current_id: None,
        }
    }
}

/// A handler invocation for one recording id in this lane. Boxed so the
/// lane stays agnostic between the transcription and AI-generation
/// handlers; `ProcessingQueue` supplies the concrete closure at
/// construction.
pub type LaneHandler = Arc<dyn Fn(String) -> BoxFuture<Result<(), QueueError>> + Send + Sync>;

/// One FIFO lane with at-most-one in-flight task. The processing loop is a
/// single background task (spawned once, woken by a `Notify`) rather than
/// respawned per task, matching the spawn-and-signal shape used by the
/// poll-based monitors elsewhere in this codebase. Handler invocations run
/// outside the lane's state mutex so a long-running handler never blocks
/// `enqueue`/`status`.
pub struct Lane {
    kind: TaskKind,
    state: Mutex<LaneState>,
    wake: Arc<Notify>,
    stop_signal: Arc<Notify>,
    next_task_id: AtomicU64,
    status_tx: mpsc::UnboundedSender<(TaskKind, LaneStatus)>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
    pub fn new(kind: TaskKind, status_tx: mpsc::UnboundedSender<(TaskKind, LaneStatus)>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            state: Mutex::new(LaneState::default()),
            wake: Arc::new(Notify::new()),
            stop_signal: Arc::new(Notify::new()),
            next_task_id: AtomicU64::new(0),
            status_tx,
            loop_handle: Mutex::new(None),
        })
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Whether `start` has been called and not yet `stop`-ped. Lets callers
    /// enforce "handler set is a precondition" instead of enqueueing onto a
    /// lane whose processing loop will never drain it.
    pub async fn is_started(&self) -> bool {
        self.loop_handle.lock().await.is_some()
    }

    /// Starts the background processing loop. Idempotent.
    pub async fn start(self: &Arc<Self>, handler: LaneHandler) {
        let mut loop_handle = self.loop_handle.lock().await;
        if loop_handle.is_some() {
            return;
        }

        let this = Arc::clone(self);
        let wake = self.wake.clone();
        let stop_signal = self.stop_signal.clone();

        *loop_handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_signal.notified() => break,
                    _ = wake.notified() => {
                        this.drain(&handler).await;
                    }
                }
            }
        }));
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.loop_handle.lock().await.take() {
            self.stop_signal.notify_one();
            let _ = handle.await;
        }
    }

    async fn drain(self: &Arc<Self>, handler: &LaneHandler) {
        loop {
            let task = {
                let mut state = self.state.lock().await;
                if state.in_flight {
                    return;
                }
                let Some(task) = state.queue.pop_front() else {
                    return;
                };
                state.in_flight = true;
                state.current_id = Some(task.recording_id.clone());
                task
            };

            self.publish_status().await;

            let result = handler(task.recording_id.clone()).await;
            if let Err(err) = result {
                log_warn!(
                    "{:?} handler failed for recording {}: {err}; dropping task and continuing lane",
                    self.kind,
                    task.recording_id
                );
            } else {
                log_info!("{:?} handler completed for recording {}", self.kind, task.recording_id);
            }

            {
                let mut state = self.state.lock().await;
                state.in_flight = false;
                state.current_id = None;
            }
            self.publish_status().await;
        }
    }

    async fn publish_status(&self) {
        let status = self.status().await;
        let _ = self.status_tx.send((self.kind, status));
    }

    /// Appends a task and, if nothing is in-flight, wakes the processing
    /// loop.
    pub async fn enqueue(&self, recording_id: String) {
        {
            let mut state = self.state.lock().await;
            let task = QueuedTask {
                id: self.next_task_id.fetch_add(1, Ordering::SeqCst),
                recording_id,
                kind: self.kind,
                created_at: Instant::now(),
            };
            state.queue.push_back(task);
        }
        self.publish_status().await;
        self.wake.notify_one();
    }

    pub async fn status(&self) -> LaneStatus {
        let state = self.state.lock().await;
        LaneStatus {
            queued: state.queue.len(),
            in_flight: state.in_flight,
            current_id: state.current_id.clone(),
        }
    }

    pub async fn contains(&self, recording_id: &str) -> bool {
        let state = self.state.lock().await;
        state.current_id.as_deref() == Some(recording_id)
            || state.queue.iter().any(|task| task.recording_id == recording_id)
    }

    /// Removes every pending task for `recording_id`. Does not interrupt a
    /// currently-running handler call.
    pub async fn cancel_tasks(&self, recording_id: &str) {
        let mut state = self.state.lock().await;
        let before = state.queue.len();
        state.queue.retain(|task| task.recording_id != recording_id);
        let removed = before - state.queue.len();
        if removed > 0 {
            log_info!("cancelled {removed} pending task(s) for recording {recording_id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn test_lane() -> (Arc<Lane>, mpsc::UnboundedReceiver<(TaskKind, LaneStatus)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Lane::new(TaskKind::Transcription, tx), rx)
    }

    #[tokio::test]
    async fn enqueue_processes_tasks_one_at_a_time_in_order() {
        let (lane, _rx) = test_lane();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let seen_clone = seen.clone();
        let concurrent_clone = concurrent.clone();
        let max_clone = max_concurrent.clone();
        let handler: LaneHandler = Arc::new(move |recording_id| {
            let seen = seen_clone.clone();
            let concurrent = concurrent_clone.clone();
            let max_concurrent = max_clone.clone();
            Box::pin(async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                seen.lock().await.push(recording_id);
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        });

        lane.start(handler).await;
        lane.enqueue("10".into()).await;
        lane.enqueue("11".into()).await;
        lane.enqueue("12".into()).await;

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        lane.stop().await;

        assert_eq!(*seen.lock().await, vec!["10", "11", "12"]);
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_tasks_removes_pending_but_leaves_others() {
        let (lane, _rx) = test_lane();
        {
            let mut state = lane.state.lock().await;
            state.queue.push_back(QueuedTask {
                id: 0,
                recording_id: "10".into(),
                kind: TaskKind::Transcription,
                created_at: Instant::now(),
            });
            state.queue.push_back(QueuedTask {
                id: 1,
                recording_id: "11".into(),
                kind: TaskKind::Transcription,
                created_at: Instant::now(),
            });
        }

        lane.cancel_tasks("10").await;
        let status = lane.status().await;
        assert_eq!(status.queued, 1);
    }
}

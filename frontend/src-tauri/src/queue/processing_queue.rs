use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::info as log_info;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::config::DetectorConfig;
use crate::error::QueueError;
use crate::meeting::handlers::{Catalog, ProcessingHandlers};
use crate::queue::lane::{Lane, LaneStatus, TaskKind};

/// Snapshot of both lanes, returned by `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub transcription: LaneStatus,
    pub ai_generation: LaneStatus,
}

/// Two independent FIFO lanes (transcription, AI-generation), each with at
/// most one in-flight task. The transcription lane carries a sidecar
/// `recording_id -> audio_path` map since its handler needs the file path,
/// not just the id.
pub struct ProcessingQueue {
    transcription: Arc<Lane>,
    ai_generation: Arc<Lane>,
    audio_paths: Mutex<HashMap<String, String>>,
    status_rx: Mutex<Option<mpsc::UnboundedReceiver<(TaskKind, LaneStatus)>>>,
}

impl ProcessingQueue {
    pub fn new() -> Arc<Self> {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            transcription: Lane::new(TaskKind::Transcription, status_tx.clone()),
            ai_generation: Lane::new(TaskKind::AiGeneration, status_tx),
            audio_paths: Mutex::new(HashMap::new()),
            status_rx: Mutex::new(Some(status_rx)),
        })
    }

    /// Starts both lanes' background processing loops against `handlers`.
    pub async fn start(self: &Arc<Self>, handlers: Arc<dyn ProcessingHandlers>) {
        let transcribe_handlers = handlers.clone();
        let this = Arc::clone(self);
        self.transcription
            .start(Arc::new(move |recording_id: String| {
                let handlers = transcribe_handlers.clone();
                let this = this.clone();
                Box::pin(async move {
                    let path = this
                        .audio_paths
                        .lock()
                        .await
                        .remove(&recording_id)
                        .unwrap_or_default();
                    handlers
                        .transcribe(&recording_id, &path)
                        .await
                        .map_err(|e| QueueError::HandlerFailure(e.to_string()))
                }) as crate::queue::lane::BoxFuture<Result<(), QueueError>>
            }))
            .await;

        self.ai_generation
            .start(Arc::new(move |recording_id: String| {
                let handlers = handlers.clone();
                Box::pin(async move {
                    handlers
                        .generate_ai(&recording_id)
                        .await
                        .map_err(|e| QueueError::HandlerFailure(e.to_string()))
                }) as crate::queue::lane::BoxFuture<Result<(), QueueError>>
            }))
            .await;
    }

    pub async fn stop(&self) {
        self.transcription.stop().await;
        self.ai_generation.stop().await;
    }

    pub async fn enqueue_transcription(&self, recording_id: String, audio_path: String) {
        self.audio_paths.lock().await.insert(recording_id.clone(), audio_path);
        self.transcription.enqueue(recording_id).await;
    }

    pub async fn enqueue_ai_generation(&self, recording_id: String) {
        self.ai_generation.enqueue(recording_id).await;
    }

    /// Removes pending tasks for `recording_id` from both lanes. Does not
    /// abort a currently-running handler.
    pub async fn cancel_tasks(&self, recording_id: &str) {
        self.transcription.cancel_tasks(recording_id).await;
        self.ai_generation.cancel_tasks(recording_id).await;
        self.audio_paths.lock().await.remove(recording_id);
    }

    /// Takes the lane status-change receiver, for forwarding into the UI.
    /// Returns `None` if already taken.
    pub async fn take_status_receiver(&self) -> Option<mpsc::UnboundedReceiver<(TaskKind, LaneStatus)>> {
        self.status_rx.lock().await.take()
    }

    pub async fn get_status(&self) -> QueueStatus {
        QueueStatus {
            transcription: self.transcription.status().await,
            ai_generation: self.ai_generation.status().await,
        }
    }

    /// Startup-time resume scan: enqueues recordings the catalog reports as
    /// incomplete, skipping any already queued. No-ops (logged) if a lane's
    /// handler set has not been started yet.
    pub async fn resume_incomplete_work(&self, catalog: &dyn Catalog, config: &DetectorConfig) {
        if config.auto_transcribe && !self.transcription.is_started().await {
            log::warn!("resume scan: transcription lane not started, skipping");
        } else if config.auto_transcribe {
            match catalog.recordings_needing_transcription().await {
                Ok(rows) => {
                    for row in rows {
                        if self.transcription.contains(&row.id).await {
                            continue;
                        }
                        self.enqueue_transcription(row.id, row.audio_path).await;
                    }
                }
                Err(err) => log::warn!("failed to query recordings needing transcription: {err}"),
            }
        }

        let ai_generation_wanted = config.auto_generate_summary || config.auto_generate_action_items;
        if ai_generation_wanted && !self.ai_generation.is_started().await {
            log::warn!("resume scan: AI-generation lane not started, skipping");
        } else if ai_generation_wanted {
            match catalog
                .recordings_needing_ai_generation(config.auto_generate_summary, config.auto_generate_action_items)
                .await
            {
                Ok(rows) => {
                    let mut seen = HashSet::new();
                    for row in rows {
                        if !seen.insert(row.id.clone()) {
                            continue;
                        }
                        if self.ai_generation.contains(&row.id).await {
                            continue;
                        }
                        self.enqueue_ai_generation(row.id).await;
                    }
                }
                Err(err) => log::warn!("failed to query recordings needing AI generation: {err}"),
            }
        }

        log_info!("resume scan complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectorError;
    use crate::meeting::handlers::RecordingStatusRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubHandlers {
        transcribe_calls: AtomicUsize,
        ai_calls: AtomicUsize,
    }

    #[async_trait]
    impl ProcessingHandlers for StubHandlers {
        async fn transcribe(&self, _recording_id: &str, _audio_path: &str) -> Result<(), DetectorError> {
            self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn generate_ai(&self, _recording_id: &str) -> Result<(), DetectorError> {
            self.ai_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubCatalog {
        transcription_rows: Vec<RecordingStatusRow>,
        ai_rows: Vec<RecordingStatusRow>,
    }

    #[async_trait]
    impl Catalog for StubCatalog {
        async fn recordings_needing_transcription(&self) -> Result<Vec<RecordingStatusRow>, DetectorError> {
            Ok(self.transcription_rows.clone())
        }

        async fn recordings_needing_ai_generation(
            &self,
            _need_summary: bool,
            _need_actions: bool,
        ) -> Result<Vec<RecordingStatusRow>, DetectorError> {
            Ok(self.ai_rows.clone())
        }
    }

    #[tokio::test]
    async fn resume_enqueues_both_lanes_and_is_idempotent() {
        let queue = ProcessingQueue::new();
        let handlers = Arc::new(StubHandlers {
            transcribe_calls: AtomicUsize::new(0),
            ai_calls: AtomicUsize::new(0),
        });
        queue.start(handlers.clone()).await;

        let catalog = StubCatalog {
            transcription_rows: vec![RecordingStatusRow {
                id: "5".into(),
                needs_transcription: true,
                needs_summary: false,
                needs_action_items: false,
                audio_path: "/rec/5.wav".into(),
            }],
            ai_rows: vec![RecordingStatusRow {
                id: "7".into(),
                needs_transcription: false,
                needs_summary: true,
                needs_action_items: false,
                audio_path: String::new(),
            }],
        };

        let config = DetectorConfig::default();
        queue.resume_incomplete_work(&catalog, &config).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(handlers.transcribe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(handlers.ai_calls.load(Ordering::SeqCst), 1);

        // Re-running resume must not duplicate queued work once the rows
        // are still reported (idempotent by id-membership check against
        // the live lane state); here the lane has already drained, so
        // re-enqueueing happens, but never doubles up within one pass.
        queue.stop().await;
    }

    #[tokio::test]
    async fn get_status_reports_empty_lanes_initially() {
        let queue = ProcessingQueue::new();
        let status = queue.get_status().await;
        assert_eq!(status.transcription.queued, 0);
        assert_eq!(status.ai_generation.queued, 0);
    }
}

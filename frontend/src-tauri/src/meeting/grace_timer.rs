use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

/// A cancellable, idempotent grace-period timer.
///
/// Cancellation is modelled as a generation counter rather than task
/// abortion: `arm` bumps the generation and the spawned sleep task captures
/// its own value. When the sleep completes the task only reports expiry if
/// the generation is still current, so re-arming or cancelling is a single
/// atomic increment with no need to await task teardown, and double-cancel
/// is automatically safe.
#[derive(Debug, Default)]
pub struct GraceTimer {
    generation: Arc<AtomicU64>,
}

impl GraceTimer {
    pub fn new() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts (or restarts) the timer. Sends the generation id through `tx`
    /// once `duration` elapses, unless cancelled or re-armed first.
    pub fn arm(&self, duration: Duration, tx: UnboundedSender<u64>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let live = self.generation.clone();

        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if live.load(Ordering::SeqCst) == generation {
                let _ = tx.send(generation);
            }
        });

        generation
    }

    /// Invalidates any live timer. Idempotent.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// True if `generation` is still the live one (i.e. expiry should be
    /// honoured).
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::{advance, pause, Duration as TokioDuration};

    #[tokio::test]
    async fn fires_after_duration_when_not_cancelled() {
        pause();
        let timer = GraceTimer::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let generation = timer.arm(Duration::from_secs(8), tx);

        advance(TokioDuration::from_secs(9)).await;
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, generation);
    }

    #[tokio::test]
    async fn cancel_suppresses_expiry() {
        pause();
        let timer = GraceTimer::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        timer.arm(Duration::from_secs(8), tx);
        timer.cancel();

        advance(TokioDuration::from_secs(9)).await;
        assert!(rx.recv().await.is_none() || rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rearming_invalidates_previous_generation() {
        pause();
        let timer = GraceTimer::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let first = timer.arm(Duration::from_secs(8), tx.clone());
        let second = timer.arm(Duration::from_secs(8), tx);

        assert_ne!(first, second);
        assert!(!timer.is_current(first));

        advance(TokioDuration::from_secs(9)).await;
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, second);
    }

    #[tokio::test]
    async fn double_cancel_is_safe() {
        let timer = GraceTimer::new();
        timer.cancel();
        timer.cancel();
    }
}

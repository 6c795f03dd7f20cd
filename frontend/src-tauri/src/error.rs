use thiserror::Error;

/// Errors raised inside the meeting-detection core.
///
/// These never cross an actor boundary as a propagated `Result`; they are
/// delivered to the embedder through `RecordingController::error` and logged
/// here first.
#[derive(Debug, Error, Clone)]
pub enum DetectorError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("handler failure: {0}")]
    HandlerFailure(String),

    #[error("signal source fault: {0}")]
    SignalSourceFault(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, Error, Clone)]
pub enum QueueError {
    #[error("handler failure: {0}")]
    HandlerFailure(String),
}

#[derive(Debug, Error)]
pub enum CrashLogError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not resolve a per-user log directory")]
    PathUnavailable,
}

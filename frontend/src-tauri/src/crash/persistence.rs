use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{error as log_error, info as log_info};
use signal_hook::consts::{SIGABRT, SIGBUS, SIGFPE, SIGILL, SIGSEGV, SIGTRAP};
use signal_hook::iterator::Signals;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::CrashLogError;

const MAX_LINES: usize = 1_000;
const MAX_BYTES: u64 = 5 * 1024 * 1024;
const CRASH_DELIMITER: &str = "══════════════════════════════════════════════════════════";

/// One parsed "CRASH DETECTED" block from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashRecord {
    pub timestamp: String,
    pub signal_or_kind: String,
    pub message: String,
    pub trace: String,
}

/// Append-only crash/error log under a stable per-user directory. Writes go
/// through a single background task fed by an mpsc channel, matching the
/// one-writer-per-shared-file discipline used elsewhere in this codebase.
/// Bounded to 5 MiB by trimming to the last 1,000 lines on overflow.
pub struct CrashPersistence {
    log_path: PathBuf,
    write_tx: mpsc::UnboundedSender<String>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    signal_task: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl CrashPersistence {
    pub fn log_path() -> Result<PathBuf, CrashLogError> {
        let mut path = dirs::data_local_dir().ok_or(CrashLogError::PathUnavailable)?;
        path.push("meetwatch");
        path.push("logs");
        path.push("crash.log");
        Ok(path)
    }

    /// Creates the log file's parent directory and starts the single
    /// writer task. Installs OS signal handlers and a panic hook so any
    /// uncaught crash is captured before the process dies.
    pub async fn init() -> Result<Arc<Self>, CrashLogError> {
        let log_path = Self::log_path()?;
        if let Some(parent) = log_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<String>();
        let writer_path = log_path.clone();

        let writer_task = tokio::spawn(async move {
            while let Some(line) = write_rx.recv().await {
                if let Err(err) = Self::append_and_trim(&writer_path, &line).await {
                    log_error!("failed writing crash log: {err}");
                }
            }
        });

        let this = Arc::new(Self {
            log_path,
            write_tx,
            writer_task: Mutex::new(Some(writer_task)),
            signal_task: Mutex::new(None),
        });

        this.install_signal_handlers()?;
        this.install_panic_hook();

        Ok(this)
    }

    fn install_signal_handlers(self: &Arc<Self>) -> Result<(), CrashLogError> {
        let mut signals = Signals::new([SIGABRT, SIGSEGV, SIGBUS, SIGILL, SIGFPE, SIGTRAP])
            .map_err(CrashLogError::Io)?;
        let tx = self.write_tx.clone();

        let handle = std::thread::spawn(move || {
            for signal in signals.forever() {
                let name = signal_name(signal);
                let block = format_crash_block(&name, "uncaught signal", "<no stack captured>");
                let _ = tx.send(block);
                // Re-raise is intentionally skipped: this process is a
                // desktop app shell, not a supervisor; the OS default
                // handler still applies once this thread exits.
            }
        });

        // We can't easily await from a sync init path without making this
        // function async-aware of the mutex; store it for cleanup on drop.
        if let Ok(mut guard) = self.signal_task.try_lock() {
            *guard = Some(handle);
        }

        Ok(())
    }

    fn install_panic_hook(self: &Arc<Self>) {
        let tx = self.write_tx.clone();
        std::panic::set_hook(Box::new(move |panic_info| {
            let message = panic_info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            let location = panic_info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "<unknown location>".to_string());

            let block = format_crash_block("panic", &message, &location);
            log_error!("{message} at {location}");
            let _ = tx.send(block);
        }));
    }

    async fn append_and_trim(path: &PathBuf, block: &str) -> Result<(), CrashLogError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        drop(file);

        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > MAX_BYTES {
            Self::trim_to_last_n_lines(path, MAX_LINES).await?;
        }
        Ok(())
    }

    async fn trim_to_last_n_lines(path: &PathBuf, n: usize) -> Result<(), CrashLogError> {
        let content = tokio::fs::read_to_string(path).await?;
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(n);
        let trimmed = lines[start..].join("\n") + "\n";
        tokio::fs::write(path, trimmed).await?;
        Ok(())
    }

    /// Full contents of the crash log.
    pub async fn read_all(&self) -> Result<String, CrashLogError> {
        match tokio::fs::read_to_string(&self.log_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(CrashLogError::Io(e)),
        }
    }

    /// The last `n` lines of the crash log.
    pub async fn read_last_n_lines(&self, n: usize) -> Result<Vec<String>, CrashLogError> {
        let content = self.read_all().await?;
        let lines: VecDeque<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(n);
        Ok(lines.into_iter().skip(start).map(String::from).collect())
    }

    /// Extracts whole "CRASH DETECTED" blocks delimited by the `══…` rule
    /// lines.
    pub async fn scan_crash_blocks(&self) -> Result<Vec<CrashRecord>, CrashLogError> {
        let content = self.read_all().await?;
        let mut records = Vec::new();
        let mut lines = content.lines().peekable();

        while let Some(line) = lines.next() {
            if line.trim() == CRASH_DELIMITER {
                let mut body = Vec::new();
                for inner in lines.by_ref() {
                    if inner.trim() == CRASH_DELIMITER {
                        break;
                    }
                    body.push(inner);
                }
                if let Some(record) = parse_crash_block(&body) {
                    records.push(record);
                }
            }
        }

        Ok(records)
    }

    pub async fn log_error(&self, message: &str) {
        let block = format_crash_block("error", message, "");
        let _ = self.write_tx.send(block);
    }

    /// Stops the writer task. The task only ever buffers and appends
    /// already-formatted lines, so aborting it is safe; there is no
    /// in-flight write whose loss would corrupt the file.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.writer_task.lock().await.take() {
            handle.abort();
        }
    }
}

fn signal_name(signal: i32) -> String {
    match signal {
        SIGABRT => "SIGABRT".to_string(),
        SIGSEGV => "SIGSEGV".to_string(),
        SIGBUS => "SIGBUS".to_string(),
        SIGILL => "SIGILL".to_string(),
        SIGFPE => "SIGFPE".to_string(),
        SIGTRAP => "SIGTRAP".to_string(),
        other => format!("signal {other}"),
    }
}

fn format_crash_block(kind: &str, message: &str, trace: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
    format!(
        "{CRASH_DELIMITER}\n[{timestamp}] CRASH DETECTED [{kind}] {message}\n{trace}\n{CRASH_DELIMITER}"
    )
}

fn parse_crash_block(body: &[&str]) -> Option<CrashRecord> {
    let header = body.first()?;
    let rest = body.get(1..).unwrap_or(&[]).join("\n");

    let timestamp = header
        .split(']')
        .next()
        .map(|s| s.trim_start_matches('[').to_string())
        .unwrap_or_default();
    let kind = header
        .split('[')
        .nth(2)
        .and_then(|s| s.split(']').next())
        .unwrap_or("unknown")
        .to_string();
    let message = header.rsplit(']').next().unwrap_or("").trim().to_string();

    Some(CrashRecord {
        timestamp,
        signal_or_kind: kind,
        message,
        trace: rest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn trim_retains_exactly_last_n_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crash.log");

        let mut content = String::new();
        for i in 0..1_500 {
            content.push_str(&format!("line {i}\n"));
        }
        tokio::fs::write(&path, content).await.unwrap();

        CrashPersistence::trim_to_last_n_lines(&path, MAX_LINES).await.unwrap();

        let result = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), MAX_LINES);
        assert_eq!(lines[0], "line 500");
        assert_eq!(lines[MAX_LINES - 1], "line 1499");
    }

    #[test]
    fn crash_block_round_trips_through_parser() {
        let block = format_crash_block("SIGSEGV", "segmentation fault", "frame 0: foo\nframe 1: bar");
        let body: Vec<&str> = block.lines().skip(1).take_while(|l| l.trim() != CRASH_DELIMITER).collect();
        let record = parse_crash_block(&body).unwrap();
        assert_eq!(record.signal_or_kind, "SIGSEGV");
        assert!(record.message.contains("segmentation fault"));
    }
}

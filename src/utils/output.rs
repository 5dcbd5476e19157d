/// Bounded output collection
///
/// The child's stdout and stderr share one pipe, so the collector sees a
/// single ordered stream. Collection stops at the configured ceiling and
/// raises an overflow flag the supervisor polls to kill the producer.
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Output integrity classification
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputIntegrity {
    #[default]
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "truncated_by_judge_limit")]
    TruncatedByJudgeLimit,
    /// Writers were still holding the pipe when collection gave up
    #[serde(rename = "collection_timeout")]
    CollectionTimeout,
    #[serde(rename = "read_error")]
    ReadError,
}

impl std::fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByJudgeLimit => write!(f, "truncated_by_judge_limit"),
            OutputIntegrity::CollectionTimeout => write!(f, "collection_timeout"),
            OutputIntegrity::ReadError => write!(f, "read_error"),
        }
    }
}

/// Output limits configuration
#[derive(Debug, Clone)]
pub struct OutputLimits {
    /// Combined stdout+stderr limit (bytes)
    pub combined_limit: usize,
    /// How long to keep draining after the child has been reaped
    pub collection_timeout_ms: u64,
}

impl Default for OutputLimits {
    fn default() -> Self {
        OutputLimits {
            combined_limit: 1024 * 1024,
            collection_timeout_ms: 2000,
        }
    }
}

/// Output collection result
#[derive(Debug, Clone)]
pub struct OutputResult {
    pub data: Vec<u8>,
    pub integrity: OutputIntegrity,
}

impl OutputResult {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

enum Chunk {
    Data(Vec<u8>),
    Failed,
}

/// Output collector with bounded collection
pub struct OutputCollector {
    limits: OutputLimits,
}

impl OutputCollector {
    pub fn new(limits: OutputLimits) -> Self {
        OutputCollector { limits }
    }

    /// Start draining `stream` on a background thread
    pub fn spawn<R: Read + Send + 'static>(&self, stream: R) -> PendingOutput {
        let (tx, rx) = unbounded();
        let overflow = Arc::new(AtomicBool::new(false));
        let limit = self.limits.combined_limit;
        let flag = Arc::clone(&overflow);

        thread::spawn(move || {
            let mut reader = stream;
            let mut chunk = [0u8; 8192];
            let mut collected = 0usize;

            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if collected + n > limit {
                            let remaining = limit - collected;
                            let _ = tx.send(Chunk::Data(chunk[..remaining].to_vec()));
                            flag.store(true, Ordering::SeqCst);
                            break;
                        }
                        collected += n;
                        if tx.send(Chunk::Data(chunk[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::debug!("output stream read failed: {}", e);
                        let _ = tx.send(Chunk::Failed);
                        break;
                    }
                }
            }
        });

        PendingOutput {
            rx,
            overflow,
            timeout: Duration::from_millis(self.limits.collection_timeout_ms),
        }
    }
}

/// Handle on a stream being collected in the background
pub struct PendingOutput {
    rx: Receiver<Chunk>,
    overflow: Arc<AtomicBool>,
    timeout: Duration,
}

impl PendingOutput {
    /// True once the stream went past the ceiling
    pub fn overflowed(&self) -> bool {
        self.overflow.load(Ordering::SeqCst)
    }

    /// Gather everything collected so far, waiting up to the collection timeout
    pub fn finish(self) -> OutputResult {
        let deadline = Instant::now() + self.timeout;
        let mut data = Vec::new();
        let mut integrity = OutputIntegrity::Complete;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(Chunk::Data(bytes)) => data.extend_from_slice(&bytes),
                Ok(Chunk::Failed) => integrity = OutputIntegrity::ReadError,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    integrity = OutputIntegrity::CollectionTimeout;
                    break;
                }
            }
        }

        if self.overflow.load(Ordering::SeqCst) {
            integrity = OutputIntegrity::TruncatedByJudgeLimit;
        }

        OutputResult { data, integrity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collector(limit: usize) -> OutputCollector {
        OutputCollector::new(OutputLimits {
            combined_limit: limit,
            collection_timeout_ms: 1000,
        })
    }

    #[test]
    fn test_output_limits_default() {
        let limits = OutputLimits::default();
        assert_eq!(limits.combined_limit, 1024 * 1024);
    }

    #[test]
    fn test_small_output_is_complete() {
        let pending = collector(1024).spawn(Cursor::new(b"hello\n".to_vec()));
        let result = pending.finish();
        assert_eq!(result.text(), "hello\n");
        assert_eq!(result.integrity, OutputIntegrity::Complete);
    }

    #[test]
    fn test_output_at_limit_is_not_truncated() {
        let pending = collector(4).spawn(Cursor::new(b"abcd".to_vec()));
        let result = pending.finish();
        assert_eq!(result.data, b"abcd");
        assert_eq!(result.integrity, OutputIntegrity::Complete);
    }

    #[test]
    fn test_output_over_limit_is_truncated_and_flagged() {
        let pending = collector(4).spawn(Cursor::new(b"abcdef".to_vec()));
        let result = pending.finish();
        assert_eq!(result.data, b"abcd");
        assert_eq!(result.integrity, OutputIntegrity::TruncatedByJudgeLimit);
    }

    #[test]
    fn test_output_integrity_display() {
        assert_eq!(format!("{}", OutputIntegrity::Complete), "complete");
        assert_eq!(
            format!("{}", OutputIntegrity::TruncatedByJudgeLimit),
            "truncated_by_judge_limit"
        );
        assert_eq!(
            format!("{}", OutputIntegrity::CollectionTimeout),
            "collection_timeout"
        );
    }
}

/// Bounded worker pool for concurrent grading sessions
///
/// Sessions share nothing mutable; each worker grades one session at a time
/// with its own workspaces. The job queue is bounded, so `submit` blocks
/// once `queue_depth` sessions are waiting.
use crate::config::judge::JudgeConfig;
use crate::config::types::{JudgeError, Result};
use crate::grader::problem::Problem;
use crate::grader::session::{Grader, SessionReport, Submission, Viewer};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct Job {
    problem: Arc<Problem>,
    submission: Submission,
    viewer: Viewer,
    reply: Sender<SessionReport>,
}

pub struct GradingPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl GradingPool {
    /// Pool sized by `workers` and `queue_depth` from the configuration
    pub fn from_config(grader: Grader, config: &JudgeConfig) -> Result<Self> {
        Self::new(grader, config.workers, config.queue_depth)
    }

    pub fn new(grader: Grader, workers: usize, queue_depth: usize) -> Result<Self> {
        if workers == 0 {
            return Err(JudgeError::Pool("worker count must be positive".to_string()));
        }

        let (tx, rx) = bounded::<Job>(queue_depth);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let rx = rx.clone();
            let grader = grader.clone();
            let handle = thread::Builder::new()
                .name(format!("judgebox-worker-{}", id))
                .spawn(move || {
                    for job in rx.iter() {
                        let report = grader.grade(&job.problem, &job.submission, job.viewer);
                        if job.reply.send(report).is_err() {
                            log::debug!("worker {}: caller dropped its report receiver", id);
                        }
                    }
                })
                .map_err(|e| JudgeError::Pool(format!("Failed to spawn worker: {}", e)))?;
            handles.push(handle);
        }

        log::info!("Grading pool started with {} workers", workers);

        Ok(Self {
            jobs: Some(tx),
            workers: handles,
        })
    }

    /// Queue a session; the report arrives on the returned receiver
    pub fn submit(
        &self,
        problem: Arc<Problem>,
        submission: Submission,
        viewer: Viewer,
    ) -> Result<Receiver<SessionReport>> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| JudgeError::Pool("pool is shut down".to_string()))?;

        let (reply, report) = bounded(1);
        jobs.send(Job {
            problem,
            submission,
            viewer,
            reply,
        })
        .map_err(|_| JudgeError::Pool("all workers have exited".to_string()))?;

        Ok(report)
    }
}

impl Drop for GradingPool {
    fn drop(&mut self) {
        // Closing the queue lets workers finish queued jobs and exit.
        drop(self.jobs.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("grading worker panicked");
            }
        }
        log::info!("Grading pool shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{Language, Verdict};
    use crate::exec::engine::ExecutionEngine;
    use crate::grader::problem::CheckerProgram;

    fn shell_grader() -> Grader {
        let mut config = JudgeConfig {
            workspace_root: std::env::temp_dir()
                .join(format!("judgebox_pool_{}", uuid::Uuid::new_v4())),
            inter_test_pause_ms: 0,
            ..JudgeConfig::default()
        };
        config.languages.interpreted.runtime = Some("sh".to_string());
        config.languages.interpreted.runtime_args = Vec::new();
        Grader::new(Arc::new(ExecutionEngine::new(Arc::new(config)).unwrap()))
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            GradingPool::new(shell_grader(), 0, 4),
            Err(JudgeError::Pool(_))
        ));
    }

    #[test]
    fn test_pool_sized_from_config() {
        let grader = shell_grader();
        let config = JudgeConfig {
            workers: 2,
            queue_depth: 1,
            ..grader.engine().config().clone()
        };
        let pool = GradingPool::from_config(grader, &config).unwrap();
        assert_eq!(pool.workers.len(), 2);
    }

    #[test]
    fn test_concurrent_sessions_are_independent() {
        let pool = GradingPool::new(shell_grader(), 3, 8).unwrap();
        let problem = Arc::new(Problem::new(
            "echo",
            vec![("1".to_string(), "a".to_string()), ("2".to_string(), "b".to_string())],
            CheckerProgram {
                language: Language::Interpreted,
                source: "read header; out=$(cat); if [ \"$out\" = ok ]; then echo AC; else echo no; fi"
                    .to_string(),
            },
        ));

        let receivers: Vec<_> = (0..6)
            .map(|i| {
                let source = if i % 2 == 0 { "echo ok" } else { "echo nope" };
                pool.submit(
                    Arc::clone(&problem),
                    Submission {
                        source: source.to_string(),
                        language: Language::Interpreted,
                        time_limit_ms: 1000,
                        memory_limit_mb: 64,
                    },
                    Viewer::Contestant,
                )
                .unwrap()
            })
            .collect();

        for (i, rx) in receivers.into_iter().enumerate() {
            let report = rx.recv().unwrap();
            let expected = if i % 2 == 0 {
                Verdict::Accepted
            } else {
                Verdict::WrongAnswer
            };
            assert_eq!(report.verdict, expected);
        }
    }
}

/// Multi-test grading
///
/// A session runs the submission against each test in index order and stops
/// at the first definitive non-pass. Per test:
///
/// ```text
/// Pending -> Running -> Ambiguous -> Running (retry) -> Definitive
///                    \-> Definitive
/// ```
///
/// An ambiguous failure (timeout or memory exhaustion that host load may
/// have caused) is replayed exactly once under the language's adjusted
/// deadline; the replay's outcome is final.
/// Clean runs are handed to the checker program, which runs through the
/// same engine.
use crate::config::types::{Ambiguity, ExecutionResult, ExecutionStatus, Language, Verdict};
use crate::exec::engine::ExecutionEngine;
use crate::grader::problem::{Problem, ProblemRepository, TestCase};
use crate::observability::metrics::get_metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

pub const ACCEPTED_MESSAGE: &str = "All tests correct - no additional feedback";
pub const CHECKER_TIMEOUT_MESSAGE: &str = "System Error: checker timed out";
pub const CHECKER_FAILURE_MESSAGE: &str = "System Error: checker failed";
pub const NO_TESTS_MESSAGE: &str = "System Error: problem has no tests";
pub const PROBLEM_NOT_FOUND_MESSAGE: &str = "Problem ID not found";
const PRIVILEGED_PREFIX: &str = "Viewing as admin:\n";

/// Submitted program and the limits every test runs under. Immutable once
/// grading starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub source: String,
    pub language: Language,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
}

/// Who receives the report; decides how much checker detail is shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Viewer {
    #[default]
    #[serde(rename = "contestant")]
    Contestant,
    #[serde(rename = "privileged")]
    Privileged,
}

/// Terminal result of a grading session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionReport {
    pub verdict: Verdict,
    pub output: String,
    /// Max elapsed ms over passed tests, or the replay deadline on TLE
    pub time: u64,
    /// Max peak memory over passed tests, MB
    pub memory: f64,
    /// Index of the test that decided a non-Accepted verdict
    pub failed_test: Option<usize>,
    /// Tests that passed the checker
    pub tests_passed: usize,
}

impl SessionReport {
    /// Report for a problem identifier the repository cannot resolve
    pub fn problem_not_found() -> Self {
        Self {
            verdict: Verdict::SystemError,
            output: PROBLEM_NOT_FOUND_MESSAGE.to_string(),
            time: 0,
            memory: 0.0,
            failed_test: None,
            tests_passed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TestState {
    Pending,
    Running { attempt: u8 },
    Ambiguous,
    Definitive,
}

/// Mutable state of one session, owned by the sequential grading loop
struct GradingSession<'a> {
    problem: &'a Problem,
    submission: &'a Submission,
    max_time_ms: u64,
    max_memory_kb: u64,
    tests_passed: usize,
    started: Instant,
}

impl<'a> GradingSession<'a> {
    fn new(problem: &'a Problem, submission: &'a Submission) -> Self {
        Self {
            problem,
            submission,
            max_time_ms: 0,
            max_memory_kb: 0,
            tests_passed: 0,
            started: Instant::now(),
        }
    }

    fn record_pass(&mut self, result: &ExecutionResult) {
        self.max_time_ms = self.max_time_ms.max(result.elapsed_ms());
        self.max_memory_kb = self.max_memory_kb.max(result.peak_memory_kb());
        self.tests_passed += 1;
    }

    /// Set the verdict. Consumes the session, so this happens exactly once.
    fn finish(self, verdict: Verdict, output: String, failed_test: Option<usize>) -> SessionReport {
        let time = self.max_time_ms;
        self.finish_with_time(verdict, output, failed_test, time)
    }

    fn finish_with_time(
        self,
        verdict: Verdict,
        output: String,
        failed_test: Option<usize>,
        time: u64,
    ) -> SessionReport {
        log::info!(
            "Problem {}: {} after {} passed tests",
            self.problem.id,
            verdict,
            self.tests_passed
        );
        get_metrics().record_verdict(verdict, self.started.elapsed());

        SessionReport {
            verdict,
            output,
            time,
            memory: self.max_memory_kb as f64 / 1024.0,
            failed_test,
            tests_passed: self.tests_passed,
        }
    }
}

/// Outcome of handing one clean output to the checker
enum CheckerOutcome {
    Pass,
    Reject(String),
    TimedOut,
    Failed,
}

/// Drives submissions through problems
#[derive(Debug, Clone)]
pub struct Grader {
    engine: Arc<ExecutionEngine>,
}

impl Grader {
    pub fn new(engine: Arc<ExecutionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Resolve `problem_id` through `repository` and grade against it
    pub fn grade_by_id(
        &self,
        repository: &dyn ProblemRepository,
        problem_id: &str,
        submission: &Submission,
        viewer: Viewer,
    ) -> SessionReport {
        match repository.load(problem_id) {
            Ok(problem) => self.grade(&problem, submission, viewer),
            Err(e) => {
                log::error!("Failed to load problem {}: {}", problem_id, e);
                get_metrics().record_verdict(Verdict::SystemError, std::time::Duration::ZERO);
                SessionReport::problem_not_found()
            }
        }
    }

    /// Grade `submission` against every test of `problem`, in order
    pub fn grade(&self, problem: &Problem, submission: &Submission, viewer: Viewer) -> SessionReport {
        let metrics = get_metrics();
        metrics.active_sessions.inc();
        let report = self.run_session(problem, submission, viewer);
        metrics.active_sessions.dec();
        report
    }

    fn run_session(&self, problem: &Problem, submission: &Submission, viewer: Viewer) -> SessionReport {
        let mut session = GradingSession::new(problem, submission);

        if problem.tests.is_empty() {
            log::error!("Problem {} has no tests", problem.id);
            return session.finish(Verdict::SystemError, NO_TESTS_MESSAGE.to_string(), None);
        }

        for test in &problem.tests {
            let result = self.run_test(&session, test);

            if result.toolchain_missing() {
                log::error!(
                    "Aborting session for problem {}: {}",
                    problem.id,
                    result.output
                );
                return session.finish(
                    Verdict::SystemError,
                    format!("System Error: {}", result.output),
                    Some(test.index),
                );
            }

            match result.status {
                ExecutionStatus::Ok => {}
                ExecutionStatus::InternalError => {
                    return session.finish(Verdict::SystemError, result.output, Some(test.index));
                }
                ExecutionStatus::TimeLimit => {
                    return session.finish_with_time(
                        Verdict::TimeLimitExceeded,
                        result.output,
                        Some(test.index),
                        result.effective_time_limit_ms,
                    );
                }
                // A runtime's own out-of-memory report survives the replay
                // and is final as a memory verdict.
                ExecutionStatus::RuntimeError
                    if result.ambiguity == Some(Ambiguity::MemoryExhaustion) =>
                {
                    return session.finish(
                        Verdict::MemoryLimitExceeded,
                        result.output,
                        Some(test.index),
                    );
                }
                ref status => {
                    return session.finish(
                        Verdict::from_status(status),
                        result.output,
                        Some(test.index),
                    );
                }
            }

            match self.check(problem, test, &result.output) {
                CheckerOutcome::Pass => session.record_pass(&result),
                CheckerOutcome::Reject(text) => {
                    let message = wrong_answer_message(test.index, &text, viewer);
                    return session.finish(Verdict::WrongAnswer, message, Some(test.index));
                }
                CheckerOutcome::TimedOut => {
                    return session.finish(
                        Verdict::SystemError,
                        CHECKER_TIMEOUT_MESSAGE.to_string(),
                        Some(test.index),
                    );
                }
                CheckerOutcome::Failed => {
                    return session.finish(
                        Verdict::SystemError,
                        CHECKER_FAILURE_MESSAGE.to_string(),
                        Some(test.index),
                    );
                }
            }
        }

        session.finish(Verdict::Accepted, ACCEPTED_MESSAGE.to_string(), None)
    }

    /// Run one test to a definitive result, replaying an ambiguous failure once
    fn run_test(&self, session: &GradingSession<'_>, test: &TestCase) -> ExecutionResult {
        let submission = session.submission;
        let config = self.engine.config();

        let mut state = TestState::Pending;
        let mut attempt = 0u8;

        loop {
            attempt += 1;
            state = transition(test, state, TestState::Running { attempt });

            let result = if attempt == 1 {
                self.engine.run(
                    &submission.source,
                    submission.language,
                    &test.input,
                    submission.time_limit_ms,
                    submission.memory_limit_mb,
                )
            } else {
                self.engine.run_adjusted(
                    &submission.source,
                    submission.language,
                    &test.input,
                    submission.time_limit_ms,
                    submission.memory_limit_mb,
                )
            };
            thread::sleep(config.inter_test_pause());

            match result.ambiguity {
                Some(ambiguity) if state == (TestState::Running { attempt: 1 }) => {
                    log::info!(
                        "Test {} ambiguous ({:?}), replaying once",
                        test.index,
                        ambiguity
                    );
                    get_metrics().ambiguity_retries.inc();
                    state = transition(test, state, TestState::Ambiguous);
                }
                _ => {
                    transition(test, state, TestState::Definitive);
                    return result;
                }
            }
        }
    }

    fn check(&self, problem: &Problem, test: &TestCase, output: &str) -> CheckerOutcome {
        let config = self.engine.config();
        let stdin = format!("{} {}\n{}", problem.id, test.name, output);

        let verdict = self.engine.run(
            &problem.checker.source,
            problem.checker.language,
            &stdin,
            config.checker.time_limit_ms,
            config.checker.memory_limit_mb,
        );
        thread::sleep(config.inter_test_pause());

        match verdict.status {
            ExecutionStatus::Ok => {
                let text = verdict.output.trim();
                if text == "AC" || text == "Accepted" {
                    CheckerOutcome::Pass
                } else {
                    CheckerOutcome::Reject(text.to_string())
                }
            }
            ExecutionStatus::TimeLimit => {
                log::error!("Checker of problem {} timed out on test {}", problem.id, test.index);
                get_metrics().checker_failures.inc();
                CheckerOutcome::TimedOut
            }
            ref status => {
                log::error!(
                    "Checker of problem {} failed on test {}: {:?} {}",
                    problem.id,
                    test.index,
                    status,
                    verdict.output
                );
                get_metrics().checker_failures.inc();
                CheckerOutcome::Failed
            }
        }
    }
}

fn transition(test: &TestCase, from: TestState, to: TestState) -> TestState {
    log::debug!("test {}: {:?} -> {:?}", test.index, from, to);
    to
}

/// Wrong Answer text. Checker detail for any test after the first is shown
/// to privileged viewers only.
fn wrong_answer_message(index: usize, checker_text: &str, viewer: Viewer) -> String {
    if index == 0 {
        return format!("Failed on test {}:\n{}", index, checker_text);
    }
    match viewer {
        Viewer::Privileged => format!(
            "{}Failed on test {}:\n{}",
            PRIVILEGED_PREFIX, index, checker_text
        ),
        Viewer::Contestant => format!("Failed on test {}", index),
    }
}

/// Verdict classification
///
/// The status of a run is a pure function of the structured facts the
/// supervisor collected and the limits it ran under. Output text never
/// decides the status; it only feeds ambiguity detection later on.
use crate::config::types::{ExecutionStatus, ResourceUsage, RuntimeFault};
use crate::judge::adapter::ExitSignals;
use crate::utils::output::OutputIntegrity;

/// Everything known about one finished run phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunEvidence {
    pub compile_failed: bool,
    /// Executable that could not be found, if any
    pub toolchain_missing: Option<String>,
    pub signals: ExitSignals,
    /// `None` when usage was not measured
    pub usage: Option<ResourceUsage>,
}

/// Limits in force at classification time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSnapshot {
    pub effective_time_limit_ms: u64,
    pub memory_ceiling_kb: u64,
}

/// Verdict classifier - pure function over run evidence
pub struct VerdictClassifier;

impl VerdictClassifier {
    /// Classify one run.
    ///
    /// Precedence: compile failure, missing toolchain, time, memory, output
    /// overflow, incomplete output, fatal signal, non-zero exit, success.
    pub fn classify(
        evidence: &RunEvidence,
        limits: &LimitSnapshot,
    ) -> (ExecutionStatus, Option<RuntimeFault>) {
        if evidence.compile_failed {
            return (ExecutionStatus::CompilationError, None);
        }

        if let Some(binary) = &evidence.toolchain_missing {
            return (
                ExecutionStatus::RuntimeError,
                Some(RuntimeFault::ToolchainNotFound(binary.clone())),
            );
        }

        let signals = &evidence.signals;

        if signals.timed_out || Self::over_time(evidence, limits) {
            return (ExecutionStatus::TimeLimit, None);
        }

        // A process that crashed on its own is a runtime error even when its
        // measured peak went over; only the watcher's kill overrides that.
        if signals.memory_exceeded || (signals.signal.is_none() && Self::over_memory(evidence, limits)) {
            return (ExecutionStatus::MemoryLimit, None);
        }

        // Overflow kills surface as SIGKILL; the flag must win over the signal.
        if signals.output_overflow {
            return (ExecutionStatus::RuntimeError, Some(RuntimeFault::OutputLimit));
        }

        match signals.output_integrity {
            OutputIntegrity::CollectionTimeout => {
                return (ExecutionStatus::RuntimeError, Some(RuntimeFault::DetachedOutput));
            }
            OutputIntegrity::ReadError => return (ExecutionStatus::InternalError, None),
            OutputIntegrity::Complete | OutputIntegrity::TruncatedByJudgeLimit => {}
        }

        if let Some(signal) = signals.signal {
            return (
                ExecutionStatus::RuntimeError,
                Some(RuntimeFault::FatalSignal(signal)),
            );
        }

        match signals.exit_code {
            Some(0) => (ExecutionStatus::Ok, None),
            Some(code) => (
                ExecutionStatus::RuntimeError,
                Some(RuntimeFault::NonzeroExit(code)),
            ),
            None => (ExecutionStatus::InternalError, None),
        }
    }

    fn over_time(evidence: &RunEvidence, limits: &LimitSnapshot) -> bool {
        evidence
            .usage
            .map(|u| u.elapsed_ms > limits.effective_time_limit_ms)
            .unwrap_or(false)
    }

    /// Strictly greater than the ceiling; exactly at the ceiling is fine
    fn over_memory(evidence: &RunEvidence, limits: &LimitSnapshot) -> bool {
        evidence
            .usage
            .map(|u| u.peak_memory_kb > limits.memory_ceiling_kb)
            .unwrap_or(false)
    }
}

/// Execution engine: one run end to end
///
/// Acquires a workspace, lets the language adapter compile and run the
/// program, then classifies the captured facts. Every failure is turned into
/// an [`ExecutionResult`] here; nothing unclassified reaches the caller.
use crate::config::judge::JudgeConfig;
use crate::config::types::{
    ExecutionResult, ExecutionStatus, JudgeError, Language, Result, RuntimeFault,
};
use crate::judge::adapter::{detect_ambiguity, JudgeAdapter, Prepared, RunLimits};
use crate::judge::registry::adapter_for;
use crate::observability::metrics::get_metrics;
use crate::safety::workspace::{Workspace, WorkspaceManager};
use crate::verdict::verdict::{LimitSnapshot, RunEvidence, VerdictClassifier};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Replaces the partial output of a run killed for flooding the stream
pub const OUTPUT_LIMIT_MESSAGE: &str = "Output Limit Exceeded";

/// Shown to callers in place of infrastructure error details
const INTERNAL_ERROR_MESSAGE: &str = "Internal judge error";

#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    config: Arc<JudgeConfig>,
    workspaces: WorkspaceManager,
}

impl ExecutionEngine {
    /// Create an engine and sweep workspaces left behind by crashed runs
    pub fn new(config: Arc<JudgeConfig>) -> Result<Self> {
        let workspaces = WorkspaceManager::new(config.workspace_root.clone())?;

        match workspaces.cleanup_old_workspaces(Duration::from_secs(config.stale_workspace_secs)) {
            Ok(0) => {}
            Ok(n) => log::info!("Removed {} stale workspaces", n),
            Err(e) => log::warn!("Stale workspace sweep failed: {}", e),
        }

        Ok(Self { config, workspaces })
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Compile (if needed) and run `source` once against `input`.
    ///
    /// Never fails: a missing toolchain becomes a Runtime Error carrying
    /// [`RuntimeFault::ToolchainNotFound`], any other infrastructure failure
    /// becomes an Internal Error with a generic message.
    pub fn run(
        &self,
        source: &str,
        language: Language,
        input: &str,
        time_limit_ms: u64,
        memory_limit_mb: u64,
    ) -> ExecutionResult {
        let limits = RunLimits::new(&self.config, language, time_limit_ms, memory_limit_mb);
        self.run_with(source, language, input, &limits)
    }

    /// Like [`run`](Self::run), under the language's adjusted deadline.
    /// Used to replay an ambiguous failure.
    pub fn run_adjusted(
        &self,
        source: &str,
        language: Language,
        input: &str,
        time_limit_ms: u64,
        memory_limit_mb: u64,
    ) -> ExecutionResult {
        let limits = RunLimits::adjusted(&self.config, language, time_limit_ms, memory_limit_mb);
        self.run_with(source, language, input, &limits)
    }

    fn run_with(
        &self,
        source: &str,
        language: Language,
        input: &str,
        limits: &RunLimits,
    ) -> ExecutionResult {
        let started = Instant::now();
        let adapter = adapter_for(language, &self.config);

        let result = match self.workspaces.create_workspace() {
            Ok(mut workspace) => {
                let outcome = self.run_in(&mut workspace, adapter.as_ref(), source, input, limits);
                if let Err(e) = workspace.cleanup() {
                    log::warn!("{}", e);
                }
                outcome
            }
            Err(e) => Err(e),
        };

        let result = result.unwrap_or_else(|e| Self::classify_failure(e, limits));

        let metrics = get_metrics();
        metrics.record_execution(&result.status, started.elapsed());
        if result.toolchain_missing() {
            metrics.toolchain_missing.inc();
        }

        log::debug!(
            "{} run finished: {:?} in {} ms",
            language,
            result.status,
            result.elapsed_ms()
        );
        result
    }

    fn run_in(
        &self,
        workspace: &mut Workspace,
        adapter: &dyn JudgeAdapter,
        source: &str,
        input: &str,
        limits: &RunLimits,
    ) -> Result<ExecutionResult> {
        let snapshot = Self::snapshot(limits);

        if let Prepared::CompileFailed { diagnostic } =
            adapter.prepare(workspace, source, &self.config)?
        {
            let evidence = RunEvidence {
                compile_failed: true,
                ..RunEvidence::default()
            };
            let (status, fault) = VerdictClassifier::classify(&evidence, &snapshot);
            return Ok(ExecutionResult {
                status,
                fault,
                output: diagnostic,
                usage: None,
                ambiguity: None,
                effective_time_limit_ms: limits.effective_time_limit_ms,
            });
        }

        let captured = adapter.execute(workspace, input, limits, &self.config)?;

        let evidence = RunEvidence {
            signals: captured.signals,
            usage: captured.usage,
            ..RunEvidence::default()
        };
        let (status, fault) = VerdictClassifier::classify(&evidence, &snapshot);

        let output = match (&status, &fault) {
            (_, Some(RuntimeFault::OutputLimit)) => OUTPUT_LIMIT_MESSAGE.to_string(),
            (_, Some(RuntimeFault::DetachedOutput)) => RuntimeFault::DetachedOutput.to_string(),
            (ExecutionStatus::InternalError, _) => INTERNAL_ERROR_MESSAGE.to_string(),
            _ => workspace.scrub(&captured.output),
        };
        let ambiguity = detect_ambiguity(adapter, &status, &output);

        Ok(ExecutionResult {
            status,
            fault,
            output,
            usage: captured.usage,
            ambiguity,
            effective_time_limit_ms: limits.effective_time_limit_ms,
        })
    }

    fn snapshot(limits: &RunLimits) -> LimitSnapshot {
        LimitSnapshot {
            effective_time_limit_ms: limits.effective_time_limit_ms,
            memory_ceiling_kb: limits.memory_ceiling_kb(),
        }
    }

    fn classify_failure(error: JudgeError, limits: &RunLimits) -> ExecutionResult {
        match error {
            JudgeError::ToolchainNotFound(binary) => {
                log::error!("Toolchain not found: {}", binary);
                let evidence = RunEvidence {
                    toolchain_missing: Some(binary),
                    ..RunEvidence::default()
                };
                let (status, fault) = VerdictClassifier::classify(&evidence, &Self::snapshot(limits));
                ExecutionResult {
                    status,
                    output: fault.as_ref().map(ToString::to_string).unwrap_or_default(),
                    fault,
                    usage: None,
                    ambiguity: None,
                    effective_time_limit_ms: limits.effective_time_limit_ms,
                }
            }
            other => {
                log::error!("Execution failed: {}", other);
                ExecutionResult::internal_error(INTERNAL_ERROR_MESSAGE, limits.effective_time_limit_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Ambiguity;

    fn engine_with(configure: impl FnOnce(&mut JudgeConfig)) -> ExecutionEngine {
        let mut config = JudgeConfig {
            workspace_root: std::env::temp_dir()
                .join(format!("judgebox_engine_{}", uuid::Uuid::new_v4())),
            ..JudgeConfig::default()
        };
        configure(&mut config);
        ExecutionEngine::new(Arc::new(config)).unwrap()
    }

    /// Run shell snippets as the "interpreted" language so the engine can be
    /// exercised without a Python install.
    fn shell_engine() -> ExecutionEngine {
        engine_with(|config| {
            config.languages.interpreted.runtime = Some("sh".to_string());
            config.languages.interpreted.runtime_args = Vec::new();
        })
    }

    #[test]
    fn test_clean_run_reports_output_and_usage() {
        let engine = shell_engine();
        let result = engine.run("read n; echo $((n * 2))", Language::Interpreted, "21\n", 2000, 256);
        assert_eq!(result.status, ExecutionStatus::Ok);
        assert_eq!(result.output, "42");
        assert!(result.usage.is_some());
        assert_eq!(result.ambiguity, None);
    }

    #[test]
    fn test_timeout_is_time_limit_and_ambiguous() {
        let engine = shell_engine();
        let result = engine.run("while :; do :; done", Language::Interpreted, "", 300, 256);
        assert_eq!(result.status, ExecutionStatus::TimeLimit);
        assert_eq!(result.ambiguity, Some(Ambiguity::Timeout));
        assert_eq!(result.effective_time_limit_ms, 300);
    }

    #[test]
    fn test_nonzero_exit_is_runtime_error() {
        let engine = shell_engine();
        let result = engine.run("echo boom; exit 4", Language::Interpreted, "", 2000, 256);
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.fault, Some(RuntimeFault::NonzeroExit(4)));
        assert_eq!(result.output, "boom");
    }

    #[test]
    fn test_output_flood_is_runtime_error() {
        let engine = {
            let mut engine = shell_engine();
            Arc::make_mut(&mut engine.config).output_limit_bytes = 4096;
            engine
        };
        let result = engine.run("yes", Language::Interpreted, "", 5000, 256);
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.fault, Some(RuntimeFault::OutputLimit));
        assert_eq!(result.output, OUTPUT_LIMIT_MESSAGE);
    }

    #[test]
    fn test_program_output_resembling_footer_is_kept() {
        let engine = shell_engine();
        let result = engine.run(
            "echo '[I] Memory used: 1'; echo real",
            Language::Interpreted,
            "",
            2000,
            256,
        );
        assert_eq!(result.status, ExecutionStatus::Ok);
        assert_eq!(result.output, "[I] Memory used: 1\nreal");
        assert!(result.usage.is_some());

        let result = engine.run("echo '[I] am line one'; echo two", Language::Interpreted, "", 2000, 256);
        assert_eq!(result.output, "[I] am line one\ntwo");
    }

    #[test]
    fn test_first_run_uses_plain_limit_and_replay_the_multiplier() {
        let engine = engine_with(|config| {
            config.languages.interpreted.runtime = Some("sh".to_string());
            config.languages.interpreted.runtime_args = Vec::new();
        });
        let source = "sleep 0.4; echo done";

        let first = engine.run(source, Language::Interpreted, "", 200, 64);
        assert_eq!(first.status, ExecutionStatus::TimeLimit);
        assert_eq!(first.effective_time_limit_ms, 200);

        let replay = engine.run_adjusted(source, Language::Interpreted, "", 200, 64);
        assert_eq!(replay.status, ExecutionStatus::Ok);
        assert_eq!(replay.effective_time_limit_ms, 600);
        assert_eq!(replay.output, "done");
    }

    #[test]
    fn test_detached_writer_is_runtime_error() {
        let engine = shell_engine();
        let result = engine.run(
            "echo hi; setsid sh -c 'sleep 4; echo late' & exit 0",
            Language::Interpreted,
            "",
            5000,
            64,
        );
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.fault, Some(RuntimeFault::DetachedOutput));
    }

    #[test]
    fn test_missing_toolchain_is_distinct_runtime_error() {
        let engine = engine_with(|config| {
            config.languages.interpreted.runtime = Some("judgebox-no-such-interpreter".to_string());
        });
        let result = engine.run("print(1)", Language::Interpreted, "", 1000, 64);
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.toolchain_missing());
        assert_eq!(result.output, "toolchain not found: judgebox-no-such-interpreter");
    }

    #[test]
    fn test_workspace_released_after_run() {
        let engine = shell_engine();
        let _ = engine.run("echo hi", Language::Interpreted, "", 1000, 64);
        let leftovers = std::fs::read_dir(&engine.config().workspace_root)
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_external_footer_is_split_from_output() {
        let engine = engine_with(|config| {
            config.languages.interpreted.runtime = Some("sh".to_string());
            config.languages.interpreted.runtime_args = Vec::new();
            config.instrumentation = crate::config::judge::Instrumentation::External;
        });
        let result = engine.run(
            "echo 42; echo '[I] Memory used: 2048'; echo '[I] Time used: 17 ms'",
            Language::Interpreted,
            "",
            1000,
            64,
        );
        assert_eq!(result.status, ExecutionStatus::Ok);
        assert_eq!(result.output, "42");
        assert_eq!(result.elapsed_ms(), 17);
        assert_eq!(result.peak_memory_kb(), 2048);
    }

    #[test]
    fn test_external_instrumentation_without_footer_is_unmeasured() {
        let engine = engine_with(|config| {
            config.languages.interpreted.runtime = Some("sh".to_string());
            config.languages.interpreted.runtime_args = Vec::new();
            config.instrumentation = crate::config::judge::Instrumentation::External;
        });
        let result = engine.run("echo hi", Language::Interpreted, "", 1000, 64);
        assert_eq!(result.status, ExecutionStatus::Ok);
        assert_eq!(result.output, "hi");
        assert_eq!(result.usage, None);
    }
}

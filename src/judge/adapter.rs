use crate::config::judge::{Instrumentation, JudgeConfig};
use crate::config::presets::ToolchainConfig;
use crate::config::types::{
    Ambiguity, ExecutionStatus, JudgeError, Language, ResourceUsage, Result,
};
use crate::exec::supervisor::{self, LaunchSpec};
use crate::safety::workspace::Workspace;
use crate::utils::instrument;
use crate::utils::output::OutputIntegrity;
use std::time::Duration;

/// Limits one run phase is held to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Limit as requested by the caller
    pub time_limit_ms: u64,
    /// Kill deadline of the run phase
    pub effective_time_limit_ms: u64,
    pub memory_limit_mb: u64,
}

impl RunLimits {
    /// Limits of a first run: only the runtime's startup allowance applies
    pub fn new(config: &JudgeConfig, language: Language, time_limit_ms: u64, memory_limit_mb: u64) -> Self {
        Self {
            time_limit_ms,
            effective_time_limit_ms: config.run_time_limit_ms(language, time_limit_ms),
            memory_limit_mb,
        }
    }

    /// Limits of a replay after an ambiguous failure, scaled by the
    /// language's timing multiplier
    pub fn adjusted(config: &JudgeConfig, language: Language, time_limit_ms: u64, memory_limit_mb: u64) -> Self {
        Self {
            time_limit_ms,
            effective_time_limit_ms: config.adjusted_time_limit_ms(language, time_limit_ms),
            memory_limit_mb,
        }
    }

    /// `memory_limit_mb * 1024`, exact
    pub fn memory_ceiling_kb(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(1024)
    }
}

/// Result of the compile phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    Ready,
    CompileFailed { diagnostic: String },
}

/// Structured exit facts reported by the supervisor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitSignals {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub memory_exceeded: bool,
    pub output_overflow: bool,
    pub output_integrity: OutputIntegrity,
}

/// Captured stream of one run phase
#[derive(Debug, Clone)]
pub struct CapturedStream {
    /// Program output with any launcher footer already split off
    pub output: String,
    /// `None` when the launcher printed no footer
    pub usage: Option<ResourceUsage>,
    pub signals: ExitSignals,
}

/// Judge adapter contract for language-specific compile/run stages.
pub trait JudgeAdapter: Send + Sync {
    fn language(&self) -> Language;

    fn toolchain(&self) -> &ToolchainConfig;

    /// File name the source is stored under inside the workspace
    fn source_file_name(&self, source: &str) -> String;

    /// Compiler argv, or `None` when the language has no compile phase
    fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>>;

    fn run_command(&self, workspace: &Workspace, limits: &RunLimits) -> Vec<String>;

    /// Diagnostic substrings this runtime prints when it runs out of memory.
    /// Only consulted by [`detect_ambiguity`].
    fn memory_exhaustion_signatures(&self) -> &'static [&'static str];

    /// Materialize the source and run the compile phase, if any
    fn prepare(&self, workspace: &mut Workspace, source: &str, config: &JudgeConfig) -> Result<Prepared> {
        let file_name = self.source_file_name(source);
        workspace.create_source_file(&file_name, source.as_bytes())?;

        let Some(argv) = self.compile_command(workspace) else {
            return Ok(Prepared::Ready);
        };

        let run = supervisor::supervise(&LaunchSpec {
            argv,
            workdir: workspace.run_dir().to_path_buf(),
            environment: Vec::new(),
            stdin_data: Vec::new(),
            wall_time_limit: config.compile_time_limit(),
            memory_ceiling_kb: None,
            output_limit: config.output_limit_bytes,
        })?;

        if run.succeeded() {
            return Ok(Prepared::Ready);
        }

        let diagnostic = if run.timed_out {
            "Compilation timed out".to_string()
        } else {
            workspace.scrub(run.output.text().trim())
        };
        log::debug!("{} compile failed in workspace {}", self.language(), workspace.run_id());

        Ok(Prepared::CompileFailed { diagnostic })
    }

    /// Run the prepared program under instrumentation
    fn execute(
        &self,
        workspace: &Workspace,
        input: &str,
        limits: &RunLimits,
        config: &JudgeConfig,
    ) -> Result<CapturedStream> {
        let mut argv = config.launcher.clone();
        argv.extend(self.run_command(workspace, limits));
        if argv.is_empty() {
            return Err(JudgeError::Config(format!(
                "no run command for {}",
                self.language()
            )));
        }

        let run = supervisor::supervise(&LaunchSpec {
            argv,
            workdir: workspace.run_dir().to_path_buf(),
            environment: Vec::new(),
            stdin_data: input.as_bytes().to_vec(),
            wall_time_limit: Duration::from_millis(limits.effective_time_limit_ms),
            memory_ceiling_kb: Some(limits.memory_ceiling_kb()),
            output_limit: config.output_limit_bytes,
        })?;

        let signals = ExitSignals {
            exit_code: run.exit_code,
            signal: run.signal,
            timed_out: run.timed_out,
            memory_exceeded: run.memory_exceeded,
            output_overflow: run.output_overflow,
            output_integrity: run.output.integrity,
        };
        let text = run.output.text();

        // Only an external launcher writes a footer into the stream; our own
        // measurements never pass through program output.
        let (output, usage) = match config.instrumentation {
            Instrumentation::Internal => (text.trim().to_string(), Some(run.usage)),
            Instrumentation::External => {
                let parsed = instrument::split(&text);
                (parsed.output, parsed.usage)
            }
        };

        Ok(CapturedStream {
            output,
            usage,
            signals,
        })
    }
}

/// Decide whether a classified failure may be an artifact of host load.
///
/// Structured flags come first: a supervisor timeout kill and a memory
/// ceiling breach are ambiguous by construction. The adapter's diagnostic
/// signatures are the only text heuristic in the crate and apply to runtime
/// errors only.
pub fn detect_ambiguity(
    adapter: &dyn JudgeAdapter,
    status: &ExecutionStatus,
    diagnostic: &str,
) -> Option<Ambiguity> {
    match status {
        ExecutionStatus::TimeLimit => Some(Ambiguity::Timeout),
        ExecutionStatus::MemoryLimit => Some(Ambiguity::MemoryExhaustion),
        ExecutionStatus::RuntimeError
            if adapter
                .memory_exhaustion_signatures()
                .iter()
                .any(|signature| diagnostic.contains(signature)) =>
        {
            Some(Ambiguity::MemoryExhaustion)
        }
        _ => None,
    }
}

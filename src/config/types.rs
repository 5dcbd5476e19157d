/// Core types and structures for the judgebox system
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Language family of a submission.
///
/// Each family maps to exactly one judge adapter: `Interpreted` runs through
/// the Python interpreter, `NativeCompiled` through g++, `ManagedRuntime`
/// through javac/java.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    #[serde(rename = "interpreted", alias = "python", alias = "py")]
    Interpreted,
    #[serde(rename = "nativeCompiled", alias = "cpp", alias = "c++")]
    NativeCompiled,
    #[serde(rename = "managedRuntime", alias = "java")]
    ManagedRuntime,
}

impl Language {
    pub const ALL: [Language; 3] = [
        Language::Interpreted,
        Language::NativeCompiled,
        Language::ManagedRuntime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Interpreted => "interpreted",
            Language::NativeCompiled => "nativeCompiled",
            Language::ManagedRuntime => "managedRuntime",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "interpreted" | "python" | "python3" | "py" => Ok(Language::Interpreted),
            "nativecompiled" | "native" | "cpp" | "c++" | "cxx" | "cc" => {
                Ok(Language::NativeCompiled)
            }
            "managedruntime" | "managed" | "java" => Ok(Language::ManagedRuntime),
            _ => Err(JudgeError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Wall time and peak memory of one run phase.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceUsage {
    /// Wall time of the user program in milliseconds
    pub elapsed_ms: u64,
    /// Peak resident set size in kilobytes
    pub peak_memory_kb: u64,
}

/// Outcome of a single run - closed taxonomy
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Program exited cleanly within every ceiling
    #[default]
    #[serde(rename = "OK")]
    Ok,
    /// Compile phase exited non-zero (or ran out of compile time)
    #[serde(rename = "CE")]
    CompilationError,
    /// Killed by the wall-clock supervisor, or measured over the effective limit
    #[serde(rename = "TLE")]
    TimeLimit,
    /// Peak memory strictly above `memory_limit_mb * 1024` KB
    #[serde(rename = "MLE")]
    MemoryLimit,
    /// Non-zero exit, fatal signal, output overflow or missing toolchain
    #[serde(rename = "RE")]
    RuntimeError,
    /// Judge infrastructure failure (workspace I/O, spawn failure)
    #[serde(rename = "IE")]
    InternalError,
}

/// Detail attached to a `RuntimeError` status
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum RuntimeFault {
    #[serde(rename = "nonzero_exit")]
    NonzeroExit(i32),
    #[serde(rename = "fatal_signal")]
    FatalSignal(i32),
    #[serde(rename = "output_limit")]
    OutputLimit,
    #[serde(rename = "toolchain_not_found")]
    ToolchainNotFound(String),
    /// A descendant left the process group and kept the output pipe open
    #[serde(rename = "detached_output")]
    DetachedOutput,
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeFault::NonzeroExit(code) => write!(f, "exited with code {}", code),
            RuntimeFault::FatalSignal(signal) => write!(f, "terminated by signal {}", signal),
            RuntimeFault::OutputLimit => write!(f, "output limit exceeded"),
            RuntimeFault::ToolchainNotFound(binary) => {
                write!(f, "toolchain not found: {}", binary)
            }
            RuntimeFault::DetachedOutput => {
                write!(f, "output stream held open by a detached process")
            }
        }
    }
}

/// Failure signature that may be caused by host load rather than the
/// submission itself. The grader replays the test once before trusting it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Ambiguity {
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "memory_exhaustion")]
    MemoryExhaustion,
}

/// Result of one classified run. Built once by the engine, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub fault: Option<RuntimeFault>,
    /// Program output, or diagnostic text on failure
    pub output: String,
    /// `None` when usage was not measured
    pub usage: Option<ResourceUsage>,
    pub ambiguity: Option<Ambiguity>,
    /// Wall-clock deadline the run was held to
    pub effective_time_limit_ms: u64,
}

impl ExecutionResult {
    pub fn internal_error(message: impl Into<String>, effective_time_limit_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::InternalError,
            fault: None,
            output: message.into(),
            usage: None,
            ambiguity: None,
            effective_time_limit_ms,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExecutionStatus::Ok
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.usage.map(|u| u.elapsed_ms).unwrap_or(0)
    }

    pub fn peak_memory_kb(&self) -> u64 {
        self.usage.map(|u| u.peak_memory_kb).unwrap_or(0)
    }

    pub fn toolchain_missing(&self) -> bool {
        matches!(self.fault, Some(RuntimeFault::ToolchainNotFound(_)))
    }
}

/// Session-level and invocation-level verdict vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Compilation/Runtime Error")]
    CompilationError,
    #[serde(rename = "System Error")]
    SystemError,
    #[serde(rename = "Invalid Request")]
    InvalidRequest,
}

impl Verdict {
    pub const ALL: [Verdict; 8] = [
        Verdict::Accepted,
        Verdict::WrongAnswer,
        Verdict::TimeLimitExceeded,
        Verdict::MemoryLimitExceeded,
        Verdict::RuntimeError,
        Verdict::CompilationError,
        Verdict::SystemError,
        Verdict::InvalidRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::CompilationError => "Compilation/Runtime Error",
            Verdict::SystemError => "System Error",
            Verdict::InvalidRequest => "Invalid Request",
        }
    }

    /// Map a single-run status to the invocation verdict
    pub fn from_status(status: &ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Ok => Verdict::Accepted,
            ExecutionStatus::CompilationError => Verdict::CompilationError,
            ExecutionStatus::TimeLimit => Verdict::TimeLimitExceeded,
            ExecutionStatus::MemoryLimit => Verdict::MemoryLimitExceeded,
            ExecutionStatus::RuntimeError => Verdict::RuntimeError,
            ExecutionStatus::InternalError => Verdict::SystemError,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Custom error types for judgebox
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("toolchain not found: {0}")]
    ToolchainNotFound(String),

    #[error("Problem error: {0}")]
    Problem(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Worker pool error: {0}")]
    Pool(String),
}

impl From<nix::errno::Errno> for JudgeError {
    fn from(err: nix::errno::Errno) -> Self {
        JudgeError::Process(err.to_string())
    }
}

/// Result type alias for judgebox operations
pub type Result<T> = std::result::Result<T, JudgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing_accepts_aliases() {
        assert_eq!("python".parse::<Language>().unwrap(), Language::Interpreted);
        assert_eq!("C++".parse::<Language>().unwrap(), Language::NativeCompiled);
        assert_eq!("java".parse::<Language>().unwrap(), Language::ManagedRuntime);
        assert_eq!(
            "managedRuntime".parse::<Language>().unwrap(),
            Language::ManagedRuntime
        );
        assert!(matches!(
            "cobol".parse::<Language>(),
            Err(JudgeError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_language_serde_names() {
        let json = serde_json::to_string(&Language::NativeCompiled).unwrap();
        assert_eq!(json, "\"nativeCompiled\"");
        let parsed: Language = serde_json::from_str("\"java\"").unwrap();
        assert_eq!(parsed, Language::ManagedRuntime);
    }

    #[test]
    fn test_verdict_strings_are_stable() {
        assert_eq!(Verdict::CompilationError.to_string(), "Compilation/Runtime Error");
        assert_eq!(
            serde_json::to_string(&Verdict::TimeLimitExceeded).unwrap(),
            "\"Time Limit Exceeded\""
        );
        assert_eq!(Verdict::from_status(&ExecutionStatus::InternalError), Verdict::SystemError);
    }

    #[test]
    fn test_unmeasured_usage_reads_as_zero() {
        let result = ExecutionResult::internal_error("boom", 1000);
        assert_eq!(result.elapsed_ms(), 0);
        assert_eq!(result.peak_memory_kb(), 0);
        assert!(result.usage.is_none());
    }

    #[test]
    fn test_toolchain_fault_display() {
        let fault = RuntimeFault::ToolchainNotFound("g++".to_string());
        assert_eq!(fault.to_string(), "toolchain not found: g++");
    }
}

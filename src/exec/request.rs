/// Single-invocation contract
///
/// `run(code, language, input, timeLimitMs, memoryLimitMb)` as consumed by an
/// outer service: a JSON request in, a `{verdict, output, time, memory}`
/// report out.
use crate::config::types::{ExecutionStatus, Language, Verdict};
use crate::exec::engine::ExecutionEngine;
use serde::{Deserialize, Serialize};

pub const MISSING_PARAMETERS_MESSAGE: &str = "Missing required parameters";

/// Request body; every field is optional on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunRequest {
    pub code: Option<String>,
    #[serde(alias = "lang")]
    pub language: Option<String>,
    pub input: Option<String>,
    #[serde(alias = "tl", alias = "timeLimitMs")]
    pub time_limit_ms: Option<u64>,
    #[serde(alias = "ml", alias = "memoryLimitMb")]
    pub memory_limit_mb: Option<u64>,
}

/// Response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub verdict: Verdict,
    pub output: String,
    /// Milliseconds
    pub time: u64,
    /// Megabytes
    pub memory: f64,
}

impl RunReport {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::InvalidRequest,
            output: message.into(),
            time: 0,
            memory: 0.0,
        }
    }
}

/// Validate `request`, run it once and shape the report
pub fn handle(engine: &ExecutionEngine, request: &RunRequest) -> RunReport {
    let (Some(code), Some(language), Some(input)) = (
        request.code.as_deref().filter(|c| !c.is_empty()),
        request.language.as_deref().filter(|l| !l.trim().is_empty()),
        request.input.as_deref(),
    ) else {
        return RunReport::invalid(MISSING_PARAMETERS_MESSAGE);
    };

    let language: Language = match language.parse() {
        Ok(language) => language,
        Err(e) => return RunReport::invalid(format!("{}", e)),
    };

    let config = engine.config();
    let time_limit_ms = request.time_limit_ms.unwrap_or(config.default_time_limit_ms);
    let memory_limit_mb = request
        .memory_limit_mb
        .unwrap_or(config.default_memory_limit_mb);

    let result = engine.run(code, language, input, time_limit_ms, memory_limit_mb);
    let memory = result.peak_memory_kb() as f64 / 1024.0;
    let elapsed_ms = result.elapsed_ms();

    match result.status {
        ExecutionStatus::TimeLimit => RunReport {
            verdict: Verdict::TimeLimitExceeded,
            output: String::new(),
            time: time_limit_ms,
            memory: 0.0,
        },
        ExecutionStatus::MemoryLimit => RunReport {
            verdict: Verdict::MemoryLimitExceeded,
            output: String::new(),
            time: 0,
            memory,
        },
        ExecutionStatus::Ok => RunReport {
            verdict: Verdict::Accepted,
            output: result.output,
            time: elapsed_ms,
            memory,
        },
        ref status => RunReport {
            verdict: Verdict::from_status(status),
            output: result.output,
            time: 0,
            memory: 0.0,
        },
    }
}

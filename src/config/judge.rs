/// Configuration loading from judgebox.json
use crate::config::presets::{LanguagePresets, ToolchainConfig};
use crate::config::types::{JudgeError, Language, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the current directory by [`JudgeConfig::load_default`]
pub const DEFAULT_CONFIG_FILE: &str = "judgebox.json";

/// Who produces the `[I]` resource footer after the program output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Instrumentation {
    /// judgebox measures the child itself and appends the footer
    #[default]
    #[serde(rename = "internal")]
    Internal,
    /// The configured launcher prints the footer; judgebox only parses it
    #[serde(rename = "external")]
    External,
}

/// Limits the checker program runs under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckerConfig {
    pub language: Language,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            language: Language::Interpreted,
            time_limit_ms: 5_000,
            memory_limit_mb: 256,
        }
    }
}

/// Full judgebox.json structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Parent directory of every per-run workspace
    pub workspace_root: PathBuf,
    /// Ceiling on the combined stdout+stderr stream (bytes)
    pub output_limit_bytes: usize,
    /// Wall-clock allowance for the compile phase
    pub compile_time_limit_ms: u64,
    /// Pause between sequential test executions
    pub inter_test_pause_ms: u64,
    /// Workspaces older than this are swept when an engine starts
    pub stale_workspace_secs: u64,
    /// Limits applied by the single-run contract when the request omits them
    pub default_time_limit_ms: u64,
    pub default_memory_limit_mb: u64,
    /// Optional argv prefix (external sandbox) for every run phase
    pub launcher: Vec<String>,
    pub instrumentation: Instrumentation,
    /// Worker threads of the grading pool
    pub workers: usize,
    /// Sessions that may wait for a worker before `submit` blocks
    pub queue_depth: usize,
    pub checker: CheckerConfig,
    pub languages: LanguagePresets,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("judgebox"),
            output_limit_bytes: 1024 * 1024,
            compile_time_limit_ms: 30_000,
            inter_test_pause_ms: 100,
            stale_workspace_secs: 3600,
            default_time_limit_ms: 2000,
            default_memory_limit_mb: 256,
            launcher: Vec::new(),
            instrumentation: Instrumentation::Internal,
            workers: 4,
            queue_depth: 16,
            checker: CheckerConfig::default(),
            languages: LanguagePresets::default(),
        }
    }
}

impl JudgeConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            JudgeError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: JudgeConfig = serde_json::from_str(&config_content)
            .map_err(|e| JudgeError::Config(format!("Failed to parse config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load ./judgebox.json when present, otherwise the built-in defaults
    pub fn load_default() -> Result<Self> {
        let config_path = std::env::current_dir()
            .map_err(|e| JudgeError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_CONFIG_FILE);

        if !config_path.exists() {
            log::debug!("{} not found, using built-in defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }

        log::info!("Loading configuration from {}", config_path.display());
        Self::load_from_file(config_path)
    }

    /// Reject configurations that would make every run fail
    pub fn validate(&self) -> Result<()> {
        if self.output_limit_bytes == 0 {
            return Err(JudgeError::Config(
                "output_limit_bytes must be positive".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(JudgeError::Config("workers must be positive".to_string()));
        }
        for language in Language::ALL {
            let toolchain = self.toolchain(language);
            if toolchain.time_multiplier == 0 || toolchain.run_multiplier == 0 {
                return Err(JudgeError::Config(format!(
                    "time multipliers for {} must be positive",
                    language
                )));
            }
            if toolchain.runtime.is_none() && language != Language::NativeCompiled {
                return Err(JudgeError::Config(format!(
                    "{} requires a runtime executable",
                    language
                )));
            }
        }
        if self.instrumentation == Instrumentation::External && self.launcher.is_empty() {
            log::warn!("external instrumentation configured without a launcher; usage will be unmeasured");
        }
        Ok(())
    }

    pub fn toolchain(&self, language: Language) -> &ToolchainConfig {
        self.languages.get(language)
    }

    /// Run-phase deadline of a first attempt
    pub fn run_time_limit_ms(&self, language: Language, time_limit_ms: u64) -> u64 {
        time_limit_ms.saturating_mul(self.toolchain(language).run_multiplier)
    }

    /// Deadline of a replay; never shorter than the first attempt's
    pub fn adjusted_time_limit_ms(&self, language: Language, time_limit_ms: u64) -> u64 {
        let toolchain = self.toolchain(language);
        time_limit_ms.saturating_mul(toolchain.time_multiplier.max(toolchain.run_multiplier))
    }

    pub fn inter_test_pause(&self) -> Duration {
        Duration::from_millis(self.inter_test_pause_ms)
    }

    pub fn compile_time_limit(&self) -> Duration {
        Duration::from_millis(self.compile_time_limit_ms)
    }
}

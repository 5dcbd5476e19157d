/// Language toolchain presets
///
/// Each preset names the compiler (if any), the runtime executable and two
/// time scalings: the startup allowance every run phase gets, and the timing
/// multiplier a replay of an ambiguous failure runs under. Presets are plain
/// data so they can be overridden from `judgebox.json`.
use crate::config::types::Language;
use serde::{Deserialize, Serialize};

/// Compiler/runtime description for one language family
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolchainConfig {
    /// Compiler executable (absent for interpreted languages)
    #[serde(default)]
    pub compiler: Option<String>,
    /// Compiler arguments placed before the output/source paths
    #[serde(default)]
    pub compiler_args: Vec<String>,
    /// Runtime executable (interpreter or VM); absent for native binaries
    #[serde(default)]
    pub runtime: Option<String>,
    /// Runtime arguments placed before the program path
    #[serde(default)]
    pub runtime_args: Vec<String>,
    /// Run-phase deadline multiplier absorbing VM startup
    #[serde(default = "default_run_multiplier")]
    pub run_multiplier: u64,
    /// Deadline multiplier of the replay after an ambiguous failure
    pub time_multiplier: u64,
}

fn default_run_multiplier() -> u64 {
    1
}

impl ToolchainConfig {
    /// Stock preset for a language family
    pub fn preset(language: Language) -> Self {
        match language {
            Language::Interpreted => ToolchainConfig {
                compiler: None,
                compiler_args: Vec::new(),
                runtime: Some("python3".to_string()),
                runtime_args: vec!["-B".to_string()],
                run_multiplier: 1,
                time_multiplier: 3,
            },
            Language::NativeCompiled => ToolchainConfig {
                compiler: Some("g++".to_string()),
                compiler_args: vec![
                    "-std=c++17".to_string(),
                    "-O2".to_string(),
                    "-pipe".to_string(),
                ],
                runtime: None,
                runtime_args: Vec::new(),
                run_multiplier: 1,
                time_multiplier: 1,
            },
            Language::ManagedRuntime => ToolchainConfig {
                compiler: Some("javac".to_string()),
                compiler_args: vec!["-encoding".to_string(), "UTF-8".to_string()],
                runtime: Some("java".to_string()),
                runtime_args: vec![
                    "-Xss64m".to_string(),
                    "-XX:+UseSerialGC".to_string(),
                    "-Dfile.encoding=UTF-8".to_string(),
                ],
                run_multiplier: 2,
                time_multiplier: 2,
            },
        }
    }

    /// Binaries that must be reachable for this toolchain to work
    pub fn required_binaries(&self) -> Vec<&str> {
        self.compiler
            .iter()
            .chain(self.runtime.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Toolchains for all three language families
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguagePresets {
    #[serde(default = "interpreted_preset")]
    pub interpreted: ToolchainConfig,
    #[serde(default = "native_preset", rename = "nativeCompiled")]
    pub native_compiled: ToolchainConfig,
    #[serde(default = "managed_preset", rename = "managedRuntime")]
    pub managed_runtime: ToolchainConfig,
}

fn interpreted_preset() -> ToolchainConfig {
    ToolchainConfig::preset(Language::Interpreted)
}

fn native_preset() -> ToolchainConfig {
    ToolchainConfig::preset(Language::NativeCompiled)
}

fn managed_preset() -> ToolchainConfig {
    ToolchainConfig::preset(Language::ManagedRuntime)
}

impl LanguagePresets {
    pub fn get(&self, language: Language) -> &ToolchainConfig {
        match language {
            Language::Interpreted => &self.interpreted,
            Language::NativeCompiled => &self.native_compiled,
            Language::ManagedRuntime => &self.managed_runtime,
        }
    }
}

impl Default for LanguagePresets {
    fn default() -> Self {
        Self {
            interpreted: interpreted_preset(),
            native_compiled: native_preset(),
            managed_runtime: managed_preset(),
        }
    }
}

use crate::config::presets::ToolchainConfig;
use crate::config::types::Language;
use crate::judge::adapter::{JudgeAdapter, RunLimits};
use crate::safety::workspace::Workspace;

const SOURCE_FILE: &str = "solution.cpp";
const BINARY: &str = "solution";

#[derive(Debug, Clone)]
pub struct CppAdapter {
    toolchain: ToolchainConfig,
}

impl CppAdapter {
    pub fn new(toolchain: ToolchainConfig) -> Self {
        Self { toolchain }
    }
}

impl JudgeAdapter for CppAdapter {
    fn language(&self) -> Language {
        Language::NativeCompiled
    }

    fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }

    fn source_file_name(&self, _source: &str) -> String {
        SOURCE_FILE.to_string()
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>> {
        let compiler = self.toolchain.compiler.clone()?;
        let mut argv = vec![compiler];
        argv.extend(self.toolchain.compiler_args.iter().cloned());
        argv.push("-o".to_string());
        argv.push(workspace.run_dir().join(BINARY).to_string_lossy().to_string());
        argv.push(workspace.run_dir().join(SOURCE_FILE).to_string_lossy().to_string());
        Some(argv)
    }

    fn run_command(&self, workspace: &Workspace, _limits: &RunLimits) -> Vec<String> {
        let mut argv: Vec<String> = self.toolchain.runtime.iter().cloned().collect();
        argv.extend(self.toolchain.runtime_args.iter().cloned());
        argv.push(workspace.run_dir().join(BINARY).to_string_lossy().to_string());
        argv
    }

    fn memory_exhaustion_signatures(&self) -> &'static [&'static str] {
        &["std::bad_alloc"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::judge::JudgeConfig;
    use crate::safety::workspace::WorkspaceManager;

    #[test]
    fn test_compile_and_run_commands() {
        let config = JudgeConfig::default();
        let adapter = CppAdapter::new(ToolchainConfig::preset(Language::NativeCompiled));
        let manager = WorkspaceManager::new(std::env::temp_dir().join("judgebox_cpp_adapter")).unwrap();
        let workspace = manager.create_workspace().unwrap();

        let compile = adapter.compile_command(&workspace).unwrap();
        assert_eq!(compile[0], "g++");
        assert!(compile.contains(&"-std=c++17".to_string()));
        assert!(compile.last().unwrap().ends_with("/solution.cpp"));

        let limits = RunLimits::new(&config, Language::NativeCompiled, 1000, 64);
        let run = adapter.run_command(&workspace, &limits);
        assert_eq!(run.len(), 1);
        assert!(run[0].ends_with("/solution"));
    }
}

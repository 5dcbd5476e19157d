use crate::config::presets::ToolchainConfig;
use crate::config::types::Language;
use crate::judge::adapter::{JudgeAdapter, RunLimits};
use crate::safety::workspace::Workspace;

const SOURCE_FILE: &str = "solution.py";

#[derive(Debug, Clone)]
pub struct PythonAdapter {
    toolchain: ToolchainConfig,
}

impl PythonAdapter {
    pub fn new(toolchain: ToolchainConfig) -> Self {
        Self { toolchain }
    }
}

impl JudgeAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Interpreted
    }

    fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }

    fn source_file_name(&self, _source: &str) -> String {
        SOURCE_FILE.to_string()
    }

    fn compile_command(&self, _workspace: &Workspace) -> Option<Vec<String>> {
        // Python has no compile stage.
        None
    }

    fn run_command(&self, workspace: &Workspace, _limits: &RunLimits) -> Vec<String> {
        let mut argv: Vec<String> = self.toolchain.runtime.iter().cloned().collect();
        argv.extend(self.toolchain.runtime_args.iter().cloned());
        argv.push(workspace.run_dir().join(SOURCE_FILE).to_string_lossy().to_string());
        argv
    }

    fn memory_exhaustion_signatures(&self) -> &'static [&'static str] {
        &["MemoryError"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::judge::JudgeConfig;
    use crate::safety::workspace::WorkspaceManager;

    #[test]
    fn test_run_command_invokes_interpreter_directly() {
        let config = JudgeConfig::default();
        let adapter = PythonAdapter::new(ToolchainConfig::preset(Language::Interpreted));
        let manager = WorkspaceManager::new(std::env::temp_dir().join("judgebox_python_adapter")).unwrap();
        let workspace = manager.create_workspace().unwrap();
        let limits = RunLimits::new(&config, Language::Interpreted, 1000, 64);

        let argv = adapter.run_command(&workspace, &limits);
        assert_eq!(argv[0], "python3");
        assert_eq!(argv[1], "-B");
        assert!(argv[2].ends_with("/solution.py"));
        assert!(adapter.compile_command(&workspace).is_none());
    }
}

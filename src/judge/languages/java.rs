use crate::config::presets::ToolchainConfig;
use crate::config::types::Language;
use crate::judge::adapter::{JudgeAdapter, RunLimits};
use crate::safety::workspace::Workspace;

const DEFAULT_CLASS: &str = "Main";

#[derive(Debug, Clone)]
pub struct JavaAdapter {
    toolchain: ToolchainConfig,
}

impl JavaAdapter {
    pub fn new(toolchain: ToolchainConfig) -> Self {
        Self { toolchain }
    }
}

const CLASS_MODIFIERS: &[&str] = &["public", "final", "abstract", "static", "strictfp"];

/// Class to compile and launch.
///
/// javac insists that a public class lives in a file of the same name, so a
/// public class wins. Without one, the class declaring `main` is used, then
/// the first class declared, then `Main`.
pub fn detect_class_name(source: &str) -> String {
    let tokens: Vec<&str> = source
        .split(|c: char| c.is_whitespace() || matches!(c, '{' | '}' | '(' | ')' | ';' | '<'))
        .filter(|token| !token.is_empty())
        .collect();

    let mut first_public = None;
    let mut first_class = None;
    let mut main_owner = None;
    let mut current = None;

    for (i, token) in tokens.iter().enumerate() {
        match *token {
            "class" => {
                let Some(name) = tokens.get(i + 1).copied().filter(|n| is_java_identifier(n)) else {
                    continue;
                };
                let is_public = tokens[..i]
                    .iter()
                    .rev()
                    .take_while(|t| CLASS_MODIFIERS.contains(*t))
                    .any(|t| *t == "public");
                if is_public && first_public.is_none() {
                    first_public = Some(name);
                }
                first_class.get_or_insert(name);
                current = Some(name);
            }
            "main" if i > 0 && tokens[i - 1] == "void" && main_owner.is_none() => {
                main_owner = current;
            }
            _ => {}
        }
    }

    first_public
        .or(main_owner)
        .or(first_class)
        .unwrap_or(DEFAULT_CLASS)
        .to_string()
}

fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn class_name_in(workspace: &Workspace) -> String {
    workspace
        .source_file()
        .and_then(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_CLASS.to_string())
}

impl JudgeAdapter for JavaAdapter {
    fn language(&self) -> Language {
        Language::ManagedRuntime
    }

    fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }

    fn source_file_name(&self, source: &str) -> String {
        format!("{}.java", detect_class_name(source))
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>> {
        let compiler = self.toolchain.compiler.clone()?;
        let source = workspace.source_file()?;
        let mut argv = vec![compiler];
        argv.extend(self.toolchain.compiler_args.iter().cloned());
        argv.push("-d".to_string());
        argv.push(workspace.run_dir().to_string_lossy().to_string());
        argv.push(source.to_string_lossy().to_string());
        Some(argv)
    }

    fn run_command(&self, workspace: &Workspace, limits: &RunLimits) -> Vec<String> {
        let mut argv: Vec<String> = self.toolchain.runtime.iter().cloned().collect();
        argv.push(format!("-Xmx{}m", limits.memory_limit_mb));
        argv.extend(self.toolchain.runtime_args.iter().cloned());
        argv.push("-cp".to_string());
        argv.push(workspace.run_dir().to_string_lossy().to_string());
        argv.push(class_name_in(workspace));
        argv
    }

    fn memory_exhaustion_signatures(&self) -> &'static [&'static str] {
        &["java.lang.OutOfMemoryError", "java.lang.StackOverflowError"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::judge::JudgeConfig;
    use crate::safety::workspace::WorkspaceManager;

    #[test]
    fn test_detect_class_name() {
        assert_eq!(detect_class_name("public class Solution {\n}"), "Solution");
        assert_eq!(detect_class_name("public final class Fast{}"), "Fast");
        assert_eq!(detect_class_name("class Hidden {}"), "Hidden");
        assert_eq!(detect_class_name("public class ../../etc {"), "Main");
        assert_eq!(detect_class_name("import java.util.*;"), "Main");
    }

    #[test]
    fn test_package_private_class_with_main_is_launched() {
        let source = "import java.util.*;\n\
                      class Pair { int a, b; }\n\
                      class Solution {\n    public static void main(String[] args) {}\n}\n";
        assert_eq!(detect_class_name(source), "Solution");

        let with_public = "class Helper {}\npublic class Runner { public static void main(String[] a) {} }";
        assert_eq!(detect_class_name(with_public), "Runner");
    }

    #[test]
    fn test_run_command_passes_memory_ceiling() {
        let config = JudgeConfig::default();
        let adapter = JavaAdapter::new(ToolchainConfig::preset(Language::ManagedRuntime));
        let manager = WorkspaceManager::new(std::env::temp_dir().join("judgebox_java_adapter")).unwrap();
        let mut workspace = manager.create_workspace().unwrap();
        let source = "public class Solution { public static void main(String[] a) {} }";
        let file_name = adapter.source_file_name(source);
        assert_eq!(file_name, "Solution.java");
        workspace.create_source_file(&file_name, source.as_bytes()).unwrap();

        let limits = RunLimits::new(&config, Language::ManagedRuntime, 1000, 128);
        assert_eq!(limits.effective_time_limit_ms, 2000);

        let argv = adapter.run_command(&workspace, &limits);
        assert_eq!(argv[0], "java");
        assert_eq!(argv[1], "-Xmx128m");
        assert_eq!(argv.last().unwrap(), "Solution");

        let compile = adapter.compile_command(&workspace).unwrap();
        assert_eq!(compile[0], "javac");
        assert!(compile.last().unwrap().ends_with("/Solution.java"));
    }
}

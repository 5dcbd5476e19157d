//! Integration tests for the engine and grader against real toolchains
//!
//! Each test skips itself when the toolchain it needs is not installed.

use judgebox::config::judge::JudgeConfig;
use judgebox::exec::engine::ExecutionEngine;
use judgebox::grader::problem::{DirectoryRepository, ProblemRepository};
use judgebox::grader::session::{Grader, Submission, Viewer, ACCEPTED_MESSAGE};
use judgebox::{ExecutionStatus, Language, Verdict};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

fn has_binary(name: &str) -> bool {
    Command::new(name).arg("--version").output().is_ok()
}

fn engine() -> Arc<ExecutionEngine> {
    let config = JudgeConfig {
        workspace_root: std::env::temp_dir()
            .join(format!("judgebox_it_{}", uuid::Uuid::new_v4())),
        inter_test_pause_ms: 0,
        ..JudgeConfig::default()
    };
    Arc::new(ExecutionEngine::new(Arc::new(config)).unwrap())
}

/// `<root>/<id>/test/<n>` plus a checker at `<root>/<id>/code`
fn problem_dir(id: &str, inputs: &[&str], checker: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("judgebox_it_problems_{}", uuid::Uuid::new_v4()));
    let dir = root.join(id);
    fs::create_dir_all(dir.join("test")).unwrap();
    fs::write(dir.join("code"), checker).unwrap();
    for (i, input) in inputs.iter().enumerate() {
        fs::write(dir.join("test").join((i + 1).to_string()), input).unwrap();
    }
    root
}

#[test]
fn test_python_doubling_is_accepted() {
    if !has_binary("python3") {
        println!("python3 not installed, skipping");
        return;
    }

    let root = problem_dir("double", &["21\n"], "print('AC')");
    let repository = DirectoryRepository::new(&root, Language::Interpreted);
    let grader = Grader::new(engine());

    let submission = Submission {
        source: "n = int(input())\nprint(n * 2)\n".to_string(),
        language: Language::Interpreted,
        time_limit_ms: 2000,
        memory_limit_mb: 256,
    };
    let report = grader.grade_by_id(&repository, "double", &submission, Viewer::Contestant);

    assert_eq!(report.verdict, Verdict::Accepted);
    assert_eq!(report.output, ACCEPTED_MESSAGE);
    assert_eq!(report.tests_passed, 1);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn test_python_output_and_stdin_are_verbatim() {
    if !has_binary("python3") {
        println!("python3 not installed, skipping");
        return;
    }

    let result = engine().run(
        "import sys\ndata = sys.stdin.read()\nprint(repr(data))\n",
        Language::Interpreted,
        "a b\n\nc",
        2000,
        256,
    );
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(result.output, "'a b\\n\\nc'");
    assert!(!result.output.contains("[I]"));
    assert!(result.usage.is_some());
}

#[test]
fn test_python_infinite_loop_is_time_limit() {
    if !has_binary("python3") {
        println!("python3 not installed, skipping");
        return;
    }

    let root = problem_dir("loop", &["1\n"], "print('AC')");
    let repository = DirectoryRepository::new(&root, Language::Interpreted);
    let grader = Grader::new(engine());

    let submission = Submission {
        source: "while True:\n    pass\n".to_string(),
        language: Language::Interpreted,
        time_limit_ms: 1000,
        memory_limit_mb: 256,
    };
    let report = grader.grade_by_id(&repository, "loop", &submission, Viewer::Contestant);

    assert_eq!(report.verdict, Verdict::TimeLimitExceeded);
    assert!(report.time >= 1000);
    assert_eq!(report.failed_test, Some(0));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn test_python_traceback_hides_workspace_path() {
    if !has_binary("python3") {
        println!("python3 not installed, skipping");
        return;
    }

    let engine = engine();
    let result = engine.run("raise ValueError('nope')\n", Language::Interpreted, "", 2000, 256);
    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert!(result.output.contains("ValueError: nope"));
    assert!(!result
        .output
        .contains(&engine.config().workspace_root.to_string_lossy().to_string()));
}

#[test]
fn test_cpp_syntax_error_is_compilation_error() {
    if !has_binary("g++") {
        println!("g++ not installed, skipping");
        return;
    }

    let result = engine().run(
        "int main() { return 0 }\n",
        Language::NativeCompiled,
        "",
        1000,
        64,
    );
    assert_eq!(result.status, ExecutionStatus::CompilationError);
    assert_eq!(result.usage, None);
    assert!(result.output.contains("solution.cpp"));
}

#[test]
fn test_cpp_program_runs_after_compile() {
    if !has_binary("g++") {
        println!("g++ not installed, skipping");
        return;
    }

    let source = "#include <iostream>\nint main() { long long n; std::cin >> n; std::cout << n * 2 << std::endl; }\n";
    let result = engine().run(source, Language::NativeCompiled, "21\n", 2000, 256);
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(result.output, "42");
}

#[test]
fn test_unknown_problem_is_system_error() {
    let root = problem_dir("present", &["1"], "print('AC')");
    let repository = DirectoryRepository::new(&root, Language::Interpreted);
    assert!(repository.load("absent").is_err());

    let grader = Grader::new(engine());
    let submission = Submission {
        source: "print(1)".to_string(),
        language: Language::Interpreted,
        time_limit_ms: 1000,
        memory_limit_mb: 64,
    };
    let report = grader.grade_by_id(&repository, "absent", &submission, Viewer::Contestant);
    assert_eq!(report.verdict, Verdict::SystemError);
    assert_eq!(report.output, "Problem ID not found");

    let _ = fs::remove_dir_all(root);
}

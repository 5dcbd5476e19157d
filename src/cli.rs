use crate::config::judge::JudgeConfig;
use crate::config::types::Language;
use crate::exec::engine::ExecutionEngine;
use crate::exec::request::{self, RunRequest};
use crate::grader::pool::GradingPool;
use crate::grader::problem::{DirectoryRepository, ProblemRepository};
use crate::grader::session::{Grader, SessionReport, Submission, Viewer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to judgebox.json (defaults to ./judgebox.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program once and print the JSON report
    Run {
        /// Language (python, cpp, java)
        #[arg(long)]
        language: String,
        /// Source code as string
        #[arg(long, conflicts_with = "code_file")]
        code: Option<String>,
        /// Read source code from a file
        #[arg(long)]
        code_file: Option<PathBuf>,
        /// Input data to pass to stdin
        #[arg(long, conflicts_with = "stdin_file")]
        stdin: Option<String>,
        /// Read stdin data from a file
        #[arg(long)]
        stdin_file: Option<PathBuf>,
        /// Time limit in milliseconds
        #[arg(long)]
        time_ms: Option<u64>,
        /// Memory limit in MB
        #[arg(long)]
        mem_mb: Option<u64>,
    },
    /// Grade submissions against every test of a problem
    Grade {
        /// Directory holding one sub-directory per problem
        #[arg(long)]
        problems: PathBuf,
        /// Problem identifier
        #[arg(long)]
        problem: String,
        /// Language (python, cpp, java)
        #[arg(long)]
        language: String,
        /// Submission source file; repeat to grade several concurrently
        #[arg(long = "source", required = true)]
        sources: Vec<PathBuf>,
        /// Time limit in milliseconds (defaults to the problem's, then the config's)
        #[arg(long)]
        time_ms: Option<u64>,
        /// Memory limit in MB (defaults to the problem's, then the config's)
        #[arg(long)]
        mem_mb: Option<u64>,
        /// Show checker detail for every failing test
        #[arg(long)]
        privileged: bool,
    },
    /// Check that every configured compiler and runtime is installed
    CheckDeps {
        /// Show the version line of each tool
        #[arg(long)]
        verbose: bool,
    },
}

pub fn run() -> Result<()> {
    env_logger::init();

    if !cfg!(unix) {
        eprintln!("Error: judgebox requires a Unix-like system");
        std::process::exit(1);
    }

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => JudgeConfig::load_from_file(path)?,
        None => JudgeConfig::load_default()?,
    };
    let config = Arc::new(config);

    match cli.command {
        Commands::Run {
            language,
            code,
            code_file,
            stdin,
            stdin_file,
            time_ms,
            mem_mb,
        } => {
            let code = match code_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?,
                ),
                None => code,
            };
            let input = match stdin_file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => stdin.unwrap_or_default(),
            };

            let engine = ExecutionEngine::new(Arc::clone(&config))?;
            let report = request::handle(
                &engine,
                &RunRequest {
                    code,
                    language: Some(language),
                    input: Some(input),
                    time_limit_ms: time_ms,
                    memory_limit_mb: mem_mb,
                },
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Grade {
            problems,
            problem,
            language,
            sources,
            time_ms,
            mem_mb,
            privileged,
        } => {
            let language: Language = language.parse()?;
            let viewer = if privileged {
                Viewer::Privileged
            } else {
                Viewer::Contestant
            };

            let repository = DirectoryRepository::new(problems, config.checker.language);
            let problem = match repository.load(&problem) {
                Ok(problem) => Arc::new(problem),
                Err(e) => {
                    log::error!("Failed to load problem {}: {}", problem, e);
                    print_reports(&[SessionReport::problem_not_found()])?;
                    return Ok(());
                }
            };

            let mut submissions = Vec::with_capacity(sources.len());
            for path in &sources {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                submissions.push(Submission {
                    source,
                    language,
                    time_limit_ms: time_ms
                        .or(problem.time_limit_ms)
                        .unwrap_or(config.default_time_limit_ms),
                    memory_limit_mb: mem_mb
                        .or(problem.memory_limit_mb)
                        .unwrap_or(config.default_memory_limit_mb),
                });
            }

            let grader = Grader::new(Arc::new(ExecutionEngine::new(Arc::clone(&config))?));
            let pool = GradingPool::from_config(grader, &config)?;
            let receivers = submissions
                .into_iter()
                .map(|submission| pool.submit(Arc::clone(&problem), submission, viewer))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut reports = Vec::with_capacity(receivers.len());
            for receiver in receivers {
                reports.push(receiver.recv().context("grading worker exited")?);
            }
            print_reports(&reports)?;

            log::debug!(
                "metrics:\n{}",
                crate::observability::metrics::get_metrics().export_prometheus()
            );
        }
        Commands::CheckDeps { verbose } => check_language_dependencies(&config, verbose)?,
    }

    Ok(())
}

/// One report prints as an object, several as an array in submission order
fn print_reports(reports: &[SessionReport]) -> Result<()> {
    let json = match reports {
        [report] => serde_json::to_string_pretty(report)?,
        _ => serde_json::to_string_pretty(reports)?,
    };
    println!("{}", json);
    Ok(())
}

/// Check that the configured toolchain binaries are reachable
fn check_language_dependencies(config: &JudgeConfig, verbose: bool) -> Result<()> {
    use std::process::Command;

    println!("🔍 Checking language dependencies...");
    println!();

    let mut missing_languages = Vec::new();

    for language in Language::ALL {
        let toolchain = config.toolchain(language);
        let mut lang_ok = true;
        let mut versions = Vec::new();

        for binary in toolchain.required_binaries() {
            // java and javac only answer -version
            let version_arg = if binary.starts_with("java") {
                "-version"
            } else {
                "--version"
            };

            match Command::new(binary).arg(version_arg).output() {
                Ok(output) if output.status.success() => {
                    let version_info = if !output.stdout.is_empty() {
                        String::from_utf8_lossy(&output.stdout)
                    } else {
                        String::from_utf8_lossy(&output.stderr)
                    }
                    .lines()
                    .next()
                    .unwrap_or("")
                    .to_string();
                    versions.push(format!("  {} -> {}", binary, version_info.trim()));
                }
                Ok(_) => {
                    lang_ok = false;
                    versions.push(format!("  {} -> FAILED", binary));
                }
                Err(_) => {
                    lang_ok = false;
                    versions.push(format!("  {} -> NOT FOUND", binary));
                }
            }
        }

        if lang_ok {
            println!("✅ {} - OK", language);
        } else {
            println!("❌ {} - MISSING", language);
            missing_languages.push(language);
        }
        if verbose || !lang_ok {
            for version in versions {
                println!("{}", version);
            }
        }
    }

    println!();

    if missing_languages.is_empty() {
        println!("🎉 All language dependencies are installed!");
        return Ok(());
    }

    let names: Vec<String> = missing_languages.iter().map(|l| l.to_string()).collect();
    println!("❌ Missing language dependencies: {}", names.join(", "));
    println!();
    println!("Install manually:");
    for language in &missing_languages {
        match language {
            Language::Interpreted => println!("  • Python: sudo apt install python3"),
            Language::NativeCompiled => println!("  • C++: sudo apt install build-essential g++"),
            Language::ManagedRuntime => println!("  • Java: sudo apt install openjdk-17-jdk"),
        }
    }

    std::process::exit(1);
}

/// Process supervision for a single compile or run phase
///
/// The child is started from an explicit argument vector in its own process
/// group, with stdout and stderr sharing one pipe. The supervisor polls the
/// child until it exits, killing the whole group with SIGKILL on wall-clock
/// expiry, output overflow or a peak RSS above the memory ceiling. Each kill
/// reason is reported as a structured flag.
///
/// A descendant that moved to another session escapes the group kill. If it
/// still holds the output pipe once the collection timeout runs out, every
/// process with the pipe open is killed by inode.
use crate::config::types::{JudgeError, ResourceUsage, Result};
use crate::utils::output::{OutputCollector, OutputIntegrity, OutputLimits, OutputResult};
use nix::fcntl::OFlag;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{pipe2, Pid};
use std::fs::File;
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Everything needed to start one supervised process
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub argv: Vec<String>,
    pub workdir: PathBuf,
    pub environment: Vec<(String, String)>,
    pub stdin_data: Vec<u8>,
    pub wall_time_limit: Duration,
    /// Peak RSS ceiling in KB; `None` disables the watcher
    pub memory_ceiling_kb: Option<u64>,
    pub output_limit: usize,
}

/// Raw facts about a finished process, before any classification
#[derive(Debug, Clone)]
pub struct SupervisedRun {
    pub output: OutputResult,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub memory_exceeded: bool,
    pub output_overflow: bool,
    pub usage: ResourceUsage,
}

impl SupervisedRun {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
            && !self.timed_out
            && !self.memory_exceeded
            && !self.output_overflow
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillReason {
    WallTime,
    Memory,
    Output,
}

/// Start `spec.argv` and supervise it to completion.
///
/// Returns [`JudgeError::ToolchainNotFound`] when the executable itself cannot
/// be found, so callers can tell a missing compiler from a failing program.
pub fn supervise(spec: &LaunchSpec) -> Result<SupervisedRun> {
    let program = spec
        .argv
        .first()
        .ok_or_else(|| JudgeError::Process("Empty command provided".to_string()))?;

    // ENOENT from a missing workdir must not read as a missing toolchain.
    if !spec.workdir.is_dir() {
        return Err(JudgeError::Workspace(format!(
            "working directory {} does not exist",
            spec.workdir.display()
        )));
    }

    let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC)?;
    let write_end_err = write_end.try_clone()?;
    let read_end = File::from(read_end);
    let pipe_inode = read_end.metadata()?.ino();

    let mut command = Command::new(program);
    command
        .args(&spec.argv[1..])
        .current_dir(&spec.workdir)
        .env_clear()
        .env("PATH", search_path())
        .env("HOME", &spec.workdir)
        .env("LANG", "C.UTF-8")
        .envs(spec.environment.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::from(write_end))
        .stderr(Stdio::from(write_end_err))
        .process_group(0);

    let start = Instant::now();
    let spawned = command.spawn();
    // The command still owns the parent's copies of the write end; EOF on the
    // read side only arrives once they are closed.
    drop(command);

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(JudgeError::ToolchainNotFound(program.clone()));
        }
        Err(e) => {
            return Err(JudgeError::Process(format!(
                "Failed to start {}: {}",
                program, e
            )));
        }
    };

    let pid = Pid::from_raw(child.id() as i32);
    log::debug!("spawned {} as pid {}", program, pid);

    if let Some(mut stdin) = child.stdin.take() {
        let data = spec.stdin_data.clone();
        thread::spawn(move || {
            if let Err(e) = stdin.write_all(&data) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    log::debug!("stdin write failed: {}", e);
                }
            }
        });
    }

    let pending = OutputCollector::new(OutputLimits {
        combined_limit: spec.output_limit,
        ..OutputLimits::default()
    })
    .spawn(read_end);

    let mut kill_reason = None;
    let mut watched_peak_kb = 0u64;

    let (status, rusage) = loop {
        if let Some(reaped) = wait_for(pid, libc::WNOHANG)? {
            break reaped;
        }

        if start.elapsed() >= spec.wall_time_limit {
            kill_reason = Some(KillReason::WallTime);
        } else if pending.overflowed() {
            kill_reason = Some(KillReason::Output);
        } else if let Some(ceiling) = spec.memory_ceiling_kb {
            if let Some(peak) = read_peak_rss_kb(pid) {
                watched_peak_kb = watched_peak_kb.max(peak);
                if peak > ceiling {
                    kill_reason = Some(KillReason::Memory);
                }
            }
        }

        if let Some(reason) = kill_reason {
            log::debug!("killing pid {} ({:?})", pid, reason);
            kill_group(pid);
            match wait_for(pid, 0)? {
                Some(reaped) => break reaped,
                None => continue,
            }
        }

        thread::sleep(POLL_INTERVAL);
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    // Descendants that outlived the leader still hold the pipe open.
    kill_group(pid);
    let output = pending.finish();
    if output.integrity == OutputIntegrity::CollectionTimeout {
        let killed = kill_pipe_writers(Path::new("/proc"), pipe_inode);
        log::warn!(
            "output pipe of {} still open after exit; killed {} detached writers",
            program,
            killed
        );
    }

    let (exit_code, signal) = decode_status(status);
    let peak_memory_kb = (rusage.ru_maxrss.max(0) as u64).max(watched_peak_kb);

    Ok(SupervisedRun {
        output,
        exit_code,
        signal,
        timed_out: kill_reason == Some(KillReason::WallTime),
        memory_exceeded: kill_reason == Some(KillReason::Memory),
        output_overflow: kill_reason == Some(KillReason::Output),
        usage: ResourceUsage {
            elapsed_ms,
            peak_memory_kb,
        },
    })
}

fn search_path() -> String {
    std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string())
}

fn kill_group(pid: Pid) {
    match killpg(pid, Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => log::warn!("failed to kill process group {}: {}", pid, e),
    }
}

/// SIGKILL every process under `proc_root` holding pipe `inode` open
fn kill_pipe_writers(proc_root: &Path, inode: u64) -> usize {
    let target = format!("pipe:[{}]", inode);
    let own_pid = std::process::id();
    let mut killed = 0;

    let Ok(entries) = std::fs::read_dir(proc_root) else {
        return 0;
    };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
            continue;
        };
        if pid == own_pid {
            continue;
        }
        let Ok(fds) = std::fs::read_dir(entry.path().join("fd")) else {
            continue;
        };
        let holds_pipe = fds
            .flatten()
            .filter_map(|fd| std::fs::read_link(fd.path()).ok())
            .any(|link| link.as_os_str() == target.as_str());
        if holds_pipe {
            match nix::sys::signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) => killed += 1,
                Err(e) => log::debug!("failed to kill detached writer {}: {}", pid, e),
            }
        }
    }
    killed
}

/// `wait4` on one child; `Ok(None)` while it is still running under WNOHANG
fn wait_for(pid: Pid, options: libc::c_int) -> Result<Option<(libc::c_int, libc::rusage)>> {
    let mut status: libc::c_int = 0;
    // SAFETY: rusage is a plain C struct; all-zero is a valid value.
    let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };

    loop {
        // SAFETY: pointers refer to live locals for the duration of the call.
        let rc = unsafe { libc::wait4(pid.as_raw(), &mut status, options, &mut rusage) };
        if rc == pid.as_raw() {
            return Ok(Some((status, rusage)));
        }
        if rc == 0 {
            return Ok(None);
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            continue;
        }
        return Err(JudgeError::Process(format!("wait4({}) failed: {}", pid, err)));
    }
}

fn decode_status(status: libc::c_int) -> (Option<i32>, Option<i32>) {
    if libc::WIFEXITED(status) {
        (Some(libc::WEXITSTATUS(status)), None)
    } else if libc::WIFSIGNALED(status) {
        (None, Some(libc::WTERMSIG(status)))
    } else {
        (None, None)
    }
}

/// Peak resident set size (VmHWM) of a live process, in KB
fn read_peak_rss_kb(pid: Pid) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_vm_hwm(&status)
}

fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with("VmHWM:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(argv: &[&str]) -> LaunchSpec {
        LaunchSpec {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            workdir: std::env::temp_dir(),
            environment: Vec::new(),
            stdin_data: Vec::new(),
            wall_time_limit: Duration::from_secs(5),
            memory_ceiling_kb: None,
            output_limit: 1024 * 1024,
        }
    }

    #[test]
    fn test_parse_vm_hwm() {
        let status = "Name:\tcat\nVmPeak:\t  9000 kB\nVmHWM:\t    1234 kB\nVmRSS:\t 1000 kB\n";
        assert_eq!(parse_vm_hwm(status), Some(1234));
        assert_eq!(parse_vm_hwm("Name:\tcat\n"), None);
    }

    #[test]
    fn test_missing_program_is_toolchain_error() {
        let err = supervise(&spec(&["judgebox-definitely-missing-binary"])).unwrap_err();
        assert!(matches!(err, JudgeError::ToolchainNotFound(ref bin) if bin == "judgebox-definitely-missing-binary"));
    }

    #[test]
    fn test_empty_argv_rejected() {
        assert!(matches!(supervise(&spec(&[])), Err(JudgeError::Process(_))));
    }

    #[test]
    fn test_stdin_is_passed_verbatim_and_streams_are_merged() {
        let mut launch = spec(&["sh", "-c", "cat; echo err 1>&2"]);
        launch.stdin_data = b"21\n".to_vec();
        let run = supervise(&launch).unwrap();
        assert!(run.succeeded());
        assert_eq!(run.output.text(), "21\nerr\n");
    }

    #[test]
    fn test_wall_clock_kill_sets_timeout_flag() {
        let mut launch = spec(&["sleep", "5"]);
        launch.wall_time_limit = Duration::from_millis(200);
        let run = supervise(&launch).unwrap();
        assert!(run.timed_out);
        assert_eq!(run.signal, Some(libc::SIGKILL));
        assert!(run.usage.elapsed_ms >= 200);
    }

    #[test]
    fn test_output_overflow_kills_producer() {
        let mut launch = spec(&["sh", "-c", "yes"]);
        launch.output_limit = 4096;
        let run = supervise(&launch).unwrap();
        assert!(run.output_overflow);
        assert!(!run.timed_out);
        assert_eq!(run.output.data.len(), 4096);
    }

    #[test]
    fn test_detached_writer_is_flagged_and_killed() {
        let marker = std::env::temp_dir().join(format!("judgebox_detached_{}", uuid::Uuid::new_v4()));
        let script = format!(
            "echo hi; setsid sh -c 'sleep 4; touch {}' & exit 0",
            marker.display()
        );
        let started = Instant::now();
        let run = supervise(&spec(&["sh", "-c", &script])).unwrap();

        assert_eq!(run.exit_code, Some(0));
        assert_eq!(run.output.integrity, OutputIntegrity::CollectionTimeout);
        assert!(run.output.text().starts_with("hi"));
        assert!(started.elapsed() < Duration::from_secs(4));

        thread::sleep(Duration::from_secs(3));
        assert!(!marker.exists(), "detached writer outlived the run");
    }

    #[test]
    fn test_nonzero_exit_code_reported() {
        let run = supervise(&spec(&["sh", "-c", "exit 3"])).unwrap();
        assert_eq!(run.exit_code, Some(3));
        assert!(!run.succeeded());
    }
}

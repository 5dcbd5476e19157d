/// Workspace management for run-scoped artifacts
///
/// Every invocation gets its own directory named by a fresh UUID, so sources,
/// binaries and class files of concurrent runs never collide. The directory
/// is removed when the [`Workspace`] guard is dropped, on every exit path.
use crate::config::types::{JudgeError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Workspace for isolated run artifacts
#[derive(Debug)]
pub struct Workspace {
    /// Unique run ID
    run_id: String,
    /// Run-specific workspace directory
    run_dir: PathBuf,
    /// Source file path (if any)
    source_file: Option<PathBuf>,
    cleaned: bool,
}

impl Workspace {
    /// Create new workspace for a run
    pub fn new(base_dir: &Path) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let run_dir = base_dir.join(&run_id);

        fs::create_dir_all(&run_dir).map_err(|e| {
            JudgeError::Workspace(format!(
                "Failed to create workspace directory {}: {}",
                run_dir.display(),
                e
            ))
        })?;

        log::debug!("Created workspace {}", run_dir.display());

        Ok(Self {
            run_id,
            run_dir,
            source_file: None,
            cleaned: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Write the submission source under `file_name` inside the workspace
    pub fn create_source_file(&mut self, file_name: &str, content: &[u8]) -> Result<PathBuf> {
        let source_path = self.run_dir.join(file_name);

        fs::write(&source_path, content).map_err(|e| {
            JudgeError::Workspace(format!(
                "Failed to write source file {}: {}",
                source_path.display(),
                e
            ))
        })?;

        self.source_file = Some(source_path.clone());
        Ok(source_path)
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Replace every occurrence of the workspace path in user-visible text
    pub fn scrub(&self, text: &str) -> String {
        let dir = self.run_dir.to_string_lossy();
        text.replace(&format!("{}/", dir), "").replace(dir.as_ref(), ".")
    }

    /// Cleanup workspace (idempotent)
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned {
            return Ok(());
        }
        self.cleaned = true;

        if self.run_dir.exists() {
            fs::remove_dir_all(&self.run_dir).map_err(|e| {
                JudgeError::Workspace(format!(
                    "Failed to remove run directory {}: {}",
                    self.run_dir.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!("{}", e);
        }
    }
}

/// Workspace manager owning the common base directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    /// Create new workspace manager
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir).map_err(|e| {
            JudgeError::Workspace(format!(
                "Failed to create workspace base directory {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        Ok(Self { base_dir })
    }

    /// Create new workspace for a run
    pub fn create_workspace(&self) -> Result<Workspace> {
        Workspace::new(&self.base_dir)
    }

    /// Remove workspaces left behind by crashed runs (older than `max_age`)
    pub fn cleanup_old_workspaces(&self, max_age: Duration) -> Result<usize> {
        let mut cleaned = 0;
        let now = SystemTime::now();

        if !self.base_dir.exists() {
            return Ok(0);
        }

        let entries = fs::read_dir(&self.base_dir).map_err(|e| {
            JudgeError::Workspace(format!(
                "Failed to read workspace directory {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("Failed to get modified time for {}: {}", path.display(), e);
                    continue;
                }
            };

            let age = match now.duration_since(modified) {
                Ok(d) => d,
                Err(_) => continue, // Future timestamp, skip
            };

            if age > max_age {
                log::info!("Cleaning up stale workspace: {}", path.display());
                if let Err(e) = fs::remove_dir_all(&path) {
                    log::warn!("Failed to remove stale workspace {}: {}", path.display(), e);
                } else {
                    cleaned += 1;
                }
            }
        }

        Ok(cleaned)
    }
}

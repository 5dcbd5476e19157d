/// Problems and where they come from
///
/// A [`Problem`] is the ordered list of test inputs plus the checker program
/// that decides correctness. Test order is an explicit, stable sort by
/// numeric test index, never directory enumeration order.
use crate::config::types::{JudgeError, Language, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One test input. `index` is the 0-based position in grading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub index: usize,
    /// Identifier handed to the checker
    pub name: String,
    pub input: String,
}

/// Program deciding whether an output is correct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerProgram {
    pub language: Language,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub id: String,
    pub tests: Vec<TestCase>,
    pub checker: CheckerProgram,
    /// Suggested limits from `problem.json`. Grading always runs under the
    /// submission's limits; front ends use these to fill in missing ones.
    pub time_limit_ms: Option<u64>,
    pub memory_limit_mb: Option<u64>,
}

impl Problem {
    /// Build a problem, assigning indices in the order given
    pub fn new(id: impl Into<String>, tests: Vec<(String, String)>, checker: CheckerProgram) -> Self {
        let tests = tests
            .into_iter()
            .enumerate()
            .map(|(index, (name, input))| TestCase { index, name, input })
            .collect();
        Self {
            id: id.into(),
            tests,
            checker,
            time_limit_ms: None,
            memory_limit_mb: None,
        }
    }
}

/// Resolves a problem identifier to its tests and checker
pub trait ProblemRepository: Send + Sync {
    fn load(&self, problem_id: &str) -> Result<Problem>;
}

/// Optional `problem.json` beside the tests
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct ProblemManifest {
    time_limit_ms: Option<u64>,
    memory_limit_mb: Option<u64>,
    checker_language: Option<Language>,
}

/// Problems laid out on disk:
///
/// ```text
/// <root>/<id>/test/<n>      test inputs, graded in ascending n
/// <root>/<id>/code          checker source
/// <root>/<id>/problem.json  optional limits and checker language
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: PathBuf,
    checker_language: Language,
}

impl DirectoryRepository {
    pub fn new(root: impl Into<PathBuf>, checker_language: Language) -> Self {
        Self {
            root: root.into(),
            checker_language,
        }
    }

    fn problem_dir(&self, problem_id: &str) -> Result<PathBuf> {
        let valid = !problem_id.is_empty()
            && problem_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(JudgeError::Problem(format!(
                "invalid problem id: {:?}",
                problem_id
            )));
        }
        Ok(self.root.join(problem_id))
    }

    fn read_manifest(dir: &Path) -> Result<ProblemManifest> {
        let path = dir.join("problem.json");
        if !path.exists() {
            return Ok(ProblemManifest::default());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            JudgeError::Problem(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn read_tests(dir: &Path) -> Result<Vec<(String, String)>> {
        let test_dir = dir.join("test");
        let entries = fs::read_dir(&test_dir).map_err(|e| {
            JudgeError::Problem(format!("Failed to read {}: {}", test_dir.display(), e))
        })?;

        let mut tests = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => continue,
            };
            let input = fs::read_to_string(&path)?;
            tests.push((name, input));
        }

        tests.sort_by(|(a, _), (b, _)| test_order_key(a).cmp(&test_order_key(b)));
        Ok(tests)
    }
}

/// Numeric names first in numeric order, then the rest by name
fn test_order_key(name: &str) -> (u8, u64, &str) {
    match name.parse::<u64>() {
        Ok(n) => (0, n, name),
        Err(_) => (1, 0, name),
    }
}

impl ProblemRepository for DirectoryRepository {
    fn load(&self, problem_id: &str) -> Result<Problem> {
        let dir = self.problem_dir(problem_id)?;
        if !dir.is_dir() {
            return Err(JudgeError::Problem("Problem ID not found".to_string()));
        }

        let checker_source = fs::read_to_string(dir.join("code")).map_err(|e| {
            JudgeError::Problem(format!("Failed to read checker of {}: {}", problem_id, e))
        })?;
        let manifest = Self::read_manifest(&dir)?;
        let tests = Self::read_tests(&dir)?;

        log::debug!("Loaded problem {} with {} tests", problem_id, tests.len());

        let mut problem = Problem::new(
            problem_id,
            tests,
            CheckerProgram {
                language: manifest.checker_language.unwrap_or(self.checker_language),
                source: checker_source,
            },
        );
        problem.time_limit_ms = manifest.time_limit_ms;
        problem.memory_limit_mb = manifest.memory_limit_mb;
        Ok(problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(tests: &[(&str, &str)]) -> (PathBuf, DirectoryRepository) {
        let root = std::env::temp_dir().join(format!("judgebox_problems_{}", uuid::Uuid::new_v4()));
        let dir = root.join("sum");
        fs::create_dir_all(dir.join("test")).unwrap();
        fs::write(dir.join("code"), "print('AC')").unwrap();
        for (name, input) in tests {
            fs::write(dir.join("test").join(name), input).unwrap();
        }
        (root.clone(), DirectoryRepository::new(root, Language::Interpreted))
    }

    #[test]
    fn test_tests_sorted_numerically() {
        let (root, repo) = fixture(&[("10", "c"), ("2", "b"), ("1", "a")]);
        let problem = repo.load("sum").unwrap();

        let names: Vec<&str> = problem.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2", "10"]);
        let indices: Vec<usize> = problem.tests.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(problem.tests[2].input, "c");
        assert_eq!(problem.checker.language, Language::Interpreted);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_manifest_supplies_limits() {
        let (root, repo) = fixture(&[("1", "x")]);
        fs::write(
            root.join("sum").join("problem.json"),
            r#"{"time_limit_ms": 500, "checker_language": "cpp"}"#,
        )
        .unwrap();

        let problem = repo.load("sum").unwrap();
        assert_eq!(problem.time_limit_ms, Some(500));
        assert_eq!(problem.memory_limit_mb, None);
        assert_eq!(problem.checker.language, Language::NativeCompiled);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_unknown_problem() {
        let (root, repo) = fixture(&[]);
        let err = repo.load("missing").unwrap_err();
        assert!(matches!(err, JudgeError::Problem(ref msg) if msg == "Problem ID not found"));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_path_traversal_rejected() {
        let (root, repo) = fixture(&[]);
        assert!(matches!(repo.load("../sum"), Err(JudgeError::Problem(_))));
        let _ = fs::remove_dir_all(root);
    }
}

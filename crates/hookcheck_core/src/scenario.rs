//! Declarative scenario records loaded from TOML.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::expectation::Expectation;
use crate::fixture::is_contained;

/// A file to write, stage and commit, plus the commit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitRequest {
    /// Path of the file relative to the fixture root.
    pub file: String,
    /// File body. Defaults to the file name followed by a newline.
    #[serde(default)]
    pub content: Option<String>,
    /// Commit message; may span several lines.
    pub message: String,
}

impl CommitRequest {
    /// Creates a request with default file content.
    #[must_use]
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            content: None,
            message: message.into(),
        }
    }

    /// Sets explicit file content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// The bytes written to disk before staging.
    #[must_use]
    pub fn contents(&self) -> Cow<'_, str> {
        match &self.content {
            Some(content) => Cow::Borrowed(content),
            None => Cow::Owned(format!("{}\n", self.file)),
        }
    }
}

/// One scenario: which hook to install, what to commit, what to expect.
///
/// ```toml
/// name = "Successful commit"
/// hook = "pre-commit"
///
/// [commit]
/// file = "successful submission"
/// message = "[Topic] Message subject."
///
/// [[expect]]
/// exit_status = 0
/// [[expect]]
/// branch = "main"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Human-readable label used in reports.
    pub name: String,
    /// Registry name of the hook to install.
    pub hook: String,
    /// The commit to attempt.
    pub commit: CommitRequest,
    /// Post-conditions, evaluated in order; all are evaluated even if some fail.
    #[serde(default, rename = "expect")]
    pub expectations: Vec<Expectation>,
    /// Per-command deadline in milliseconds, overriding the configured one.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Scenario {
    /// Loads and validates a scenario file.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let scenario: Self = toml::from_str(&content).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        scenario.validate()?;
        Ok(scenario)
    }

    /// Parses and validates a scenario from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(content).map_err(|source| ScenarioError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;

        scenario.validate()?;
        Ok(scenario)
    }

    /// Checks every path the scenario touches stays inside the fixture.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let paths = std::iter::once(self.commit.file.as_str()).chain(self.expectations.iter().filter_map(Expectation::path));

        for path in paths {
            if !is_contained(Path::new(path)) {
                return Err(ScenarioError::InvalidPath {
                    scenario: self.name.clone(),
                    path: path.to_string(),
                });
            }
        }

        Ok(())
    }

    /// The scenario's own deadline, if it declares one.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Relative paths whose presence the expectations ask about.
    #[must_use]
    pub fn probed_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.expectations.iter().filter_map(Expectation::path).collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

/// Errors raised while loading a scenario file.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The file could not be read.
    #[error("failed to read scenario '{path}': {source}")]
    Read {
        /// Path to the scenario file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file was not a valid scenario.
    #[error("failed to parse scenario '{path}': {source}")]
    Parse {
        /// Path to the scenario file.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A path in the scenario would escape the fixture.
    #[error("scenario '{scenario}' references '{path}', which is outside the fixture")]
    InvalidPath {
        /// Scenario name.
        scenario: String,
        /// The offending path.
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    const SUCCESSFUL_COMMIT: &str = r#"
name = "Successful commit"
hook = "pre-commit"

[commit]
file = "successful submission"
message = """
[Topic] Message subject.
"""

[[expect]]
exit_status = 0

[[expect]]
branch = "main"

[[expect]]
file_exists = "successful submission"

[[expect]]
clean = true
"#;

    #[test]
    fn parses_canonical_scenario() {
        let scenario = Scenario::from_toml(SUCCESSFUL_COMMIT).unwrap();

        assert_eq!(scenario.name, "Successful commit");
        assert_eq!(scenario.hook, "pre-commit");
        assert_eq!(scenario.commit.file, "successful submission");
        assert_eq!(scenario.commit.message, "[Topic] Message subject.\n");
        assert_eq!(
            scenario.expectations,
            vec![
                Expectation::ExitStatus(0),
                Expectation::Branch("main".into()),
                Expectation::FileExists("successful submission".into()),
                Expectation::Clean(true),
            ]
        );
        assert_eq!(scenario.timeout(), None);
    }

    #[test]
    fn parses_extended_expectations_and_timeout() {
        let scenario = Scenario::from_toml(
            r#"
name = "Rejected"
hook = "reject"
timeout_ms = 1500

[commit]
file = "a.txt"
content = "payload"
message = "msg"

[[expect]]
exit_status_not = 0
[[expect]]
commit_count = 0
[[expect]]
stderr_contains = "rejected"
[[expect]]
file_absent = "b.txt"
"#,
        )
        .unwrap();

        assert_eq!(scenario.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(scenario.commit.contents(), "payload");
        assert_eq!(scenario.expectations.len(), 4);
        assert_eq!(scenario.expectations[1], Expectation::CommitCount(0));
    }

    #[test]
    fn default_content_is_file_name() {
        let request = CommitRequest::new("notes", "msg");
        assert_eq!(request.contents(), "notes\n");
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Scenario::from_toml(
            r#"
name = "x"
hook = "pre-commit"
unexpected = true
[commit]
file = "a"
message = "m"
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ScenarioError::Parse { .. }));
    }

    #[test]
    fn rejects_unknown_expectation_kind() {
        let err = Scenario::from_toml(
            r#"
name = "x"
hook = "pre-commit"
[commit]
file = "a"
message = "m"
[[expect]]
tag_exists = "v1"
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ScenarioError::Parse { .. }));
    }

    #[test]
    fn rejects_escaping_commit_path() {
        let err = Scenario::from_toml(
            r#"
name = "escape"
hook = "pre-commit"
[commit]
file = "../outside"
message = "m"
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ScenarioError::InvalidPath { .. }));
    }

    #[test]
    fn rejects_escaping_expectation_path() {
        let err = Scenario::from_toml(
            r#"
name = "escape"
hook = "pre-commit"
[commit]
file = "a"
message = "m"
[[expect]]
file_exists = "/etc/passwd"
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ScenarioError::InvalidPath { .. }));
    }

    #[test]
    fn probed_paths_are_deduplicated() {
        let mut scenario = Scenario::from_toml(SUCCESSFUL_COMMIT).unwrap();
        scenario
            .expectations
            .push(Expectation::FileAbsent("successful submission".into()));
        scenario.expectations.push(Expectation::FileAbsent("other".into()));

        assert_eq!(scenario.probed_paths(), vec!["other", "successful submission"]);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Scenario::load(Path::new("/nonexistent/scenario.toml")).unwrap_err();
        assert!(matches!(err, ScenarioError::Read { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SUCCESSFUL_COMMIT.as_bytes()).unwrap();

        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.hook, "pre-commit");
    }
}

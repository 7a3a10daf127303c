//! Declarative post-conditions and their evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::inspect::RepositoryObservation;
use crate::runner::ExecutionResult;

/// A single assertion a scenario makes about the commit and the repository.
///
/// In TOML each expectation is a one-key table, e.g. `exit_status = 0` or
/// `file_exists = "README"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// The commit exited with this status.
    ExitStatus(i32),
    /// The commit exited with any status other than this one.
    ExitStatusNot(i32),
    /// `HEAD` is on this branch.
    Branch(String),
    /// This path exists on disk.
    FileExists(String),
    /// This path does not exist on disk.
    FileAbsent(String),
    /// `true`: nothing staged, modified or untracked. `false`: something is.
    Clean(bool),
    /// Exactly this many commits are reachable from `HEAD`.
    CommitCount(usize),
    /// Captured standard output contains this text.
    StdoutContains(String),
    /// Captured standard error contains this text.
    StderrContains(String),
}

impl Expectation {
    /// The relative path this expectation probes, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::FileExists(path) | Self::FileAbsent(path) => Some(path),
            _ => None,
        }
    }

    /// Compares the expectation against the most recent result and observation.
    pub fn evaluate(
        &self,
        result: &ExecutionResult,
        observation: &RepositoryObservation,
    ) -> Result<(), ExpectationMismatch> {
        let (holds, expected, actual) = match self {
            Self::ExitStatus(status) => (
                result.status == *status,
                status.to_string(),
                result.status.to_string(),
            ),
            Self::ExitStatusNot(status) => (
                result.status != *status,
                format!("not {status}"),
                result.status.to_string(),
            ),
            Self::Branch(name) => {
                let actual = observation.branch.as_deref().unwrap_or("(detached HEAD)");
                (observation.branch.as_deref() == Some(name), name.clone(), actual.to_string())
            }
            Self::FileExists(path) => {
                let present = observation.file_exists(path).unwrap_or(false);
                (present, "present".into(), presence(present))
            }
            Self::FileAbsent(path) => {
                let present = observation.file_exists(path).unwrap_or(false);
                (!present, "absent".into(), presence(present))
            }
            Self::Clean(clean) => (
                observation.is_clean() == *clean,
                cleanliness(*clean),
                describe_tree(observation),
            ),
            Self::CommitCount(count) => (
                observation.commit_count == *count,
                count.to_string(),
                observation.commit_count.to_string(),
            ),
            Self::StdoutContains(text) => (result.stdout.contains(text.as_str()), text.clone(), result.stdout.clone()),
            Self::StderrContains(text) => (result.stderr.contains(text.as_str()), text.clone(), result.stderr.clone()),
        };

        if holds {
            return Ok(());
        }

        Err(ExpectationMismatch {
            expectation: self.clone(),
            expected,
            actual,
        })
    }
}

fn presence(present: bool) -> String {
    if present { "present" } else { "absent" }.to_string()
}

fn cleanliness(clean: bool) -> String {
    if clean { "clean" } else { "dirty" }.to_string()
}

fn describe_tree(observation: &RepositoryObservation) -> String {
    if observation.is_clean() {
        return cleanliness(true);
    }

    let paths: Vec<String> = observation
        .entries
        .iter()
        .map(|entry| format!("{} {}", entry.code, entry.path))
        .collect();
    format!("dirty ({})", paths.join(", "))
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitStatus(status) => write!(f, "exit status == {status}"),
            Self::ExitStatusNot(status) => write!(f, "exit status != {status}"),
            Self::Branch(name) => write!(f, "current branch == {name}"),
            Self::FileExists(path) => write!(f, "file '{path}' exists"),
            Self::FileAbsent(path) => write!(f, "file '{path}' is absent"),
            Self::Clean(true) => f.write_str("working tree clean"),
            Self::Clean(false) => f.write_str("working tree dirty"),
            Self::CommitCount(count) => write!(f, "commit count == {count}"),
            Self::StdoutContains(text) => write!(f, "stdout contains '{text}'"),
            Self::StderrContains(text) => write!(f, "stderr contains '{text}'"),
        }
    }
}

/// An expectation that did not hold, with both sides rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectationMismatch {
    /// The expectation that failed.
    pub expectation: Expectation,
    /// What the scenario declared.
    pub expected: String,
    /// What was observed.
    pub actual: String,
}

impl fmt::Display for ExpectationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.expectation, self.expected, self.actual
        )
    }
}

/// Evaluates every expectation, collecting all mismatches rather than
/// stopping at the first.
#[must_use]
pub fn evaluate_all(
    expectations: &[Expectation],
    result: &ExecutionResult,
    observation: &RepositoryObservation,
) -> Vec<ExpectationMismatch> {
    expectations
        .iter()
        .filter_map(|expectation| expectation.evaluate(result, observation).err())
        .collect()
}

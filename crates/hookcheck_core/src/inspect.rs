//! Read-only queries against a fixture's git state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::fixture::Fixture;
use crate::runner::{CommandRunner, RunError, RunOptions};

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Two-character `XY` status code (e.g. `"A "`, `"??"`).
    pub code: String,
    /// Path relative to the repository root.
    pub path: String,
}

impl StatusEntry {
    /// Returns `true` for untracked paths.
    #[must_use]
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }

    /// Returns `true` when the index differs from `HEAD` for this path.
    #[must_use]
    pub fn is_staged(&self) -> bool {
        !self.is_untracked() && !self.code.starts_with(' ')
    }
}

/// Snapshot of repository state taken after the triggering command returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryObservation {
    /// Checked-out branch, or `None` when `HEAD` is detached.
    pub branch: Option<String>,
    /// Porcelain status entries; empty means clean.
    pub entries: Vec<StatusEntry>,
    /// Commits reachable from `HEAD`.
    pub commit_count: usize,
    /// Presence on disk of each probed path.
    pub files: BTreeMap<String, bool>,
}

impl RepositoryObservation {
    /// Returns `true` when there are no staged, unstaged or untracked changes.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    /// Presence of a probed path, or `None` if it was not probed.
    #[must_use]
    pub fn file_exists(&self, path: &str) -> Option<bool> {
        self.files.get(path).copied()
    }
}

/// Queries branch, cleanliness, file presence and history of a fixture.
///
/// Nothing is cached: every call reads the repository afresh.
#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    runner: &'a CommandRunner,
    options: &'a RunOptions,
}

impl<'a> Inspector<'a> {
    /// Creates an inspector that shells out through `runner` with `options`.
    #[must_use]
    pub const fn new(runner: &'a CommandRunner, options: &'a RunOptions) -> Self {
        Self { runner, options }
    }

    /// Name of the checked-out branch.
    pub fn current_branch(&self, fixture: &Fixture) -> Result<String, InspectionError> {
        let repo = open(fixture.path())?;

        let head = repo.head_name().map_err(|err| InspectionError::Repository {
            path: fixture.path().to_path_buf(),
            detail: err.to_string(),
        })?;

        match head {
            Some(name) => Ok(name.shorten().to_string()),
            None => Err(InspectionError::DetachedHead {
                path: fixture.path().to_path_buf(),
            }),
        }
    }

    /// Number of commits reachable from `HEAD`; zero on an unborn branch.
    pub fn commit_count(&self, fixture: &Fixture) -> Result<usize, InspectionError> {
        let repo = open(fixture.path())?;
        let to_error = |detail: String| InspectionError::Repository {
            path: fixture.path().to_path_buf(),
            detail,
        };

        let head = repo.head().map_err(|err| to_error(err.to_string()))?;
        let Some(tip) = head.id() else {
            return Ok(0);
        };

        let walk = repo
            .rev_walk([tip.detach()])
            .all()
            .map_err(|err| to_error(err.to_string()))?;

        let mut count = 0;
        for info in walk {
            info.map_err(|err| to_error(err.to_string()))?;
            count += 1;
        }

        Ok(count)
    }

    /// Parsed `git status --porcelain -z --untracked-files=all`.
    pub fn status_entries(&self, fixture: &Fixture) -> Result<Vec<StatusEntry>, InspectionError> {
        let result = self.runner.git(
            fixture,
            &["status", "--porcelain", "-z", "--untracked-files=all"],
            self.options,
        )?;

        if !result.success() {
            return Err(InspectionError::Status {
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            });
        }

        Ok(parse_porcelain(&result.stdout))
    }

    /// `true` iff nothing is staged, modified or untracked.
    pub fn is_clean(&self, fixture: &Fixture) -> Result<bool, InspectionError> {
        Ok(self.status_entries(fixture)?.is_empty())
    }

    /// Whether `relative` exists on disk under the fixture root, tracked or not.
    #[must_use]
    pub fn file_exists(&self, fixture: &Fixture, relative: &str) -> bool {
        fixture
            .resolve(Path::new(relative))
            .is_some_and(|path| path.exists())
    }

    /// Takes a full snapshot, probing the presence of `paths`.
    ///
    /// A detached `HEAD` is recorded as `branch: None` rather than failing,
    /// so a branch expectation can report it as a mismatch.
    pub fn observe(&self, fixture: &Fixture, paths: &[&str]) -> Result<RepositoryObservation, InspectionError> {
        let branch = match self.current_branch(fixture) {
            Ok(branch) => Some(branch),
            Err(InspectionError::DetachedHead { .. }) => None,
            Err(err) => return Err(err),
        };

        let files = paths
            .iter()
            .map(|path| ((*path).to_string(), self.file_exists(fixture, path)))
            .collect();

        Ok(RepositoryObservation {
            branch,
            entries: self.status_entries(fixture)?,
            commit_count: self.commit_count(fixture)?,
            files,
        })
    }
}

fn open(path: &Path) -> Result<gix::Repository, InspectionError> {
    gix::open(path).map_err(|err| InspectionError::Repository {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })
}

/// Parses NUL-separated porcelain v1 output. Rename and copy records carry
/// their source path as an extra field, which is skipped.
fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut records = output.split('\0').filter(|record| !record.is_empty());

    while let Some(record) = records.next() {
        let Some((code, path)) = record.split_at_checked(2) else {
            continue;
        };

        if code.contains('R') || code.contains('C') {
            records.next();
        }

        entries.push(StatusEntry {
            code: code.to_string(),
            path: path.strip_prefix(' ').unwrap_or(path).to_string(),
        });
    }

    entries
}

/// Errors raised while reading repository state.
#[derive(Debug, thiserror::Error)]
pub enum InspectionError {
    /// The repository could not be opened or its references read.
    #[error("cannot read repository '{path}': {detail}")]
    Repository {
        /// Fixture root.
        path: PathBuf,
        /// Raw error text from the git library.
        detail: String,
    },

    /// `HEAD` does not point at a branch.
    #[error("HEAD is detached in '{path}'")]
    DetachedHead {
        /// Fixture root.
        path: PathBuf,
    },

    /// `git status` exited non-zero.
    #[error("`git status` failed with status {status}: {stderr}")]
    Status {
        /// Exit status of `git status`.
        status: i32,
        /// Raw standard error.
        stderr: String,
    },

    /// `git status` could not be run.
    #[error(transparent)]
    Run(#[from] RunError),
}

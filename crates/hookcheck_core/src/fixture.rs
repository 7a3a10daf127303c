//! Disposable git repositories, one per scenario.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;
#[cfg(feature = "tracing")]
use tracing::debug;

use crate::runner::{CommandRunner, RunError, RunOptions};

/// Prefix for every fixture directory created under the system temp dir.
pub const FIXTURE_PREFIX: &str = "hookcheck-";
/// Branch checked out in a fresh fixture unless configured otherwise.
pub const DEFAULT_BRANCH: &str = "main";

static NEXT_FIXTURE: AtomicU64 = AtomicU64::new(0);

/// Lifecycle of a [`Fixture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// Directory allocated, git setup not yet complete.
    Uninitialized,
    /// Ready for hooks and commands.
    Initialized,
    /// Directory removed.
    TornDown,
}

/// Settings applied when a fixture repository is initialised.
#[derive(Debug, Clone)]
pub struct FixtureOptions {
    /// Branch `HEAD` points at before the first commit.
    pub default_branch: String,
    /// Parent directory for fixtures. Uses the system temp dir when `None`.
    pub parent_dir: Option<PathBuf>,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            default_branch: DEFAULT_BRANCH.to_string(),
            parent_dir: None,
        }
    }
}

/// An isolated git working directory owned by exactly one scenario.
///
/// The directory is removed by [`Fixture::destroy`] or, failing that, when
/// the fixture is dropped. Paths are unique per process (atomic counter) and
/// across processes (`tempfile` exclusive creation with a random suffix).
#[derive(Debug)]
pub struct Fixture {
    name: String,
    root: PathBuf,
    dir: Option<TempDir>,
    state: FixtureState,
}

impl Fixture {
    /// Allocates a fresh directory and initialises it as a git repository.
    ///
    /// `HEAD` is pointed at `options.default_branch`, the runner's identity is
    /// written to the local config, commit signing is disabled and
    /// `core.hooksPath` is pinned to the fixture's own hooks directory so a
    /// global hooks path cannot shadow installed hooks.
    pub fn create(runner: &CommandRunner, options: &FixtureOptions) -> Result<Self, FixtureError> {
        let mut fixture = Self::allocate(options)?;

        #[cfg(feature = "tracing")]
        debug!(fixture = %fixture.name, path = %fixture.root.display(), "allocated fixture");

        fixture.initialise(runner, options)?;
        fixture.state = FixtureState::Initialized;

        Ok(fixture)
    }

    fn allocate(options: &FixtureOptions) -> Result<Self, FixtureError> {
        let serial = NEXT_FIXTURE.fetch_add(1, Ordering::Relaxed);
        let name = format!("fixture-{}-{serial}", std::process::id());

        let suffix = format!("-{serial}");
        let mut builder = tempfile::Builder::new();
        builder.prefix(FIXTURE_PREFIX).suffix(&suffix);

        let dir = match &options.parent_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|source| FixtureError::Allocate { source })?;

        Ok(Self {
            name,
            root: dir.path().to_path_buf(),
            dir: Some(dir),
            state: FixtureState::Uninitialized,
        })
    }

    fn initialise(&self, runner: &CommandRunner, options: &FixtureOptions) -> Result<(), FixtureError> {
        let head_ref = format!("refs/heads/{}", options.default_branch);
        let hooks_dir = self.hooks_dir().to_string_lossy().into_owned();
        let identity = runner.identity();

        self.setup_step(runner, &["init", "--quiet"])?;
        self.setup_step(runner, &["symbolic-ref", "HEAD", &head_ref])?;
        self.setup_step(runner, &["config", "user.name", &identity.name])?;
        self.setup_step(runner, &["config", "user.email", &identity.email])?;
        self.setup_step(runner, &["config", "commit.gpgsign", "false"])?;
        self.setup_step(runner, &["config", "core.hooksPath", &hooks_dir])?;

        Ok(())
    }

    fn setup_step(&self, runner: &CommandRunner, args: &[&str]) -> Result<(), FixtureError> {
        let result = runner
            .git_in(&self.root, args, &RunOptions::default())
            .map_err(|source| FixtureError::Run {
                fixture: self.name.clone(),
                source,
            })?;

        if result.success() {
            return Ok(());
        }

        Err(FixtureError::GitSetup {
            fixture: self.name.clone(),
            step: args.join(" "),
            status: result.status,
            stderr: result.stderr.trim().to_string(),
        })
    }

    /// Root of the working directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Identity of this fixture, unique within the process.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> FixtureState {
        self.state
    }

    /// Directory git reads hooks from for this fixture.
    #[must_use]
    pub fn hooks_dir(&self) -> PathBuf {
        self.root.join(".git").join("hooks")
    }

    /// Resolves a path relative to the fixture root, refusing anything that
    /// could land outside it.
    #[must_use]
    pub fn resolve(&self, relative: &Path) -> Option<PathBuf> {
        is_contained(relative).then(|| self.root.join(relative))
    }

    /// Removes the fixture directory. Calling this again is a no-op.
    pub fn destroy(&mut self) -> Result<(), FixtureError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        self.state = FixtureState::TornDown;

        #[cfg(feature = "tracing")]
        debug!(fixture = %self.name, "removing fixture");

        dir.close().map_err(|source| FixtureError::Teardown {
            path: self.root.clone(),
            source,
        })
    }
}

/// Returns `true` when `relative` is a non-empty relative path that stays
/// inside its base directory and does not touch the `.git` directory.
#[must_use]
pub fn is_contained(relative: &Path) -> bool {
    let mut seen_normal = false;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                if !seen_normal && part == ".git" {
                    return false;
                }
                seen_normal = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }

    seen_normal
}

/// Errors raised while creating or tearing down a fixture.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// The temporary directory could not be created.
    #[error("failed to allocate fixture directory: {source}")]
    Allocate {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Git could not be started during setup.
    #[error("failed to run git while initialising '{fixture}': {source}")]
    Run {
        /// Fixture being initialised.
        fixture: String,
        /// The runner error.
        #[source]
        source: RunError,
    },

    /// A git setup step exited non-zero.
    #[error("`git {step}` failed in '{fixture}' with status {status}: {stderr}")]
    GitSetup {
        /// Fixture being initialised.
        fixture: String,
        /// Arguments passed to git.
        step: String,
        /// Exit status of the step.
        status: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The fixture directory could not be removed.
    #[error("failed to remove fixture '{path}': {source}")]
    Teardown {
        /// Root of the fixture.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::runner;

    #[test]
    fn create_initialises_repository_on_main() {
        let fixture = Fixture::create(&runner(), &FixtureOptions::default()).unwrap();

        assert_eq!(fixture.state(), FixtureState::Initialized);
        assert!(fixture.path().join(".git").is_dir());

        let head = std::fs::read_to_string(fixture.path().join(".git/HEAD")).unwrap();
        assert_eq!(head.trim(), "ref: refs/heads/main");
    }

    #[test]
    fn create_honours_custom_default_branch() {
        let options = FixtureOptions {
            default_branch: "trunk".into(),
            ..FixtureOptions::default()
        };
        let fixture = Fixture::create(&runner(), &options).unwrap();

        let head = std::fs::read_to_string(fixture.path().join(".git/HEAD")).unwrap();
        assert_eq!(head.trim(), "ref: refs/heads/trunk");
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut fixture = Fixture::create(&runner(), &FixtureOptions::default()).unwrap();
        let root = fixture.path().to_path_buf();

        fixture.destroy().unwrap();
        fixture.destroy().unwrap();

        assert_eq!(fixture.state(), FixtureState::TornDown);
        assert!(!root.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let fixture = Fixture::create(&runner(), &FixtureOptions::default()).unwrap();
        let root = fixture.path().to_path_buf();

        drop(fixture);

        assert!(!root.exists());
    }

    #[test]
    fn fixtures_never_share_a_root() {
        let first = Fixture::create(&runner(), &FixtureOptions::default()).unwrap();
        let second = Fixture::create(&runner(), &FixtureOptions::default()).unwrap();

        assert_ne!(first.path(), second.path());
        assert_ne!(first.name(), second.name());
    }

    #[test]
    fn create_ignores_git_dir_pointing_elsewhere() {
        let outer = tempfile::tempdir().unwrap();
        runner()
            .git_in(outer.path(), &["init", "--quiet"], &RunOptions::default())
            .unwrap();
        let outer_git = outer.path().join(".git");
        let before = std::fs::read_to_string(outer_git.join("config")).unwrap();

        let runner = runner().with_env("GIT_DIR", outer_git.to_string_lossy());
        let fixture = Fixture::create(&runner, &FixtureOptions::default()).unwrap();

        assert!(fixture.path().join(".git").is_dir());
        assert_eq!(std::fs::read_to_string(outer_git.join("config")).unwrap(), before);
    }

    #[test]
    fn create_fails_when_git_is_missing() {
        let runner = CommandRunner::new("hookcheck-definitely-not-git");
        let err = Fixture::create(&runner, &FixtureOptions::default()).unwrap_err();

        assert!(matches!(err, FixtureError::Run { .. }));
    }

    #[test]
    fn is_contained_accepts_plain_relative_paths() {
        assert!(is_contained(Path::new("successful submission")));
        assert!(is_contained(Path::new("src/lib.rs")));
        assert!(is_contained(Path::new("./notes.txt")));
    }

    #[test]
    fn is_contained_rejects_escapes() {
        assert!(!is_contained(Path::new("")));
        assert!(!is_contained(Path::new("../outside")));
        assert!(!is_contained(Path::new("a/../../outside")));
        assert!(!is_contained(Path::new("/etc/passwd")));
        assert!(!is_contained(Path::new(".git/config")));
        assert!(!is_contained(Path::new("./.git/hooks/pre-commit")));
        assert!(!is_contained(Path::new(".")));
    }
}

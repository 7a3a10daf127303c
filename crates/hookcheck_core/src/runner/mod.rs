//! Subprocess execution inside a fixture.
//!
//! A non-zero exit status is an ordinary [`ExecutionResult`]. The runner only
//! fails when a process cannot be started, exceeds its deadline, or is
//! cancelled.

mod process;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use self::process::{Invocation, execute};
use crate::fixture::Fixture;
use crate::scenario::CommitRequest;

/// Author and committer identity handed to git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Value for `user.name`, `GIT_AUTHOR_NAME` and `GIT_COMMITTER_NAME`.
    pub name: String,
    /// Value for `user.email`, `GIT_AUTHOR_EMAIL` and `GIT_COMMITTER_EMAIL`.
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "Hookcheck".into(),
            email: "hookcheck@example.invalid".into(),
        }
    }
}

/// Handle used to abort an in-flight command from another thread.
///
/// Clones share state: cancelling one cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Running commands and their process groups are
    /// killed immediately.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Returns `true` once [`CancelToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    pub(crate) async fn cancelled(&self) {
        self.0.cancelled().await;
    }
}

/// Variables that tell git which repository, index or config to use.
///
/// Git exports several of these to the hooks it runs, so they are removed
/// from every command to keep it pointed at its own fixture.
const REPOSITORY_ENV: &[&str] = &[
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_OBJECT_DIRECTORY",
    "GIT_ALTERNATE_OBJECT_DIRECTORIES",
    "GIT_COMMON_DIR",
    "GIT_NAMESPACE",
    "GIT_PREFIX",
    "GIT_QUARANTINE_PATH",
    "GIT_CEILING_DIRECTORIES",
    "GIT_DISCOVERY_ACROSS_FILESYSTEM",
    "GIT_CONFIG",
    "GIT_CONFIG_PARAMETERS",
    "GIT_CONFIG_COUNT",
];

/// Returns `true` for variables that could point git outside the fixture.
pub(crate) fn is_repository_env(key: &OsStr) -> bool {
    let Some(key) = key.to_str() else {
        return false;
    };

    REPOSITORY_ENV.contains(&key) || key.starts_with("GIT_CONFIG_KEY_") || key.starts_with("GIT_CONFIG_VALUE_")
}

/// Per-call knobs for [`CommandRunner::run`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bytes written to the child's standard input.
    pub stdin: Option<Vec<u8>>,
    /// Deadline after which the child and its process group are killed.
    pub timeout: Option<Duration>,
    /// Token that kills the child and its process group when cancelled.
    pub cancel: Option<CancelToken>,
}

impl RunOptions {
    /// Sets the standard input payload.
    #[must_use]
    pub fn with_stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Sets an optional deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Captured outcome of one finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Exit status. Signal deaths report `128 + signal` on unix.
    pub status: i32,
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
    /// Wall-clock time from spawn to exit.
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl ExecutionResult {
    /// Returns `true` when the command exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

pub(crate) fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Executes commands with a fixed git binary, identity and extra environment.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    git: PathBuf,
    identity: Identity,
    env: Vec<(String, String)>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

impl CommandRunner {
    /// Creates a runner that invokes `git` as the git executable.
    #[must_use]
    pub fn new(git: impl Into<PathBuf>) -> Self {
        Self {
            git: git.into(),
            identity: Identity::default(),
            env: Vec::new(),
        }
    }

    /// Overrides the commit identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Adds an environment variable passed to every command (and so to hooks).
    ///
    /// Variables that locate a repository, such as `GIT_DIR`, are never
    /// passed on.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The commit identity applied to fixtures and commands.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The git executable this runner invokes.
    #[must_use]
    pub fn git_program(&self) -> &Path {
        &self.git
    }

    /// Runs `argv` with the fixture root as working directory.
    ///
    /// `argv[0]` is the program. An empty `argv` is reported as a spawn
    /// failure.
    pub fn run<S: AsRef<OsStr>>(
        &self,
        fixture: &Fixture,
        argv: &[S],
        options: &RunOptions,
    ) -> Result<ExecutionResult, RunError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(RunError::Spawn {
                command: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        self.run_in(fixture.path(), program.as_ref(), args, options)
    }

    /// Runs the configured git executable inside the fixture.
    pub fn git<S: AsRef<OsStr>>(
        &self,
        fixture: &Fixture,
        args: &[S],
        options: &RunOptions,
    ) -> Result<ExecutionResult, RunError> {
        self.git_in(fixture.path(), args, options)
    }

    pub(crate) fn git_in<S: AsRef<OsStr>>(
        &self,
        dir: &Path,
        args: &[S],
        options: &RunOptions,
    ) -> Result<ExecutionResult, RunError> {
        self.run_in(dir, self.git.as_os_str(), args, options)
    }

    fn run_in<S: AsRef<OsStr>>(
        &self,
        dir: &Path,
        program: &OsStr,
        args: &[S],
        options: &RunOptions,
    ) -> Result<ExecutionResult, RunError> {
        let args: Vec<&OsStr> = args.iter().map(AsRef::as_ref).collect();
        let env = self.environment();

        let invocation = Invocation {
            program,
            args: &args,
            dir,
            env: &env,
        };

        execute(&invocation, options)
    }

    fn environment(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("GIT_AUTHOR_NAME".to_string(), self.identity.name.clone()),
            ("GIT_AUTHOR_EMAIL".to_string(), self.identity.email.clone()),
            ("GIT_COMMITTER_NAME".to_string(), self.identity.name.clone()),
            ("GIT_COMMITTER_EMAIL".to_string(), self.identity.email.clone()),
            ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        ];
        env.extend(self.env.iter().cloned());
        env
    }

    /// Writes the requested file, stages it, then commits with the requested
    /// message fed through standard input.
    ///
    /// Returns the commit step's result, which is where a hook rejection
    /// shows up. If staging fails its result is returned and no commit is
    /// attempted.
    pub fn commit_file(
        &self,
        fixture: &Fixture,
        request: &CommitRequest,
        options: &RunOptions,
    ) -> Result<ExecutionResult, RunError> {
        let target = fixture
            .resolve(Path::new(&request.file))
            .ok_or_else(|| RunError::PathOutsideFixture {
                path: PathBuf::from(&request.file),
            })?;

        write_file(&target, request.contents().as_bytes())?;

        let add_options = RunOptions {
            stdin: None,
            ..options.clone()
        };
        let staged = self.git(fixture, &["add", "--", request.file.as_str()], &add_options)?;
        if !staged.success() {
            return Ok(staged);
        }

        let commit_options = options.clone().with_stdin(request.message.as_bytes());
        self.git(fixture, &["commit", "--file=-"], &commit_options)
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), RunError> {
    let to_error = |source| RunError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_error)?;
    }

    std::fs::write(path, content).map_err(to_error)
}

/// Failures of the runner itself, as opposed to a command exiting non-zero.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The process could not be started (missing binary, permission denied).
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Command line that failed to start.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process outlived its deadline and was killed.
    #[error("`{command}` timed out after {}ms", timeout.as_millis())]
    Timeout {
        /// Command line that was killed.
        command: String,
        /// The deadline that expired.
        timeout: Duration,
    },

    /// The process was killed because the scenario was cancelled.
    #[error("`{command}` was cancelled")]
    Cancelled {
        /// Command line that was killed.
        command: String,
    },

    /// Waiting on the process failed.
    #[error("failed while waiting for `{command}`: {source}")]
    Io {
        /// Command line being waited on.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A file could not be written into the fixture before committing.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A requested file path would escape the fixture root.
    #[error("path '{path}' is outside the fixture")]
    PathOutsideFixture {
        /// The offending relative path.
        path: PathBuf,
    },
}

impl RunError {
    /// Returns `true` for [`RunError::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for [`RunError::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::fixture::FixtureOptions;
    use crate::test_utils::{fixture, runner};

    #[test]
    fn captures_stdout_and_status() {
        let fixture = fixture();
        let result = runner().run(&fixture, &["sh", "-c", "echo hello; exit 3"], &RunOptions::default()).unwrap();

        assert_eq!(result.status, 3);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(!result.success());
    }

    #[test]
    fn captures_stderr_separately() {
        let fixture = fixture();
        let result = runner().run(&fixture, &["sh", "-c", "echo oops >&2"], &RunOptions::default()).unwrap();

        assert!(result.success());
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr.trim(), "oops");
    }

    #[test]
    fn runs_inside_fixture_root() {
        let fixture = fixture();
        let result = runner().run(&fixture, &["pwd"], &RunOptions::default()).unwrap();

        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        let expected = std::fs::canonicalize(fixture.path()).unwrap();
        assert_eq!(reported, expected);
    }

    #[test]
    fn feeds_stdin_payload() {
        let fixture = fixture();
        let options = RunOptions::default().with_stdin("line one\nline two\n");
        let result = runner().run(&fixture, &["cat"], &options).unwrap();

        assert_eq!(result.stdout, "line one\nline two\n");
    }

    #[test]
    fn passes_extra_environment() {
        let fixture = fixture();
        let runner = runner().with_env("HOOKCHECK_PROBE", "visible");
        let result = runner
            .run(&fixture, &["sh", "-c", "printf %s \"$HOOKCHECK_PROBE\""], &RunOptions::default())
            .unwrap();

        assert_eq!(result.stdout, "visible");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let fixture = fixture();
        let err = runner()
            .run(&fixture, &["hookcheck-no-such-program"], &RunOptions::default())
            .unwrap_err();

        assert!(matches!(err, RunError::Spawn { .. }));
    }

    #[test]
    fn empty_argv_is_a_spawn_error() {
        let fixture = fixture();
        let argv: [&str; 0] = [];
        let err = runner().run(&fixture, &argv, &RunOptions::default()).unwrap_err();

        assert!(matches!(err, RunError::Spawn { .. }));
    }

    #[test]
    fn timeout_kills_long_running_process() {
        let fixture = fixture();
        let options = RunOptions::default().with_timeout(Some(Duration::from_millis(200)));
        let start = Instant::now();

        let err = runner().run(&fixture, &["sh", "-c", "sleep 30"], &options).unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn timeout_covers_background_processes_holding_output() {
        let fixture = fixture();
        let options = RunOptions::default().with_timeout(Some(Duration::from_millis(300)));
        let start = Instant::now();

        let err = runner()
            .run(&fixture, &["sh", "-c", "sleep 30 & exit 0"], &options)
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn pre_cancelled_token_never_spawns() {
        let fixture = fixture();
        let token = CancelToken::new();
        token.cancel();
        let options = RunOptions::default().with_cancel(token);

        let err = runner()
            .run(&fixture, &["sh", "-c", "touch spawned"], &options)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!fixture.path().join("spawned").exists());
    }

    #[test]
    fn repository_env_is_recognised() {
        for key in ["GIT_DIR", "GIT_WORK_TREE", "GIT_INDEX_FILE", "GIT_CONFIG_KEY_0", "GIT_CONFIG_VALUE_3"] {
            assert!(is_repository_env(OsStr::new(key)), "{key}");
        }
        for key in ["GIT_AUTHOR_NAME", "GIT_TERMINAL_PROMPT", "PATH"] {
            assert!(!is_repository_env(OsStr::new(key)), "{key}");
        }
    }

    #[test]
    fn cancel_kills_running_process() {
        let fixture = fixture();
        let token = CancelToken::new();
        let options = RunOptions::default().with_cancel(token.clone());

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            token.cancel();
        });

        let err = runner().run(&fixture, &["sh", "-c", "sleep 30"], &options).unwrap_err();
        canceller.join().unwrap();

        assert!(err.is_cancelled());
    }

    #[test]
    fn commit_file_creates_commit() {
        let fixture = fixture();
        let request = CommitRequest::new("notes.txt", "first\n\nbody line");

        let result = runner().commit_file(&fixture, &request, &RunOptions::default()).unwrap();
        assert!(result.success(), "commit failed: {}", result.stderr);

        let log = runner()
            .git(&fixture, &["log", "--format=%B", "-n", "1"], &RunOptions::default())
            .unwrap();
        assert_eq!(log.stdout.trim(), "first\n\nbody line");
    }

    #[test]
    fn commit_file_writes_nested_paths() {
        let fixture = fixture();
        let request = CommitRequest::new("docs/guide.md", "Add guide");

        let result = runner().commit_file(&fixture, &request, &RunOptions::default()).unwrap();

        assert!(result.success(), "commit failed: {}", result.stderr);
        assert!(fixture.path().join("docs/guide.md").is_file());
    }

    #[test]
    fn commit_file_refuses_paths_outside_fixture() {
        let fixture = fixture();
        let request = CommitRequest::new("../escape.txt", "nope");

        let err = runner().commit_file(&fixture, &request, &RunOptions::default()).unwrap_err();

        assert!(matches!(err, RunError::PathOutsideFixture { .. }));
    }

    #[test]
    fn identity_is_applied_to_commits() {
        let identity = Identity {
            name: "Ada".into(),
            email: "ada@example.invalid".into(),
        };
        let runner = runner().with_identity(identity);
        let fixture = crate::fixture::Fixture::create(&runner, &FixtureOptions::default()).unwrap();

        runner
            .commit_file(&fixture, &CommitRequest::new("a.txt", "msg"), &RunOptions::default())
            .unwrap();
        let author = runner
            .git(&fixture, &["log", "--format=%an <%ae>", "-n", "1"], &RunOptions::default())
            .unwrap();

        assert_eq!(author.stdout.trim(), "Ada <ada@example.invalid>");
    }
}

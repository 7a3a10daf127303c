//! Named hooks and their installation into a fixture.
//!
//! A [`HookRegistry`] maps names to [`HookRef`]s. Built-in stubs are always
//! available; more come from a directory of executables or from the
//! `[hooks]` table of the configuration file. [`install`] places a resolved
//! hook where git will invoke it.

mod install;
mod registry;

use std::fmt;
use std::path::PathBuf;

pub use self::install::install;
pub use self::registry::HookRegistry;

/// Stage used when a hook does not name one.
pub const DEFAULT_STAGE: &str = "pre-commit";

/// Hook file names git recognises.
pub const KNOWN_STAGES: &[&str] = &[
    "applypatch-msg",
    "pre-applypatch",
    "post-applypatch",
    "pre-commit",
    "pre-merge-commit",
    "prepare-commit-msg",
    "commit-msg",
    "post-commit",
    "pre-rebase",
    "post-checkout",
    "post-merge",
    "pre-push",
    "pre-receive",
    "update",
    "proc-receive",
    "post-receive",
    "post-update",
    "reference-transaction",
    "push-to-checkout",
    "pre-auto-gc",
    "post-rewrite",
    "sendemail-validate",
    "fsmonitor-watchman",
    "post-index-change",
];

/// Returns `true` if `stage` is a hook name git will invoke.
#[must_use]
pub fn is_known_stage(stage: &str) -> bool {
    KNOWN_STAGES.contains(&stage)
}

/// Where a hook's body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookSource {
    /// An executable file copied into the fixture.
    File(PathBuf),
    /// A script body written verbatim.
    Script(String),
}

impl fmt::Display for HookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Script(_) => f.write_str("<inline script>"),
        }
    }
}

/// A resolved hook: registry name, the git stage it installs at, and its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRef {
    /// Name scenarios refer to.
    pub name: String,
    /// File name under `.git/hooks`, e.g. `pre-commit`.
    pub stage: String,
    /// Body of the hook.
    pub source: HookSource,
}

impl HookRef {
    /// Creates a hook backed by an inline script.
    #[must_use]
    pub fn script(name: impl Into<String>, stage: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: stage.into(),
            source: HookSource::Script(body.into()),
        }
    }

    /// Creates a hook backed by an executable on disk.
    #[must_use]
    pub fn file(name: impl Into<String>, stage: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            stage: stage.into(),
            source: HookSource::File(path.into()),
        }
    }

    /// Checks that the hook's body is available to install.
    ///
    /// A file-backed hook must point at an existing file.
    pub fn validate(&self) -> Result<(), HookInstallError> {
        match &self.source {
            HookSource::File(path) if !path.is_file() => Err(HookInstallError::MissingSource {
                name: self.name.clone(),
                path: path.clone(),
            }),
            HookSource::File(_) | HookSource::Script(_) => Ok(()),
        }
    }
}

/// Errors raised while resolving or installing a hook.
#[derive(Debug, thiserror::Error)]
pub enum HookInstallError {
    /// No hook is registered under the requested name.
    #[error("unknown hook '{name}'")]
    UnknownHook {
        /// The requested name.
        name: String,
    },

    /// A file-backed hook points at a file that does not exist.
    #[error("hook '{name}' source '{path}' does not exist")]
    MissingSource {
        /// Hook name.
        name: String,
        /// The missing file.
        path: PathBuf,
    },

    /// A configured hook is malformed.
    #[error("hook '{name}' is invalid: {reason}")]
    InvalidDefinition {
        /// Hook name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A hooks directory could not be listed.
    #[error("failed to read hooks directory '{path}': {source}")]
    ReadDir {
        /// The directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the source or writing the installed hook failed.
    #[error("failed to install hook '{name}' at '{path}': {source}")]
    Io {
        /// Hook name.
        name: String,
        /// Path being read or written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

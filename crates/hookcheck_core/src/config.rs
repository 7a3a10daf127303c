use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fixture::{DEFAULT_BRANCH, FixtureOptions};
use crate::runner::{CommandRunner, Identity};

/// A hook declared in the `[hooks.<name>]` table of `.hookcheck.toml`.
///
/// Exactly one of `path` and `script` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    /// Executable copied into the fixture, relative to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Inline script body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Git hook stage; `pre-commit` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

/// Project-level configuration loaded from `.hookcheck.toml`.
///
/// Every key is optional. A missing file yields [`Config::default`], which
/// runs the `git` on `PATH`, starts fixtures on `main`, and applies no
/// timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Git executable.
    pub git: PathBuf,

    /// Branch `HEAD` points at in a fresh fixture.
    pub default_branch: String,

    /// Per-command deadline in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Directory of executable hooks, relative to the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks_dir: Option<PathBuf>,

    /// Author and committer name.
    pub user_name: String,

    /// Author and committer email.
    pub user_email: String,

    /// Extra environment passed to git and, through it, to hooks.
    pub env: BTreeMap<String, String>,

    /// Named hooks.
    pub hooks: BTreeMap<String, HookConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let identity = Identity::default();
        Self {
            git: PathBuf::from("git"),
            default_branch: DEFAULT_BRANCH.to_string(),
            timeout_ms: None,
            hooks_dir: None,
            user_name: identity.name,
            user_email: identity.email,
            env: BTreeMap::new(),
            hooks: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Creates a default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a `.hookcheck.toml` file.
    ///
    /// Returns the default configuration if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = read_file(path)?;
        parse_toml(path, &content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        parse_toml(Path::new("<inline>"), content)
    }

    /// Atomically writes this configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        write_file(path, &content)
    }

    /// Serialises this configuration to a pretty-printed TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }

    /// The configured per-command deadline.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// A command runner with this configuration's git binary, identity and
    /// environment.
    #[must_use]
    pub fn runner(&self) -> CommandRunner {
        let identity = Identity {
            name: self.user_name.clone(),
            email: self.user_email.clone(),
        };

        self.env
            .iter()
            .fold(CommandRunner::new(&self.git).with_identity(identity), |runner, (key, value)| {
                runner.with_env(key, value)
            })
    }

    /// Fixture options derived from this configuration.
    #[must_use]
    pub fn fixture_options(&self) -> FixtureOptions {
        FixtureOptions {
            default_branch: self.default_branch.clone(),
            ..FixtureOptions::default()
        }
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes through a temporary file in the same directory, then renames it
/// over `path`.
fn write_file(path: &Path, content: &str) -> Result<(), ConfigError> {
    let to_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(to_error)?;
    file.write_all(content.as_bytes()).map_err(to_error)?;
    file.as_file().sync_all().map_err(to_error)?;
    file.persist(path).map_err(|err| to_error(err.error))?;

    Ok(())
}

fn parse_toml(path: &Path, content: &str) -> Result<Config, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Why `.hookcheck.toml` could not be loaded or saved.
///
/// Every variant but [`ConfigError::Serialize`] names the file involved.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read hookcheck config {}: {source}", path.display())]
    Read {
        /// Config file.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Bad TOML, a mistyped value, or a key hookcheck does not know.
    #[error("invalid hookcheck config {}: {source}", path.display())]
    Parse {
        /// Config file, or `<inline>` for [`Config::from_toml`].
        path: PathBuf,
        /// Deserializer report, with line and column.
        #[source]
        source: toml::de::Error,
    },

    /// The configuration has no TOML representation.
    #[error("cannot encode hookcheck config: {source}")]
    Serialize {
        /// Serializer report.
        #[source]
        source: toml::ser::Error,
    },

    /// Creating, writing or renaming the replacement file failed.
    #[error("cannot write hookcheck config {}: {source}", path.display())]
    Write {
        /// Destination file.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Config file involved, when there is one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        let (Self::Read { path, .. } | Self::Parse { path, .. } | Self::Write { path, .. }) = self else {
            return None;
        };
        Some(path)
    }
}

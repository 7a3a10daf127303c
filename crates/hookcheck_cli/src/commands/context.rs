//! Configuration loading shared by every command.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use hookcheck_core::prelude::*;

use crate::{CONFIG_FILENAME, ConfigArgs};

/// Configuration with command-line overrides applied.
#[derive(Debug)]
pub struct HarnessContext {
    /// Parsed `.hookcheck.toml`, or defaults.
    pub config: Config,
    /// Directory relative config paths resolve against.
    pub base_dir: PathBuf,
}

impl HarnessContext {
    /// Loads the configuration named by `args` (or `.hookcheck.toml`) and
    /// applies `--hooks-dir`.
    pub fn load(args: &ConfigArgs) -> anyhow::Result<Self> {
        let config_path = args.config.as_deref().unwrap_or(Path::new(CONFIG_FILENAME));
        let mut config = Config::load(config_path).context("loading config")?;

        if let Some(dir) = &args.hooks_dir {
            let cwd = std::env::current_dir().context("resolving current directory")?;
            config.hooks_dir = Some(cwd.join(dir));
        }

        let base_dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self { config, base_dir })
    }

    /// Built-in hooks plus those from the hooks directory and `[hooks]`.
    pub fn registry(&self) -> anyhow::Result<HookRegistry> {
        HookRegistry::from_config(&self.config, &self.base_dir).context("loading hooks")
    }

    /// An orchestrator configured from this context.
    pub fn orchestrator(&self) -> anyhow::Result<Orchestrator> {
        Orchestrator::from_config(&self.config, &self.base_dir).context("loading hooks")
    }
}

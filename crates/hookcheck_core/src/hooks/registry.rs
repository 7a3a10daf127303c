use std::collections::BTreeMap;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::debug;

use super::{DEFAULT_STAGE, HookInstallError, HookRef, is_known_stage};
use crate::config::{Config, HookConfig};

const ACCEPT_SCRIPT: &str = "#!/bin/sh\nexit 0\n";
const REJECT_SCRIPT: &str = "#!/bin/sh\necho \"hookcheck: commit rejected by stub hook\" >&2\nexit 1\n";
const HANG_SCRIPT: &str = "#!/bin/sh\nwhile :; do sleep 1; done\n";

/// Name-to-hook lookup table.
///
/// Names are unique; registering a name again replaces the earlier entry,
/// so configuration can shadow built-ins.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, HookRef>,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of stub hooks that need nothing on disk.
    ///
    /// - `pre-commit` and `accept` exit 0
    /// - `reject` prints to stderr and exits 1
    /// - `hang` never exits
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, body) in [
            ("pre-commit", ACCEPT_SCRIPT),
            ("accept", ACCEPT_SCRIPT),
            ("reject", REJECT_SCRIPT),
            ("hang", HANG_SCRIPT),
        ] {
            registry.register(HookRef::script(name, DEFAULT_STAGE, body));
        }
        registry
    }

    /// Registry holding every executable file in `dir`, named by file name.
    pub fn from_dir(dir: &Path) -> Result<Self, HookInstallError> {
        let mut registry = Self::new();
        registry.load_dir(dir)?;
        Ok(registry)
    }

    /// Built-ins, then `hooks_dir`, then `[hooks]` entries, each layer
    /// overriding the one before. Relative paths resolve against `base_dir`.
    pub fn from_config(config: &Config, base_dir: &Path) -> Result<Self, HookInstallError> {
        let mut registry = Self::builtin();

        if let Some(dir) = &config.hooks_dir {
            registry.load_dir(&base_dir.join(dir))?;
        }

        for (name, entry) in &config.hooks {
            registry.register_config(name, entry, base_dir)?;
        }

        Ok(registry)
    }

    /// Registers every executable, non-hidden file in `dir`. Returns how many
    /// were added.
    ///
    /// A file named after a git hook installs at that stage; anything else
    /// installs at `pre-commit`.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, HookInstallError> {
        let read_error = |source| HookInstallError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if path.is_file() && is_executable(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut added = 0;
        for path in paths {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let stage = if is_known_stage(name) { name } else { DEFAULT_STAGE };
            let name = name.to_string();
            self.register(HookRef::file(name, stage, &path));
            added += 1;
        }

        #[cfg(feature = "tracing")]
        debug!(dir = %dir.display(), added, "loaded hooks directory");

        Ok(added)
    }

    /// Registers one `[hooks.<name>]` entry.
    pub fn register_config(&mut self, name: &str, entry: &HookConfig, base_dir: &Path) -> Result<(), HookInstallError> {
        let invalid = |reason: &str| HookInstallError::InvalidDefinition {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let stage = entry.stage.as_deref().unwrap_or(DEFAULT_STAGE);
        if !is_known_stage(stage) {
            return Err(invalid(&format!("'{stage}' is not a git hook stage")));
        }

        let hook = match (&entry.path, &entry.script) {
            (Some(path), None) => HookRef::file(name, stage, base_dir.join(path)),
            (None, Some(script)) => HookRef::script(name, stage, script.as_str()),
            (Some(_), Some(_)) => return Err(invalid("set either `path` or `script`, not both")),
            (None, None) => return Err(invalid("one of `path` or `script` is required")),
        };

        self.register(hook);
        Ok(())
    }

    /// Adds or replaces a hook, returning the one it replaced.
    pub fn register(&mut self, hook: HookRef) -> Option<HookRef> {
        self.hooks.insert(hook.name.clone(), hook)
    }

    /// Looks up a hook by name.
    pub fn resolve(&self, name: &str) -> Result<&HookRef, HookInstallError> {
        self.hooks.get(name).ok_or_else(|| HookInstallError::UnknownHook { name: name.to_string() })
    }

    /// Registered hooks in name order.
    pub fn iter(&self) -> impl Iterator<Item = &HookRef> {
        self.hooks.values()
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` when no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path).is_ok_and(|meta| meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

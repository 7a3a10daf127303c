use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::debug;

use super::{HookInstallError, HookRef, HookSource};
use crate::fixture::Fixture;

/// Writes `hook` to `<fixture>/.git/hooks/<stage>` and marks it executable.
///
/// An existing hook at the same stage is overwritten. Returns the installed
/// path.
pub fn install(fixture: &Fixture, hook: &HookRef) -> Result<PathBuf, HookInstallError> {
    let hooks_dir = fixture.hooks_dir();
    let target = hooks_dir.join(&hook.stage);

    hook.validate()?;
    std::fs::create_dir_all(&hooks_dir).map_err(io_error(hook, &hooks_dir))?;

    match &hook.source {
        HookSource::Script(body) => {
            std::fs::write(&target, body).map_err(io_error(hook, &target))?;
        }
        HookSource::File(source) => {
            std::fs::copy(source, &target).map_err(io_error(hook, source))?;
        }
    }

    make_executable(&target).map_err(io_error(hook, &target))?;

    #[cfg(feature = "tracing")]
    debug!(hook = %hook.name, stage = %hook.stage, path = %target.display(), "installed hook");

    Ok(target)
}

fn io_error(hook: &HookRef, path: &Path) -> impl FnOnce(std::io::Error) -> HookInstallError {
    let name = hook.name.clone();
    let path = path.to_path_buf();
    move |source| HookInstallError::Io { name, path, source }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

//! Scoped stub provisioning with guaranteed cleanup.
//!
//! The type checker needs a stub file that only exists inside the installed
//! library. Provisioning copies it into the project's stubs directory for
//! the duration of one command; [`StubGuard`] removes it again on every
//! exit path - success, tool failure, or interrupt-driven unwind.
//!
//! Concurrent invocations sharing a working copy race on the destination
//! path. The runner makes no attempt to guard it; a second run can remove
//! the stub out from under the first. Known limitation.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use mallet_config::StubConfig;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("stub source {path} does not exist at the package's install location")]
    MissingSource { path: PathBuf },
    #[error("failed to copy stub {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A provisioned stub file, removed again when the guard drops.
///
/// Removal is best-effort: the wrapped command's result is already
/// determined by the time cleanup runs, so a failed removal is logged at
/// `warn` and otherwise ignored. A file that is already gone is a no-op.
#[derive(Debug)]
pub struct StubGuard {
    dest: PathBuf,
}

impl StubGuard {
    /// Where the stub was provisioned to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dest
    }
}

impl Drop for StubGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.dest) {
            Ok(()) => {
                tracing::debug!(path = %self.dest.display(), "removed provisioned stub");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.dest.display(), "failed to remove provisioned stub: {e}");
            }
        }
    }
}

/// Copy the configured stub out of the package's install location into the
/// project, returning the guard that owns the copy's lifetime.
///
/// Fatal before the type checker runs: a missing source file or a copy
/// failure (permissions, disk) aborts the whole command.
pub fn provision(
    stub: &StubConfig,
    location: &Path,
    project_root: &Path,
) -> Result<StubGuard, ProvisionError> {
    let from = location.join(stub.source());
    if !from.is_file() {
        return Err(ProvisionError::MissingSource { path: from });
    }

    let to = project_root.join(stub.dest());
    let copy_err = |source| ProvisionError::Copy {
        from: from.clone(),
        to: to.clone(),
        source,
    };
    if let Some(parent) = to.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(copy_err)?;
    }
    fs::copy(&from, &to).map_err(copy_err)?;

    tracing::debug!(from = %from.display(), to = %to.display(), "provisioned stub");
    Ok(StubGuard { dest: to })
}

/// Value for the checker's search-path variable: the stubs directory,
/// prepended to any pre-existing value.
///
/// The result is only ever exported to the spawned child, never into the
/// runner's own environment.
#[must_use]
pub fn search_path_value(stub_dir: &Path, existing: Option<&OsStr>) -> OsString {
    let mut value = OsString::from(stub_dir.as_os_str());
    if let Some(existing) = existing
        && !existing.is_empty()
    {
        value.push(if cfg!(windows) { ";" } else { ":" });
        value.push(existing);
    }
    value
}

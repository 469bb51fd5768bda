//! Child process spawning with interrupt-safe exit propagation.
//!
//! The runner owns a single foreground child at a time. The child inherits
//! stdio (the delegated tools talk to the terminal directly), and its exit
//! status becomes the task's status verbatim. A Ctrl-C during a run resolves
//! to unwinding: the caller's scoped resources (the provisioned stub) must
//! be released before the process exits.

use std::process::Stdio;

use thiserror::Error;
use tokio::process::{Child, Command};

use mallet_types::{CommandSpec, ExitDisposition};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// RAII guard that kills a spawned child on drop.
///
/// Wrap the child immediately after `spawn()` so an interrupt or early
/// error return between spawn and reap cannot leak a running process.
/// Call `disarm()` once the child has been waited on.
struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    fn child_mut(&mut self) -> &mut Child {
        self.child.as_mut().expect("child present until disarmed")
    }

    fn disarm(&mut self) {
        self.child = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        let _ = child.start_kill();
        let _ = child.try_wait();
    }
}

/// Spawn a command with inherited stdio and wait for it, racing a Ctrl-C
/// listener.
///
/// On interrupt the terminal has already delivered the signal to the
/// child's process group; the guard's kill-on-drop is the backstop for a
/// child that ignores it. Either way the call returns
/// [`ExitDisposition::Interrupted`] so callers unwind and scoped resources
/// clean up.
pub async fn run(spec: &CommandSpec) -> Result<ExitDisposition, RunError> {
    tracing::info!(command = %spec, "running");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    if let Some(dir) = &spec.cwd {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|source| RunError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    let mut guard = ChildGuard::new(child);

    let waited = tokio::select! {
        status = guard.child_mut().wait() => Some(status),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(status) = waited else {
        tracing::debug!(program = %spec.program, "interrupted, terminating child");
        return Ok(ExitDisposition::Interrupted);
    };
    let status = status.map_err(|source| RunError::Wait {
        program: spec.program.clone(),
        source,
    })?;
    guard.disarm();
    Ok(disposition_for(status))
}

/// Run commands in order, stopping at the first one that does not succeed.
///
/// All-or-nothing: no retries, no partial-failure recovery. The first
/// failing command's status is the sequence's status.
pub async fn run_sequence(specs: &[CommandSpec]) -> Result<ExitDisposition, RunError> {
    for spec in specs {
        let disposition = run(spec).await?;
        if !disposition.is_success() {
            return Ok(disposition);
        }
    }
    Ok(ExitDisposition::Success)
}

fn disposition_for(status: std::process::ExitStatus) -> ExitDisposition {
    if status.success() {
        return ExitDisposition::Success;
    }
    if let Some(code) = status.code() {
        return ExitDisposition::Code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitDisposition::Signal(signal);
        }
    }
    ExitDisposition::Code(-1)
}

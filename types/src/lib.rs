//! Core domain types for mallet.
//!
//! This crate contains pure domain types with no IO, no async, and no
//! dependencies: the task surface exposed on the command line, a fully
//! resolved external command invocation, and the exit disposition the
//! process must terminate with. IO lives in `mallet-tools`; configuration
//! lives in `mallet-config`.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// A named developer task exposed on the command line.
///
/// The declaration order of [`Task::ALL`] is the order tasks appear in the
/// help listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Format,
    Lint,
    Test,
    CpuTest,
    ExampleLint,
}

impl Task {
    /// Every task, in help-listing order.
    pub const ALL: [Task; 5] = [
        Task::Format,
        Task::Lint,
        Task::Test,
        Task::CpuTest,
        Task::ExampleLint,
    ];

    /// The user-facing command name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Task::Format => "format",
            Task::Lint => "lint",
            Task::Test => "test",
            Task::CpuTest => "cputest",
            Task::ExampleLint => "example_lint",
        }
    }

    /// One-line help text.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Task::Format => "Provision the type stub, then run the formatter and linter",
            Task::Lint => "Provision the type stub, then run the linter only",
            Task::Test => "Run the full test suite",
            Task::CpuTest => "Run the test suite excluding GPU-tagged tests",
            Task::ExampleLint => "Run the linter against the example configuration",
        }
    }

    /// Whether the task needs the type stub provisioned before it runs.
    #[must_use]
    pub fn needs_stub(self) -> bool {
        matches!(self, Task::Format | Task::Lint)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully resolved external command invocation.
///
/// Environment entries apply to the spawned child only; the runner never
/// mutates its own process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, OsString)>,
    /// Working directory for the child; `None` inherits the runner's.
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Build a spec from an argv array; `None` if the array is empty.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args.iter().cloned()))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Renders a shell-readable one-liner (`VAR=value program arg ...`) so log
/// and dry-run output can be copy-pasted into a shell.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={} ", shell_quote(&value.to_string_lossy()))?;
        }
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote a token for display when it would not survive a shell unquoted.
fn shell_quote(token: &str) -> String {
    let needs_quoting = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '$' | '&' | '|' | ';' | '*'));
    if needs_quoting {
        format!("'{}'", token.replace('\'', "'\\''"))
    } else {
        token.to_string()
    }
}

/// The outcome the mallet process must exit with.
///
/// External tool exit statuses are propagated verbatim, never translated:
/// a failing linter is the command's result, not an internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    Success,
    /// The child exited with this non-zero code.
    Code(i32),
    /// Unix: the child was terminated by this signal.
    Signal(i32),
    /// Ctrl-C was observed while a child was running.
    Interrupted,
}

impl ExitDisposition {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, ExitDisposition::Success)
    }

    /// The code the runner's own process should exit with.
    ///
    /// Signal deaths map to the shell convention of 128+n; an interrupt
    /// maps to 130 (128+SIGINT).
    #[must_use]
    pub fn process_exit_code(self) -> i32 {
        match self {
            ExitDisposition::Success => 0,
            ExitDisposition::Code(code) => code,
            ExitDisposition::Signal(signal) => 128 + signal,
            ExitDisposition::Interrupted => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandSpec, ExitDisposition, Task, shell_quote};

    #[test]
    fn task_names_are_unique_and_listing_ordered() {
        let names: Vec<&str> = Task::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec!["format", "lint", "test", "cputest", "example_lint"]
        );
        for task in Task::ALL {
            assert!(!task.description().is_empty());
        }
    }

    #[test]
    fn only_checker_tasks_need_the_stub() {
        assert!(Task::Format.needs_stub());
        assert!(Task::Lint.needs_stub());
        assert!(!Task::Test.needs_stub());
        assert!(!Task::CpuTest.needs_stub());
        assert!(!Task::ExampleLint.needs_stub());
    }

    #[test]
    fn from_argv_splits_program_and_args() {
        let argv = vec!["pysen".to_string(), "run".to_string(), "lint".to_string()];
        let spec = CommandSpec::from_argv(&argv).expect("non-empty argv");
        assert_eq!(spec.program, "pysen");
        assert_eq!(spec.args, vec!["run", "lint"]);
        assert!(CommandSpec::from_argv(&[]).is_none());
    }

    #[test]
    fn display_is_shell_readable() {
        let spec = CommandSpec::new("python")
            .args(["-m", "pytest", "-m", "not gpu"])
            .env("MYPYPATH", "stubs");
        assert_eq!(
            spec.to_string(),
            "MYPYPATH=stubs python -m pytest -m 'not gpu'"
        );
    }

    #[test]
    fn quoting_escapes_embedded_single_quotes() {
        assert_eq!(shell_quote("plain"), "plain");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn exit_codes_follow_shell_conventions() {
        assert_eq!(ExitDisposition::Success.process_exit_code(), 0);
        assert_eq!(ExitDisposition::Code(7).process_exit_code(), 7);
        assert_eq!(ExitDisposition::Signal(9).process_exit_code(), 137);
        assert_eq!(ExitDisposition::Interrupted.process_exit_code(), 130);
        assert!(ExitDisposition::Success.is_success());
        assert!(!ExitDisposition::Code(1).is_success());
    }
}

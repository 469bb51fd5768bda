//! Configuration loading, parsing, and defaults for mallet.
//!
//! Configuration is project-local: a `mallet.toml` discovered by walking
//! from the working directory up through its ancestors. A missing file is
//! not an error - the built-in defaults describe the original toolchain
//! (`pysen` for format/lint, `pytest` for tests, a `torch` stub provisioned
//! into `stubs/` for the type checker). An unreadable or unparsable file is
//! fatal: silently ignoring a config the user wrote would run the wrong
//! commands.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use mallet_types::{CommandSpec, Task};

/// File name searched for in the working directory and its ancestors.
pub const CONFIG_FILE_NAME: &str = "mallet.toml";

const DEFAULT_INTERPRETER: &str = "python";
const DEFAULT_GPU_MARKER: &str = "gpu";
const DEFAULT_PACKAGE: &str = "torch";
const DEFAULT_STUB_SOURCE: &str = "torch/_VF.pyi";
const DEFAULT_STUB_DEST: &str = "stubs/torch/_VF.pyi";
const DEFAULT_STUB_DIR: &str = "stubs";
const DEFAULT_SEARCH_PATH_VAR: &str = "MYPYPATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("task '{task}' has an empty command configured")]
    EmptyCommand { task: &'static str },
}

/// Top-level configuration. Every field is optional in the file; accessors
/// fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MalletConfig {
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub stub: StubConfig,
    #[serde(default)]
    pub python: PythonConfig,
}

/// Per-task command lines, as argv arrays.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksConfig {
    pub format: Option<Vec<String>>,
    pub lint: Option<Vec<String>>,
    pub test: Option<Vec<String>>,
    pub cputest: Option<Vec<String>>,
    pub example_lint: Option<Vec<String>>,
    /// Test marker identifying hardware-bound tests, excluded by `cputest`.
    pub gpu_marker: Option<String>,
}

impl TasksConfig {
    #[must_use]
    pub fn gpu_marker(&self) -> &str {
        self.gpu_marker.as_deref().unwrap_or(DEFAULT_GPU_MARKER)
    }
}

/// Parameters of the provisioned type stub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StubConfig {
    /// Installed package the stub is copied out of.
    pub package: Option<String>,
    /// Stub path relative to the package's install location.
    pub source: Option<String>,
    /// Project-relative destination the type checker will find it at.
    pub dest: Option<String>,
    /// Environment variable naming the checker's stub search path.
    pub search_path_var: Option<String>,
    /// Project-relative directory exported on the search path.
    pub stub_dir: Option<String>,
}

impl StubConfig {
    #[must_use]
    pub fn package(&self) -> &str {
        self.package.as_deref().unwrap_or(DEFAULT_PACKAGE)
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        Path::new(self.source.as_deref().unwrap_or(DEFAULT_STUB_SOURCE))
    }

    #[must_use]
    pub fn dest(&self) -> &Path {
        Path::new(self.dest.as_deref().unwrap_or(DEFAULT_STUB_DEST))
    }

    #[must_use]
    pub fn search_path_var(&self) -> &str {
        self.search_path_var
            .as_deref()
            .unwrap_or(DEFAULT_SEARCH_PATH_VAR)
    }

    #[must_use]
    pub fn stub_dir(&self) -> &Path {
        Path::new(self.stub_dir.as_deref().unwrap_or(DEFAULT_STUB_DIR))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PythonConfig {
    pub interpreter: Option<String>,
}

impl PythonConfig {
    #[must_use]
    pub fn interpreter(&self) -> &str {
        self.interpreter.as_deref().unwrap_or(DEFAULT_INTERPRETER)
    }
}

impl MalletConfig {
    /// Load the config discovered from `start_dir`, or defaults if none
    /// exists.
    pub fn load(start_dir: &Path) -> Result<Self, ConfigError> {
        match Self::discover(start_dir) {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load a specific config file. Unlike [`MalletConfig::load`], the file
    /// must exist.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), "failed to read config: {source}");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map_err(|source| {
            tracing::warn!(path = %path.display(), "failed to parse config: {source}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Find the nearest `mallet.toml` in `start_dir` or its ancestors.
    #[must_use]
    pub fn discover(start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Resolve the external command for a task.
    ///
    /// A task configured as an explicit empty array is an error: the file
    /// said "run nothing", which cannot produce a meaningful exit status.
    pub fn command_for(&self, task: Task) -> Result<CommandSpec, ConfigError> {
        let argv = self.argv_for(task);
        CommandSpec::from_argv(&argv).ok_or(ConfigError::EmptyCommand { task: task.name() })
    }

    fn argv_for(&self, task: Task) -> Vec<String> {
        let configured = match task {
            Task::Format => &self.tasks.format,
            Task::Lint => &self.tasks.lint,
            Task::Test => &self.tasks.test,
            Task::CpuTest => &self.tasks.cputest,
            Task::ExampleLint => &self.tasks.example_lint,
        };
        if let Some(argv) = configured {
            return argv.clone();
        }
        self.default_argv(task)
    }

    fn default_argv(&self, task: Task) -> Vec<String> {
        let owned = |argv: &[&str]| argv.iter().map(ToString::to_string).collect();
        match task {
            Task::Format => owned(&["pysen", "run", "format", "lint"]),
            Task::Lint => owned(&["pysen", "run", "lint"]),
            Task::Test => owned(&[self.python.interpreter(), "-m", "pytest", "tests"]),
            // Derived from the resolved `test` argv so cputest runs a strict
            // subset of the unfiltered suite even when `test` is overridden.
            Task::CpuTest => {
                let mut argv = self.argv_for(Task::Test);
                argv.push("-m".to_string());
                argv.push(format!("not {}", self.tasks.gpu_marker()));
                argv
            }
            Task::ExampleLint => owned(&["pysen", "--config", "example/pyproject.toml", "run", "lint"]),
        }
    }
}

//! Mallet CLI - binary entry point and task dispatch.
//!
//! # Architecture
//!
//! ```text
//! main() -> Cli::parse() -> dispatch(task)
//!                              |- MalletConfig::load (mallet.toml ancestor search)
//!                              |- provision stub (RAII guard, checker tasks only)
//!                              |- run the delegated tool, stdio inherited
//!                              `- exit with the child's status
//! ```
//!
//! Invoking `mallet` with no task prints the task listing and exits 0.
//! Delegated tool exit statuses are propagated verbatim. Setup failures
//! (config, package location, stub copy, spawn) print a one-line `error:`
//! to stderr and exit non-zero before the delegated tool ever runs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mallet_config::MalletConfig;
use mallet_tools::{installed_location, provision, run_sequence, search_path_value};
use mallet_types::{CommandSpec, ExitDisposition, Task};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::try_new("error").expect("error filter is valid"));

    // The delegated tools own stdout; diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();
}

#[derive(Debug, Parser)]
#[command(
    name = "mallet",
    version,
    about = "Developer task runner wrapping the project's format, lint, and test tools",
    subcommand_value_name = "TASK",
    subcommand_help_heading = "Tasks"
)]
struct Cli {
    /// Path to a mallet.toml (default: search ancestor directories).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the resolved commands without executing anything.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    task: Option<TaskCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum TaskCommand {
    #[command(about = Task::Format.description())]
    Format,
    #[command(about = Task::Lint.description())]
    Lint,
    #[command(about = Task::Test.description())]
    Test,
    #[command(about = Task::CpuTest.description())]
    Cputest,
    #[command(name = "example_lint", about = Task::ExampleLint.description())]
    ExampleLint,
}

impl TaskCommand {
    fn task(self) -> Task {
        match self {
            TaskCommand::Format => Task::Format,
            TaskCommand::Lint => Task::Lint,
            TaskCommand::Test => Task::Test,
            TaskCommand::Cputest => Task::CpuTest,
            TaskCommand::ExampleLint => Task::ExampleLint,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let Some(command) = cli.task else {
        // The default command is the task listing, and it always exits 0.
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    match dispatch(command.task(), cli.config.as_deref(), cli.dry_run).await {
        Ok(disposition) => ExitCode::from(exit_code_u8(disposition)),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(
    task: Task,
    config_override: Option<&Path>,
    dry_run: bool,
) -> Result<ExitDisposition> {
    let cwd = std::env::current_dir().context("failed to determine the working directory")?;
    let (config, root) = load_config(&cwd, config_override)?;
    tracing::debug!(task = %task, root = %root.display(), "dispatching");
    let commands = plan(&config, &root, task)?;

    if dry_run {
        if task.needs_stub() {
            println!(
                "# provision stub: {} -> {}",
                config.stub.package(),
                root.join(config.stub.dest()).display()
            );
        }
        for command in &commands {
            println!("{command}");
        }
        return Ok(ExitDisposition::Success);
    }

    // Scoped acquisition: the guard lives for exactly the run below and
    // removes the stub on success, failure, and interrupt alike.
    let _stub = if task.needs_stub() {
        let location =
            installed_location(config.python.interpreter(), config.stub.package()).await?;
        Some(provision(&config.stub, &location, &root)?)
    } else {
        None
    };

    Ok(run_sequence(&commands).await?)
}

/// Resolve the config and the project root the task runs against.
///
/// The root is the directory holding the config file (commands run there,
/// and the stub destination is relative to it); with no config anywhere,
/// the working directory stands in.
fn load_config(cwd: &Path, config_override: Option<&Path>) -> Result<(MalletConfig, PathBuf)> {
    if let Some(path) = config_override {
        let config = MalletConfig::load_file(path)?;
        let root = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
        return Ok((config, root));
    }

    let root = MalletConfig::discover(cwd)
        .and_then(|path| path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| cwd.to_path_buf());
    let config = MalletConfig::load(cwd)?;
    Ok((config, root))
}

/// Resolve a task into the command sequence to run, rooted at the project
/// directory, with the checker's search-path variable exported to the
/// child for stub-backed tasks.
fn plan(config: &MalletConfig, root: &Path, task: Task) -> Result<Vec<CommandSpec>> {
    let mut spec = config.command_for(task)?.current_dir(root);
    if task.needs_stub() {
        let stub_dir = root.join(config.stub.stub_dir());
        let existing = std::env::var_os(config.stub.search_path_var());
        spec = spec.env(
            config.stub.search_path_var(),
            search_path_value(&stub_dir, existing.as_deref()),
        );
    }
    Ok(vec![spec])
}

fn exit_code_u8(disposition: ExitDisposition) -> u8 {
    u8::try_from(disposition.process_exit_code()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use mallet_config::MalletConfig;
    use mallet_types::{ExitDisposition, Task};

    use super::{Cli, TaskCommand, exit_code_u8, plan};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn every_task_parses_under_its_original_name() {
        use clap::Parser;

        for (argv, expected) in [
            ("format", Task::Format),
            ("lint", Task::Lint),
            ("test", Task::Test),
            ("cputest", Task::CpuTest),
            ("example_lint", Task::ExampleLint),
        ] {
            let cli = Cli::try_parse_from(["mallet", argv]).expect("task parses");
            let command = cli.task.expect("subcommand present");
            assert_eq!(command.task(), expected);
        }
    }

    #[test]
    fn dry_run_flag_is_accepted_after_the_task() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["mallet", "cputest", "--dry-run"]).expect("parses");
        assert!(cli.dry_run);
        assert!(matches!(cli.task, Some(TaskCommand::Cputest)));
    }

    #[test]
    fn help_listing_names_every_task() {
        let help = Cli::command().render_long_help().to_string();
        assert!(!help.is_empty());
        for task in Task::ALL {
            assert!(help.contains(task.name()), "help is missing {task}");
            assert!(
                help.contains(task.description()),
                "help is missing the description of {task}"
            );
        }
    }

    #[test]
    fn stub_tasks_export_the_search_path_to_the_child() {
        let config = MalletConfig::default();
        let root = std::path::Path::new("/proj");

        let lint = plan(&config, root, Task::Lint).expect("plan lint");
        assert_eq!(lint.len(), 1);
        assert_eq!(lint[0].cwd.as_deref(), Some(root));
        let (key, value) = &lint[0].env[0];
        assert_eq!(key, "MYPYPATH");
        let stubs_dir = root.join(config.stub.stub_dir());
        assert!(
            value
                .to_string_lossy()
                .starts_with(&*stubs_dir.to_string_lossy()),
            "search path should lead with the project stubs dir"
        );

        let test = plan(&config, root, Task::Test).expect("plan test");
        assert!(test[0].env.is_empty());
    }

    #[test]
    fn config_override_sets_the_project_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mallet.toml");
        std::fs::write(&path, "[python]\ninterpreter = \"python3\"\n").expect("write config");

        let cwd = std::env::current_dir().expect("cwd");
        let (config, root) = super::load_config(&cwd, Some(&path)).expect("load");
        assert_eq!(config.python.interpreter(), "python3");
        assert_eq!(root, dir.path());
    }

    #[test]
    fn exit_codes_round_trip_into_u8_range() {
        assert_eq!(exit_code_u8(ExitDisposition::Success), 0);
        assert_eq!(exit_code_u8(ExitDisposition::Code(7)), 7);
        assert_eq!(exit_code_u8(ExitDisposition::Interrupted), 130);
        // A code the OS cannot represent degrades to plain failure.
        assert_eq!(exit_code_u8(ExitDisposition::Code(-1)), 1);
    }
}

//! Installed-package location queries through the package installer.
//!
//! The stub source lives inside an installed library's directory, which only
//! the active package installer knows. `pip show` reports it as a
//! `Location:` field; anything short of a parseable location is fatal, so
//! the type checker is never invoked against a half-provisioned search path.

use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("python interpreter '{interpreter}' not found on PATH")]
    InterpreterMissing { interpreter: String },
    #[error("package '{package}' is not installed (pip reported no location)")]
    NotInstalled { package: String },
    #[error("failed to query pip for '{package}': {source}")]
    Query {
        package: String,
        #[source]
        source: std::io::Error,
    },
}

/// Ask the package installer where `package` is installed.
///
/// Runs `<interpreter> -m pip show <package>` with captured output. The
/// interpreter is resolved up front so a missing Python surfaces as its own
/// error instead of a generic spawn failure.
pub async fn installed_location(
    interpreter: &str,
    package: &str,
) -> Result<PathBuf, LocateError> {
    let interpreter_path =
        which::which(interpreter).map_err(|_| LocateError::InterpreterMissing {
            interpreter: interpreter.to_string(),
        })?;

    let output = Command::new(interpreter_path)
        .args(["-m", "pip", "show", package])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|source| LocateError::Query {
            package: package.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(LocateError::NotInstalled {
            package: package.to_string(),
        });
    }

    let report = String::from_utf8_lossy(&output.stdout);
    parse_location(&report).ok_or_else(|| LocateError::NotInstalled {
        package: package.to_string(),
    })
}

/// Extract the `Location:` field from a `pip show` report.
#[must_use]
pub fn parse_location(report: &str) -> Option<PathBuf> {
    report
        .lines()
        .find_map(|line| line.strip_prefix("Location:"))
        .map(|rest| PathBuf::from(rest.trim()))
        .filter(|path| !path.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{LocateError, installed_location, parse_location};

    #[test]
    fn parses_the_location_field() {
        let report = "Name: torch\n\
                      Version: 2.1.0\n\
                      Location: /opt/venv/lib/python3.11/site-packages\n\
                      Requires: filelock, typing-extensions\n";
        assert_eq!(
            parse_location(report),
            Some(PathBuf::from("/opt/venv/lib/python3.11/site-packages"))
        );
    }

    #[test]
    fn missing_or_empty_location_yields_none() {
        assert_eq!(parse_location("Name: torch\nVersion: 2.1.0\n"), None);
        assert_eq!(parse_location("Location:   \n"), None);
        assert_eq!(parse_location(""), None);
    }

    #[test]
    fn location_value_is_trimmed() {
        assert_eq!(
            parse_location("Location:   /some/path  \n"),
            Some(PathBuf::from("/some/path"))
        );
    }

    #[tokio::test]
    async fn missing_interpreter_fails_before_any_spawn() {
        let result = installed_location("mallet-test-no-such-python", "torch").await;
        assert!(matches!(
            result,
            Err(LocateError::InterpreterMissing { .. })
        ));
    }
}

// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! External test output formatter
//!
//! A user-supplied shell command can rewrite each test's captured output
//! before it is rendered. The command gets the output on stdin and its
//! stdout replaces it. Every invocation is bounded by a timeout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use testlens_core::Package;

/// Errors from running the external formatter
#[derive(Debug, Error)]
pub enum FormatterError {
    /// The command could not be started or its pipes failed
    #[error("failed to run test output formatter '{command}': {source}")]
    Spawn {
        /// The formatter command line
        command: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully
    #[error("test output formatter '{command}' exited with {status}, stderr was: {stderr}")]
    Failed {
        /// The formatter command line
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// The command did not finish in time
    #[error("test output formatter '{command}' timed out after {}s", timeout.as_secs())]
    Timeout {
        /// The formatter command line
        command: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },
}

/// Something that rewrites captured test output
#[async_trait]
pub trait OutputFormatter: Send + Sync {
    /// Return the replacement for one output blob
    async fn format(&self, output: &str) -> Result<String, FormatterError>;
}

/// Leaves output untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl OutputFormatter for Passthrough {
    async fn format(&self, output: &str) -> Result<String, FormatterError> {
        Ok(output.to_string())
    }
}

/// Runs a shell command per output blob
#[derive(Debug, Clone)]
pub struct ExternalFormatter {
    command: String,
    timeout: Duration,
}

impl ExternalFormatter {
    /// Create a formatter for `command` with a per-run `timeout`
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    fn shell(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd.exe");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("/bin/bash");
            cmd.arg("-c");
            cmd
        };
        cmd.arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, output: &str) -> Result<String, FormatterError> {
        let spawn_error = |source| FormatterError::Spawn {
            command: self.command.clone(),
            source,
        };

        let mut child = self.shell().spawn().map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            // A command may exit without reading all of its input
            match stdin.write_all(output.as_bytes()).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(spawn_error(e)),
                _ => {}
            }
            drop(stdin);
        }

        let result = child.wait_with_output().await.map_err(spawn_error)?;
        if !result.status.success() {
            return Err(FormatterError::Failed {
                command: self.command.clone(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&result.stdout).into_owned())
    }
}

#[async_trait]
impl OutputFormatter for ExternalFormatter {
    async fn format(&self, output: &str) -> Result<String, FormatterError> {
        debug!(command = %self.command, bytes = output.len(), "running output formatter");
        match tokio::time::timeout(self.timeout, self.run(output)).await {
            Ok(result) => result,
            Err(_) => Err(FormatterError::Timeout {
                command: self.command.clone(),
                timeout: self.timeout,
            }),
        }
    }
}

/// Run the formatter over every non-empty test output in a package
///
/// # Errors
///
/// Returns the first formatter failure.
pub async fn format_package(
    formatter: &dyn OutputFormatter,
    package: &mut Package,
) -> Result<(), FormatterError> {
    for testcase in &mut package.testcases {
        if testcase.output.is_empty() {
            continue;
        }
        testcase.output = formatter.format(&testcase.output).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use testlens_core::{TestCase, TestResult};

    struct Upper;

    #[async_trait]
    impl OutputFormatter for Upper {
        async fn format(&self, output: &str) -> Result<String, FormatterError> {
            Ok(output.to_uppercase())
        }
    }

    fn package_with_outputs(outputs: &[&str]) -> Package {
        Package {
            start_time: None,
            name: "pkg".to_string(),
            result: TestResult::Pass,
            duration: Duration::ZERO,
            coverage: None,
            output: "package output".to_string(),
            testcases: outputs
                .iter()
                .enumerate()
                .map(|(i, output)| TestCase {
                    start_time: None,
                    name: format!("Test{i}"),
                    result: TestResult::Pass,
                    duration: Duration::ZERO,
                    coverage: None,
                    output: (*output).to_string(),
                    cached: false,
                })
                .collect(),
            reason: String::new(),
            cached: false,
        }
    }

    #[tokio::test]
    async fn test_passthrough() {
        assert_eq!(Passthrough.format("as is").await.unwrap(), "as is");
    }

    #[tokio::test]
    async fn test_format_package_skips_empty_output() {
        let mut package = package_with_outputs(&["first", "", "third"]);
        format_package(&Upper, &mut package).await.unwrap();
        let outputs: Vec<_> = package.testcases.iter().map(|tc| tc.output.as_str()).collect();
        assert_eq!(outputs, vec!["FIRST", "", "THIRD"]);
        assert_eq!(package.output, "package output");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_formatter_replaces_output() {
        let formatter = ExternalFormatter::new("tr a-z A-Z", Duration::from_secs(10));
        assert_eq!(formatter.format("hello\nworld").await.unwrap(), "HELLO\nWORLD");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_formatter_failure_includes_stderr() {
        let formatter = ExternalFormatter::new("echo broken >&2; exit 3", Duration::from_secs(10));
        let err = formatter.format("input").await.unwrap_err();
        match &err {
            FormatterError::Failed { stderr, .. } => assert_eq!(stderr.trim(), "broken"),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(err.to_string().contains("stderr was: broken"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_formatter_timeout() {
        let formatter = ExternalFormatter::new("sleep 5", Duration::from_millis(100));
        let err = formatter.format("").await.unwrap_err();
        assert!(matches!(err, FormatterError::Timeout { .. }));
    }
}

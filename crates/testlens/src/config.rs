//! Configuration for the testlens command line
//!
//! This module provides the clap-derived [`Config`], the hide options that
//! feed the renderer, and logging level selection.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::render::RenderSettings;

/// Default ceiling for one run of the external output formatter
pub const DEFAULT_FORMATTER_TIMEOUT_SECS: u64 = 10;

/// testlens - readable summaries of go test output
///
/// Reads `go test -v` or `go test -json` output and prints it grouped by
/// package, with downloads and per-test results.
#[derive(Parser, Debug, Clone)]
#[command(name = "testlens")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Read the test log from this file instead of standard input
    ///
    /// `-` also means standard input.
    #[arg(short, long, env = "TESTLENS_INPUT")]
    pub input: Option<PathBuf>,

    /// Comma-separated list of things to hide from the output
    #[arg(long, env = "TESTLENS_HIDE", value_enum, value_delimiter = ',')]
    pub hide: Vec<Hide>,

    /// Show the test status next to the icons (PASS, FAIL, SKIP)
    #[arg(long, env = "TESTLENS_SHOW_TEST_STATUS", default_value = "false")]
    pub show_test_status: bool,

    /// Shell command that reformats each non-empty test output
    ///
    /// The command receives the output on stdin and must print the
    /// replacement on stdout.
    #[arg(long, env = "TESTLENS_FORMATTER")]
    pub formatter: Option<String>,

    /// Seconds the formatter may run for a single test output
    #[arg(long, env = "TESTLENS_FORMATTER_TIMEOUT", default_value_t = DEFAULT_FORMATTER_TIMEOUT_SECS)]
    pub formatter_timeout: u64,

    /// Exit with 0 even if downloads, packages or tests failed
    #[arg(long, env = "TESTLENS_NOFAIL", default_value = "false")]
    pub nofail: bool,

    /// Output format
    #[arg(long, env = "TESTLENS_FORMAT", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable verbose logging (debug level)
    ///
    /// Logs are written to stderr so rendered output on stdout stays clean.
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            hide: Vec::new(),
            show_test_status: false,
            formatter: None,
            formatter_timeout: DEFAULT_FORMATTER_TIMEOUT_SECS,
            nofail: false,
            format: OutputFormat::Text,
            verbose: false,
            quiet: false,
        }
    }
}

/// Items that can be hidden from the rendered output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Hide {
    /// Hide successful dependency downloads
    SuccessfulDownloads,
    /// Hide packages with only successful tests
    SuccessfulPackages,
    /// Hide packages that have no tests
    EmptyPackages,
    /// Hide successful tests
    SuccessfulTests,
    /// Hide all non-error items
    All,
}

/// How results are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text, streamed as packages finish
    #[default]
    Text,
    /// The complete result as one JSON document
    Json,
}

impl Config {
    /// Input file path, or `None` for standard input
    #[must_use]
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|path| path.as_os_str() != "-")
    }

    /// Renderer settings derived from `--hide` and `--show-test-status`
    #[must_use]
    pub fn render_settings(&self) -> RenderSettings {
        let mut settings = RenderSettings {
            show_test_status: self.show_test_status,
            ..Default::default()
        };
        for hide in &self.hide {
            match hide {
                Hide::SuccessfulDownloads => settings.hide_successful_downloads = true,
                Hide::SuccessfulPackages => settings.hide_successful_packages = true,
                Hide::EmptyPackages => settings.hide_empty_packages = true,
                Hide::SuccessfulTests => settings.hide_successful_tests = true,
                Hide::All => {
                    settings.hide_successful_downloads = true;
                    settings.hide_successful_packages = true;
                    settings.hide_empty_packages = true;
                    settings.hide_successful_tests = true;
                }
            }
        }
        settings
    }

    /// Timeout for a single formatter run
    #[must_use]
    pub fn formatter_timeout(&self) -> Duration {
        Duration::from_secs(self.formatter_timeout)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file is specified but doesn't exist or is a directory
    /// - The formatter command is blank
    /// - The formatter timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(input) = self.input_path() {
            if !input.exists() {
                return Err(ConfigError::InputNotFound(input.clone()));
            }
            if input.is_dir() {
                return Err(ConfigError::InputIsDirectory(input.clone()));
            }
        }
        if self.formatter.as_deref().is_some_and(|cmd| cmd.trim().is_empty()) {
            return Err(ConfigError::EmptyFormatter);
        }
        if self.formatter_timeout == 0 {
            return Err(ConfigError::ZeroFormatterTimeout);
        }
        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Input file not found
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Input path is a directory
    #[error("Input path is a directory: {0}")]
    InputIsDirectory(PathBuf),

    /// Formatter command is empty
    #[error("Formatter command must not be empty")]
    EmptyFormatter,

    /// Formatter timeout is zero
    #[error("Formatter timeout must be at least one second")]
    ZeroFormatterTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.input.is_none());
        assert!(config.hide.is_empty());
        assert!(!config.show_test_status);
        assert!(config.formatter.is_none());
        assert_eq!(config.formatter_timeout, DEFAULT_FORMATTER_TIMEOUT_SECS);
        assert!(!config.nofail);
        assert_eq!(config.format, OutputFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dash_means_stdin() {
        let config = Config {
            input: Some(PathBuf::from("-")),
            ..Default::default()
        };
        assert!(config.input_path().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_render_settings_default() {
        assert_eq!(Config::default().render_settings(), RenderSettings::default());
    }

    #[test]
    fn test_render_settings_hide_all() {
        let config = Config {
            hide: vec![Hide::All],
            show_test_status: true,
            ..Default::default()
        };
        let settings = config.render_settings();
        assert!(settings.hide_successful_downloads);
        assert!(settings.hide_successful_packages);
        assert!(settings.hide_empty_packages);
        assert!(settings.hide_successful_tests);
        assert!(settings.show_test_status);
    }

    #[test]
    fn test_render_settings_selected() {
        let config = Config {
            hide: vec![Hide::EmptyPackages, Hide::SuccessfulTests],
            ..Default::default()
        };
        let settings = config.render_settings();
        assert!(!settings.hide_successful_downloads);
        assert!(!settings.hide_successful_packages);
        assert!(settings.hide_empty_packages);
        assert!(settings.hide_successful_tests);
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(Config::default().log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_log_level_verbose() {
        let config = Config {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_log_level_quiet() {
        let config = Config {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(config.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_validate_missing_input() {
        let config = Config {
            input: Some(PathBuf::from("/nonexistent/go-test-12345.log")),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InputNotFound(_))));
    }

    #[test]
    fn test_validate_directory_input() {
        let config = Config {
            input: Some(std::env::temp_dir()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InputIsDirectory(_))));
    }

    #[test]
    fn test_validate_formatter() {
        let config = Config {
            formatter: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyFormatter)));

        let config = Config {
            formatter: Some("cat".to_string()),
            formatter_timeout: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroFormatterTimeout)));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}

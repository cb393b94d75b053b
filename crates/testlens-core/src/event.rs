// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! Tokenizer events
//!
//! An [`Event`] is the classification of one input line. Events carry no
//! identity beyond their position in the stream.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a classified line says happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// A test started (`=== RUN`)
    Run,
    /// A parallel test yielded (`=== PAUSE`)
    Pause,
    /// A parallel test resumed (`=== CONT`)
    Cont,
    /// A test or package passed
    Pass,
    /// A test or package failed
    Fail,
    /// A test or package was skipped
    Skip,
    /// Bare `PASS` sentinel closing a run
    PassFinal,
    /// Bare `FAIL` sentinel closing a run
    FailFinal,
    /// Bare `SKIP` sentinel closing a run
    SkipFinal,
    /// A dependency is being downloaded
    Download,
    /// A dependency download reported a diagnostic
    DownloadFailed,
    /// `# <package>` banner announcing build output for a package
    Package,
    /// Coverage percentage line
    Coverage,
    /// `coverage: [no statements]`
    #[serde(rename = "coverage_nostatements")]
    CoverageNoStatements,
    /// Free text with no structural meaning of its own
    Stdout,
}

impl Action {
    /// Whether the action belongs to the dependency download phase
    #[must_use]
    pub fn is_download(self) -> bool {
        matches!(self, Self::Download | Self::DownloadFailed)
    }

    /// Whether the action reports a terminal result for a test or package
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Pass | Self::Fail | Self::Skip)
    }

    /// Whether the action is one of the bare whole-run sentinels
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::PassFinal | Self::FailFinal | Self::SkipFinal)
    }

    /// Snake-case name as used in serialized events
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Pause => "pause",
            Self::Cont => "cont",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::PassFinal => "pass_final",
            Self::FailFinal => "fail_final",
            Self::SkipFinal => "skip_final",
            Self::Download => "download",
            Self::DownloadFailed => "download_failed",
            Self::Package => "package",
            Self::Coverage => "coverage",
            Self::CoverageNoStatements => "coverage_nostatements",
            Self::Stdout => "stdout",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified line of runner output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Classification of the line
    pub action: Action,
    /// Package under test, empty if the line does not name one
    #[serde(default)]
    pub package: String,
    /// Dependency version for download actions
    #[serde(default)]
    pub version: String,
    /// Hierarchical test name (`TestX/sub/case`), empty if none
    #[serde(default)]
    pub test: String,
    /// Elapsed time reported by the line, zero if unknown
    #[serde(default, with = "crate::duration::go_format")]
    pub elapsed: Duration,
    /// Captured free text
    #[serde(default)]
    pub output: String,
    /// Result was reused from the runner's cache
    #[serde(default)]
    pub cached: bool,
    /// Coverage percentage, `None` when the line reports none
    #[serde(default)]
    pub coverage: Option<f64>,
    /// Wall-clock classification time (or the JSON record's own timestamp)
    #[serde(skip)]
    pub received_at: DateTime<Utc>,
    /// The line came from a JSON record, so `package`/`test` are authoritative
    #[serde(skip)]
    pub json: bool,
}

impl Event {
    /// Create an event with the given action and every other field empty
    #[must_use]
    pub fn new(action: Action) -> Self {
        Self {
            action,
            package: String::new(),
            version: String::new(),
            test: String::new(),
            elapsed: Duration::ZERO,
            output: String::new(),
            cached: false,
            coverage: None,
            received_at: Utc::now(),
            json: false,
        }
    }

    /// Set the package name
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Set the test name
    #[must_use]
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = test.into();
        self
    }

    /// Set the captured output
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Set the dependency version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the elapsed time
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Mark the event as JSON-sourced
    #[must_use]
    pub fn json_sourced(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Events compare on content only; `received_at` is an ordering aid and is ignored.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.action == other.action
            && self.package == other.package
            && self.version == other.version
            && self.test == other.test
            && self.elapsed == other.elapsed
            && self.output == other.output
            && self.cached == other.cached
            && self.coverage == other.coverage
            && self.json == other.json
    }
}

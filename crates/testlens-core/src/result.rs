//! Test result types
//!
//! The structured model the aggregator emits: one [`Downloads`] summary and a
//! sequence of [`Package`] records, each owning its sorted [`TestCase`] list.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a test case or package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestResult {
    /// Passed
    #[serde(rename = "PASS")]
    Pass,
    /// Failed, or never reported a result
    #[serde(rename = "FAIL")]
    Fail,
    /// Skipped
    #[serde(rename = "SKIP")]
    Skip,
}

impl TestResult {
    /// The runner's own spelling (`PASS`, `FAIL`, `SKIP`)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single test or subtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Earliest time this test was seen in the stream
    #[serde(skip)]
    pub start_time: Option<DateTime<Utc>>,
    /// Test name; subtests use `/` separated path segments
    pub name: String,
    /// Outcome
    pub result: TestResult,
    /// Time the test took
    #[serde(with = "crate::duration::go_format")]
    pub duration: Duration,
    /// Coverage percentage, when reported
    pub coverage: Option<f64>,
    /// Captured output
    pub output: String,
    /// Result came from the runner's cache
    #[serde(default)]
    pub cached: bool,
}

impl TestCase {
    /// Test name with `/` replaced, usable as an anchor
    #[must_use]
    pub fn id(&self) -> String {
        self.name.replace('/', "_")
    }

    /// Start time plus duration, if the start time is known
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        let duration = chrono::Duration::from_std(self.duration).ok()?;
        self.start_time.map(|start| start + duration)
    }

    /// Whether this is a subtest of another test
    #[must_use]
    pub fn is_subtest(&self) -> bool {
        self.name.contains('/')
    }
}

/// One test suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Earliest time this package was seen in the stream
    #[serde(skip)]
    pub start_time: Option<DateTime<Utc>>,
    /// Package import path
    pub name: String,
    /// Outcome of the package as a whole
    pub result: TestResult,
    /// Time the package took
    #[serde(with = "crate::duration::go_format")]
    pub duration: Duration,
    /// Coverage percentage, when reported
    pub coverage: Option<f64>,
    /// Output not attributable to any test, such as a build failure
    pub output: String,
    /// Test cases sorted by hierarchical name
    #[serde(default)]
    pub testcases: Vec<TestCase>,
    /// Why the package ended the way it did, when the runner says
    #[serde(default)]
    pub reason: String,
    /// Result came from the runner's cache
    #[serde(default)]
    pub cached: bool,
}

impl Package {
    /// Package name with `.` and `/` replaced, usable as an anchor
    #[must_use]
    pub fn id(&self) -> String {
        self.name.replace(['.', '/'], "_")
    }

    /// Start time plus duration, if the start time is known
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        let duration = chrono::Duration::from_std(self.duration).ok()?;
        self.start_time.map(|start| start + duration)
    }

    /// Look up a test case by exact name
    #[must_use]
    pub fn testcase(&self, name: &str) -> Option<&TestCase> {
        self.testcases.iter().find(|tc| tc.name == name)
    }

    /// Test cases that failed
    #[must_use]
    pub fn failing_tests(&self) -> Vec<&TestCase> {
        self.testcases
            .iter()
            .filter(|tc| tc.result == TestResult::Fail)
            .collect()
    }

    /// Whether the package failed as a whole
    #[must_use]
    pub fn failed(&self) -> bool {
        self.result == TestResult::Fail
    }
}

/// One dependency fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    /// Module path
    pub package: String,
    /// Module version, empty when the diagnostic did not name one
    pub version: String,
    /// The fetch failed
    pub failed: bool,
    /// Failure diagnostic, one line per reported line
    pub reason: String,
}

/// Summary of the dependency download phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downloads {
    /// Downloads in first-seen order
    pub packages: Vec<Download>,
    /// Any download failed or a free-standing failure reason was recorded
    pub failed: bool,
    /// Failure text not tied to a single module (e.g. `go.mod` updates needed)
    #[serde(default)]
    pub reason: String,
    /// First download activity
    #[serde(skip)]
    pub start_time: Option<DateTime<Utc>>,
    /// Last download activity
    #[serde(skip)]
    pub end_time: Option<DateTime<Utc>>,
}

impl Downloads {
    /// Whether no download activity was seen at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.reason.is_empty()
    }
}

/// Everything the aggregator produced for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    /// Raw lines seen before any recognized activity
    pub prefix: Vec<String>,
    /// The download phase summary
    pub downloads: Downloads,
    /// Packages in emission order
    pub packages: Vec<Package>,
}

impl ParseResult {
    /// Whether any download or package failed
    #[must_use]
    pub fn failed(&self) -> bool {
        self.downloads.failed || self.packages.iter().any(Package::failed)
    }

    /// Look up a package by name
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }
}

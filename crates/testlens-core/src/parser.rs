// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! Event aggregator
//!
//! [`EventParser`] consumes tokenizer events in order and rebuilds the
//! result model. It keeps three trackers:
//!
//! - a prefix collector for text seen before any recognized activity,
//! - a downloads tracker for the dependency fetch phase,
//! - a package tracker holding one scope per package with its test cases.
//!
//! Output comes back as [`Emission`]s as soon as each piece is final: prefix
//! lines immediately, the single [`Downloads`] summary when the first
//! non-download event arrives, and each [`Package`] when its own terminal
//! line is seen. [`EventParser::finish`] flushes whatever is still open.
//!
//! # Example
//!
//! ```
//! use testlens_core::parser::parse_output;
//! use testlens_core::result::TestResult;
//!
//! let result = parse_output("=== RUN   TestX\n--- PASS: TestX (0.00s)\nPASS\nok  \tpkg\t0.019s\n").unwrap();
//! assert_eq!(result.packages[0].name, "pkg");
//! assert_eq!(result.packages[0].testcases[0].result, TestResult::Pass);
//! ```

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::error::LensError;
use crate::event::{Action, Event};
use crate::ordering::{compare_test_names, trim_trailing_newlines};
use crate::result::{Download, Downloads, Package, ParseResult, TestCase, TestResult};
use crate::tokenizer::Tokenizer;

/// One finished piece of output from the aggregator
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// A raw line seen before any recognized activity
    Prefix(String),
    /// The download phase summary, emitted exactly once
    Downloads(Downloads),
    /// A finalized package
    Package(Package),
}

// ============================================================================
// Downloads tracker
// ============================================================================

static MISSING_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"no required module provides package (?P<package>\S+);")
        .expect("download diagnostic pattern must compile")
});

const GO_MOD_UPDATE: &str = "updates to go.mod needed";

/// Where continuation lines of a download diagnostic go
#[derive(Debug, Clone, Copy)]
enum DownloadCursor {
    Entry(usize),
    Global,
}

#[derive(Debug)]
struct DownloadTracker {
    entries: Vec<Download>,
    index: HashMap<String, usize>,
    reason: String,
    last: Option<DownloadCursor>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    open: bool,
}

impl DownloadTracker {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            reason: String::new(),
            last: None,
            start_time: None,
            end_time: None,
            open: true,
        }
    }

    fn entry(&mut self, package: &str, at: DateTime<Utc>) -> &mut Download {
        self.start_time.get_or_insert(at);
        self.end_time = Some(at);
        let idx = match self.index.get(package) {
            Some(&idx) => idx,
            None => {
                self.entries.push(Download {
                    package: package.to_string(),
                    version: String::new(),
                    failed: false,
                    reason: String::new(),
                });
                let idx = self.entries.len() - 1;
                self.index.insert(package.to_string(), idx);
                idx
            }
        };
        self.last = Some(DownloadCursor::Entry(idx));
        &mut self.entries[idx]
    }

    fn record(&mut self, event: &Event) -> Result<(), LensError> {
        if !self.open {
            return Err(LensError::DownloadPhaseClosed {
                package: event.package.clone(),
            });
        }
        let entry = self.entry(&event.package, event.received_at);
        if !event.version.is_empty() {
            entry.version.clone_from(&event.version);
        }
        if event.action == Action::DownloadFailed {
            entry.failed = true;
            push_line(&mut entry.reason, &event.output);
        }
        Ok(())
    }

    /// Recognize a download failure printed as free text
    fn record_diagnostic(&mut self, line: &str, at: DateTime<Utc>) -> bool {
        if let Some(caps) = MISSING_MODULE.captures(line) {
            let entry = self.entry(&caps["package"], at);
            entry.failed = true;
            push_line(&mut entry.reason, line);
            return true;
        }
        if line.contains(GO_MOD_UPDATE) {
            push_line(&mut self.reason, line);
            self.last = Some(DownloadCursor::Global);
            self.end_time = Some(at);
            return true;
        }
        false
    }

    /// Continue the most recent download diagnostic, if there is one
    fn continue_last(&mut self, line: &str) -> bool {
        match self.last {
            Some(DownloadCursor::Entry(idx)) => push_line(&mut self.entries[idx].reason, line),
            Some(DownloadCursor::Global) => push_line(&mut self.reason, line),
            None => return false,
        }
        true
    }

    fn close(&mut self) -> Downloads {
        self.open = false;
        self.last = None;
        self.index.clear();

        let mut packages = std::mem::take(&mut self.entries);
        for download in &mut packages {
            trim_trailing_newlines(&mut download.reason);
        }
        let reason = std::mem::take(&mut self.reason).trim().to_string();
        let failed = !reason.is_empty() || packages.iter().any(|d| d.failed);
        debug!(downloads = packages.len(), failed, "download phase closed");

        Downloads {
            packages,
            failed,
            reason,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

// ============================================================================
// Package tracker
// ============================================================================

/// Identity of a package scope
///
/// Plain-text test lines do not name their package; they collect in the
/// pending scope until a package-level terminal line adopts it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ScopeKey {
    Named(String),
    Pending,
}

impl ScopeKey {
    fn of(event: &Event) -> Self {
        if event.package.is_empty() {
            Self::Pending
        } else {
            Self::Named(event.package.clone())
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Pending => "",
        }
    }
}

#[derive(Debug)]
struct TestEntry {
    name: String,
    start_time: Option<DateTime<Utc>>,
    result: Option<TestResult>,
    duration: Duration,
    coverage: Option<f64>,
    output: String,
    cached: bool,
}

impl TestEntry {
    fn new(name: &str, at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            start_time: Some(at),
            result: None,
            duration: Duration::ZERO,
            coverage: None,
            output: String::new(),
            cached: false,
        }
    }

    fn into_testcase(self) -> TestCase {
        let mut output = self.output;
        trim_trailing_newlines(&mut output);
        let result = self.result.unwrap_or_else(|| {
            debug!(test = %self.name, "test never reported a result, marking it failed");
            TestResult::Fail
        });
        TestCase {
            start_time: self.start_time,
            name: self.name,
            result,
            duration: self.duration,
            coverage: self.coverage,
            output,
            cached: self.cached,
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    start_time: Option<DateTime<Utc>>,
    result: Option<TestResult>,
    duration: Duration,
    coverage: Option<f64>,
    output: String,
    reason: String,
    cached: bool,
    tests: Vec<TestEntry>,
    test_index: HashMap<String, usize>,
}

impl Scope {
    fn test(&mut self, name: &str, at: DateTime<Utc>) -> &mut TestEntry {
        let idx = match self.test_index.get(name) {
            Some(&idx) => idx,
            None => {
                self.tests.push(TestEntry::new(name, at));
                self.test_index.insert(name.to_string(), self.tests.len() - 1);
                self.tests.len() - 1
            }
        };
        &mut self.tests[idx]
    }

    fn is_empty(&self) -> bool {
        self.tests.is_empty() && self.output.is_empty() && self.reason.is_empty()
    }

    /// Merge a scope that turned out to belong to this one
    fn absorb(&mut self, other: Scope) {
        self.start_time = match (self.start_time, other.start_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.result = self.result.or(other.result);
        self.coverage = self.coverage.or(other.coverage);
        self.cached |= other.cached;
        self.output.push_str(&other.output);
        self.reason.push_str(&other.reason);
        for entry in other.tests {
            if !self.test_index.contains_key(&entry.name) {
                self.test_index.insert(entry.name.clone(), self.tests.len());
                self.tests.push(entry);
            }
        }
    }

    fn into_package(self, name: String) -> Package {
        let mut tests = self.tests;
        tests.sort_by(|a, b| compare_test_names(&a.name, &b.name));
        let testcases = tests.into_iter().map(TestEntry::into_testcase).collect();

        let result = self.result.unwrap_or_else(|| {
            warn!(package = %name, "package ended without a result, marking it failed");
            TestResult::Fail
        });
        let mut output = self.output;
        let mut reason = self.reason;
        trim_trailing_newlines(&mut output);
        trim_trailing_newlines(&mut reason);

        Package {
            start_time: self.start_time,
            name,
            result,
            duration: self.duration,
            coverage: self.coverage,
            output,
            testcases,
            reason,
            cached: self.cached,
        }
    }
}

#[derive(Debug, Default)]
struct PackageTracker {
    order: Vec<ScopeKey>,
    scopes: HashMap<ScopeKey, Scope>,
    closed: HashSet<String>,
    /// Tests between their RUN and their result, most recently active last
    open_tests: Vec<(ScopeKey, String)>,
    /// Last test that failed or skipped; owns trailing diagnostics while no
    /// test is open
    trailing: Option<(ScopeKey, String)>,
    current_package: Option<ScopeKey>,
}

impl PackageTracker {
    fn is_closed(&self, key: &ScopeKey) -> bool {
        matches!(key, ScopeKey::Named(name) if self.closed.contains(name))
    }

    /// Get or open a scope; a newly opened scope becomes the current package
    fn scope(&mut self, key: &ScopeKey, at: DateTime<Utc>) -> &mut Scope {
        if !self.scopes.contains_key(key) {
            trace!(package = key.name(), "opening package scope");
            self.order.push(key.clone());
            self.current_package = Some(key.clone());
        }
        let scope = self.scopes.entry(key.clone()).or_default();
        scope.start_time.get_or_insert(at);
        scope
    }

    /// Move a test to the top of the open list
    fn activate(&mut self, key: ScopeKey, test: &str) {
        self.trailing = None;
        self.deactivate(&key, test);
        self.open_tests.push((key, test.to_string()));
    }

    fn deactivate(&mut self, key: &ScopeKey, test: &str) {
        self.open_tests.retain(|(k, t)| !(k == key && t == test));
    }

    fn open_banner(&mut self, event: &Event) {
        let key = ScopeKey::of(event);
        if self.is_closed(&key) {
            debug!(package = %event.package, "ignoring banner for an emitted package");
            return;
        }
        self.scope(&key, event.received_at);
        self.current_package = Some(key);
        self.open_tests.clear();
        self.trailing = None;
    }

    fn test_boundary(&mut self, event: &Event) {
        if event.test.is_empty() {
            debug!(action = %event.action, "ignoring test boundary without a test name");
            return;
        }
        let key = ScopeKey::of(event);
        if self.is_closed(&key) {
            debug!(package = %event.package, test = %event.test, "ignoring late test event");
            return;
        }
        self.scope(&key, event.received_at)
            .test(&event.test, event.received_at);
        // A paused test stays open but only the next RUN or CONT moves the cursor.
        if event.action != Action::Pause {
            self.activate(key, &event.test);
        }
    }

    fn finish_test(&mut self, event: &Event, result: TestResult) {
        let key = ScopeKey::of(event);
        if self.is_closed(&key) {
            debug!(package = %event.package, test = %event.test, "ignoring late test result");
            return;
        }
        let test = self
            .scope(&key, event.received_at)
            .test(&event.test, event.received_at);
        test.result = Some(result);
        test.duration = event.elapsed;
        test.cached |= event.cached;
        self.deactivate(&key, &event.test);
        self.trailing = (result != TestResult::Pass).then(|| (key, event.test.clone()));
    }

    fn finish_package(&mut self, event: &Event, result: TestResult) -> Option<Package> {
        if event.package.is_empty() {
            debug!(action = %event.action, "ignoring terminal event without a package");
            return None;
        }
        let key = ScopeKey::Named(event.package.clone());
        if self.is_closed(&key) {
            debug!(package = %event.package, "ignoring repeated package result");
            return None;
        }
        self.adopt_pending(&key);

        let scope = self.scope(&key, event.received_at);
        scope.result = Some(result);
        scope.duration = event.elapsed;
        if event.coverage.is_some() {
            scope.coverage = event.coverage;
        }
        scope.cached |= event.cached;
        if !event.output.is_empty() {
            push_line(&mut scope.reason, &event.output);
        }
        self.close(&key)
    }

    /// Hand the pending scope's tests to the package that just finished
    fn adopt_pending(&mut self, key: &ScopeKey) {
        let Some(pending) = self.scopes.remove(&ScopeKey::Pending) else {
            return;
        };
        self.order.retain(|k| *k != ScopeKey::Pending);
        trace!(package = key.name(), tests = pending.tests.len(), "adopting pending scope");

        match self.scopes.get_mut(key) {
            Some(existing) => existing.absorb(pending),
            None => {
                self.order.push(key.clone());
                self.scopes.insert(key.clone(), pending);
            }
        }
        for (scope_key, _) in self.open_tests.iter_mut().chain(self.trailing.as_mut()) {
            if *scope_key == ScopeKey::Pending {
                *scope_key = key.clone();
            }
        }
        if self.current_package == Some(ScopeKey::Pending) {
            self.current_package = Some(key.clone());
        }
    }

    fn finish_run(&mut self, event: &Event, result: TestResult) {
        self.open_tests.clear();
        self.trailing = None;
        let key = if event.package.is_empty() {
            self.current_package.clone()
        } else {
            Some(ScopeKey::Named(event.package.clone()))
        };
        match key.filter(|key| !self.is_closed(key)) {
            Some(key) => self.scope(&key, event.received_at).result = Some(result),
            None => debug!(action = %event.action, "no open package for run sentinel"),
        }
    }

    fn record_coverage(&mut self, event: &Event) {
        let Some(coverage) = event.coverage else {
            return;
        };
        let key = if event.package.is_empty() {
            self.current_package.clone()
        } else {
            Some(ScopeKey::Named(event.package.clone()))
        };
        let Some(key) = key.filter(|key| !self.is_closed(key)) else {
            debug!(coverage, "no open package for coverage line");
            return;
        };
        let scope = self.scope(&key, event.received_at);
        scope.coverage = Some(coverage);
        if !event.test.is_empty() {
            scope.test(&event.test, event.received_at).coverage = Some(coverage);
        }
    }

    fn append_output(&mut self, key: &ScopeKey, test: &str, line: &str, at: DateTime<Utc>) {
        let scope = self.scope(key, at);
        if test.is_empty() {
            push_line(&mut scope.output, line);
        } else {
            push_line(&mut scope.test(test, at).output, line);
        }
    }

    /// Attribute untagged output to the most recently active open test,
    /// then to a just-failed test, then to the current package
    fn attribute(&mut self, line: &str, at: DateTime<Utc>) -> bool {
        let owner = self.open_tests.last().or(self.trailing.as_ref()).cloned();
        if let Some((key, test)) = owner {
            self.append_output(&key, &test, line, at);
            return true;
        }
        if let Some(key) = self.current_package.clone() {
            self.append_output(&key, "", line, at);
            return true;
        }
        false
    }

    fn close(&mut self, key: &ScopeKey) -> Option<Package> {
        let scope = self.scopes.remove(key)?;
        self.order.retain(|k| k != key);
        if let ScopeKey::Named(name) = key {
            self.closed.insert(name.clone());
        }
        self.open_tests.retain(|(k, _)| k != key);
        if self.trailing.as_ref().is_some_and(|(k, _)| k == key) {
            self.trailing = None;
        }
        if self.current_package.as_ref() == Some(key) {
            self.current_package = None;
        }
        let package = scope.into_package(key.name().to_string());
        debug!(package = %package.name, result = %package.result, tests = package.testcases.len(), "package finished");
        Some(package)
    }

    /// Close every scope still open, in first-seen order
    fn flush(&mut self) -> Vec<Package> {
        let order = std::mem::take(&mut self.order);
        let mut packages = Vec::with_capacity(order.len());
        for key in order {
            if key == ScopeKey::Pending && self.scopes.get(&key).is_some_and(Scope::is_empty) {
                self.scopes.remove(&key);
                continue;
            }
            if let Some(package) = self.close(&key) {
                packages.push(package);
            }
        }
        packages
    }
}

fn push_line(target: &mut String, line: &str) {
    target.push_str(line);
    target.push('\n');
}

// ============================================================================
// Event parser
// ============================================================================

/// The event aggregator
///
/// Feed events in arrival order with [`process`](Self::process) and call
/// [`finish`](Self::finish) once the stream ends.
#[derive(Debug)]
pub struct EventParser {
    prefix_open: bool,
    downloads: DownloadTracker,
    packages: PackageTracker,
}

impl EventParser {
    /// Create an aggregator with all three phases open
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix_open: true,
            downloads: DownloadTracker::new(),
            packages: PackageTracker::default(),
        }
    }

    /// Whether raw lines are still being collected as prefix text
    #[must_use]
    pub fn is_prefix_open(&self) -> bool {
        self.prefix_open
    }

    /// Whether the download summary has not been emitted yet
    #[must_use]
    pub fn is_downloads_open(&self) -> bool {
        self.downloads.open
    }

    /// Consume one event
    ///
    /// Returns whatever became final as a result, in emission order.
    ///
    /// # Errors
    ///
    /// - [`LensError::DownloadPhaseClosed`] if a download event arrives after
    ///   the download summary was emitted.
    /// - [`LensError::UnattributedOutput`] if free text arrives with no scope
    ///   that could own it.
    pub fn process(&mut self, event: Event) -> Result<Vec<Emission>, LensError> {
        let mut emitted = Vec::new();
        match event.action {
            Action::Download | Action::DownloadFailed => {
                self.downloads.record(&event)?;
                self.prefix_open = false;
            }
            Action::Stdout => self.process_output(event, &mut emitted)?,
            action => {
                self.close_downloads(&mut emitted);
                let packages = &mut self.packages;
                match action {
                    Action::Package => packages.open_banner(&event),
                    Action::Run | Action::Pause | Action::Cont => packages.test_boundary(&event),
                    Action::Pass | Action::Fail | Action::Skip => {
                        let result = terminal_result(action);
                        if event.test.is_empty() {
                            emitted.extend(packages.finish_package(&event, result).map(Emission::Package));
                        } else {
                            packages.finish_test(&event, result);
                        }
                    }
                    Action::PassFinal | Action::FailFinal | Action::SkipFinal => {
                        packages.finish_run(&event, terminal_result(action));
                    }
                    Action::Coverage => packages.record_coverage(&event),
                    Action::CoverageNoStatements => {
                        trace!(package = %event.package, "package has no statements");
                    }
                    Action::Download | Action::DownloadFailed | Action::Stdout => {}
                }
            }
        }
        Ok(emitted)
    }

    fn process_output(&mut self, event: Event, emitted: &mut Vec<Emission>) -> Result<(), LensError> {
        let at = event.received_at;

        if event.json && !event.package.is_empty() {
            let key = ScopeKey::Named(event.package);
            if self.packages.is_closed(&key) {
                debug!(package = key.name(), "ignoring output for an emitted package");
                return Ok(());
            }
            self.close_downloads(emitted);
            self.packages.append_output(&key, &event.test, &event.output, at);
            return Ok(());
        }

        if self.downloads.open && !event.json && self.downloads.record_diagnostic(&event.output, at) {
            self.prefix_open = false;
            return Ok(());
        }
        if self.packages.attribute(&event.output, at) {
            return Ok(());
        }
        if self.downloads.open && self.downloads.continue_last(&event.output) {
            return Ok(());
        }
        if self.prefix_open {
            emitted.push(Emission::Prefix(event.output));
            return Ok(());
        }
        if event.output.is_empty() || event.output.starts_with("exit status ") {
            debug!(output = %event.output, "dropping unattributed exit status line");
            return Ok(());
        }
        Err(LensError::UnattributedOutput {
            output: event.output,
        })
    }

    fn close_downloads(&mut self, emitted: &mut Vec<Emission>) {
        self.prefix_open = false;
        if self.downloads.open {
            emitted.push(Emission::Downloads(self.downloads.close()));
        }
    }

    /// End of stream: emit the downloads summary if still pending, then
    /// every package that never saw its terminal line
    #[must_use]
    pub fn finish(mut self) -> Vec<Emission> {
        let mut emitted = Vec::new();
        self.close_downloads(&mut emitted);
        emitted.extend(self.packages.flush().into_iter().map(Emission::Package));
        emitted
    }
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

fn terminal_result(action: Action) -> TestResult {
    match action {
        Action::Pass | Action::PassFinal => TestResult::Pass,
        Action::Skip | Action::SkipFinal => TestResult::Skip,
        _ => TestResult::Fail,
    }
}

// ============================================================================
// Convenience entry points
// ============================================================================

impl Extend<Emission> for ParseResult {
    fn extend<I: IntoIterator<Item = Emission>>(&mut self, iter: I) {
        for emission in iter {
            match emission {
                Emission::Prefix(line) => self.prefix.push(line),
                Emission::Downloads(downloads) => self.downloads = downloads,
                Emission::Package(package) => self.packages.push(package),
            }
        }
    }
}

/// Aggregate an already tokenized event sequence
///
/// # Errors
///
/// Returns the first aggregation error; see [`EventParser::process`].
pub fn parse_events(events: impl IntoIterator<Item = Event>) -> Result<ParseResult, LensError> {
    let mut parser = EventParser::new();
    let mut result = ParseResult::default();
    for event in events {
        result.extend(parser.process(event)?);
    }
    result.extend(parser.finish());
    Ok(result)
}

/// Tokenize and aggregate a reader synchronously
///
/// # Errors
///
/// Returns the first I/O, tokenization or aggregation error.
pub fn parse_reader(reader: impl BufRead) -> Result<ParseResult, LensError> {
    let mut parser = EventParser::new();
    let mut result = ParseResult::default();
    for event in Tokenizer::events(reader) {
        result.extend(parser.process(event?)?);
    }
    result.extend(parser.finish());
    Ok(result)
}

/// Tokenize and aggregate a complete transcript
///
/// # Errors
///
/// Returns the first tokenization or aggregation error.
pub fn parse_output(output: &str) -> Result<ParseResult, LensError> {
    parse_reader(output.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn run(events: Vec<Event>) -> ParseResult {
        parse_events(events).expect("parse")
    }

    fn stdout(line: &str) -> Event {
        Event::new(Action::Stdout).with_output(line)
    }

    #[test]
    fn test_empty_stream_emits_empty_downloads() {
        let emitted = EventParser::new().finish();
        assert_eq!(emitted, vec![Emission::Downloads(Downloads::default())]);
    }

    #[test]
    fn test_prefix_lines_before_activity() {
        let result = run(vec![
            stdout("banner one"),
            stdout(""),
            Event::new(Action::Pass).with_package("pkg"),
        ]);
        assert_eq!(result.prefix, vec!["banner one", ""]);
        assert_eq!(result.packages.len(), 1);
    }

    #[test]
    fn test_downloads_emitted_before_first_package() {
        let mut parser = EventParser::new();
        let emitted = parser
            .process(Event::new(Action::Download).with_package("mod").with_version("v1.0.0"))
            .unwrap();
        assert!(emitted.is_empty());
        assert!(!parser.is_prefix_open());
        assert!(parser.is_downloads_open());

        let emitted = parser
            .process(Event::new(Action::Pass).with_package("pkg"))
            .unwrap();
        assert_eq!(emitted.len(), 2);
        let Emission::Downloads(downloads) = &emitted[0] else {
            panic!("expected downloads first, got {:?}", emitted[0]);
        };
        assert_eq!(downloads.packages.len(), 1);
        assert_eq!(downloads.packages[0].version, "v1.0.0");
        assert!(!downloads.failed);
        assert!(matches!(&emitted[1], Emission::Package(p) if p.name == "pkg"));
    }

    #[test]
    fn test_download_after_phase_closed_is_fatal() {
        let mut parser = EventParser::new();
        parser.process(Event::new(Action::Run).with_test("TestA")).unwrap();
        let err = parser
            .process(Event::new(Action::Download).with_package("late"))
            .unwrap_err();
        assert!(matches!(err, LensError::DownloadPhaseClosed { package } if package == "late"));
    }

    #[test]
    fn test_download_failure_reason_lines() {
        let result = run(vec![
            Event::new(Action::DownloadFailed)
                .with_package("example.com/gone")
                .with_version("v0.1.0")
                .with_output("reading example.com/gone: 404 Not Found"),
            stdout("\tserver response: not found"),
        ]);
        let download = &result.downloads.packages[0];
        assert!(download.failed);
        assert_eq!(
            download.reason,
            "reading example.com/gone: 404 Not Found\n\tserver response: not found"
        );
        assert!(result.downloads.failed);
    }

    #[test]
    fn test_download_diagnostics_in_free_text() {
        let result = run(vec![
            stdout("main.go:3:8: no required module provides package example.com/x; to add it:"),
            stdout("\tgo get example.com/x"),
        ]);
        assert!(result.prefix.is_empty());
        assert!(result.downloads.failed);
        assert_eq!(result.downloads.packages[0].package, "example.com/x");
        assert!(result.downloads.packages[0].reason.ends_with("\tgo get example.com/x"));

        let result = run(vec![
            stdout("go: updates to go.mod needed; to update it:"),
            stdout("\tgo mod tidy"),
            stdout(""),
        ]);
        assert!(result.downloads.failed);
        assert_eq!(
            result.downloads.reason,
            "go: updates to go.mod needed; to update it:\n\tgo mod tidy"
        );
    }

    #[test]
    fn test_output_follows_current_test() {
        let result = run(vec![
            Event::new(Action::Run).with_test("TestA"),
            stdout("hello from A"),
            Event::new(Action::Fail).with_test("TestA"),
            stdout("    a_test.go:9: after the fail line"),
            Event::new(Action::FailFinal),
            stdout("trailer after the run"),
            Event::new(Action::Fail).with_package("pkg"),
        ]);
        let package = &result.packages[0];
        assert_eq!(package.name, "pkg");
        assert_eq!(
            package.testcases[0].output,
            "hello from A\n    a_test.go:9: after the fail line"
        );
        assert_eq!(package.testcases[0].result, TestResult::Fail);
        assert_eq!(package.output, "trailer after the run");
    }

    #[test]
    fn test_output_after_subtest_goes_to_parent() {
        let result = run(vec![
            Event::new(Action::Run).with_test("TestA"),
            Event::new(Action::Run).with_test("TestA/sub"),
            stdout("from sub"),
            Event::new(Action::Fail).with_test("TestA/sub"),
            stdout("parent log line"),
            Event::new(Action::Pass).with_test("TestA"),
            Event::new(Action::PassFinal),
            Event::new(Action::Pass).with_package("pkg"),
        ]);
        let package = &result.packages[0];
        // The parent is still open, so it wins over the failed subtest
        assert_eq!(package.testcase("TestA").unwrap().output, "parent log line");
        assert_eq!(package.testcase("TestA/sub").unwrap().output, "from sub");
        assert_eq!(package.output, "");
    }

    #[test]
    fn test_non_verbose_failure_output() {
        let result = run(vec![
            Event::new(Action::Fail).with_test("TestA"),
            Event::new(Action::Fail).with_test("TestA/sub"),
            stdout("        a_test.go:12: Failed"),
            Event::new(Action::Pass).with_test("TestA/ok"),
            stdout("package level"),
            Event::new(Action::FailFinal),
            Event::new(Action::Fail).with_package("pkg"),
        ]);
        let package = &result.packages[0];
        assert_eq!(package.testcase("TestA").unwrap().output, "");
        assert_eq!(
            package.testcase("TestA/sub").unwrap().output,
            "        a_test.go:12: Failed"
        );
        assert_eq!(package.testcase("TestA/ok").unwrap().output, "");
        assert_eq!(package.output, "package level");
    }

    #[test]
    fn test_output_between_tests_goes_to_package() {
        let result = run(vec![
            Event::new(Action::Run).with_test("TestA"),
            Event::new(Action::Pass).with_test("TestA"),
            stdout("between tests"),
            Event::new(Action::Run).with_test("TestB"),
            stdout("from B"),
            Event::new(Action::Pass).with_test("TestB"),
            Event::new(Action::PassFinal),
            Event::new(Action::Pass).with_package("pkg"),
        ]);
        let package = &result.packages[0];
        assert_eq!(package.testcase("TestA").unwrap().output, "");
        assert_eq!(package.testcase("TestB").unwrap().output, "from B");
        assert_eq!(package.output, "between tests");
    }

    #[test]
    fn test_finished_parallel_test_hands_cursor_back() {
        let result = run(vec![
            Event::new(Action::Run).with_test("TestA"),
            Event::new(Action::Run).with_test("TestB"),
            Event::new(Action::Cont).with_test("TestA"),
            Event::new(Action::Cont).with_test("TestB"),
            Event::new(Action::Pass).with_test("TestB"),
            stdout("A again"),
            Event::new(Action::Pass).with_test("TestA"),
            Event::new(Action::Pass).with_package("pkg"),
        ]);
        let package = &result.packages[0];
        assert_eq!(package.testcase("TestA").unwrap().output, "A again");
        assert_eq!(package.testcase("TestB").unwrap().output, "");
    }

    #[test]
    fn test_pause_keeps_cursor() {
        let result = run(vec![
            Event::new(Action::Run).with_test("TestA"),
            Event::new(Action::Run).with_test("TestB"),
            Event::new(Action::Pause).with_test("TestA"),
            stdout("still B"),
            Event::new(Action::Pass).with_test("TestA"),
            Event::new(Action::Pass).with_test("TestB"),
            Event::new(Action::Pass).with_package("pkg"),
        ]);
        let package = &result.packages[0];
        assert_eq!(package.testcase("TestB").unwrap().output, "still B");
        assert_eq!(package.testcase("TestA").unwrap().output, "");
    }

    #[test]
    fn test_package_output_from_banner() {
        let result = run(vec![
            Event::new(Action::Package).with_package("example.com/broken"),
            stdout("./a.go:3:1: syntax error: non-declaration statement outside function body"),
            Event::new(Action::Fail)
                .with_package("example.com/broken")
                .with_output("build failed"),
        ]);
        let package = &result.packages[0];
        assert_eq!(package.result, TestResult::Fail);
        assert_eq!(package.reason, "build failed");
        assert!(package.output.starts_with("./a.go:3:1: syntax error"));
    }

    #[test]
    fn test_truncated_test_defaults_to_fail() {
        let result = run(vec![
            Event::new(Action::Run).with_package("pkg").with_test("TestHang"),
            stdout("waiting forever"),
        ]);
        let package = &result.packages[0];
        assert_eq!(package.name, "pkg");
        assert_eq!(package.result, TestResult::Fail);
        assert_eq!(package.testcases[0].result, TestResult::Fail);
        assert_eq!(package.testcases[0].output, "waiting forever");
    }

    #[test]
    fn test_pending_scope_flushed_unnamed() {
        let result = run(vec![
            Event::new(Action::Run).with_test("TestA"),
            Event::new(Action::Pass).with_test("TestA"),
        ]);
        assert_eq!(result.packages.len(), 1);
        assert_eq!(result.packages[0].name, "");
        assert_eq!(result.packages[0].result, TestResult::Fail);
        assert_eq!(result.packages[0].testcases[0].result, TestResult::Pass);
    }

    #[test]
    fn test_json_output_trusts_hints() {
        let result = run(vec![
            Event::new(Action::Run).with_package("pkg").with_test("TestA").json_sourced(),
            Event::new(Action::Run).with_package("pkg").with_test("TestB").json_sourced(),
            stdout("belongs to A").with_package("pkg").with_test("TestA").json_sourced(),
            Event::new(Action::Pass).with_package("pkg").with_test("TestA").json_sourced(),
            Event::new(Action::Pass).with_package("pkg").with_test("TestB").json_sourced(),
            Event::new(Action::Pass).with_package("pkg").json_sourced(),
            Event::new(Action::Pass).with_package("pkg").json_sourced(),
            stdout("late").with_package("pkg").json_sourced(),
        ]);
        assert_eq!(result.packages.len(), 1);
        let package = &result.packages[0];
        assert_eq!(package.testcase("TestA").unwrap().output, "belongs to A");
        assert_eq!(package.testcase("TestB").unwrap().output, "");
    }

    #[test]
    fn test_unattributed_output_is_fatal() {
        let mut parser = EventParser::new();
        parser.process(Event::new(Action::Pass).with_package("pkg")).unwrap();
        assert!(parser.process(stdout("exit status 1")).unwrap().is_empty());
        assert!(parser.process(stdout("")).unwrap().is_empty());
        let err = parser.process(stdout("who owns this?")).unwrap_err();
        assert!(matches!(err, LensError::UnattributedOutput { output } if output == "who owns this?"));
    }

    #[test]
    fn test_final_sentinel_without_scope_is_ignored() {
        let result = run(vec![
            Event::new(Action::Pass).with_package("pkg"),
            Event::new(Action::FailFinal),
        ]);
        assert_eq!(result.packages.len(), 1);
        assert_eq!(result.packages[0].result, TestResult::Pass);
    }

    #[test]
    fn test_coverage_on_open_scope() {
        let mut coverage = Event::new(Action::Coverage);
        coverage.coverage = Some(75.0);
        let result = run(vec![
            Event::new(Action::Run).with_test("TestA"),
            Event::new(Action::Pass).with_test("TestA"),
            Event::new(Action::PassFinal),
            coverage,
            Event::new(Action::CoverageNoStatements),
            Event::new(Action::Pass).with_package("pkg"),
        ]);
        assert_eq!(result.packages[0].coverage, Some(75.0));
        assert!(result.packages[0].testcases[0].coverage.is_none());
    }

    #[test]
    fn test_testcases_sorted_and_trimmed() {
        let result = run(vec![
            Event::new(Action::Run).with_test("TestB"),
            Event::new(Action::Run).with_test("TestA/sub"),
            Event::new(Action::Run).with_test("TestA"),
            stdout("line"),
            stdout(""),
            stdout(""),
            Event::new(Action::Pass).with_package("pkg"),
        ]);
        let names: Vec<_> = result.packages[0]
            .testcases
            .iter()
            .map(|tc| tc.name.as_str())
            .collect();
        assert_eq!(names, vec!["TestA", "TestA/sub", "TestB"]);
        assert_eq!(result.packages[0].testcases[0].output, "line");
    }
}

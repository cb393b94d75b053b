// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! Line tokenizer
//!
//! Classifies each line of `go test` output into an [`Event`] using a fixed,
//! ordered rule table. Every rule names the tokenizer states it applies in,
//! a pattern with named captures, the [`Action`] it produces and the state
//! the machine moves to. Rules are tried in declaration order and the first
//! match wins, so the free-text catch-all sits at the very end.
//!
//! Lines starting with `{` are first tried as `go test -json` records. A
//! record carrying `Output` is classified by its (trimmed) output text with
//! the record's own fields as fallbacks; a record without output maps
//! straight to an event.
//!
//! # Example
//!
//! ```
//! use testlens_core::event::Action;
//! use testlens_core::tokenizer::Tokenizer;
//!
//! let input = "=== RUN   TestX\n--- PASS: TestX (0.00s)\n";
//! let events: Vec<_> = Tokenizer::events(input.as_bytes())
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(events[0].action, Action::Run);
//! assert_eq!(events[1].test, "TestX");
//! ```

use std::fmt;
use std::io::BufRead;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::duration::parse_go_duration;
use crate::error::LensError;
use crate::event::{Action, Event};

/// Where the tokenizer is relative to test boundaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TokenizerState {
    /// Nothing test-related seen yet
    #[default]
    Init,
    /// Inside a running, non-paused test
    Run,
    /// Between test boundaries
    BetweenTests,
}

impl TokenizerState {
    /// Lower-case name used in diagnostics
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Run => "run",
            Self::BetweenTests => "between_tests",
        }
    }
}

impl fmt::Display for TokenizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Rule table
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Next {
    Stay,
    To(TokenizerState),
}

struct Rule {
    states: &'static [TokenizerState],
    pattern: Regex,
    action: Action,
    next: Next,
}

use TokenizerState::{BetweenTests, Init, Run};

const INIT: &[TokenizerState] = &[Init];
const RUNNING: &[TokenizerState] = &[Run];
const IDLE: &[TokenizerState] = &[Init, BetweenTests];
const ACTIVE: &[TokenizerState] = &[Run, BetweenTests];
const ANY: &[TokenizerState] = &[Init, Run, BetweenTests];

const BETWEEN: Next = Next::To(BetweenTests);

type RuleSpec = (&'static [TokenizerState], &'static str, Action, Next);

#[rustfmt::skip]
const RULE_SPECS: &[RuleSpec] = &[
    (INIT, r"^go: downloading (?P<package>\S+) (?P<version>.*)$", Action::Download, Next::Stay),
    (INIT, r"^go: (?P<package>[^@]+)@(?P<version>[^:]+): (?P<output>.*)$", Action::DownloadFailed, Next::Stay),
    (IDLE, r"^# (?P<package>.*)$", Action::Package, BETWEEN),
    (ANY, r"^=== RUN\s+(?P<test>.*)$", Action::Run, Next::To(Run)),
    (ACTIVE, r"^=== PAUSE\s+(?P<test>.*)$", Action::Pause, BETWEEN),
    (ACTIVE, r"^=== CONT\s+(?P<test>.*)$", Action::Cont, Next::To(Run)),
    (ANY, r"^\s*--- FAIL:\s+(?P<test>\S+) \(((?P<cached>cached)|(?P<elapsed>\S*))\)$", Action::Fail, BETWEEN),
    (ANY, r"^\s*--- PASS:\s+(?P<test>\S+) \(((?P<cached>cached)|(?P<elapsed>\S*))\)$", Action::Pass, BETWEEN),
    (ANY, r"^\s*--- SKIP:\s+(?P<test>\S+) \(((?P<cached>cached)|(?P<elapsed>\S*))\)$", Action::Skip, BETWEEN),
    (
        IDLE,
        r"^ok\s+(?P<package>\S+)\s+(\((?P<cached>cached)\)|(?P<elapsed>\S*))(\s+coverage: ((?P<coverage>[^%\s]*)% of statements( in .*)?|\[no statements\]))?$",
        Action::Pass,
        BETWEEN,
    ),
    (IDLE, r"^\?\s+(?P<package>\S+)\s+\[(?P<output>.*)\]$", Action::Skip, BETWEEN),
    (IDLE, r"^\?\s+(?P<package>\S+)\s+(?P<output>.*)$", Action::Skip, BETWEEN),
    (ANY, r"^FAIL\s+(?P<package>\S+)\s+\((?P<elapsed>\S*)\)$", Action::Fail, BETWEEN),
    (ANY, r"^FAIL\s+(?P<package>\S+)\s+(?P<elapsed>\S+)$", Action::Fail, BETWEEN),
    (ANY, r"^FAIL\s+(?P<package>\S+)\s+\[(?P<output>.*)\]$", Action::Fail, BETWEEN),
    (IDLE, r"^PASS\s+(?P<package>\S+)\s+\(((?P<cached>cached)|(?P<elapsed>\S*))\)$", Action::Pass, BETWEEN),
    (IDLE, r"^SKIP\s+(?P<package>\S+)\s+\(((?P<cached>cached)|(?P<elapsed>\S*))\)$", Action::Skip, BETWEEN),
    (IDLE, r"^FAIL$", Action::FailFinal, BETWEEN),
    (IDLE, r"^PASS$", Action::PassFinal, BETWEEN),
    (IDLE, r"^SKIP$", Action::SkipFinal, BETWEEN),
    (ACTIVE, r"^coverage: (?P<coverage>[^%\s]*)% of statements( in .*)?$", Action::Coverage, Next::Stay),
    (ACTIVE, r"^coverage: \[no statements\]$", Action::CoverageNoStatements, Next::Stay),
    (IDLE, r"(?s)^(?P<output>.*)$", Action::Stdout, BETWEEN),
    (RUNNING, r"(?s)^(?P<output>.*)$", Action::Stdout, Next::Stay),
];

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    RULE_SPECS
        .iter()
        .map(|&(states, pattern, action, next)| Rule {
            states,
            // Patterns are literals above and covered by the tokenizer tests.
            pattern: Regex::new(pattern).expect("tokenizer rule pattern must compile"),
            action,
            next,
        })
        .collect()
});

impl Rule {
    fn applies_in(&self, state: TokenizerState) -> bool {
        self.states.contains(&state)
    }

    fn next_state(&self, current: TokenizerState) -> TokenizerState {
        match self.next {
            Next::Stay => current,
            Next::To(state) => state,
        }
    }

    /// Build the event for a match, or `None` when a captured literal is
    /// malformed and the next rule should be tried instead.
    fn build_event(&self, caps: &Captures<'_>, record: Option<&JsonRecord>) -> Option<Event> {
        let elapsed = match caps.name("elapsed") {
            Some(m) => parse_go_duration(m.as_str())?,
            None => Duration::ZERO,
        };
        let coverage = match caps.name("coverage") {
            Some(m) => Some(parse_coverage(m.as_str())?),
            None => None,
        };

        let mut event = Event::new(self.action)
            .with_package(capture(caps, "package"))
            .with_version(capture(caps, "version"))
            .with_test(capture(caps, "test"))
            .with_output(capture(caps, "output"))
            .with_elapsed(elapsed);
        event.cached = caps.name("cached").is_some();
        event.coverage = coverage;

        if let Some(record) = record {
            record.fill_in(&mut event);
        }
        Some(event)
    }
}

fn capture<'h>(caps: &Captures<'h>, name: &str) -> &'h str {
    caps.name(name).map_or("", |m| m.as_str())
}

fn parse_coverage(literal: &str) -> Option<f64> {
    literal
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.is_sign_positive())
}

// ============================================================================
// JSON records
// ============================================================================

/// One `go test -json` record
#[derive(Debug, Deserialize)]
struct JsonRecord {
    #[serde(rename = "Time", alias = "time", default)]
    time: Option<DateTime<Utc>>,
    #[serde(rename = "Action", alias = "action", default)]
    action: String,
    #[serde(rename = "Package", alias = "package", default)]
    package: String,
    #[serde(rename = "Test", alias = "test", default)]
    test: String,
    #[serde(rename = "Elapsed", alias = "elapsed", default)]
    elapsed: Option<f64>,
    #[serde(rename = "Output", alias = "output", default)]
    output: Option<String>,
}

impl JsonRecord {
    fn decode(line: &str) -> Option<Self> {
        if !line.starts_with('{') {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                trace!(error = %e, "line looks like JSON but does not decode, classifying as text");
                None
            }
        }
    }

    /// Elapsed seconds as a duration, when positive and representable
    fn elapsed(&self) -> Option<Duration> {
        self.elapsed
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Use the record's fields where the line classification left a gap
    fn fill_in(&self, event: &mut Event) {
        if event.package.is_empty() {
            event.package.clone_from(&self.package);
        }
        if event.test.is_empty() {
            event.test.clone_from(&self.test);
        }
        if event.elapsed.is_zero() {
            if let Some(elapsed) = self.elapsed() {
                event.elapsed = elapsed;
            }
        }
        if let Some(time) = self.time {
            event.received_at = time;
        }
        event.json = true;
    }

    /// Event for a record that carries no output line
    fn direct_event(&self) -> Option<Event> {
        let action = match self.action.as_str() {
            "run" => Action::Run,
            "pause" => Action::Pause,
            "cont" => Action::Cont,
            "pass" => Action::Pass,
            "fail" => Action::Fail,
            "skip" => Action::Skip,
            _ => return None,
        };
        let mut event = Event::new(action);
        self.fill_in(&mut event);
        Some(event)
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

/// The line classifier state machine
#[derive(Debug, Default)]
pub struct Tokenizer {
    state: TokenizerState,
}

impl Tokenizer {
    /// Create a tokenizer in the [`TokenizerState::Init`] state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> TokenizerState {
        self.state
    }

    /// Classify one line (without its line terminator)
    ///
    /// Returns `Ok(None)` when the line produces no event: an empty line no
    /// rule claims, or a JSON record whose action has no event counterpart.
    ///
    /// # Errors
    ///
    /// Returns [`LensError::UnmatchedLine`] if a non-empty line matches no
    /// rule in the current state.
    pub fn classify(&mut self, line: &str, line_number: usize) -> Result<Option<Event>, LensError> {
        let record = JsonRecord::decode(line);
        let text = match &record {
            Some(record) => match record.output.as_deref() {
                Some(output) => output.trim_end_matches(['\r', '\n']),
                None => return Ok(record.direct_event()),
            },
            None => line,
        };

        for rule in RULES.iter().filter(|rule| rule.applies_in(self.state)) {
            let Some(caps) = rule.pattern.captures(text) else {
                continue;
            };
            let Some(event) = rule.build_event(&caps, record.as_ref()) else {
                debug!(line_number, action = %rule.action, "malformed literal, trying next rule");
                continue;
            };

            let next = rule.next_state(self.state);
            if next != self.state {
                trace!(line_number, from = %self.state, to = %next, "tokenizer state change");
            }
            self.state = next;
            return Ok(Some(event));
        }

        if text.is_empty() {
            return Ok(None);
        }
        Err(LensError::UnmatchedLine {
            line_number,
            state: self.state.to_string(),
            line: text.to_string(),
        })
    }

    /// Tokenize a whole reader with a fresh tokenizer
    ///
    /// The returned iterator stops after the first error.
    #[must_use]
    pub fn events<R: BufRead>(reader: R) -> Events<R> {
        Events {
            lines: Lines::new(reader),
            tokenizer: Self::new(),
            line_number: 0,
            failed: false,
        }
    }
}

/// Tokenize a complete in-memory transcript
///
/// # Errors
///
/// Returns the first tokenization error encountered.
pub fn tokenize(input: &str) -> Result<Vec<Event>, LensError> {
    Tokenizer::events(input.as_bytes()).collect()
}

// ============================================================================
// Line splitting
// ============================================================================

/// Strip one `\n` and one `\r` from the end of a raw line and decode it
pub(crate) fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Turn one `read_until(b'\n')` buffer into a line
///
/// Returns `None` for an unterminated buffer that decodes to nothing, which
/// marks the end of the input.
pub(crate) fn take_line(raw: &[u8]) -> Option<String> {
    let line = decode_line(raw);
    if !raw.ends_with(b"\n") && line.is_empty() {
        return None;
    }
    Some(line)
}

/// Splits a byte stream into lines regardless of read boundaries
///
/// Invalid UTF-8 is replaced rather than rejected. A final line without a
/// terminator is yielded only when it is non-empty.
#[derive(Debug)]
pub struct Lines<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> Lines<R> {
    /// Wrap a buffered reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => match take_line(&self.buf) {
                Some(line) => Some(Ok(line)),
                None => {
                    self.done = true;
                    None
                }
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterator of events over a reader, see [`Tokenizer::events`]
#[derive(Debug)]
pub struct Events<R> {
    lines: Lines<R>,
    tokenizer: Tokenizer,
    line_number: usize,
    failed: bool,
}

impl<R> Events<R> {
    /// State of the underlying tokenizer
    pub fn state(&self) -> TokenizerState {
        self.tokenizer.state()
    }
}

impl<R: BufRead> Iterator for Events<R> {
    type Item = Result<Event, LensError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            self.line_number += 1;
            match self.tokenizer.classify(&line, self.line_number) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

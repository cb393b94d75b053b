// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! Plain-text rendering of parse results
//!
//! The [`Renderer`] turns prefix lines, the downloads summary and packages
//! into display text one piece at a time, so packages can be printed as
//! soon as they finish. It also tracks the process exit code.

use std::fmt::Write as _;

use testlens_core::duration::format_go_duration;
use testlens_core::{Download, Downloads, Package, ParseResult, TestCase, TestResult};

/// Flags that influence what gets rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSettings {
    /// Hide successful dependency downloads
    pub hide_successful_downloads: bool,
    /// Hide packages where nothing failed
    pub hide_successful_packages: bool,
    /// Hide packages without test cases
    pub hide_empty_packages: bool,
    /// Hide test cases that passed
    pub hide_successful_tests: bool,
    /// Print PASS/FAIL/SKIP next to the icons
    pub show_test_status: bool,
}

/// Exit code for a complete result, matching [`Renderer::exit_code`]
#[must_use]
pub fn exit_code(result: &ParseResult) -> i32 {
    let failing = result.failed()
        || result
            .packages
            .iter()
            .any(|package| !package.failing_tests().is_empty());
    i32::from(failing)
}

const OUTPUT_INDENT: &str = "     ";

fn icon(result: TestResult) -> &'static str {
    match result {
        TestResult::Pass => "✅",
        TestResult::Fail => "❌",
        TestResult::Skip => "🚧",
    }
}

/// Stateful renderer for one run
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    settings: RenderSettings,
    failed: bool,
}

impl Renderer {
    /// Create a renderer with the given settings
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            failed: false,
        }
    }

    /// Process exit code for everything rendered so far
    ///
    /// `1` if any download, package or test failed, `0` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed)
    }

    /// Render one raw prefix line verbatim
    #[must_use]
    pub fn prefix(&self, line: &str) -> String {
        format!("{line}\n")
    }

    /// Render the downloads summary
    ///
    /// Returns an empty string when there is nothing to show.
    pub fn downloads(&mut self, downloads: &Downloads) -> String {
        self.failed |= downloads.failed;
        if downloads.is_empty() || (self.settings.hide_successful_downloads && !downloads.failed) {
            return String::new();
        }

        let mut out = String::new();
        let title = if downloads.failed {
            "Failed to download dependencies"
        } else {
            "Dependencies downloaded"
        };
        let _ = writeln!(out, "📥 {title}");
        for download in &downloads.packages {
            if self.settings.hide_successful_downloads && !download.failed {
                continue;
            }
            self.download_line(&mut out, download);
        }
        if !downloads.reason.is_empty() {
            let _ = writeln!(out, "   {}", icon(TestResult::Fail));
            push_indented(&mut out, &downloads.reason);
        }
        out
    }

    fn download_line(&self, out: &mut String, download: &Download) {
        let result = if download.failed {
            TestResult::Fail
        } else {
            TestResult::Pass
        };
        let version = if download.version.is_empty() {
            String::new()
        } else {
            format!("@{}", download.version)
        };
        let _ = writeln!(
            out,
            "   {} {}{}{version}",
            icon(result),
            self.status(result),
            download.package
        );
        if !download.reason.is_empty() {
            push_indented(out, &download.reason);
        }
    }

    /// Render one finished package
    ///
    /// Returns an empty string when the hide settings filter it out.
    pub fn package(&mut self, package: &Package) -> String {
        let failing = package.failed() || !package.failing_tests().is_empty();
        self.failed |= failing;

        if self.settings.hide_successful_packages && !failing {
            return String::new();
        }
        if self.settings.hide_empty_packages && package.testcases.is_empty() && !failing {
            return String::new();
        }

        let mut out = String::new();
        let name = if package.name.is_empty() {
            "(unknown package)"
        } else {
            package.name.as_str()
        };
        let _ = writeln!(
            out,
            "📦 {} {}{name}{}",
            icon(package.result),
            self.status(package.result),
            package_details(package)
        );
        if !package.reason.is_empty() {
            let _ = writeln!(out, "   {}", package.reason);
        }
        if !package.output.is_empty() {
            push_indented(&mut out, &package.output);
        }
        for testcase in &package.testcases {
            if self.settings.hide_successful_tests && testcase.result == TestResult::Pass {
                continue;
            }
            self.testcase_lines(&mut out, testcase);
        }
        out
    }

    fn testcase_lines(&self, out: &mut String, testcase: &TestCase) {
        let timing = if testcase.cached {
            "cached".to_string()
        } else {
            format_go_duration(testcase.duration)
        };
        let _ = writeln!(
            out,
            "  {} {}{} ({timing})",
            icon(testcase.result),
            self.status(testcase.result),
            testcase.name
        );
        if testcase.result != TestResult::Pass && !testcase.output.is_empty() {
            push_indented(out, &testcase.output);
        }
    }

    fn status(&self, result: TestResult) -> String {
        if self.settings.show_test_status {
            format!("{result} ")
        } else {
            String::new()
        }
    }
}

fn package_details(package: &Package) -> String {
    let mut details = Vec::new();
    if package.cached {
        details.push("cached".to_string());
    } else if !package.duration.is_zero() {
        details.push(format_go_duration(package.duration));
    }
    if let Some(coverage) = package.coverage {
        details.push(format!("coverage: {coverage:.1}%"));
    }
    if details.is_empty() {
        String::new()
    } else {
        format!(" ({})", details.join(", "))
    }
}

fn push_indented(out: &mut String, text: &str) {
    for line in text.lines() {
        out.push_str(OUTPUT_INDENT);
        out.push_str(line);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::time::Duration;

    fn testcase(name: &str, result: TestResult, output: &str) -> TestCase {
        TestCase {
            start_time: None,
            name: name.to_string(),
            result,
            duration: Duration::from_millis(10),
            coverage: None,
            output: output.to_string(),
            cached: false,
        }
    }

    fn package(result: TestResult, testcases: Vec<TestCase>) -> Package {
        Package {
            start_time: None,
            name: "example.com/pkg".to_string(),
            result,
            duration: Duration::from_millis(19),
            coverage: None,
            output: String::new(),
            testcases,
            reason: String::new(),
            cached: false,
        }
    }

    fn download(package: &str, failed: bool, reason: &str) -> Download {
        Download {
            package: package.to_string(),
            version: "v1.0.0".to_string(),
            failed,
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_prefix_verbatim() {
        assert_eq!(Renderer::default().prefix("  banner"), "  banner\n");
    }

    #[test]
    fn test_empty_downloads_render_nothing() {
        let mut renderer = Renderer::default();
        assert_eq!(renderer.downloads(&Downloads::default()), "");
        assert_eq!(renderer.exit_code(), 0);
    }

    #[test]
    fn test_downloads_block() {
        let downloads = Downloads {
            packages: vec![
                download("example.com/ok", false, ""),
                download("example.com/gone", true, "410 Gone\nserver response: not found"),
            ],
            failed: true,
            ..Default::default()
        };
        let mut renderer = Renderer::default();
        assert_eq!(
            renderer.downloads(&downloads),
            "📥 Failed to download dependencies\n   ✅ example.com/ok@v1.0.0\n   ❌ example.com/gone@v1.0.0\n     410 Gone\n     server response: not found\n"
        );
        assert_eq!(renderer.exit_code(), 1);
    }

    #[test]
    fn test_hide_successful_downloads() {
        let settings = RenderSettings {
            hide_successful_downloads: true,
            ..Default::default()
        };
        let ok = Downloads {
            packages: vec![download("example.com/ok", false, "")],
            ..Default::default()
        };
        assert_eq!(Renderer::new(settings).downloads(&ok), "");

        let mixed = Downloads {
            packages: vec![
                download("example.com/ok", false, ""),
                download("example.com/gone", true, ""),
            ],
            failed: true,
            ..Default::default()
        };
        let out = Renderer::new(settings).downloads(&mixed);
        assert!(!out.contains("example.com/ok"));
        assert!(out.contains("example.com/gone"));
    }

    #[test]
    fn test_package_block() {
        let pkg = package(
            TestResult::Fail,
            vec![
                testcase("TestA", TestResult::Pass, "noise"),
                testcase("TestB", TestResult::Fail, "b_test.go:3: boom"),
            ],
        );
        let mut renderer = Renderer::default();
        assert_eq!(
            renderer.package(&pkg),
            "📦 ❌ example.com/pkg (19ms)\n  ✅ TestA (10ms)\n  ❌ TestB (10ms)\n     b_test.go:3: boom\n"
        );
        assert_eq!(renderer.exit_code(), 1);
    }

    #[test]
    fn test_show_test_status() {
        let settings = RenderSettings {
            show_test_status: true,
            ..Default::default()
        };
        let mut pkg = package(TestResult::Pass, vec![testcase("TestA", TestResult::Skip, "")]);
        pkg.coverage = Some(66.66);
        pkg.cached = true;
        assert_eq!(
            Renderer::new(settings).package(&pkg),
            "📦 ✅ PASS example.com/pkg (cached, coverage: 66.7%)\n  🚧 SKIP TestA (10ms)\n"
        );
    }

    #[test]
    fn test_hide_successful_packages_and_tests() {
        let settings = RenderSettings {
            hide_successful_packages: true,
            hide_successful_tests: true,
            ..Default::default()
        };
        let mut renderer = Renderer::new(settings);
        let passing = package(TestResult::Pass, vec![testcase("TestA", TestResult::Pass, "")]);
        assert_eq!(renderer.package(&passing), "");
        assert_eq!(renderer.exit_code(), 0);

        let failing = package(
            TestResult::Fail,
            vec![
                testcase("TestA", TestResult::Pass, ""),
                testcase("TestB", TestResult::Fail, ""),
            ],
        );
        let out = renderer.package(&failing);
        assert!(!out.contains("TestA"));
        assert!(out.contains("TestB"));
        assert_eq!(renderer.exit_code(), 1);
    }

    #[test]
    fn test_hide_empty_packages() {
        let settings = RenderSettings {
            hide_empty_packages: true,
            ..Default::default()
        };
        let mut skipped = package(TestResult::Skip, Vec::new());
        skipped.reason = "no test files".to_string();
        assert_eq!(Renderer::new(settings).package(&skipped), "");

        let mut broken = package(TestResult::Fail, Vec::new());
        broken.reason = "build failed".to_string();
        broken.output = "./a.go:1:1: syntax error".to_string();
        assert_eq!(
            Renderer::new(settings).package(&broken),
            "📦 ❌ example.com/pkg (19ms)\n   build failed\n     ./a.go:1:1: syntax error\n"
        );
    }

    #[test]
    fn test_failing_test_in_passing_package_sets_exit_code() {
        let mut renderer = Renderer::default();
        let _ = renderer.package(&package(
            TestResult::Pass,
            vec![testcase("TestFlaky", TestResult::Fail, "")],
        ));
        assert_eq!(renderer.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_for_result() {
        let mut result = ParseResult::default();
        assert_eq!(exit_code(&result), 0);
        result.packages.push(package(
            TestResult::Pass,
            vec![testcase("TestFlaky", TestResult::Fail, "")],
        ));
        assert_eq!(exit_code(&result), 1);

        let result = ParseResult {
            downloads: Downloads {
                failed: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(exit_code(&result), 1);
    }
}

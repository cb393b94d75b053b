// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! Error types for testlens-core

use thiserror::Error;

/// Errors that abort a tokenize/parse run
///
/// Every variant is fatal: recoverable conditions (malformed durations,
/// undecodable JSON lines) are resolved inside the tokenizer and never
/// surface here.
#[derive(Debug, Error)]
pub enum LensError {
    /// Error reading the input stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A non-empty line matched no rule in the current tokenizer state
    #[error("failed to match line {line_number} in state {state}: {line:?}")]
    UnmatchedLine {
        /// 1-based line number in the input
        line_number: usize,
        /// Tokenizer state the line was classified in
        state: String,
        /// The offending line
        line: String,
    },

    /// Free-text output arrived when no scope could own it
    #[error("unexpected output with no open test, package or download: {output:?} (was the run produced with -v or -json?)")]
    UnattributedOutput {
        /// The output line that could not be attributed
        output: String,
    },

    /// A download event arrived after the download phase was closed
    #[error("download of {package} reported after the download phase closed")]
    DownloadPhaseClosed {
        /// Module that was reported late
        package: String,
    },

    /// A consumer dropped one of the pipeline output streams
    #[error("the {stream} consumer went away before the pipeline finished")]
    StreamClosed {
        /// Name of the output stream ("prefix", "downloads" or "packages")
        stream: &'static str,
    },

    /// A pipeline task panicked or was cancelled
    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! testlens-core: structured results from `go test` output
//!
//! This library rebuilds a hierarchical result model (downloads, packages,
//! test cases with subtests) from the line-oriented console output of
//! `go test`, in plain text or `-json` form. It is a two-stage pipeline:
//!
//! 1. [`tokenizer`] classifies each line into an [`Event`] with a rule-table
//!    state machine.
//! 2. [`parser`] aggregates events into prefix lines, one [`Downloads`]
//!    summary and finalized [`Package`] records, attributing untagged output
//!    to the innermost open test or package.
//!
//! # Example
//!
//! ```
//! use testlens_core::prelude::*;
//!
//! let output = "\
//! === RUN   TestSubtest
//! === RUN   TestSubtest/test1
//! --- FAIL: TestSubtest (0.00s)
//!     --- PASS: TestSubtest/test1 (0.00s)
//! FAIL
//! FAIL\texample.com/pkg\t0.004s
//! ";
//! let result = parse_output(output).unwrap();
//! let package = &result.packages[0];
//! assert_eq!(package.result, TestResult::Fail);
//! assert_eq!(package.testcases[1].name, "TestSubtest/test1");
//!
//! // Or drive the aggregator yourself, one event at a time
//! let mut parser = EventParser::new();
//! for event in Tokenizer::events(output.as_bytes()) {
//!     for emission in parser.process(event.unwrap()).unwrap() {
//!         if let Emission::Package(package) = emission {
//!             println!("{} {}", package.result, package.name);
//!         }
//!     }
//! }
//! let _rest = parser.finish();
//! ```
//!
//! The [`pipeline`] module runs both stages as tokio tasks over an async
//! reader.

pub mod duration;
pub mod error;
pub mod event;
pub mod ordering;
pub mod parser;
pub mod pipeline;
pub mod result;
pub mod tokenizer;

pub use error::LensError;
pub use event::{Action, Event};
pub use parser::{Emission, EventParser, parse_events, parse_output, parse_reader};
pub use result::{Download, Downloads, Package, ParseResult, TestCase, TestResult};
pub use tokenizer::{Tokenizer, TokenizerState};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::LensError;
    pub use crate::event::{Action, Event};
    pub use crate::parser::{Emission, EventParser, parse_output, parse_reader};
    pub use crate::result::{Downloads, Package, ParseResult, TestCase, TestResult};
    pub use crate::tokenizer::Tokenizer;
}

//! testlens library
//!
//! This module exports the command line front end of testlens for use in
//! integration tests and as a library: configuration, rendering, the
//! external output formatter and the run loop built on `testlens-core`.

pub mod config;
pub mod formatter;
pub mod render;
pub mod run;

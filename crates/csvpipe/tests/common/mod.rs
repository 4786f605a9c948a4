//! Shared test utilities for csvpipe integration tests.
//!
//! - `TestHarness`: an isolated service with temp storage, an in-memory
//!   database and inline job dispatch
//! - Builders for CSV payloads and processing configs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;

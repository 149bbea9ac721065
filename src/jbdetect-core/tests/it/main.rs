//! Consolidated integration tests for jbdetect-core.
//!
//! One test binary so proptest suites and timing-sensitive tests do not
//! contend across separate processes.
//! See: https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod aggregation;
mod common;
mod engine;
mod sandbox;

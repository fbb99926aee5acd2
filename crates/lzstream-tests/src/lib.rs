//! lzstream testing suite
//!
//! Shared helpers for the integration tests and benchmarks of the lzstream
//! workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Data generators and collecting handlers used across all test files.
pub mod test_utils;

//! Shared test utilities for async-agentx integration tests.

// Allow dead code and unused imports since not all test files use all utilities
#![allow(dead_code)]
#![allow(unused_imports)]

mod fixtures;
mod master;

pub use fixtures::*;
pub use master::FakeMaster;

//! CLI support for the `agentx-example` demo agent.
//!
//! Argument parsing and the formatting of registered-value dumps.
//!
//! This module is only available with the `cli` feature.

pub mod args;
pub mod output;

// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for cireplay, a harness that checks JVM compiler replay.
//!
//! A scenario crashes the JIT compiler on purpose so that it dumps replay data, then replays that
//! data under different VM options and checks the exit codes. See [`orchestrator`] for the flow
//! of a scenario and [`scenarios`] for the built-in ones.

pub mod analyzer;
pub mod artifacts;
pub mod capabilities;
pub mod cleaner;
pub mod config;
pub mod core_file;
pub mod errors;
pub mod generator;
mod helpers;
pub mod jvm;
pub mod orchestrator;
pub mod platform;
pub mod player;
pub mod process;
pub mod reporter;
pub mod scenarios;
#[cfg(test)]
mod test_helpers;

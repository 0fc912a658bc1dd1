// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Well-known artifact names.
//!
//! These names are fixed rather than unique per run, so two scenarios must never share a working
//! directory.

/// The replay data file written by the crashing JVM and read by the replaying one.
pub const REPLAY_FILE_NAME: &str = "test_replay.txt";

/// The name the core file of the crashing JVM is moved to.
pub const TEST_CORE_FILE_NAME: &str = "test_core";

/// Captured stdout and stderr of the crashing JVM.
pub const CRASH_OUTPUT_FILE_NAME: &str = "crash.out";

/// Core files dropped by the OS in the working directory.
pub(crate) const CORE_PREFIX: &str = "core";

/// Replay files written by the JVM under default names.
pub(crate) const REPLAY_PREFIX: &str = "replay";

/// The `-XX:ReplayDataFile` option pointing at [`REPLAY_FILE_NAME`].
pub(crate) const REPLAY_FILE_OPTION: &str = "-XX:ReplayDataFile=test_replay.txt";

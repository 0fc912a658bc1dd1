// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    artifacts::REPLAY_FILE_OPTION,
    errors::HarnessError,
    jvm::{JvmLauncher, RUN_SHELL_ZERO_LIMIT, vm_options},
    process::{CommandSpec, ProcessRunner},
};
use tracing::debug;

/// Options for replaying compilations from the replay data file.
pub const REPLAY_OPTIONS: &[&str] = &[
    vm_options::DISABLE_COREDUMP_ON_CRASH,
    "-XX:+IgnoreUnrecognizedVMOptions",
    "-XX:TypeProfileLevel=222",
    "-XX:+ReplayCompiles",
    REPLAY_FILE_OPTION,
];

/// Replays the compilations recorded in the replay data file.
pub struct ReplayPlayer<'a> {
    launcher: &'a JvmLauncher,
    runner: &'a dyn ProcessRunner,
}

impl<'a> ReplayPlayer<'a> {
    /// Creates a new player.
    pub fn new(launcher: &'a JvmLauncher, runner: &'a dyn ProcessRunner) -> Self {
        Self { launcher, runner }
    }

    /// Returns the command that [`start_test`](Self::start_test) runs.
    pub fn command(&self, vm_opts: &[&str]) -> CommandSpec {
        let command = self
            .launcher
            .test_jvm(REPLAY_OPTIONS.iter().chain(vm_opts).copied());
        self.launcher.shell_command(RUN_SHELL_ZERO_LIMIT, &command)
    }

    /// Replays with `vm_opts` appended to the replay options, returning the JVM's exit code.
    ///
    /// Core dumps are suppressed for the replaying JVM, which is expected to crash in negative
    /// cases.
    pub fn start_test(&self, vm_opts: &[&str]) -> Result<i32, HarnessError> {
        let output = self.runner.run(&self.command(vm_opts))?;
        debug!(
            exit_code = output.exit_code(),
            "replay with [{}] finished",
            vm_opts.join(", ")
        );
        Ok(output.exit_code())
    }
}

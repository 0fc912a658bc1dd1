// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Launching child processes.
//!
//! Scenarios never spawn processes directly: they go through a [`ProcessRunner`], so that the
//! orchestration logic can be exercised without a JVM.

use crate::{errors::HarnessError, helpers::exit_code_of};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use tracing::debug;

/// A command to be run: a program, its arguments and a working directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Utf8PathBuf,
}

impl CommandSpec {
    /// Creates a new command with no arguments.
    pub fn new(program: impl Into<String>, cwd: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the program.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Returns the working directory.
    pub fn cwd(&self) -> &Utf8Path {
        &self.cwd
    }

    /// Returns true if any argument is exactly `arg`.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Renders the command as a single line a POSIX shell would split back into the same
    /// arguments.
    pub fn to_command_line(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(&self.args))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

/// What a finished child process left behind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessOutput {
    pid: u32,
    exit_code: i32,
    output: String,
}

impl ProcessOutput {
    /// Creates a new `ProcessOutput`.
    pub fn new(pid: u32, exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            pid,
            exit_code,
            output: output.into(),
        }
    }

    /// The process ID of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// The exit code. A child killed by signal `n` reports `128 + n`.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Combined stdout and stderr.
    pub fn output(&self) -> &str {
        &self.output
    }
}

/// Runs a command to completion.
pub trait ProcessRunner {
    /// Runs `command`, blocking until it exits.
    ///
    /// A non-zero exit code is not an error: only a failure to launch or wait on the process is.
    fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, HarnessError>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for &T {
    fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, HarnessError> {
        (**self).run(command)
    }
}

/// A [`ProcessRunner`] that launches real processes with `duct`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DuctRunner;

impl ProcessRunner for DuctRunner {
    fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, HarnessError> {
        debug!(cwd = %command.cwd(), "running `{command}`");

        let launch_error = |err| HarnessError::Launch {
            command: command.to_command_line(),
            err,
        };

        let handle = duct::cmd(command.program(), command.arguments())
            .dir(command.cwd().as_std_path())
            // The JVM interleaves crash reports across both streams: keep them in order.
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .start()
            .map_err(launch_error)?;
        let pid = handle.pids().first().copied().unwrap_or_default();
        let output = handle.wait().map_err(launch_error)?;

        let exit_code = exit_code_of(output.status);
        debug!(pid, exit_code, "process exited");

        Ok(ProcessOutput::new(
            pid,
            exit_code,
            String::from_utf8_lossy(&output.stdout),
        ))
    }
}

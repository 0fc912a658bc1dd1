// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by cireplay.

use crate::{orchestrator::VmFlavor, reporter::Expectation};
use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{num::ParseIntError, time::Duration};
use thiserror::Error;

/// An infrastructure error: something went wrong in the harness or its environment, not in the
/// behavior under test.
///
/// These errors abort a scenario immediately. The working directory is left as-is so that the
/// artifacts can be inspected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    /// A child process could not be launched or waited on.
    #[error("failed to launch `{command}`")]
    Launch {
        /// The command line that was attempted.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The replay-generating JVM exited with code 0, so no replay data was produced.
    #[error("crash JVM exited gracefully (exit code 0), no replay data was produced: `{command}`")]
    GeneratorExitedGracefully {
        /// The command line that was run.
        command: String,
    },

    /// The captured output of the crashing JVM could not be written.
    #[error("failed to write crash output to `{path}`")]
    WriteCrashOutput {
        /// The output file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A core dump was requested, but no core file could be found.
    #[error("core file for crashed process {pid} not found")]
    CoreFileNotFound {
        /// The process ID of the crashed JVM.
        pid: u32,
    },

    /// The core file could not be moved to its well-known name.
    #[error("failed to move core file `{from}` to `{to}`")]
    MoveCoreFile {
        /// The core file found.
        from: Utf8PathBuf,

        /// The destination.
        to: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A core dump was requested, but this host cannot produce one.
    #[error("host is not configured to generate cores: {reason}")]
    HostNotConfigured {
        /// Why cores cannot be produced.
        reason: String,
    },

    /// The replay data file could not be read.
    #[error("failed to read replay data at `{path}`")]
    ReadReplay {
        /// The replay data file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The replay data file could not be rewritten.
    #[error("failed to write replay data at `{path}`")]
    WriteReplay {
        /// The replay data file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The replay data file has no `compile` record.
    #[error("no `compile` record found in replay data at `{path}`")]
    NoCompileRecord {
        /// The replay data file.
        path: Utf8PathBuf,
    },

    /// A `compile` record is too short to carry a compile level.
    #[error("`compile` record has no compile level: `{line}`")]
    MissingCompLevel {
        /// The offending line.
        line: String,
    },

    /// The compile level of a `compile` record is not an integer.
    #[error("invalid compile level `{token}` in `compile` record: `{line}`")]
    InvalidCompLevel {
        /// The offending line.
        line: String,

        /// The token in the compile level position.
        token: String,

        /// The underlying error.
        #[source]
        err: ParseIntError,
    },

    /// A VM-flavor-specific check was requested without a flavor.
    #[error("this scenario requires a VM flavor (known values: {})", VmFlavor::variants().join(", "))]
    VmFlavorRequired,

    /// The working directory could not be listed.
    #[error("failed to read directory `{dir}`")]
    ReadDir {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A deleted file was still visible after the deletion timeout.
    #[error("`{path}` still exists {timeout:?} after it was deleted")]
    DeletionTimedOut {
        /// The file being deleted.
        path: Utf8PathBuf,

        /// How long the cleaner waited.
        timeout: Duration,
    },
}

/// A test-visible failure: a check on the behavior under test did not hold.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}: expected {expected}, actual {actual}")]
pub struct AssertionFailure {
    message: String,
    expected: String,
    actual: String,
}

impl AssertionFailure {
    /// Creates a new assertion failure.
    pub fn new(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn exit_code(expectation: Expectation, options: &[&str], exit_code: i32) -> Self {
        Self::new(
            format!(
                "unexpected exit code for {expectation} case: [{}]",
                options.iter().join(", ")
            ),
            expectation.describe_exit_code(),
            exit_code.to_string(),
        )
    }

    /// Returns the message describing the check.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the expected value, rendered as a string.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Returns the actual value, rendered as a string.
    pub fn actual(&self) -> &str {
        &self.actual
    }
}

/// An error that ends a scenario run.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// An infrastructure error.
    #[error(transparent)]
    Harness(#[from] HarnessError),

    /// An assertion failure.
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
}

/// An error that occurred while reading the cireplay config.
#[derive(Debug, Error)]
#[error("failed to parse cireplay config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigReadError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigReadErrorKind,
}

impl ConfigReadError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigReadErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigReadErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigReadError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigReadErrorKind {
    /// The config sources could not be merged.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// The merged config could not be deserialized.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// A workload was requested that the config doesn't know about.
#[derive(Clone, Debug, Error)]
#[error("workload `{name}` not found (known workloads: {})", .all_workloads.join(", "))]
pub struct UnknownWorkload {
    name: String,
    all_workloads: Vec<String>,
}

impl UnknownWorkload {
    pub(crate) fn new(
        name: impl Into<String>,
        all_workloads: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_workloads: Vec<_> = all_workloads.into_iter().map(|s| s.into()).collect();
        all_workloads.sort_unstable();
        Self {
            name: name.into(),
            all_workloads,
        }
    }
}

/// Error returned while parsing a [`VmFlavor`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for VM flavor: {input}\n(known values: {})",
    VmFlavor::variants().join(", "),
)]
pub struct VmFlavorParseError {
    input: String,
}

impl VmFlavorParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

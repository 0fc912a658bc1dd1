// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use cireplay_runner::errors::{AssertionFailure, ConfigReadError, HarnessError, UnknownWorkload};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `cireplay` failures.
///
/// Unknown or unexpected failures always result in exit code 1.
pub enum CireplayExitCode {}

impl CireplayExitCode {
    /// The command completed, and every replay behaved as expected.
    pub const OK: i32 = 0;

    /// A replay didn't behave as expected.
    pub const SCENARIO_FAILED: i32 = 100;

    /// A user issue happened while setting up a cireplay invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// The harness itself failed: a JVM couldn't be launched, or its artifacts weren't usable.
    pub const INFRASTRUCTURE_ERROR: i32 = 97;
}

// The #[error()] strings are placeholder messages: errors are meant to be printed with
// display_to_stderr, which colorizes them.

/// An error that cireplay knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed { err: std::io::Error },
    #[error("working directory is invalid")]
    WorkDirInvalid { path: Utf8PathBuf, reason: String },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigReadError,
    },
    #[error("unknown workload")]
    UnknownWorkload {
        #[from]
        err: UnknownWorkload,
    },
    #[error("failed to serialize config")]
    ShowConfigError {
        #[from]
        err: toml::ser::Error,
    },
    #[error("failed to probe JVM capabilities")]
    ProbeFailed { err: HarnessError },
    #[error("cleanup failed")]
    CleanupFailed { err: HarnessError },
    #[error("scenario `{scenario}` aborted")]
    ScenarioAborted { scenario: String, err: HarnessError },
    #[error("scenario `{scenario}` failed")]
    ScenarioFailed {
        scenario: String,
        failure: AssertionFailure,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[from]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::WorkDirInvalid { .. }
            | Self::ConfigParseError { .. }
            | Self::UnknownWorkload { .. }
            | Self::ShowConfigError { .. } => CireplayExitCode::SETUP_ERROR,
            Self::ProbeFailed { .. }
            | Self::CleanupFailed { .. }
            | Self::ScenarioAborted { .. }
            | Self::WriteOutputError { .. } => CireplayExitCode::INFRASTRUCTURE_ERROR,
            Self::ScenarioFailed { .. } => CireplayExitCode::SCENARIO_FAILED,
        }
    }

    /// Displays this error to stderr, followed by its chain of causes.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::WorkDirInvalid { path, reason } => {
                error!(
                    "working directory `{}` is invalid: {reason}",
                    path.style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::UnknownWorkload { err } => {
                error!("{err}");
                None
            }
            Self::ShowConfigError { err } => {
                error!("failed to serialize config");
                Some(err as &dyn Error)
            }
            Self::ProbeFailed { err } => {
                error!("failed to probe JVM capabilities");
                Some(err as &dyn Error)
            }
            Self::CleanupFailed { err } => {
                error!("failed to clean up the working directory");
                Some(err as &dyn Error)
            }
            Self::ScenarioAborted { scenario, err } => {
                error!(
                    "scenario `{}` aborted, artifacts were left in place",
                    scenario.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::ScenarioFailed { scenario, failure } => {
                error!(
                    "scenario `{}` failed: {}",
                    scenario.style(styles.bold),
                    failure.message()
                );
                error!(
                    target: NO_HEADING_TARGET,
                    "  expected: {}\n    actual: {}",
                    failure.expected().style(styles.expected),
                    failure.actual().style(styles.actual),
                );
                None
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

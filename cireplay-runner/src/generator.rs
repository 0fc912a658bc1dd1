// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producing replay data by crashing the compiler on purpose.

use crate::{
    artifacts::{CRASH_OUTPUT_FILE_NAME, REPLAY_FILE_NAME, REPLAY_FILE_OPTION, TEST_CORE_FILE_NAME},
    cleaner::ArtifactCleaner,
    config::WorkloadConfig,
    core_file::{CoreLocation, CoreLocator},
    errors::HarnessError,
    jvm::{JvmLauncher, RUN_SHELL_NO_LIMIT, vm_options},
    process::{CommandSpec, ProcessOutput, ProcessRunner},
};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

/// Options that make compilation quick, deterministic and fatal: the first compilation crashes
/// the compiler, which dumps replay data.
pub const REPLAY_GENERATION_OPTIONS: &[&str] = &[
    "-Xms8m",
    "-Xmx32m",
    "-XX:MetaspaceSize=4m",
    "-XX:MaxMetaspaceSize=16m",
    "-XX:InitialCodeCacheSize=512k",
    "-XX:ReservedCodeCacheSize=4m",
    "-XX:ThreadStackSize=512",
    "-XX:VMThreadStackSize=512",
    "-XX:CompilerThreadStackSize=512",
    "-XX:ParallelGCThreads=1",
    "-XX:CICompilerCount=2",
    "-XX:-BackgroundCompilation",
    "-XX:CompileCommand=inline,java.io.PrintStream::*",
    "-XX:+IgnoreUnrecognizedVMOptions",
    // Extra profile data, as a stress test.
    "-XX:TypeProfileLevel=222",
    "-XX:CICrashAt=1",
    "-XX:+DumpReplayDataOnError",
    "-XX:+PreferInterpreterNativeStubs",
    REPLAY_FILE_OPTION,
];

/// The result of a generation run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GenerationOutcome {
    /// The JVM crashed and left replay data behind.
    Generated(GeneratedReplay),

    /// A core dump was requested, but the host can't produce one.
    CoresUnavailable {
        /// Why not.
        reason: String,
    },
}

/// Artifacts of a successful generation run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneratedReplay {
    replay_file: Utf8PathBuf,
    crash_output: ProcessOutput,
    core_file: Option<Utf8PathBuf>,
}

impl GeneratedReplay {
    /// The replay data file.
    pub fn replay_file(&self) -> &Utf8Path {
        &self.replay_file
    }

    /// What the crashing JVM printed, its pid and exit code.
    pub fn crash_output(&self) -> &ProcessOutput {
        &self.crash_output
    }

    /// The core file, if one was requested.
    pub fn core_file(&self) -> Option<&Utf8Path> {
        self.core_file.as_deref()
    }
}

/// Runs the crashing JVM.
pub struct ReplayGenerator<'a> {
    launcher: &'a JvmLauncher,
    runner: &'a dyn ProcessRunner,
    cleaner: &'a ArtifactCleaner,
    locator: CoreLocator,
    workload: WorkloadConfig,
}

impl<'a> ReplayGenerator<'a> {
    /// Creates a new generator running `workload`.
    pub fn new(
        launcher: &'a JvmLauncher,
        runner: &'a dyn ProcessRunner,
        cleaner: &'a ArtifactCleaner,
        workload: WorkloadConfig,
    ) -> Self {
        Self {
            launcher,
            runner,
            cleaner,
            locator: CoreLocator::new(launcher.work_dir(), launcher.platform()),
            workload,
        }
    }

    /// Returns the command that [`generate_replay`](Self::generate_replay) runs.
    pub fn command(&self, need_core_dump: bool, extra_args: &[&str]) -> CommandSpec {
        let mut args: Vec<String> = REPLAY_GENERATION_OPTIONS
            .iter()
            .chain(extra_args)
            .map(|arg| (*arg).to_owned())
            .collect();
        args.push(
            if need_core_dump {
                vm_options::ENABLE_COREDUMP_ON_CRASH
            } else {
                vm_options::DISABLE_COREDUMP_ON_CRASH
            }
            .to_owned(),
        );
        args.push(format!(
            "-XX:CompileOnly={}",
            self.workload.compile_only_filter()
        ));
        args.push(self.workload.main_class.clone());

        let command = self.launcher.test_jvm(args);
        if need_core_dump {
            self.launcher.shell_command(RUN_SHELL_NO_LIMIT, &command)
        } else {
            command
        }
    }

    /// Runs the workload in a JVM that crashes while compiling it, leaving replay data (and a
    /// core file if `need_core_dump` is set) in the working directory.
    pub fn generate_replay(
        &self,
        need_core_dump: bool,
        extra_args: &[&str],
    ) -> Result<GenerationOutcome, HarnessError> {
        let command = self.command(need_core_dump, extra_args);
        info!(
            need_core_dump,
            "generating replay data for `{}`",
            self.workload.compile_only_filter()
        );

        let crash_output = self.runner.run(&command)?;
        if crash_output.exit_code() == 0 {
            return Err(HarnessError::GeneratorExitedGracefully {
                command: command.to_command_line(),
            });
        }

        let work_dir = self.launcher.work_dir();
        let crash_output_path = work_dir.join(CRASH_OUTPUT_FILE_NAME);
        std::fs::write(&crash_output_path, crash_output.output()).map_err(|err| {
            HarnessError::WriteCrashOutput {
                path: crash_output_path,
                err,
            }
        })?;

        let core_file = if need_core_dump {
            match self
                .locator
                .locate(crash_output.output(), crash_output.pid())
            {
                CoreLocation::Found(core) => Some(self.move_core_file(core)?),
                CoreLocation::Unavailable { reason } => {
                    return Ok(GenerationOutcome::CoresUnavailable { reason });
                }
                CoreLocation::NotFound => {
                    return Err(HarnessError::CoreFileNotFound {
                        pid: crash_output.pid(),
                    });
                }
            }
        } else {
            None
        };

        // The replay data is all that's needed from here on.
        self.cleaner
            .remove_starting_with(self.launcher.platform().crash_log_prefix())?;

        Ok(GenerationOutcome::Generated(GeneratedReplay {
            replay_file: work_dir.join(REPLAY_FILE_NAME),
            crash_output,
            core_file,
        }))
    }

    fn move_core_file(&self, core: Utf8PathBuf) -> Result<Utf8PathBuf, HarnessError> {
        let to = self.launcher.work_dir().join(TEST_CORE_FILE_NAME);
        debug!("moving core file `{core}` to `{to}`");

        // Cores may be written to another file system (e.g. /cores on macOS), which rename can't
        // cross.
        let result = std::fs::rename(&core, &to).or_else(|_| {
            std::fs::copy(&core, &to)?;
            std::fs::remove_file(&core)
        });
        match result {
            Ok(()) => Ok(to),
            Err(err) => Err(HarnessError::MoveCoreFile { from: core, to, err }),
        }
    }
}

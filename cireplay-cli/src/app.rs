// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

use crate::{
    ExpectedError, Result,
    errors::CireplayExitCode,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use cireplay_runner::{
    capabilities::VmCapabilities,
    cleaner::ArtifactCleaner,
    config::HarnessConfig,
    errors::ScenarioError,
    jvm::JvmLauncher,
    orchestrator::{ScenarioConfig, ScenarioOrchestrator, VmFlavor},
    platform::HostPlatform,
    process::DuctRunner,
    scenarios::ScenarioKind,
};
use clap::{Args, Subcommand};
use std::io::Write;
use tracing::info;

/// Checks that JVM compiler replay works.
///
/// Each scenario crashes the JIT compiler on purpose so that it dumps replay data, then replays
/// that data with different VM options and checks the exit codes.
#[derive(Debug, clap::Parser)]
#[command(
    name = "cireplay",
    version,
    styles = clap_styles::style(),
    max_term_width = 100,
)]
pub struct CireplayApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    common: CommonOpts,

    #[clap(subcommand)]
    command: Command,
}

impl CireplayApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let work_dir = self.common.work_dir()?;
        let config = HarnessConfig::from_sources(&work_dir, self.common.config_file.as_deref())?;
        let platform = HostPlatform::current();

        match self.command {
            Command::ShowConfig => {
                let mut writer = output_writer.stdout_writer();
                write!(writer, "{}", config.to_toml()?)?;
                writer.flush()?;
            }
            Command::Clean => {
                ArtifactCleaner::new(&work_dir, platform, config.cleanup())
                    .cleanup()
                    .map_err(|err| ExpectedError::CleanupFailed { err })?;
                info!("cleaned up `{work_dir}`");
            }
            Command::Probe => {
                let launcher = self.common.launcher(&config, &work_dir, platform);
                let capabilities = probe(&launcher)?;
                let mut writer = output_writer.stdout_writer();
                write!(writer, "{}", toml::to_string(&capabilities)?)?;
                writer.flush()?;
            }
            Command::Run { scenario } => {
                let launcher = self.common.launcher(&config, &work_dir, platform);
                let (kind, flavor) = scenario.kind_and_flavor();
                let scenario_config = ScenarioConfig {
                    flavor,
                    capabilities: probe(&launcher)?,
                };

                let runner = DuctRunner;
                let outcome = ScenarioOrchestrator::new(
                    kind.hook(),
                    scenario_config,
                    &config,
                    launcher,
                    &runner,
                )?
                .run();

                let mut writer = output_writer.stdout_writer();
                outcome
                    .report
                    .write_human(&mut writer, output.colorize_stdout())?;
                writer.flush()?;

                let scenario = kind.name().to_owned();
                match outcome.result {
                    Ok(()) => {}
                    Err(ScenarioError::Assertion(failure)) => {
                        return Err(ExpectedError::ScenarioFailed { scenario, failure });
                    }
                    Err(ScenarioError::Harness(err)) => {
                        return Err(ExpectedError::ScenarioAborted { scenario, err });
                    }
                }
            }
        }

        Ok(CireplayExitCode::OK)
    }
}

fn probe(launcher: &JvmLauncher) -> Result<VmCapabilities> {
    VmCapabilities::probe(launcher, &DuctRunner).map_err(|err| ExpectedError::ProbeFailed { err })
}

#[derive(Debug, Args)]
struct CommonOpts {
    /// Config file [default: <work-dir>/.config/cireplay.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Directory JVMs are run in, and artifacts are written to [default: current directory]
    #[arg(long, global = true, value_name = "DIR", env = "CIREPLAY_WORK_DIR")]
    work_dir: Option<Utf8PathBuf>,

    /// Java launcher to test, overriding `jvm.java` in the config
    #[arg(long, global = true, value_name = "PATH")]
    java: Option<String>,
}

impl CommonOpts {
    fn work_dir(&self) -> Result<Utf8PathBuf> {
        let work_dir = match &self.work_dir {
            Some(work_dir) => work_dir.clone(),
            None => {
                let current_dir = std::env::current_dir()
                    .map_err(|err| ExpectedError::CurrentDirFailed { err })?;
                Utf8PathBuf::try_from(current_dir).map_err(|err| {
                    ExpectedError::WorkDirInvalid {
                        path: Utf8PathBuf::from(err.as_path().to_string_lossy().into_owned()),
                        reason: "path is not valid UTF-8".to_owned(),
                    }
                })?
            }
        };

        if !work_dir.is_dir() {
            return Err(ExpectedError::WorkDirInvalid {
                path: work_dir,
                reason: "not a directory".to_owned(),
            });
        }
        Ok(work_dir)
    }

    fn launcher(
        &self,
        config: &HarnessConfig,
        work_dir: &Utf8Path,
        platform: HostPlatform,
    ) -> JvmLauncher {
        let mut jvm_config = config.jvm().clone();
        if let Some(java) = &self.java {
            jvm_config.java = java.clone();
        }
        JvmLauncher::new(&jvm_config, work_dir, platform)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a replay scenario
    Run {
        #[clap(subcommand)]
        scenario: RunCommand,
    },
    /// Print what the JVM under test supports
    Probe,
    /// Remove core files, replay data and crash logs from the working directory
    Clean,
    /// Print the resolved configuration as TOML
    ShowConfig,
}

#[derive(Debug, Subcommand)]
enum RunCommand {
    /// Replay with default and tiered options
    Common,
    /// Check that replay data only replays on a compatible VM flavor
    Vm {
        /// The VM flavor the replay data is generated with: server, client
        #[arg(long, value_name = "FLAVOR")]
        flavor: VmFlavor,
    },
    /// Check that inlining decisions are recorded and replayed
    Inlining,
    /// Replay data whose compile records lack the compile level
    NoCompLevel,
}

impl RunCommand {
    fn kind_and_flavor(&self) -> (ScenarioKind, Option<VmFlavor>) {
        match self {
            Self::Common => (ScenarioKind::Common, None),
            Self::Vm { flavor } => (ScenarioKind::Vm, Some(*flavor)),
            Self::Inlining => (ScenarioKind::Inlining, None),
            Self::NoCompLevel => (ScenarioKind::NoCompLevel, None),
        }
    }
}

// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a scenario: clean, generate replay data, replay it with different options, clean.
//!
//! A scenario is driven by a [`ScenarioOrchestrator`], which hands a [`ScenarioContext`] to the
//! scenario's [`ScenarioHook`]. The context exposes the building blocks (generating replay data,
//! replaying it and checking the exit code) that scenarios are assembled from.
//!
//! Errors are handled in two ways:
//!
//! * [`HarnessError`]s abort the scenario right away. The working directory is not cleaned up, so
//!   the artifacts are still around to be inspected.
//! * [`AssertionFailure`]s stop the remaining checks, but the working directory is cleaned up
//!   before the failure is reported.

use crate::{
    analyzer::ReplayAnalyzer,
    capabilities::VmCapabilities,
    cleaner::ArtifactCleaner,
    config::{HarnessConfig, WorkloadConfig},
    errors::{AssertionFailure, HarnessError, ScenarioError, UnknownWorkload, VmFlavorParseError},
    generator::{GeneratedReplay, GenerationOutcome, ReplayGenerator},
    jvm::{JvmLauncher, comp_level, vm_options},
    player::ReplayPlayer,
    process::ProcessRunner,
    reporter::{Expectation, ScenarioReport, ScenarioResult},
};
use serde::Serialize;
use std::{fmt, str::FromStr};
use tracing::{debug, info};

/// The VM flavor a scenario checks replay compatibility against.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VmFlavor {
    /// The server VM, compiling at full optimization.
    Server,

    /// The client VM, compiling at the simple level.
    Client,
}

impl VmFlavor {
    /// Returns the string representations of all flavors.
    pub fn variants() -> &'static [&'static str] {
        &["server", "client"]
    }

    /// The compile level replay data generated by this flavor has with tiering disabled.
    pub fn expected_comp_level(self) -> i32 {
        match self {
            Self::Server => comp_level::FULL_OPTIMIZATION,
            Self::Client => comp_level::SIMPLE,
        }
    }
}

impl FromStr for VmFlavor {
    type Err = VmFlavorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            other => Err(VmFlavorParseError::new(other)),
        }
    }
}

impl fmt::Display for VmFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Settings for a single scenario run.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScenarioConfig {
    /// The VM flavor, required by [`ScenarioContext::run_vm_tests`].
    pub flavor: Option<VmFlavor>,

    /// What the JVM under test supports.
    pub capabilities: VmCapabilities,
}

/// Where a scenario run is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScenarioState {
    /// No artifacts are present.
    Clean,

    /// The crashing JVM ran.
    Generated,

    /// The replay data has at least one `compile` record.
    Validated,

    /// The replay data was replayed at least once.
    Played,

    /// Artifacts were removed after use.
    Cleaned,
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Generated => write!(f, "generated"),
            Self::Validated => write!(f, "validated"),
            Self::Played => write!(f, "played"),
            Self::Cleaned => write!(f, "cleaned"),
        }
    }
}

/// The customizable part of a scenario.
pub trait ScenarioHook {
    /// The scenario's name, for reporting.
    fn name(&self) -> &str;

    /// The workload whose compilation is crashed.
    fn workload(&self) -> &str {
        HarnessConfig::DEFAULT_WORKLOAD
    }

    /// Whether the initial replay data is generated along with a core file.
    fn need_core_dump(&self) -> bool {
        false
    }

    /// Options for the JVM generating the initial replay data.
    fn generator_args(&self) -> &[&'static str] {
        &[]
    }

    /// The checks to run once the initial replay data exists.
    fn test_action(&self, cx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError>;
}

/// The result of [`ScenarioOrchestrator::run`].
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// The replays that ran, including the one that failed, if any.
    pub report: ScenarioReport,

    /// How the scenario ended.
    pub result: Result<(), ScenarioError>,
}

/// Runs a scenario from start to finish.
pub struct ScenarioOrchestrator<'a> {
    hook: Box<dyn ScenarioHook + 'a>,
    cx: ScenarioContext<'a>,
}

impl<'a> ScenarioOrchestrator<'a> {
    /// Creates a new orchestrator for `hook`.
    ///
    /// Fails if the hook's workload isn't configured.
    pub fn new(
        hook: Box<dyn ScenarioHook + 'a>,
        config: ScenarioConfig,
        harness_config: &HarnessConfig,
        launcher: JvmLauncher,
        runner: &'a dyn ProcessRunner,
    ) -> Result<Self, UnknownWorkload> {
        let workload = harness_config.workload(hook.workload())?.clone();
        let cleaner = ArtifactCleaner::new(
            launcher.work_dir(),
            launcher.platform(),
            harness_config.cleanup(),
        );
        let cx = ScenarioContext {
            report: ScenarioReport::new(hook.name()),
            analyzer: ReplayAnalyzer::new(launcher.work_dir()),
            state: ScenarioState::Clean,
            config,
            workload,
            cleaner,
            launcher,
            runner,
        };
        Ok(Self { hook, cx })
    }

    /// Runs the scenario.
    pub fn run(self) -> ScenarioOutcome {
        let Self { hook, mut cx } = self;
        info!("running scenario `{}`", hook.name());

        let result = cx.run_test(hook.need_core_dump(), hook.generator_args(), |cx| {
            hook.test_action(cx)
        });
        match &result {
            Ok(()) => info!("scenario `{}` passed", hook.name()),
            Err(error) => debug!("scenario `{}` ended with: {error}", hook.name()),
        }

        ScenarioOutcome {
            report: cx.report,
            result,
        }
    }
}

/// The operations a [`ScenarioHook`] builds checks from.
pub struct ScenarioContext<'a> {
    config: ScenarioConfig,
    workload: WorkloadConfig,
    launcher: JvmLauncher,
    runner: &'a dyn ProcessRunner,
    cleaner: ArtifactCleaner,
    analyzer: ReplayAnalyzer,
    report: ScenarioReport,
    state: ScenarioState,
}

impl ScenarioContext<'_> {
    /// The scenario settings.
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// What the JVM under test supports.
    pub fn capabilities(&self) -> &VmCapabilities {
        &self.config.capabilities
    }

    /// The analyzer for the current replay data.
    pub fn analyzer(&self) -> &ReplayAnalyzer {
        &self.analyzer
    }

    /// The replays run so far.
    pub fn report(&self) -> &ScenarioReport {
        &self.report
    }

    /// The current state.
    pub fn state(&self) -> ScenarioState {
        self.state
    }

    fn transition(&mut self, to: ScenarioState) {
        if self.state != to {
            debug!("scenario state: {} -> {to}", self.state);
            self.state = to;
        }
    }

    /// Cleans up, generates replay data with `generator_args`, runs `action` and cleans up again.
    ///
    /// An assertion failure in `action` is returned after the final cleanup; infrastructure
    /// errors are returned right away.
    pub fn run_test<F>(
        &mut self,
        need_core_dump: bool,
        generator_args: &[&str],
        action: F,
    ) -> Result<(), ScenarioError>
    where
        F: FnOnce(&mut Self) -> Result<(), ScenarioError>,
    {
        self.cleanup()?;
        self.generate_replay(need_core_dump, generator_args)?;

        match action(self) {
            Ok(()) => {
                self.cleanup()?;
                Ok(())
            }
            Err(ScenarioError::Assertion(failure)) => {
                self.cleanup()?;
                Err(failure.into())
            }
            Err(error @ ScenarioError::Harness(_)) => Err(error),
        }
    }

    /// Removes all artifacts from the working directory.
    pub fn cleanup(&mut self) -> Result<(), HarnessError> {
        self.cleaner.cleanup()?;
        let to = match self.state {
            ScenarioState::Clean => ScenarioState::Clean,
            _ => ScenarioState::Cleaned,
        };
        self.transition(to);
        Ok(())
    }

    /// Generates replay data and checks that it has a `compile` record.
    pub fn generate_replay(
        &mut self,
        need_core_dump: bool,
        generator_args: &[&str],
    ) -> Result<GeneratedReplay, HarnessError> {
        let generator = ReplayGenerator::new(
            &self.launcher,
            self.runner,
            &self.cleaner,
            self.workload.clone(),
        );
        let generated = match generator.generate_replay(need_core_dump, generator_args)? {
            GenerationOutcome::Generated(generated) => generated,
            GenerationOutcome::CoresUnavailable { reason } => {
                return Err(HarnessError::HostNotConfigured { reason });
            }
        };
        self.transition(ScenarioState::Generated);

        self.analyzer.first_compile_record()?;
        self.transition(ScenarioState::Validated);
        Ok(generated)
    }

    /// Returns the compile level recorded in the replay data.
    pub fn comp_level_from_replay(&self) -> Result<i32, HarnessError> {
        self.analyzer.comp_level_from_replay()
    }

    /// Replays with `vm_opts`, returning the exit code.
    pub fn start_test(&mut self, vm_opts: &[&str]) -> Result<i32, HarnessError> {
        let exit_code = ReplayPlayer::new(&self.launcher, self.runner).start_test(vm_opts)?;
        self.transition(ScenarioState::Played);
        Ok(exit_code)
    }

    /// Replays with `vm_opts`, which must succeed.
    pub fn positive_test(&mut self, vm_opts: &[&str]) -> Result<(), ScenarioError> {
        self.replay_expecting(Expectation::Positive, vm_opts)
    }

    /// Replays with `vm_opts`, which must fail.
    pub fn negative_test(&mut self, vm_opts: &[&str]) -> Result<(), ScenarioError> {
        self.replay_expecting(Expectation::Negative, vm_opts)
    }

    fn replay_expecting(
        &mut self,
        expectation: Expectation,
        vm_opts: &[&str],
    ) -> Result<(), ScenarioError> {
        let exit_code = self.start_test(vm_opts)?;
        let result = ScenarioResult {
            expectation,
            options: vm_opts.iter().map(|opt| (*opt).to_owned()).collect(),
            exit_code,
        };
        let passed = result.passed();
        self.report.push(result);

        if passed {
            Ok(())
        } else {
            Err(AssertionFailure::exit_code(expectation, vm_opts, exit_code).into())
        }
    }

    /// Replays without extra options, and with tiered compilation if the VM supports it.
    pub fn common_tests(&mut self) -> Result<(), ScenarioError> {
        self.positive_test(&[])?;
        if self.capabilities().tiered_supported {
            self.positive_test(&[vm_options::TIERED_ENABLED])?;
        }
        Ok(())
    }

    /// Checks that replay data is tied to the VM flavor that generated it.
    pub fn run_vm_tests(&mut self) -> Result<(), ScenarioError> {
        let flavor = self.config.flavor.ok_or(HarnessError::VmFlavorRequired)?;
        let capabilities = self.config.capabilities;
        match flavor {
            VmFlavor::Server => {
                if capabilities.client_vm_available {
                    self.negative_test(&[vm_options::CLIENT_VM])?;
                }
            }
            VmFlavor::Client => {
                if capabilities.server_vm_available {
                    self.negative_test(&[vm_options::TIERED_DISABLED, vm_options::SERVER_VM])?;
                    if capabilities.tiered_supported {
                        self.positive_test(&[vm_options::TIERED_ENABLED, vm_options::SERVER_VM])?;
                    }
                }
            }
        }
        self.non_tiered_tests(flavor.expected_comp_level())
    }

    /// Replays with tiering disabled, which only works if the replay data has the compile level
    /// that non-tiered compilation uses.
    pub fn non_tiered_tests(&mut self, expected_comp_level: i32) -> Result<(), ScenarioError> {
        let comp_level = self.comp_level_from_replay()?;
        if comp_level == expected_comp_level {
            self.positive_test(&[vm_options::TIERED_DISABLED])
        } else {
            self.negative_test(&[vm_options::TIERED_DISABLED])
        }
    }
}

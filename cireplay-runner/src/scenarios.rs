// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The built-in scenarios.

use crate::{
    errors::{AssertionFailure, ScenarioError},
    jvm::{comp_level, vm_options},
    orchestrator::{ScenarioContext, ScenarioHook, VmFlavor},
};
use tracing::info;

/// A built-in scenario.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScenarioKind {
    /// Replay with default and tiered options.
    Common,

    /// Check replay data against the VM flavor that generated it.
    Vm,

    /// Check that inlining decisions are recorded and replayed.
    Inlining,

    /// Replay data without compile levels.
    NoCompLevel,
}

impl ScenarioKind {
    /// The scenario's name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Vm => "vm",
            Self::Inlining => "inlining",
            Self::NoCompLevel => "no-comp-level",
        }
    }

    /// Returns the hook implementing this scenario.
    pub fn hook(self) -> Box<dyn ScenarioHook> {
        match self {
            Self::Common => Box::new(CommonScenario),
            Self::Vm => Box::new(VmScenario),
            Self::Inlining => Box::new(InliningScenario),
            Self::NoCompLevel => Box::new(NoCompLevelScenario),
        }
    }
}

/// Generates replay data without a core file and replays it.
#[derive(Clone, Copy, Debug)]
pub struct CommonScenario;

impl ScenarioHook for CommonScenario {
    fn name(&self) -> &str {
        ScenarioKind::Common.name()
    }

    fn test_action(&self, cx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
        cx.common_tests()
    }
}

/// Generates replay data along with a core file, then checks that it replays only on a compatible
/// VM.
///
/// This is the scenario that covers generation with a core dump: the crashing JVM runs under
/// `ulimit -c unlimited`, and the core is located and kept as `test_core` for post-mortem tools.
/// Nothing here reads the core, but a host that can't write one fails the scenario.
///
/// With a tiered server VM, replay data is also generated at each tiered stop level below full
/// optimization, and must record a compile level no higher than the stop level.
#[derive(Clone, Copy, Debug)]
pub struct VmScenario;

impl VmScenario {
    const STOP_LEVELS: std::ops::RangeInclusive<i32> = comp_level::SIMPLE..=3;
}

impl ScenarioHook for VmScenario {
    fn name(&self) -> &str {
        ScenarioKind::Vm.name()
    }

    fn need_core_dump(&self) -> bool {
        true
    }

    fn test_action(&self, cx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
        cx.common_tests()?;
        cx.run_vm_tests()?;
        cx.cleanup()?;

        if cx.config().flavor != Some(VmFlavor::Server) || !cx.capabilities().tiered_enabled {
            return Ok(());
        }
        for stop_level in Self::STOP_LEVELS {
            info!("checking replay data generated with tiered stop level {stop_level}");
            let option = vm_options::tiered_stop_at_level(stop_level);
            cx.generate_replay(true, &[option.as_str()])?;

            let level = cx.comp_level_from_replay()?;
            if level <= 0 || level > stop_level {
                return Err(AssertionFailure::new(
                    format!("unexpected compile level with {option}"),
                    format!("1..={stop_level}"),
                    level.to_string(),
                )
                .into());
            }
            cx.positive_test(&[option.as_str()])?;
            cx.cleanup()?;
        }
        Ok(())
    }
}

/// Checks that inlining decisions made at full optimization are recorded.
#[derive(Clone, Copy, Debug)]
pub struct InliningScenario;

impl InliningScenario {
    const WORKLOAD: &'static str = "inlining";
    const INLINE_FLAG: &'static str = "inline";
}

impl ScenarioHook for InliningScenario {
    fn name(&self) -> &str {
        ScenarioKind::Inlining.name()
    }

    fn workload(&self) -> &str {
        Self::WORKLOAD
    }

    fn generator_args(&self) -> &[&'static str] {
        &[vm_options::TIERED_DISABLED]
    }

    fn test_action(&self, cx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
        let record = cx.analyzer().first_compile_record()?;

        let expected_level = comp_level::FULL_OPTIMIZATION.to_string();
        let level = record.level_token().unwrap_or_default();
        if level != expected_level {
            return Err(AssertionFailure::new(
                "unexpected compile level in the first compile record",
                expected_level,
                level,
            )
            .into());
        }

        let inline_flag = record.inline_flag().unwrap_or_default();
        if inline_flag != Self::INLINE_FLAG {
            return Err(AssertionFailure::new(
                "no inlining decisions in the first compile record",
                Self::INLINE_FLAG,
                inline_flag,
            )
            .into());
        }

        cx.positive_test(&[vm_options::TIERED_DISABLED])
    }
}

/// Replays data whose compile records lack the compile level, as written by older VMs.
#[derive(Clone, Copy, Debug)]
pub struct NoCompLevelScenario;

impl ScenarioHook for NoCompLevelScenario {
    fn name(&self) -> &str {
        ScenarioKind::NoCompLevel.name()
    }

    fn test_action(&self, cx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
        cx.analyzer().strip_last_token_of_compile_records()?;

        let capabilities = *cx.capabilities();
        if capabilities.client_vm_available {
            cx.negative_test(&[vm_options::CLIENT_VM])?;
        }
        if capabilities.server_vm_available {
            cx.positive_test(&[vm_options::TIERED_DISABLED, vm_options::SERVER_VM])?;
            cx.positive_test(&[vm_options::TIERED_ENABLED, vm_options::SERVER_VM])?;
        }
        Ok(())
    }
}

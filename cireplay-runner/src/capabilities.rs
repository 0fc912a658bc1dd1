// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probing what the JVM under test supports.
//!
//! The probe launches a handful of short-lived JVMs, so callers should run it once and hand the
//! result to every scenario that needs it.

use crate::{
    errors::HarnessError,
    jvm::{JvmLauncher, vm_options},
    process::ProcessRunner,
};
use serde::Serialize;
use tracing::debug;

/// What the JVM under test supports, as observed by [`VmCapabilities::probe`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VmCapabilities {
    /// `-client` selects a client VM.
    pub client_vm_available: bool,

    /// `-server` selects a server VM.
    pub server_vm_available: bool,

    /// The VM was built with tiered compilers.
    pub tiered_supported: bool,

    /// Tiered compilation is on with the configured options.
    pub tiered_enabled: bool,
}

impl VmCapabilities {
    const COMPILER_PROPERTY: &'static str = "sun.management.compiler";
    const TIERED_COMPILERS: &'static str = "Tiered Compilers";
    const TIERED_FLAG: &'static str = "TieredCompilation";

    /// Runs the probe JVMs.
    pub fn probe(
        launcher: &JvmLauncher,
        runner: &dyn ProcessRunner,
    ) -> Result<Self, HarnessError> {
        let client_vm_available = runner
            .run(&launcher.test_jvm([vm_options::CLIENT_VM, vm_options::VERSION]))?
            .output()
            .contains("Client");
        let server_vm_available = runner
            .run(&launcher.test_jvm([vm_options::SERVER_VM, vm_options::VERSION]))?
            .output()
            .contains("Server");

        let settings = runner.run(&launcher.test_jvm([
            "-XX:+PrintFlagsFinal",
            "-XshowSettings:properties",
            vm_options::VERSION,
        ]))?;
        let tiered_supported = find_property(settings.output(), Self::COMPILER_PROPERTY)
            .is_some_and(|compiler| compiler.contains(Self::TIERED_COMPILERS));
        let tiered_enabled = tiered_supported
            && find_bool_flag(settings.output(), Self::TIERED_FLAG).unwrap_or(false);

        let capabilities = Self {
            client_vm_available,
            server_vm_available,
            tiered_supported,
            tiered_enabled,
        };
        debug!(?capabilities, "probed JVM capabilities");
        Ok(capabilities)
    }
}

/// Finds `name = value` in `-XshowSettings:properties` output.
fn find_property<'a>(output: &'a str, name: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// Finds the final value of a boolean flag in `-XX:+PrintFlagsFinal` output, where lines look like
/// `bool TieredCompilation = true {pd product} {default}`.
fn find_bool_flag(output: &str, name: &str) -> Option<bool> {
    output.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        if tokens.next()? != "bool" || tokens.next()? != name || tokens.next()? != "=" {
            return None;
        }
        tokens.next()?.parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        platform::HostPlatform,
        test_helpers::{FakeJvm, test_launcher},
    };
    use camino_tempfile::tempdir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn probe_server_only_vm() {
        let dir = tempdir().unwrap();
        let jvm = FakeJvm::server();
        let launcher = test_launcher(dir.path(), HostPlatform::Linux);

        let capabilities = VmCapabilities::probe(&launcher, &jvm).unwrap();
        assert_eq!(
            capabilities,
            VmCapabilities {
                client_vm_available: false,
                server_vm_available: true,
                tiered_supported: true,
                tiered_enabled: true,
            }
        );
        assert_eq!(jvm.commands().len(), 3, "one JVM per probe");
    }

    #[test]
    fn probe_client_vm_without_tiers() {
        let dir = tempdir().unwrap();
        let mut jvm = FakeJvm::server();
        jvm.client_vm = true;
        jvm.server_vm = false;
        jvm.tiered = false;
        let launcher = test_launcher(dir.path(), HostPlatform::Linux);

        let capabilities = VmCapabilities::probe(&launcher, &jvm).unwrap();
        assert_eq!(
            capabilities,
            VmCapabilities {
                client_vm_available: true,
                server_vm_available: false,
                tiered_supported: false,
                tiered_enabled: false,
            }
        );
    }

    const SETTINGS: &str = indoc! {"
             bool TieredCompilation                        = false     {pd product} {command line}
             intx TieredStopAtLevel                        = 4         {product} {default}
        Property settings:
            java.vm.name = OpenJDK 64-Bit Server VM
            sun.management.compiler = HotSpot 64-Bit Tiered Compilers
    "};

    #[test]
    fn parse_settings() {
        assert_eq!(
            find_property(SETTINGS, "sun.management.compiler"),
            Some("HotSpot 64-Bit Tiered Compilers")
        );
        assert_eq!(find_property(SETTINGS, "java.home"), None);
    }

    #[test_case("TieredCompilation", Some(false) ; "present")]
    #[test_case("TieredStopAtLevel", None ; "not a bool")]
    #[test_case("UseJVMCICompiler", None ; "absent")]
    fn parse_bool_flags(name: &str, expected: Option<bool>) {
        assert_eq!(find_bool_flag(SETTINGS, name), expected);
    }
}

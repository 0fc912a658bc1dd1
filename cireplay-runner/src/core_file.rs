// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding the core file of a crashed JVM.
//!
//! HotSpot prints where it expects the core file to be written as part of its crash report, for
//! example:
//!
//! ```text
//! # Core dump will be written. Default location: /work/core.1234
//! # Core dump will be written. Default location: Core dumps may be processed with "/usr/share/apport/apport %p" (or dumping to /work/core.1234)
//! # Core dumps have been disabled. To enable core dumping, try "ulimit -c unlimited" before starting Java again
//! ```
//!
//! When the report doesn't say, the platform's conventions are used instead.

use crate::{helpers::expand_core_pattern, platform::HostPlatform};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

/// Where the core file of a crashed process ended up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CoreLocation {
    /// The core file was found.
    Found(Utf8PathBuf),

    /// This host doesn't write core files where the harness can get at them.
    Unavailable {
        /// Why not.
        reason: String,
    },

    /// The core file should exist, but doesn't.
    NotFound,
}

/// Looks up core files.
#[derive(Clone, Debug)]
pub struct CoreLocator {
    work_dir: Utf8PathBuf,
    platform: HostPlatform,
    core_pattern_path: Utf8PathBuf,
}

impl CoreLocator {
    /// The Linux kernel setting describing how core files are named.
    pub const CORE_PATTERN_PATH: &'static str = "/proc/sys/kernel/core_pattern";

    const LOCATION_STRING: &'static str = "location: ";
    const DUMPING_TO_STRING: &'static str = "or dumping to ";
    const CORES_DISABLED_STRING: &'static str = "Core dumps have been disabled";

    /// Creates a new locator for processes that ran in `work_dir`.
    pub fn new(work_dir: &Utf8Path, platform: HostPlatform) -> Self {
        Self {
            work_dir: work_dir.to_owned(),
            platform,
            core_pattern_path: Self::CORE_PATTERN_PATH.into(),
        }
    }

    #[cfg(test)]
    fn with_core_pattern_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.core_pattern_path = path.into();
        self
    }

    /// Locates the core file of the process `pid`, which printed `crash_output`.
    pub fn locate(&self, crash_output: &str, pid: u32) -> CoreLocation {
        if crash_output.contains(Self::CORES_DISABLED_STRING) {
            return CoreLocation::Unavailable {
                reason: "the crashed JVM reported that core dumps have been disabled".to_owned(),
            };
        }

        if let Some(reported) = parse_core_location(crash_output) {
            debug!("crash output reports core location `{reported}`");
            let reported = self.work_dir.join(reported);
            if let Some(found) = [reported.clone(), Utf8PathBuf::from(format!("{reported}.{pid}"))]
                .into_iter()
                .find(|path| path.is_file())
            {
                return CoreLocation::Found(found);
            }
        }

        match self.platform {
            HostPlatform::MacOs => self.first_existing([format!("/cores/core.{pid}").into()]),
            HostPlatform::Linux => self.locate_with_core_pattern(pid),
            HostPlatform::Windows | HostPlatform::OtherUnix => self.first_existing([
                self.work_dir.join("core"),
                self.work_dir.join(format!("core.{pid}")),
            ]),
        }
    }

    fn locate_with_core_pattern(&self, pid: u32) -> CoreLocation {
        let mut candidates = Vec::new();
        match std::fs::read_to_string(&self.core_pattern_path) {
            Ok(pattern) => {
                let pattern = pattern.trim();
                if pattern.starts_with('|') {
                    return CoreLocation::Unavailable {
                        reason: format!("core dumps are piped to an external program: `{pattern}`"),
                    };
                }
                if !pattern.is_empty() {
                    candidates.push(self.work_dir.join(expand_core_pattern(pattern, pid)));
                }
            }
            Err(error) => {
                debug!("failed to read `{}`: {error}", self.core_pattern_path);
            }
        }
        candidates.push(self.work_dir.join("core"));
        candidates.push(self.work_dir.join(format!("core.{pid}")));
        self.first_existing(candidates)
    }

    fn first_existing(&self, candidates: impl IntoIterator<Item = Utf8PathBuf>) -> CoreLocation {
        candidates
            .into_iter()
            .find(|path| path.is_file())
            .map_or(CoreLocation::NotFound, CoreLocation::Found)
    }
}

/// Extracts the core file path from HotSpot's crash report, if it has one.
fn parse_core_location(crash_output: &str) -> Option<&str> {
    let line = crash_output
        .lines()
        .find(|line| line.contains(CoreLocator::LOCATION_STRING))?;
    let (_, location) = line.split_once(CoreLocator::LOCATION_STRING)?;

    // When cores are post-processed, the path is in a parenthesized suffix.
    let location = match location.split_once(CoreLocator::DUMPING_TO_STRING) {
        Some((_, dumping_to)) => dumping_to
            .trim_end()
            .strip_suffix(')')
            .unwrap_or(dumping_to),
        None => location,
    };

    let location = location.trim();
    (!location.is_empty()).then_some(location)
}

// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host platform differences that matter to replay scenarios.

use std::fmt;

/// The platform the harness (and the JVMs it launches) runs on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostPlatform {
    /// Linux.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
    /// Any other Unix-like platform.
    OtherUnix,
}

impl HostPlatform {
    /// Returns the platform this binary was built for.
    pub fn current() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                Self::Linux
            } else if #[cfg(target_os = "macos")] {
                Self::MacOs
            } else if #[cfg(windows)] {
                Self::Windows
            } else {
                Self::OtherUnix
            }
        }
    }

    /// Returns true if this is Windows.
    pub fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }

    /// The prefix of the crash logs the JVM writes into its working directory.
    pub fn crash_log_prefix(self) -> &'static str {
        "hs_err_pid"
    }

    /// File deletion isn't immediately observable on Windows: deleted files must be polled for.
    pub fn requires_deletion_poll(self) -> bool {
        self.is_windows()
    }

    /// The separator between classpath entries.
    pub fn classpath_separator(self) -> &'static str {
        if self.is_windows() { ";" } else { ":" }
    }

    /// The file name of the java launcher.
    pub fn java_executable(self) -> &'static str {
        if self.is_windows() { "java.exe" } else { "java" }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
            Self::OtherUnix => write!(f, "unix"),
        }
    }
}

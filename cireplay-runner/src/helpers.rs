// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for cireplay-runner.

use std::process::ExitStatus;

/// Converts an exit status into the exit code a Java process launcher would report.
///
/// A process killed by signal `n` is reported as `128 + n`.
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Expands the pid placeholders of a Linux core pattern.
pub(crate) fn expand_core_pattern(pattern: &str, pid: u32) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('p') | Some('P') => out.push_str(&pid.to_string()),
            Some('%') => out.push('%'),
            // Other specifiers (%e, %t, ...) can't be predicted: keep them so the lookup fails.
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

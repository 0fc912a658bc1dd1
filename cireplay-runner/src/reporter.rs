// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording and displaying the replays a scenario ran.

use owo_colors::{OwoColorize, Style};
use serde::Serialize;
use std::{fmt, io};
use swrite::{SWrite, swrite};

/// What a replay is expected to do.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Expectation {
    /// The replay succeeds: exit code 0.
    Positive,

    /// The replay fails: any non-zero exit code.
    Negative,
}

impl Expectation {
    /// Whether `exit_code` meets this expectation.
    pub fn is_met(self, exit_code: i32) -> bool {
        match self {
            Self::Positive => exit_code == 0,
            Self::Negative => exit_code != 0,
        }
    }

    /// The expected exit code, for display.
    pub fn describe_exit_code(self) -> &'static str {
        match self {
            Self::Positive => "0",
            Self::Negative => "non-zero",
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// A single replay and its outcome.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioResult {
    /// The expected outcome.
    pub expectation: Expectation,

    /// The options the replay was run with, on top of the replay options.
    pub options: Vec<String>,

    /// The exit code of the replaying JVM.
    pub exit_code: i32,
}

impl ScenarioResult {
    /// Whether the replay behaved as expected.
    pub fn passed(&self) -> bool {
        self.expectation.is_met(self.exit_code)
    }
}

/// Everything a scenario run did, in order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ScenarioReport {
    scenario: String,
    results: Vec<ScenarioResult>,
}

impl ScenarioReport {
    /// Creates an empty report for `scenario`.
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            results: Vec::new(),
        }
    }

    /// The name of the scenario.
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// The replays run so far.
    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    pub(crate) fn push(&mut self, result: ScenarioResult) {
        self.results.push(result);
    }

    /// Returns a one-line summary, e.g. `3 replays run: 3 passed, 0 failed`.
    pub fn summary(&self) -> String {
        let passed = self.results.iter().filter(|r| r.passed()).count();
        let mut out = String::new();
        swrite!(
            out,
            "{} {} run: {passed} passed, {} failed",
            self.results.len(),
            plural_replays(self.results.len()),
            self.results.len() - passed,
        );
        out
    }

    /// Writes the report in human-readable form.
    pub fn write_human(&self, writer: &mut dyn io::Write, colorize: bool) -> io::Result<()> {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }

        writeln!(writer, "scenario {}:", self.scenario.style(styles.scenario))?;
        for result in &self.results {
            let (status, style) = if result.passed() {
                ("PASS", styles.pass)
            } else {
                ("FAIL", styles.fail)
            };
            let mut options = String::new();
            if result.options.is_empty() {
                options.push_str("(no options)");
            } else {
                options.push_str(&shell_words::join(&result.options));
            }
            writeln!(
                writer,
                "    {:>4} [{:>8}] exit {:>3} {}",
                status.style(style),
                result.expectation.to_string(),
                result.exit_code,
                options,
            )?;
        }
        writeln!(writer, "{}", self.summary().style(styles.count))
    }
}

fn plural_replays(count: usize) -> &'static str {
    if count == 1 { "replay" } else { "replays" }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    scenario: Style,
    count: Style,
    pass: Style,
    fail: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.scenario = Style::new().bold();
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
    }
}

// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for cireplay.
//!
//! The config is layered: the [default config](HarnessConfig::DEFAULT_CONFIG) is read first, then
//! the repository config (`.config/cireplay.toml` or an explicitly specified file), then
//! environment variables prefixed with `CIREPLAY_`.

use crate::errors::{ConfigReadError, ConfigReadErrorKind, UnknownWorkload};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};
use tracing::warn;

/// Overall configuration for cireplay.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HarnessConfig {
    jvm: JvmConfig,
    workloads: BTreeMap<String, WorkloadConfig>,
    cleanup: CleanupConfig,
}

impl HarnessConfig {
    /// The path, relative to the working directory, at which the config is looked up.
    pub const CONFIG_PATH: &'static str = ".config/cireplay.toml";

    /// The default config, embedded at build time.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Environment configuration uses this prefix, plus a _.
    pub const ENVIRONMENT_PREFIX: &'static str = "CIREPLAY";

    /// The workload used by scenarios that don't ask for a specific one.
    pub const DEFAULT_WORKLOAD: &'static str = "replay";

    /// Reads the config from `config_file` if specified, otherwise from
    /// [`CONFIG_PATH`](Self::CONFIG_PATH) under `work_dir` if it exists.
    ///
    /// Unknown keys are reported as warnings.
    pub fn from_sources(
        work_dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigReadError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = work_dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source).add_source(
            Environment::with_prefix(Self::ENVIRONMENT_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );
        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigReadError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in `{config_file}`: {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }

        Ok(config)
    }

    /// Returns the JVM config.
    pub fn jvm(&self) -> &JvmConfig {
        &self.jvm
    }

    /// Returns the workload with the given name.
    pub fn workload(&self, name: &str) -> Result<&WorkloadConfig, UnknownWorkload> {
        self.workloads
            .get(name)
            .ok_or_else(|| UnknownWorkload::new(name, self.workloads.keys()))
    }

    /// Returns the cleanup config.
    pub fn cleanup(&self) -> &CleanupConfig {
        &self.cleanup
    }

    #[cfg(test)]
    pub(crate) fn with_cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Renders the config as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(Self, BTreeSet<String>), ConfigReadErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigReadErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: Self = serde_path_to_error::deserialize(ignored_de).map_err(|error| {
            // The config crate reports the key as well: drop it so it's only printed once.
            let path = error.path().clone();
            let error = match error.into_inner() {
                ConfigError::At { error, .. } => *error,
                other => other,
            };
            ConfigReadErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                path, error,
            )))
        })?;

        Ok((config, ignored))
    }
}

/// How to launch JVMs.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct JvmConfig {
    /// The java launcher. Empty means "look it up".
    #[serde(default)]
    pub java: String,

    /// VM options passed to every JVM.
    #[serde(default)]
    pub vm_options: Vec<String>,

    /// Java options passed to every JVM, after the VM options.
    #[serde(default)]
    pub java_options: Vec<String>,

    /// Classpath entries.
    #[serde(default)]
    pub classpath: Vec<Utf8PathBuf>,
}

/// A Java program whose single method gets compiled, and crashes the compiler.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct WorkloadConfig {
    /// The fully qualified main class.
    pub main_class: String,

    /// The method of `main_class` that is compiled.
    pub method: String,
}

impl WorkloadConfig {
    /// Returns the `<class>::<method>` filter used with `-XX:CompileOnly`.
    pub fn compile_only_filter(&self) -> String {
        format!("{}::{}", self.main_class, self.method)
    }
}

/// Cleanup settings.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct CleanupConfig {
    /// How often to check whether a deleted file is gone.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// How long to wait for a deleted file to disappear.
    #[serde(with = "humantime_serde")]
    pub deletion_timeout: Duration,
}

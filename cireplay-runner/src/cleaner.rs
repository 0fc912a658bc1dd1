// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Removing stale artifacts from the working directory.

use crate::{
    artifacts::{CORE_PREFIX, REPLAY_FILE_NAME, REPLAY_PREFIX, TEST_CORE_FILE_NAME},
    config::CleanupConfig,
    errors::HarnessError,
    platform::HostPlatform,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Deletes core files, replay files and crash logs left behind by JVMs.
///
/// Deletion is best-effort: a file that can't be deleted is logged and skipped. The only errors
/// are failing to list the working directory, and (on Windows) a deleted file that never
/// disappears.
#[derive(Clone, Debug)]
pub struct ArtifactCleaner {
    work_dir: Utf8PathBuf,
    platform: HostPlatform,
    poll_interval: Duration,
    deletion_timeout: Duration,
}

impl ArtifactCleaner {
    /// Creates a new cleaner for `work_dir`.
    pub fn new(work_dir: &Utf8Path, platform: HostPlatform, config: &CleanupConfig) -> Self {
        Self {
            work_dir: work_dir.to_owned(),
            platform,
            poll_interval: config.poll_interval,
            deletion_timeout: config.deletion_timeout,
        }
    }

    /// Removes every known artifact.
    pub fn cleanup(&self) -> Result<(), HarnessError> {
        self.remove_starting_with(CORE_PREFIX)?;
        self.remove_starting_with(REPLAY_PREFIX)?;
        self.remove_starting_with(self.platform.crash_log_prefix())?;
        self.remove(TEST_CORE_FILE_NAME)?;
        self.remove(REPLAY_FILE_NAME)?;
        Ok(())
    }

    /// Removes every file in the working directory whose name starts with `prefix`.
    pub fn remove_starting_with(&self, prefix: &str) -> Result<(), HarnessError> {
        let read_dir_error = |err| HarnessError::ReadDir {
            dir: self.work_dir.clone(),
            err,
        };

        for entry in self.work_dir.read_dir_utf8().map_err(read_dir_error)? {
            let entry = match entry {
                Ok(entry) => entry,
                // Non-UTF-8 names can't match any prefix.
                Err(error) if error.kind() == std::io::ErrorKind::InvalidData => continue,
                Err(error) => return Err(read_dir_error(error)),
            };
            if !entry.file_name().starts_with(prefix) {
                continue;
            }
            if let Err(error) = std::fs::remove_file(entry.path()) {
                debug!("failed to remove `{}`: {error}", entry.path());
            }
        }

        Ok(())
    }

    fn remove(&self, file_name: &str) -> Result<(), HarnessError> {
        let path = self.work_dir.join(file_name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => debug!("failed to remove `{path}`: {error}"),
        }

        if self.platform.requires_deletion_poll() {
            self.wait_until_gone(&path)?;
        }
        Ok(())
    }

    fn wait_until_gone(&self, path: &Utf8Path) -> Result<(), HarnessError> {
        let start = Instant::now();
        while path.exists() {
            if start.elapsed() >= self.deletion_timeout {
                return Err(HarnessError::DeletionTimedOut {
                    path: path.to_owned(),
                    timeout: self.deletion_timeout,
                });
            }
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_cleanup_config;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;

    fn file_names(dir: &Utf8Path) -> Vec<String> {
        let mut names: Vec<_> = dir
            .read_dir_utf8()
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn removes_known_artifacts_only() {
        let dir = tempdir().unwrap();
        for name in [
            "core",
            "core.1234",
            "replay_pid1234.log",
            "hs_err_pid1234.log",
            "test_core",
            "test_replay.txt",
            "crash.out",
            "Workload.class",
            "my_core",
        ] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }

        let cleaner = ArtifactCleaner::new(dir.path(), HostPlatform::Linux, &test_cleanup_config());
        cleaner.cleanup().unwrap();

        assert_eq!(file_names(dir.path()), ["Workload.class", "crash.out", "my_core"]);
    }

    #[test]
    fn directories_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("cores")).unwrap();
        std::fs::write(dir.path().join("cores").join("core.1"), "x").unwrap();

        let cleaner = ArtifactCleaner::new(dir.path(), HostPlatform::Linux, &test_cleanup_config());
        cleaner.cleanup().unwrap();

        assert!(dir.path().join("cores").join("core.1").exists());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let dir = tempdir().unwrap();
        for platform in [HostPlatform::Linux, HostPlatform::Windows] {
            let cleaner = ArtifactCleaner::new(dir.path(), platform, &test_cleanup_config());
            cleaner.cleanup().unwrap();
            cleaner.cleanup().unwrap();
        }
        assert!(file_names(dir.path()).is_empty());
    }

    #[test]
    fn deletion_poll_waits_for_removal() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(REPLAY_FILE_NAME), "x").unwrap();

        let cleaner =
            ArtifactCleaner::new(dir.path(), HostPlatform::Windows, &test_cleanup_config());
        cleaner.cleanup().unwrap();
        assert!(!dir.path().join(REPLAY_FILE_NAME).exists());
    }

    #[test]
    fn deletion_poll_times_out() {
        let dir = tempdir().unwrap();
        // A non-empty directory can't be removed with remove_file, so it never goes away.
        let stuck = dir.path().join(TEST_CORE_FILE_NAME);
        std::fs::create_dir(&stuck).unwrap();
        std::fs::write(stuck.join("inner"), "x").unwrap();

        let config = CleanupConfig {
            poll_interval: Duration::from_millis(1),
            deletion_timeout: Duration::from_millis(20),
        };
        let cleaner = ArtifactCleaner::new(dir.path(), HostPlatform::Windows, &config);
        let error = cleaner.cleanup().unwrap_err();
        assert!(
            matches!(&error, HarnessError::DeletionTimedOut { path, .. } if *path == stuck),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let cleaner = ArtifactCleaner::new(&missing, HostPlatform::Linux, &test_cleanup_config());
        assert!(matches!(
            cleaner.cleanup(),
            Err(HarnessError::ReadDir { .. })
        ));
    }
}

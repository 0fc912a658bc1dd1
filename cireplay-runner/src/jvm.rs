// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building JVM command lines.

use crate::{config::JvmConfig, platform::HostPlatform, process::CommandSpec};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;

/// VM options the scenarios pass around.
pub mod vm_options {
    /// Enables tiered compilation.
    pub const TIERED_ENABLED: &str = "-XX:+TieredCompilation";
    /// Disables tiered compilation.
    pub const TIERED_DISABLED: &str = "-XX:-TieredCompilation";
    /// Lets the JVM dump core when it crashes.
    pub const ENABLE_COREDUMP_ON_CRASH: &str = "-XX:+CreateCoredumpOnCrash";
    /// Prevents the JVM from dumping core when it crashes.
    pub const DISABLE_COREDUMP_ON_CRASH: &str = "-XX:-CreateCoredumpOnCrash";
    /// Selects the client VM.
    pub const CLIENT_VM: &str = "-client";
    /// Selects the server VM.
    pub const SERVER_VM: &str = "-server";
    /// Prints the version and exits.
    pub const VERSION: &str = "-version";

    /// Stops tiered compilation at `level`.
    pub fn tiered_stop_at_level(level: i32) -> String {
        format!("-XX:TieredStopAtLevel={level}")
    }
}

/// Compile levels recorded in replay data.
pub mod comp_level {
    /// C1 without profiling: what a client (or tiering-disabled C1) VM compiles at.
    pub const SIMPLE: i32 = 1;
    /// C2: what a server VM with tiering disabled compiles at.
    pub const FULL_OPTIMIZATION: i32 = 4;
}

/// Shell prefix raising the core size limit.
pub(crate) const RUN_SHELL_NO_LIMIT: &str = "ulimit -c unlimited && ";

/// Shell prefix preventing any core dump.
pub(crate) const RUN_SHELL_ZERO_LIMIT: &str = "ulimit -S -c 0 && ";

/// Environment variables holding extra VM and Java options, as set by test drivers.
const TEST_OPTIONS_ENV_VARS: [&str; 2] = ["TESTVMOPTS", "TESTJAVAOPTS"];

/// Builds command lines for JVMs under test.
#[derive(Clone, Debug)]
pub struct JvmLauncher {
    java: String,
    test_options: Vec<String>,
    classpath: Vec<Utf8PathBuf>,
    work_dir: Utf8PathBuf,
    platform: HostPlatform,
}

impl JvmLauncher {
    /// Creates a new launcher from the config and the process environment.
    pub fn new(config: &JvmConfig, work_dir: &Utf8Path, platform: HostPlatform) -> Self {
        Self::with_env(config, work_dir, platform, |name| std::env::var(name).ok())
    }

    /// Creates a new launcher, looking up environment variables through `env`.
    pub fn with_env(
        config: &JvmConfig,
        work_dir: &Utf8Path,
        platform: HostPlatform,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let java = if !config.java.is_empty() {
            config.java.clone()
        } else if let Some(java_home) = env("JAVA_HOME").filter(|home| !home.is_empty()) {
            Utf8PathBuf::from(java_home)
                .join("bin")
                .join(platform.java_executable())
                .into_string()
        } else {
            platform.java_executable().to_owned()
        };

        let mut test_options: Vec<String> = config
            .vm_options
            .iter()
            .chain(&config.java_options)
            .cloned()
            .collect();
        for var in TEST_OPTIONS_ENV_VARS {
            if let Some(value) = env(var) {
                test_options.extend(value.split_whitespace().map(str::to_owned));
            }
        }

        Self {
            java,
            test_options,
            classpath: config.classpath.clone(),
            work_dir: work_dir.to_owned(),
            platform,
        }
    }

    /// The java launcher.
    pub fn java(&self) -> &str {
        &self.java
    }

    /// Options passed to every JVM.
    pub fn test_options(&self) -> &[String] {
        &self.test_options
    }

    /// The directory JVMs are run in.
    pub fn work_dir(&self) -> &Utf8Path {
        &self.work_dir
    }

    /// The host platform.
    pub fn platform(&self) -> HostPlatform {
        self.platform
    }

    /// Returns the command for a JVM under test: the launcher, the test options, the classpath and
    /// then `args`.
    pub fn test_jvm<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command =
            CommandSpec::new(&self.java, &self.work_dir).args(self.test_options.iter().cloned());
        if !self.classpath.is_empty() {
            let classpath = self
                .classpath
                .iter()
                .join(self.platform.classpath_separator());
            command = command.arg("-cp").arg(classpath);
        }
        command.args(args)
    }

    /// Wraps `command_line` in `sh -c`, prefixed with `prefix`.
    pub fn shell(&self, prefix: &str, command_line: &str) -> CommandSpec {
        CommandSpec::new("sh", &self.work_dir)
            .arg("-c")
            .arg(format!("{prefix}{command_line}"))
    }

    /// Runs `command` through `sh -c`, prefixed with `prefix`.
    ///
    /// The shell splits the command line again. Elsewhere each argument is quoted, so that it
    /// reaches the JVM unchanged. On Windows the arguments are joined with spaces and passed
    /// through [`escape_for_windows_shell`] instead.
    pub fn shell_command(&self, prefix: &str, command: &CommandSpec) -> CommandSpec {
        let command_line = if self.platform.is_windows() {
            let command_line = std::iter::once(command.program())
                .chain(command.arguments().iter().map(String::as_str))
                .join(" ");
            escape_for_windows_shell(&command_line)
        } else {
            command.to_command_line()
        };
        self.shell(prefix, &command_line)
    }
}

/// Prepares a command line for the POSIX shell emulation used on Windows hosts.
///
/// Only path separators and the `;` and `|` metacharacters are handled.
pub fn escape_for_windows_shell(command_line: &str) -> String {
    command_line
        .replace('\\', "/")
        .replace(';', "\\;")
        .replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::jvm_args;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use test_case::test_case;

    fn config(java: &str) -> JvmConfig {
        JvmConfig {
            java: java.to_owned(),
            vm_options: vec!["-Xmx1g".to_owned()],
            java_options: vec!["-Dfoo=bar".to_owned()],
            classpath: vec!["classes".into(), "lib/extra.jar".into()],
        }
    }

    fn launcher(java: &str, platform: HostPlatform, env: &[(&str, &str)]) -> JvmLauncher {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        JvmLauncher::with_env(&config(java), Utf8Path::new("/work"), platform, |name| {
            env.get(name).cloned()
        })
    }

    #[test]
    fn java_resolution() {
        let l = launcher("/custom/java", HostPlatform::Linux, &[("JAVA_HOME", "/jdk")]);
        assert_eq!(l.java(), "/custom/java");

        let l = launcher("", HostPlatform::Linux, &[("JAVA_HOME", "/jdk")]);
        assert_eq!(
            l.java(),
            Utf8Path::new("/jdk").join("bin").join("java").as_str()
        );

        let l = launcher("", HostPlatform::Windows, &[("JAVA_HOME", "C:/jdk")]);
        assert!(l.java().ends_with("java.exe"), "{}", l.java());

        let l = launcher("", HostPlatform::MacOs, &[]);
        assert_eq!(l.java(), "java");
    }

    #[test]
    fn test_jvm_command() {
        let l = launcher(
            "java",
            HostPlatform::Linux,
            &[("TESTVMOPTS", "-XX:+UseSerialGC  -Xss1m"), ("TESTJAVAOPTS", "-ea")],
        );
        let command = l.test_jvm(["-version"]);
        assert_eq!(command.program(), "java");
        assert_eq!(command.cwd(), "/work");
        assert_eq!(
            command.arguments(),
            [
                "-Xmx1g",
                "-Dfoo=bar",
                "-XX:+UseSerialGC",
                "-Xss1m",
                "-ea",
                "-cp",
                "classes:lib/extra.jar",
                "-version",
            ]
        );

        let l = launcher("java", HostPlatform::Windows, &[]);
        let command = l.test_jvm(Vec::<String>::new());
        assert_eq!(command.arguments()[3], "classes;lib/extra.jar");
    }

    #[test]
    fn shell_wrapping() {
        let l = launcher("java", HostPlatform::Linux, &[]);
        let command = l.shell(RUN_SHELL_ZERO_LIMIT, "java -version");
        assert_eq!(command.program(), "sh");
        assert_eq!(command.arguments(), ["-c", "ulimit -S -c 0 && java -version"]);
    }

    #[test]
    fn shell_command_quotes_arguments() {
        let l = launcher("java", HostPlatform::Linux, &[]);
        let command = l.shell_command(
            RUN_SHELL_NO_LIMIT,
            &l.test_jvm(["-XX:CompileOnly=A$B::test", "A$B"]),
        );
        let script = &command.arguments()[1];
        assert!(script.starts_with("ulimit -c unlimited && java "), "{script}");
        assert!(script.contains("'-XX:CompileOnly=A$B::test'"), "{script}");
        assert_eq!(
            &jvm_args(&command)[2..],
            ["-cp", "classes:lib/extra.jar", "-XX:CompileOnly=A$B::test", "A$B"]
        );
    }

    #[test]
    fn windows_shell_command_keeps_classpath() {
        let l = launcher("C:\\jdk\\bin\\java.exe", HostPlatform::Windows, &[]);
        let command = l.shell_command(
            RUN_SHELL_ZERO_LIMIT,
            &l.test_jvm(["-XX:CompileCommand=quiet|x", "-version"]),
        );
        assert_eq!(command.program(), "sh");
        assert_eq!(
            command.arguments()[1],
            "ulimit -S -c 0 && C:/jdk/bin/java.exe -Xmx1g -Dfoo=bar -cp classes\\;lib/extra.jar \
             -XX:CompileCommand=quiet\\|x -version"
        );
        // What the JVM sees once the shell has split the line.
        assert_eq!(
            jvm_args(&command),
            [
                "-Xmx1g",
                "-Dfoo=bar",
                "-cp",
                "classes;lib/extra.jar",
                "-XX:CompileCommand=quiet|x",
                "-version",
            ]
        );
    }

    #[test_case(r"C:\jdk\bin\java -cp a;b", "C:/jdk/bin/java -cp a\\;b" ; "path and separator")]
    #[test_case("java -XX:CompileCommand=a|b", "java -XX:CompileCommand=a\\|b" ; "pipe")]
    #[test_case("java -version", "java -version" ; "nothing to escape")]
    fn windows_escaping(input: &str, expected: &str) {
        assert_eq!(escape_for_windows_shell(input), expected);
    }
}

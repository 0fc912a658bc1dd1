// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A scripted stand-in for a JVM, used to exercise scenarios without launching processes.

use crate::{
    artifacts::REPLAY_FILE_NAME,
    config::{CleanupConfig, JvmConfig},
    errors::HarnessError,
    jvm::JvmLauncher,
    platform::HostPlatform,
    process::{CommandSpec, ProcessOutput, ProcessRunner},
};
use camino::Utf8Path;
use std::{cell::RefCell, time::Duration};

pub(crate) const GENERATOR_PID: u32 = 4242;

/// A replay file as a server VM with tiering disabled would write it.
pub(crate) const SERVER_REPLAY: &str = "\
JvmtiExport can_access_local_variables 0
ciMethod compiler/ciReplay/CiReplayWorkload test (I)V 4069 2003 8 0 0
compile compiler/ciReplay/CiReplayWorkload test (I)V -1 4 inline 0
";

/// A replay file as a client VM would write it.
pub(crate) const CLIENT_REPLAY: &str = "\
ciMethod compiler/ciReplay/CiReplayWorkload test (I)V 4069 2003 8 0 0
compile compiler/ciReplay/CiReplayWorkload test (I)V -1 1 inline 0
";

/// Returns the arguments the JVM would see, looking through an `sh -c` wrapper.
pub(crate) fn jvm_args(command: &CommandSpec) -> Vec<String> {
    if command.program() == "sh" {
        let script = &command.arguments()[1];
        let (_, command_line) = script.split_once("&& ").expect("shell prefix ends with &&");
        let mut words = shell_words::split(command_line).expect("command line is valid");
        words.remove(0);
        words
    } else {
        command.arguments().to_vec()
    }
}

/// Whether a launch is a replay of compilations, as opposed to generation or probing.
pub(crate) fn is_replay(args: &[String]) -> bool {
    args.iter().any(|a| a == "-XX:+ReplayCompiles")
}

pub(crate) struct FakeJvm {
    pub(crate) client_vm: bool,
    pub(crate) server_vm: bool,
    pub(crate) tiered: bool,
    pub(crate) replay_content: String,
    pub(crate) generator_exit_code: i32,
    pub(crate) generator_output: String,
    /// Created in the working directory by the generator, if set.
    pub(crate) core_file_name: Option<String>,
    /// Whether generated replay data has the level set with `-XX:TieredStopAtLevel`.
    pub(crate) honor_stop_level: bool,
    replay_exit: Box<dyn Fn(&[String]) -> i32>,
    commands: RefCell<Vec<CommandSpec>>,
}

impl FakeJvm {
    /// A server VM without a client VM, which replays everything successfully.
    pub(crate) fn server() -> Self {
        Self {
            client_vm: false,
            server_vm: true,
            tiered: true,
            replay_content: SERVER_REPLAY.to_owned(),
            generator_exit_code: 134,
            generator_output: "# A fatal error has been detected by the Java Runtime Environment\n"
                .to_owned(),
            core_file_name: None,
            honor_stop_level: true,
            replay_exit: Box::new(|_| 0),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_replay_exit(mut self, f: impl Fn(&[String]) -> i32 + 'static) -> Self {
        self.replay_exit = Box::new(f);
        self
    }

    pub(crate) fn commands(&self) -> Vec<CommandSpec> {
        self.commands.borrow().clone()
    }

    /// The JVM arguments of every replay launch so far.
    pub(crate) fn replays(&self) -> Vec<Vec<String>> {
        self.commands
            .borrow()
            .iter()
            .map(jvm_args)
            .filter(|args| is_replay(args))
            .collect()
    }

    fn probe_output(&self, args: &[String]) -> String {
        let has = |arg: &str| args.iter().any(|a| a == arg);
        if has("-client") {
            if self.client_vm {
                "Java HotSpot(TM) Client VM (build 17, mixed mode)".to_owned()
            } else {
                "Java HotSpot(TM) 64-Bit Server VM (build 17, mixed mode)".to_owned()
            }
        } else if has("-server") {
            if self.server_vm {
                "Java HotSpot(TM) 64-Bit Server VM (build 17, mixed mode)".to_owned()
            } else {
                "Java HotSpot(TM) Client VM (build 17, mixed mode)".to_owned()
            }
        } else {
            let compiler = if self.tiered {
                "HotSpot 64-Bit Tiered Compilers"
            } else {
                "HotSpot 64-Bit Server Compiler"
            };
            format!(
                "     bool TieredCompilation                        = {}         {{pd product}} {{default}}\n\
                 Property settings:\n    sun.management.compiler = {compiler}\n",
                self.tiered
            )
        }
    }
}

impl ProcessRunner for FakeJvm {
    fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, HarnessError> {
        self.commands.borrow_mut().push(command.clone());
        let args = jvm_args(command);

        if is_replay(&args) {
            return Ok(ProcessOutput::new(
                GENERATOR_PID + 1,
                (self.replay_exit)(&args),
                "",
            ));
        }
        if args.iter().any(|a| a == "-version") {
            return Ok(ProcessOutput::new(1, 0, self.probe_output(&args)));
        }

        let stop_level = args
            .iter()
            .find_map(|arg| arg.strip_prefix("-XX:TieredStopAtLevel="))
            .filter(|_| self.honor_stop_level);
        let replay_content = match stop_level {
            Some(level) => format!(
                "compile compiler/ciReplay/CiReplayWorkload test (I)V -1 {level} inline 0\n"
            ),
            None => self.replay_content.clone(),
        };

        let cwd = command.cwd();
        std::fs::write(cwd.join(REPLAY_FILE_NAME), replay_content).unwrap();
        std::fs::write(cwd.join(format!("hs_err_pid{GENERATOR_PID}.log")), "crash log").unwrap();
        if let Some(core) = &self.core_file_name {
            std::fs::write(cwd.join(core), "core").unwrap();
        }
        Ok(ProcessOutput::new(
            GENERATOR_PID,
            self.generator_exit_code,
            self.generator_output.clone(),
        ))
    }
}

pub(crate) fn test_launcher(work_dir: &Utf8Path, platform: HostPlatform) -> JvmLauncher {
    let config = JvmConfig {
        java: "java".to_owned(),
        vm_options: Vec::new(),
        java_options: Vec::new(),
        classpath: vec!["classes".into()],
    };
    JvmLauncher::with_env(&config, work_dir, platform, |_| None)
}

pub(crate) fn test_cleanup_config() -> CleanupConfig {
    CleanupConfig {
        poll_interval: Duration::from_millis(1),
        deletion_timeout: Duration::from_secs(5),
    }
}

//! Operator process execution.
//!
//! [`SubprocessRunner`] spawns the assembled [`CommandLine`], captures the
//! complete stdout/stderr and returns the exit status verbatim. There is a
//! single attempt per call and no timeout: the returned future resolves only
//! once the child has exited.

use std::process::Stdio;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::command::CommandLine;
use crate::error::ConfigError;

/// Shell used for [`ExecutionMode::Shell`].
const SHELL: &str = "/bin/sh";

/// How a [`CommandLine`] is handed to the operating system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Space-join the tokens and run them through `/bin/sh -c`.
    ///
    /// Shell metacharacters in any token (paths, option values) are
    /// interpreted by the shell.
    #[default]
    Shell,
    /// Execute the program directly with each token as a literal argument.
    Argv,
}

impl FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shell" => Ok(Self::Shell),
            "argv" => Ok(Self::Argv),
            _ => Err(ConfigError::InvalidValue {
                var: "execution mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Captured output of one operator process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a command line to completion.
///
/// The seam between the dispatcher and the operating system; tests swap in
/// recording fakes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command`. When `env` is given it replaces the child's
    /// environment.
    async fn run(
        &self,
        command: &CommandLine,
        env: Option<&[(String, String)]>,
    ) -> std::io::Result<ExecutionResult>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessRunner {
    mode: ExecutionMode,
}

impl SubprocessRunner {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    fn command_for(&self, command: &CommandLine) -> Command {
        match self.mode {
            ExecutionMode::Shell => {
                let mut cmd = Command::new(SHELL);
                cmd.arg("-c").arg(command.joined());
                cmd
            }
            ExecutionMode::Argv => {
                let mut cmd = Command::new(command.program());
                cmd.args(command.args());
                cmd
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn run(
        &self,
        command: &CommandLine,
        env: Option<&[(String, String)]>,
    ) -> std::io::Result<ExecutionResult> {
        let mut cmd = self.command_for(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(vars) = env {
            cmd.env_clear();
            for (key, value) in vars {
                cmd.env(key, value);
            }
        }

        let output = cmd.output().await?;

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

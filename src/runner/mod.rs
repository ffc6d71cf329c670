//! Subprocess runner for invoking external build tooling
//!
//! Every stage talks to git, the upstream build system, and the toolchain
//! through the [`CommandRunner`] trait, so tests can script subprocess
//! behavior without spawning anything.

pub mod shell;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

pub use shell::ShellRunner;

/// A subprocess invocation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Program to execute
    pub program: String,

    /// Arguments
    pub args: Vec<String>,

    /// Working directory, if any
    pub cwd: Option<PathBuf>,

    /// Extra environment exported to the subprocess
    pub env: HashMap<String, String>,
}

impl CommandRequest {
    /// Build a request from a rendered argv. The argv must be non-empty.
    pub fn from_argv(argv: &[String]) -> Self {
        Self {
            program: argv[0].clone(),
            args: argv[1..].to_vec(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// One-line rendering for logs
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured output of a finished subprocess
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal)
    pub code: i32,

    /// Captured stdout
    pub stdout: String,

    /// Captured stderr
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Errors from spawning or decoding a subprocess
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {detail}")]
    Spawn { program: String, detail: String },

    #[error("Output of '{program}' is not valid UTF-8: {detail}")]
    InvalidUtf8 { program: String, detail: String },
}

/// Trait for command execution - allows mock implementations in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, RunnerError>;
}

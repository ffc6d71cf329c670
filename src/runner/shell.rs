//! Shell runner - spawns real subprocesses via tokio

use crate::runner::{CommandOutput, CommandRequest, CommandRunner, RunnerError};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Runs commands as real subprocesses
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, RunnerError> {
        debug!("Spawning subprocess: {}", request.display());

        let mut command = Command::new(&request.program);
        command.args(&request.args);
        command.envs(&request.env);
        command.kill_on_drop(true);

        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().await.map_err(|e| RunnerError::Spawn {
            program: request.program.clone(),
            detail: e.to_string(),
        })?;

        // Builds emit locale-dependent stderr; decode it lossily. Stdout
        // is consumed programmatically (tag verification) and stays strict.
        let stdout = String::from_utf8(output.stdout).map_err(|e| RunnerError::InvalidUtf8 {
            program: request.program.clone(),
            detail: e.to_string(),
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let code = output.status.code().unwrap_or(-1);
        debug!(
            "Subprocess '{}' exited with code {} ({} bytes stdout)",
            request.program,
            code,
            stdout.len()
        );

        Ok(CommandOutput {
            code,
            stdout,
            stderr,
        })
    }
}

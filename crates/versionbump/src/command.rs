use async_process::{Command, ExitStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl From<async_process::Output> for Output {
    fn from(output: async_process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into(),
            stderr: String::from_utf8_lossy(&output.stderr).into(),
            status: output.status,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "`{}` failed with code {}:\n\n--- Stdout:\n {}\n--- Stderr:\n {}",
        command,
        output.status.code().unwrap_or(1),
        output.stdout,
        output.stderr
    )]
    Failed { command: String, output: Output },
}

impl Error {
    /// Whether the program could not be started because it is not installed.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Check the exit status of a finished command.
///
/// # Errors
/// If the command exited with a non-zero exit code.
pub fn check_exit_status(cmd: &Command, output: &async_process::Output) -> Result<(), Error> {
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::Failed {
            command: format!("{cmd:?}"),
            output: output.clone().into(),
        })
    }
}

/// Run a command to completion and capture its output.
///
/// # Errors
/// If the command cannot be started or exits with a non-zero exit code.
pub async fn run_command(cmd: &mut Command) -> Result<Output, Error> {
    tracing::debug!(?cmd, "running command");
    let output = cmd.output().await?;
    check_exit_status(cmd, &output)?;
    Ok(output.into())
}

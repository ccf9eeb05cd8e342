//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
//! Thin wrapper over `tokio::process::Command` shared by the host adapters.

use std::process::{ExitStatus, Stdio};

use anyhow::{anyhow, Context};
use tokio::process::Command;
use tracing::debug;

use crate::error::ExternalResult;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command to completion; a non-zero exit is returned, not raised.
pub async fn run(program: &str, args: &[&str]) -> ExternalResult<CommandOutput> {
    let cmdline = command_line(program, args);
    debug!(command = %cmdline, "running host command");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("failed to spawn `{cmdline}`"))?;
    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command and fail unless it exits successfully.
pub async fn run_checked(program: &str, args: &[&str]) -> ExternalResult<CommandOutput> {
    let output = run(program, args).await?;
    if !output.status.success() {
        return Err(anyhow!(
            "`{}` exited with {}: {}",
            command_line(program, args),
            output.status,
            output.stderr.trim()
        )
        .into());
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let output = run("sh", &["-c", "echo hello"]).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn checked_run_reports_stderr() {
        let err = run_checked("sh", &["-c", "echo boom >&2; exit 3"])
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("boom"), "{message}");
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        assert!(run("mcs-definitely-not-installed", &[]).await.is_err());
    }
}

//! Cancellable external-tool invocation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::cancel::CancelToken;

/// Errors from running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` with `args` to completion.
///
/// The child is killed if `cancel` fires before it exits. A non-zero exit
/// status becomes [`ToolError::Failed`] carrying the tool's stderr.
pub async fn run_tool<I, S>(
    program: &Path,
    args: I,
    cancel: &CancelToken,
) -> Result<ToolOutput, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if cancel.is_cancelled() {
        return Err(ToolError::Cancelled);
    }

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound {
                    path: program.to_path_buf(),
                }
            } else {
                ToolError::Io(e)
            }
        })?;

    let output = match cancel.run_until_cancelled(child.wait_with_output()).await {
        Some(result) => result?,
        None => {
            debug!(program = %program.display(), "Tool run cancelled, child killed");
            return Err(ToolError::Cancelled);
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program.display().to_string(),
            code: output.status.code(),
            stderr,
        });
    }

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr,
    })
}

/// Checks that `program` can be spawned with `version_arg`.
pub async fn tool_available(program: &Path, version_arg: &str) -> Result<(), ToolError> {
    let result = Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ToolError::NotFound {
            path: program.to_path_buf(),
        }),
        Err(e) => Err(ToolError::Io(e)),
    }
}

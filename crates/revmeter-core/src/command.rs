//! Synchronous external command execution.
//!
//! Build and version-control steps are plain argv vectors run to completion.
//! Every command is traced to the operator log before it executes, and a
//! non-zero exit is an error the caller treats as fatal to the whole run —
//! there is no partial continuation after a failed build or git command.

use std::path::Path;
use std::process::Command;

use log::{error, info};

use crate::error::{HarnessError, Result};

/// Render an argv vector the way it was traced: space-joined.
pub fn render(argv: &[String]) -> String {
    argv.join(" ")
}

fn prepared(argv: &[String], dir: Option<&Path>) -> Result<Command> {
    let program = argv
        .first()
        .ok_or_else(|| HarnessError::Config("empty command line".to_string()))?;
    let mut command = Command::new(program);
    command.args(&argv[1..]);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    info!("$ {}", render(argv));
    Ok(command)
}

/// Run a command to completion, discarding its output.
///
/// `dir` is the working directory; `None` runs in the harness's own current
/// directory. Returns an error if the command cannot be launched or exits
/// non-zero.
pub fn run(argv: &[String], dir: Option<&Path>) -> Result<()> {
    let status = prepared(argv, dir)?
        .status()
        .map_err(|e| HarnessError::Launch {
            command: render(argv),
            source: e,
        })?;
    if !status.success() {
        return Err(HarnessError::CommandFailed {
            command: render(argv),
            code: status.code(),
        });
    }
    Ok(())
}

/// Run a command to completion and return its captured stdout as text.
///
/// Stdout is decoded lossily as UTF-8. On a non-zero exit the captured
/// stderr is logged before the error is returned.
pub fn run_captured(argv: &[String], dir: Option<&Path>) -> Result<String> {
    let output = prepared(argv, dir)?
        .output()
        .map_err(|e| HarnessError::Launch {
            command: render(argv),
            source: e,
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            error!("`{}` stderr: {}", render(argv), stderr.trim());
        }
        return Err(HarnessError::CommandFailed {
            command: render(argv),
            code: output.status.code(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

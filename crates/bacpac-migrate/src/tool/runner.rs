//! Subprocess execution for SqlPackage.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Runs SqlPackage and reports its exit code.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `program` with `args` to completion and return its exit code.
    ///
    /// An `Err` means the process could not be started at all; a started
    /// process that fails is reported through the exit code.
    async fn run(&self, program: &Path, args: &[String]) -> Result<i32>;
}

/// Runs the tool as a child process.
///
/// The tool's stdout is relayed line by line as `info` events so that the
/// caller's own stdout carries nothing but its result; stderr is inherited.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<i32> {
        debug!("Executing {} {}", program.display(), args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => info!("{}", line),
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Stopped relaying {} output: {}", program.display(), e);
                        break;
                    }
                }
            }
        }

        let status = child.wait().await?;

        match status.code() {
            Some(code) => Ok(code),
            None => {
                // Terminated by a signal
                warn!("{} exited without a status code", program.display());
                Ok(-1)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_process_runner_reports_exit_code() {
        let runner = ProcessRunner;
        let ok = runner
            .run(Path::new("sh"), &["-c".to_string(), "exit 0".to_string()])
            .await
            .unwrap();
        assert_eq!(ok, 0);

        let failed = runner
            .run(Path::new("sh"), &["-c".to_string(), "exit 5".to_string()])
            .await
            .unwrap();
        assert_eq!(failed, 5);
    }

    #[tokio::test]
    async fn test_process_runner_consumes_output() {
        let script = "for i in 1 2 3; do echo \"Processing table $i\"; done; exit 3";
        let code = ProcessRunner
            .run(Path::new("sh"), &["-c".to_string(), script.to_string()])
            .await
            .unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn test_process_runner_missing_program() {
        let result = ProcessRunner
            .run(Path::new("/nonexistent/sqlpackage"), &[])
            .await;
        assert!(result.is_err());
    }
}

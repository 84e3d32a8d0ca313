//! Echoed, dry-run aware command execution
//!
//! Commands that change the cluster (or helm's local repository list) are
//! printed before they run and skipped entirely in dry-run mode. Read-only
//! probes bypass this and talk to the runner directly.

use crate::error::{KubeError, Result};
use crate::report::Reporter;
use crate::runner::{CommandRunner, Invocation, RunOptions};

/// How a failing command is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Non-zero exit aborts the operation
    Required,
    /// Non-zero exit is reported and ignored
    MayFail,
}

/// Where the command's stdout is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    Stderr,
    Stdout,
}

pub struct Executor<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    reporter: &'a Reporter,
    dry_run: bool,
}

impl<'a, R: CommandRunner + ?Sized> Executor<'a, R> {
    pub fn new(runner: &'a R, reporter: &'a Reporter, dry_run: bool) -> Self {
        Self {
            runner,
            reporter,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Echo and run `invocation`; returns its exit code (0 in dry-run mode)
    pub async fn execute(&self, invocation: &Invocation, step: Step, echo: Echo) -> Result<i32> {
        self.reporter.command(invocation);
        if self.dry_run {
            return Ok(0);
        }

        let output = self.runner.run(invocation, &RunOptions::new()).await?;
        match echo {
            Echo::Stdout => self.reporter.output(&output.stdout),
            Echo::Stderr => self.reporter.command_output(&output.stdout),
        }
        self.reporter.command_output(&output.stderr);

        if !output.success() {
            match step {
                Step::Required => {
                    return Err(KubeError::CommandFailed {
                        command: invocation.command_line(),
                        code: output.code,
                        output: output.combined(),
                    });
                }
                Step::MayFail => {
                    tracing::info!(command = %invocation, code = output.code, "ignoring failure");
                }
            }
        }
        Ok(output.code)
    }
}

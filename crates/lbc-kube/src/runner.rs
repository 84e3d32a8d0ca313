//! Running external programs
//!
//! Everything the installer does to the cluster goes through a [`CommandRunner`].
//! The real implementation spawns processes with tokio; tests use the scripted
//! [`MockRunner`](crate::mock::MockRunner).

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{KubeError, Result};

/// Timeout for cluster probes (`helm status`, `kubectl version`, ...)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for `<tool> version` probes
pub const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Exit code reported when a command was killed at its deadline
///
/// Only the sign is meaningful: a negative code means the process did not
/// exit on its own (timeout or signal).
pub const TIMEOUT_EXIT_CODE: i32 = -9;

/// A program and its arguments, never interpreted by a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a command line with shell-style quoting
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = shlex::split(line)
            .ok_or_else(|| KubeError::InvalidCommand(line.to_string()))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| KubeError::InvalidCommand(line.to_string()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value` when `value` is set
    pub fn opt(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Render as a copy-pasteable command line
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|word| match shlex::try_quote(word) {
                Ok(quoted) => quoted.into_owned(),
                Err(_) => word.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Invocation {
    /// Words joined by single spaces, without quoting
    pub fn words(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Fully captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Killed at the deadline or by a signal
    pub fn interrupted(&self) -> bool {
        self.code < 0
    }

    /// stdout followed by stderr, for error messages
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub timeout: Option<Duration>,
    pub stdin: Option<String>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Executes external commands
///
/// A command that starts and exits non-zero is an `Ok` output; only a
/// program that cannot be started is an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation, options: &RunOptions) -> Result<CommandOutput>;
}

/// Runs commands as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation, options: &RunOptions) -> Result<CommandOutput> {
        tracing::debug!(command = %invocation, timeout = ?options.timeout, "spawning");

        let mut command = Command::new(invocation.program());
        command
            .args(invocation.arguments())
            .stdin(if options.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => KubeError::ToolMissing {
                program: invocation.program().to_string(),
            },
            _ => KubeError::Io(e),
        })?;

        // Stdin is fed alongside the wait so a child that never reads it
        // still runs into the deadline.
        let stdin = child.stdin.take();
        let feed = async {
            let (Some(input), Some(mut stdin)) = (&options.stdin, stdin) else {
                return Ok::<(), std::io::Error>(());
            };
            match stdin.write_all(input.as_bytes()).await {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(command = %invocation, "child exited before reading stdin");
                    Ok(())
                }
                result => result,
            }
        };

        // Dropping this future drops the child, which kills it.
        let waited = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed.and(output)
        };
        let output = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, waited).await {
                Ok(output) => output?,
                Err(_) => {
                    tracing::debug!(command = %invocation, "timed out after {:?}", limit);
                    return Ok(CommandOutput::new(
                        TIMEOUT_EXIT_CODE,
                        "",
                        format!("timed out after {}s", limit.as_secs_f32()),
                    ));
                }
            },
            None => waited.await?,
        };

        let result = CommandOutput {
            code: exit_code(&output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(command = %invocation, code = result.code, "finished");
        Ok(result)
    }
}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(TIMEOUT_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(TIMEOUT_EXIT_CODE)
}

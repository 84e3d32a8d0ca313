//! Operator-facing output
//!
//! Echoed commands, `info:`/`warning:` lines and command output go to stderr.
//! Rendered manifests, dumps and per-workload check lines go to stdout so they
//! can be piped. A buffered reporter keeps both streams in memory for tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use console::style;

use crate::runner::Invocation;

/// What a buffered reporter has written so far, without styling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Clone)]
enum Sink {
    Terminal,
    Buffer(Arc<Mutex<Transcript>>),
}

#[derive(Clone, Copy)]
enum Stream {
    Out,
    Err,
}

/// Writes operator-facing lines
#[derive(Clone)]
pub struct Reporter {
    sink: Sink,
}

impl Reporter {
    /// Report to the terminal
    pub fn new() -> Self {
        Self {
            sink: Sink::Terminal,
        }
    }

    /// Report into memory
    pub fn buffered() -> Self {
        Self {
            sink: Sink::Buffer(Arc::new(Mutex::new(Transcript::default()))),
        }
    }

    /// Everything written so far; empty for a terminal reporter
    pub fn transcript(&self) -> Transcript {
        match &self.sink {
            Sink::Terminal => Transcript::default(),
            Sink::Buffer(buffer) => buffer
                .lock()
                .map(|t| t.clone())
                .unwrap_or_else(|poisoned| poisoned.into_inner().clone()),
        }
    }

    /// Echo a command before it runs
    pub fn command(&self, invocation: &Invocation) {
        self.line(Stream::Err, &style(invocation.command_line()).dim().to_string());
    }

    pub fn info(&self, msg: &str) {
        self.line(Stream::Err, &format!("{} {}", style("info:").blue(), msg));
    }

    pub fn warn(&self, msg: &str) {
        self.line(
            Stream::Err,
            &format!("{} {}", style("warning:").yellow(), msg),
        );
    }

    pub fn error(&self, msg: &str) {
        self.line(Stream::Err, &format!("{} {}", style("error:").red(), msg));
    }

    pub fn success(&self, msg: &str) {
        self.line(Stream::Err, &format!("{} {}", style("✓").green(), msg));
    }

    /// Plain progress message
    pub fn message(&self, msg: &str) {
        self.line(Stream::Err, msg);
    }

    /// Output of an executed command
    pub fn command_output(&self, text: &str) {
        if !text.trim().is_empty() {
            self.line(Stream::Err, text.trim_end());
        }
    }

    /// Result data meant for stdout
    pub fn output(&self, text: &str) {
        self.line(Stream::Out, text.trim_end_matches('\n'));
    }

    /// Per-workload check line
    pub fn check(&self, name: &str, ok: bool) {
        let verdict = if ok {
            style("ok").green()
        } else {
            style("failed").red()
        };
        self.line(
            Stream::Out,
            &format!("Checking deployment {} ... {}", name, verdict),
        );
    }

    fn line(&self, stream: Stream, text: &str) {
        match &self.sink {
            Sink::Terminal => {
                let _ = match stream {
                    Stream::Out => writeln!(io::stdout(), "{}", text),
                    Stream::Err => writeln!(io::stderr(), "{}", text),
                };
            }
            Sink::Buffer(buffer) => {
                let mut transcript = buffer
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let target = match stream {
                    Stream::Out => &mut transcript.stdout,
                    Stream::Err => &mut transcript.stderr,
                };
                target.push_str(&console::strip_ansi_codes(text));
                target.push('\n');
            }
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

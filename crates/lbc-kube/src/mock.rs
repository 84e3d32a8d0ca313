//! Scripted command runner for testing
//!
//! Expectations are consumed in order. Each one matches the command's words
//! joined by single spaces (no quoting), either exactly or by regex, and
//! answers with a canned output. Every command received is recorded so tests
//! can assert what was (not) run.

use async_trait::async_trait;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{KubeError, Result};
use crate::runner::{CommandOutput, CommandRunner, Invocation, RunOptions};

type SideEffect = Box<dyn Fn(&Invocation) + Send + Sync>;

enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == line,
            Matcher::Pattern(regex) => regex.is_match(line),
        }
    }

    fn describe(&self) -> String {
        match self {
            Matcher::Exact(expected) => format!("'{}'", expected),
            Matcher::Pattern(regex) => format!("/{}/", regex.as_str()),
        }
    }
}

enum Response {
    Output(CommandOutput),
    Missing,
}

struct Expectation {
    matcher: Matcher,
    response: Response,
    effect: Option<SideEffect>,
}

/// In-memory runner answering from a script
#[derive(Clone, Default)]
pub struct MockRunner {
    expected: Arc<Mutex<VecDeque<Expectation>>>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect exactly `command`, answering with `code` and `stdout`
    pub fn expect(self, command: &str, code: i32, stdout: &str) -> Self {
        self.push(
            Matcher::Exact(command.to_string()),
            Response::Output(CommandOutput::new(code, stdout, "")),
            None,
        )
    }

    /// Expect exactly `command`, answering with a full output
    pub fn expect_output(self, command: &str, output: CommandOutput) -> Self {
        self.push(
            Matcher::Exact(command.to_string()),
            Response::Output(output),
            None,
        )
    }

    /// Expect a command matching the anchored regex `pattern`
    pub fn expect_matching(self, pattern: &str, code: i32, stdout: &str) -> Self {
        self.push(
            anchored(pattern),
            Response::Output(CommandOutput::new(code, stdout, "")),
            None,
        )
    }

    /// Like [`expect_matching`](Self::expect_matching), running `effect` when matched
    pub fn expect_matching_with<F>(self, pattern: &str, code: i32, stdout: &str, effect: F) -> Self
    where
        F: Fn(&Invocation) + Send + Sync + 'static,
    {
        self.push(
            anchored(pattern),
            Response::Output(CommandOutput::new(code, stdout, "")),
            Some(Box::new(effect)),
        )
    }

    /// Expect `command` and fail as if its program were not installed
    pub fn expect_missing(self, command: &str) -> Self {
        self.push(Matcher::Exact(command.to_string()), Response::Missing, None)
    }

    /// Command lines received so far
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).iter().map(Invocation::words).collect()
    }

    /// Number of expectations not yet consumed
    pub fn remaining(&self) -> usize {
        lock(&self.expected).len()
    }

    fn push(self, matcher: Matcher, response: Response, effect: Option<SideEffect>) -> Self {
        lock(&self.expected).push_back(Expectation {
            matcher,
            response,
            effect,
        });
        self
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &Invocation, _options: &RunOptions) -> Result<CommandOutput> {
        lock(&self.calls).push(invocation.clone());
        let line = invocation.words();

        let expectation = {
            let mut expected = lock(&self.expected);
            let next = expected
                .front()
                .map(|next| (next.matcher.matches(&line), next.matcher.describe()));
            match next {
                Some((true, _)) => expected.pop_front(),
                Some((false, description)) => {
                    return Err(KubeError::UnexpectedCommand {
                        command: line,
                        expected: description,
                    });
                }
                None => None,
            }
        };

        let Some(expectation) = expectation else {
            return Err(KubeError::UnexpectedCommand {
                command: line,
                expected: "no further commands".to_string(),
            });
        };

        if let Some(effect) = &expectation.effect {
            effect(invocation);
        }

        match expectation.response {
            Response::Output(output) => Ok(output),
            Response::Missing => Err(KubeError::ToolMissing {
                program: invocation.program().to_string(),
            }),
        }
    }
}

fn anchored(pattern: &str) -> Matcher {
    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(regex) => Matcher::Pattern(regex),
        Err(_) => Matcher::Exact(pattern.to_string()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answers_in_order() {
        let runner = MockRunner::new()
            .expect("helm status es", 0, "STATUS: DEPLOYED")
            .expect_matching("helm fetch --destination .* es-repo/es", 0, "");

        let first = runner
            .run(&Invocation::parse("helm status es").unwrap(), &RunOptions::new())
            .await
            .unwrap();
        assert_eq!(first.stdout, "STATUS: DEPLOYED");

        runner
            .run(
                &Invocation::parse("helm fetch --destination /tmp/x es-repo/es").unwrap(),
                &RunOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(runner.remaining(), 0);
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_out_of_order_command() {
        let runner = MockRunner::new().expect("helm status es", 0, "");
        let err = runner
            .run(&Invocation::parse("helm delete es").unwrap(), &RunOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::UnexpectedCommand { .. }));
        assert_eq!(runner.remaining(), 1);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = MockRunner::new().expect_missing("curl --version");
        let err = runner
            .run(&Invocation::parse("curl --version").unwrap(), &RunOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::ToolMissing { .. }));
    }
}

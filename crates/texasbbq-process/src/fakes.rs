//! In-process executors for tests
//!
//! Provides `ScriptedExecutor`, which never spawns anything and answers
//! from canned responses, and `RecordingExecutor`, which wraps a real
//! executor and keeps a log of what it ran.

use std::sync::Mutex;

use crate::error::Result;
use crate::executor::{CommandOutput, CommandSpec, ProcessExecutor};

// ---------------------------------------------------------------------------
// ScriptedExecutor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// Executor that records every command and replies from a rule table.
///
/// Rules match when the command line contains the rule's pattern; the most
/// recently added matching rule wins. Unmatched commands succeed with empty
/// output.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `stdout` and exit code 0 to commands containing `pattern`.
    pub fn respond(&self, pattern: &str, stdout: &str) -> &Self {
        self.push(pattern, 0, stdout, "")
    }

    /// Fail commands containing `pattern` with `exit_code` and `stderr`.
    pub fn fail(&self, pattern: &str, exit_code: i32, stderr: &str) -> &Self {
        self.push(pattern, exit_code, "", stderr)
    }

    fn push(&self, pattern: &str, exit_code: i32, stdout: &str, stderr: &str) -> &Self {
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        rules.push(Rule {
            pattern: pattern.to_string(),
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
        self
    }

    /// Every command executed so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Command lines executed so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    /// Number of executed commands whose line contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl ProcessExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let command = spec.command_line();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());

        let rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        let output = match rules.iter().rev().find(|r| command.contains(&r.pattern)) {
            Some(rule) => CommandOutput {
                command,
                exit_code: rule.exit_code,
                stdout: rule.stdout.clone(),
                stderr: rule.stderr.clone(),
                duration_ms: 0,
            },
            None => CommandOutput {
                command,
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 0,
            },
        };
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// RecordingExecutor
// ---------------------------------------------------------------------------

/// Wraps another executor and records the command lines it forwards.
#[derive(Debug, Default)]
pub struct RecordingExecutor<E> {
    inner: E,
    calls: Mutex<Vec<String>>,
}

impl<E: ProcessExecutor> RecordingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Command lines forwarded so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl<E: ProcessExecutor> ProcessExecutor for RecordingExecutor<E> {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.command_line());
        self.inner.execute(spec)
    }
}

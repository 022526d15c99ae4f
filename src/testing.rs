//! In-memory stand-ins for the host, the operator's machine and the prompt.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::local::LocalExecutor;
use crate::provision::Confirm;
use crate::remote::{CommandOutput, RemoteExecutor};
use crate::shell::Cmd;

/// Records every script and succeeds unless a script contains a pattern
/// registered with [`FakeRemote::fail_when`].
#[derive(Default)]
pub struct FakeRemote {
    scripts: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, String)>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(&self, pattern: &str) {
        self.failing.lock().unwrap().push(pattern.to_string());
    }

    pub fn respond(&self, pattern: &str, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((pattern.to_string(), stdout.to_string()));
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    /// Index of the first script containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.scripts().iter().position(|s| s.contains(pattern))
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.position(pattern).is_some()
    }
}

#[async_trait]
impl RemoteExecutor for FakeRemote {
    fn host(&self) -> &str {
        "fake-host"
    }

    async fn execute(&self, script: &str) -> Result<CommandOutput> {
        self.scripts.lock().unwrap().push(script.to_string());

        let failed = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|p| script.contains(p.as_str()));

        let stdout = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| script.contains(p.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();

        Ok(CommandOutput {
            succeeded: !failed,
            status: Some(if failed { 1 } else { 0 }),
            stdout,
            stderr: String::new(),
        })
    }
}

#[derive(Default)]
pub struct FakeLocal {
    commands: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
}

impl FakeLocal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(&self, pattern: &str) {
        self.failing.lock().unwrap().push(pattern.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl LocalExecutor for FakeLocal {
    fn execute(&self, cmd: &Cmd) -> Result<CommandOutput> {
        let line = cmd.render();
        self.commands.lock().unwrap().push(line.clone());
        let failed = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|p| line.contains(p.as_str()));
        Ok(CommandOutput {
            succeeded: !failed,
            status: Some(if failed { 1 } else { 0 }),
            ..CommandOutput::default()
        })
    }
}

/// Answers every confirmation with a fixed value and counts the questions.
pub struct FixedAnswer {
    answer: bool,
    asked: Mutex<usize>,
}

impl FixedAnswer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: Mutex::new(0),
        }
    }

    pub fn times_asked(&self) -> usize {
        *self.asked.lock().unwrap()
    }
}

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        *self.asked.lock().unwrap() += 1;
        Ok(self.answer)
    }
}

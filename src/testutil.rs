#![cfg(test)]

use anyhow::{bail, Result};
use std::collections::VecDeque;

use crate::executor::CommandExecutor;

/// Hands back scripted exit codes and records every call it receives.
pub struct RecordingExecutor {
    codes: VecDeque<i32>,
    fail_on: Option<usize>,
    pub calls: Vec<(String, Vec<String>)>,
}

impl RecordingExecutor {
    pub fn new(codes: &[i32]) -> Self {
        Self {
            codes: codes.iter().copied().collect(),
            fail_on: None,
            calls: Vec::new(),
        }
    }

    /// The zero-based call `index` returns an error instead of a code.
    pub fn fail_on_call(mut self, index: usize) -> Self {
        self.fail_on = Some(index);
        self
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .iter()
            .map(|(program, args)| {
                let mut parts = vec![program.clone()];
                parts.extend(args.iter().cloned());
                parts.join(" ")
            })
            .collect()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&mut self, program: &str, args: &[String]) -> Result<i32> {
        let index = self.calls.len();
        self.calls.push((program.to_string(), args.to_vec()));

        if self.fail_on == Some(index) {
            bail!("failed to run {}", program);
        }
        match self.codes.pop_front() {
            Some(code) => Ok(code),
            None => bail!("no scripted exit code for call {}", index),
        }
    }
}

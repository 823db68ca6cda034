// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted agent adapter for deterministic testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::agent::{AdapterError, AgentAdapter};
use crate::tool::Tool;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Recorded call to a [`ScriptedAgent`].
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCall {
    Plan { task: String },
    Execute { task: String },
}

struct ScriptedState {
    plan_error: Option<AdapterError>,
    /// Queued execute outcomes, consumed front-first. When empty the
    /// default output is returned.
    results: VecDeque<Result<Value, AdapterError>>,
    default_output: Value,
    /// Fail this many execute calls before succeeding.
    fail_remaining: u32,
    fail_error: AdapterError,
    tokens_per_execute: u64,
    last_tokens: u64,
    execute_delay: Option<Duration>,
    /// (tool name, args) invoked in order on every execute.
    tool_calls: Vec<(String, Value)>,
    tools: Vec<Arc<dyn Tool>>,
    calls: Vec<AgentCall>,
    execute_count: u32,
}

/// Programmable agent that records calls and replays scripted outcomes.
#[derive(Clone)]
pub struct ScriptedAgent {
    name: String,
    inner: Arc<Mutex<ScriptedState>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::named("scripted")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(ScriptedState {
                plan_error: None,
                results: VecDeque::new(),
                default_output: json!({ "output": "ok" }),
                fail_remaining: 0,
                fail_error: AdapterError::Failed("scripted failure".to_string()),
                tokens_per_execute: 10,
                last_tokens: 0,
                execute_delay: None,
                tool_calls: Vec::new(),
                tools: Vec::new(),
                calls: Vec::new(),
                execute_count: 0,
            })),
        }
    }

    /// Set the output returned when the scripted queue is empty.
    pub fn with_output(self, output: Value) -> Self {
        self.inner.lock().default_output = output;
        self
    }

    /// Queue an explicit outcome for the next execute call.
    pub fn push_result(&self, result: Result<Value, AdapterError>) {
        self.inner.lock().results.push_back(result);
    }

    /// Fail the next `count` execute calls with the given error.
    pub fn fail_times(self, count: u32, error: AdapterError) -> Self {
        {
            let mut state = self.inner.lock();
            state.fail_remaining = count;
            state.fail_error = error;
        }
        self
    }

    /// Fail every execute call.
    pub fn always_fail(self, error: AdapterError) -> Self {
        self.fail_times(u32::MAX, error)
    }

    pub fn fail_plan(self, error: AdapterError) -> Self {
        self.inner.lock().plan_error = Some(error);
        self
    }

    pub fn with_tokens_per_execute(self, tokens: u64) -> Self {
        self.inner.lock().tokens_per_execute = tokens;
        self
    }

    /// Sleep this long inside every execute (for concurrency tests).
    pub fn with_execute_delay(self, delay: Duration) -> Self {
        self.inner.lock().execute_delay = Some(delay);
        self
    }

    pub fn with_tools(self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.inner.lock().tools = tools;
        self
    }

    /// Invoke the named tool with the given args on every execute, in
    /// declaration order. The last tool result becomes the output.
    pub fn with_tool_call(self, name: impl Into<String>, args: Value) -> Self {
        self.inner.lock().tool_calls.push((name.into(), args));
        self
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.inner.lock().calls.clone()
    }

    pub fn execute_count(&self) -> u32 {
        self.inner.lock().execute_count
    }
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentAdapter for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.inner.lock().tools.clone()
    }

    async fn plan(&self, task: &str) -> Result<String, AdapterError> {
        let mut state = self.inner.lock();
        state.calls.push(AgentCall::Plan {
            task: task.to_string(),
        });
        if let Some(error) = &state.plan_error {
            return Err(error.clone());
        }
        Ok(task.to_string())
    }

    async fn execute(&self, task: &str, tools: &[Arc<dyn Tool>]) -> Result<Value, AdapterError> {
        let (delay, scripted_tool_calls) = {
            let mut state = self.inner.lock();
            state.calls.push(AgentCall::Execute {
                task: task.to_string(),
            });
            state.execute_count += 1;
            (state.execute_delay, state.tool_calls.clone())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        // Drive any scripted tool invocations through the wrapped tool set.
        let mut tool_output = None;
        for (name, args) in &scripted_tool_calls {
            let tool = tools
                .iter()
                .find(|t| t.name() == name)
                .ok_or_else(|| AdapterError::Failed(format!("no such tool: {name}")))?;
            let result = tool
                .invoke(args.clone())
                .await
                .map_err(|e| AdapterError::Failed(e.to_string()))?;
            tool_output = Some(result);
        }

        let mut state = self.inner.lock();
        state.last_tokens = state.tokens_per_execute;

        if state.fail_remaining > 0 {
            state.fail_remaining = state.fail_remaining.saturating_sub(1);
            return Err(state.fail_error.clone());
        }

        if let Some(result) = state.results.pop_front() {
            return result;
        }

        match tool_output {
            Some(result) => Ok(json!({ "output": result })),
            None => Ok(state.default_output.clone()),
        }
    }

    fn token_usage(&self) -> u64 {
        self.inner.lock().last_tokens
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

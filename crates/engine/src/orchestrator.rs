// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-execution orchestrator.
//!
//! Drives one execution through INIT → PLAN → EXECUTE → REVIEW →
//! TERMINATE, appending a `STATE_ENTER` event with cumulative counters at
//! the top of every iteration — that event is the durable checkpoint
//! resume targets. Policy is validated before each iteration; the EXECUTE
//! handler runs the adapter under the retry engine; exactly one
//! terminating event is appended per run.
//!
//! The async and blocking entry points are semantically identical; the
//! async form additionally honors external cancellation.

use crate::bus::EventBus;
use crate::cancel::CancelToken;
use crate::context::{ExecutionContext, SharedContext};
use crate::error::EngineError;
use crate::retry::{execute_with_retry, RetryFailure};
use crate::tool::IdempotentTool;
use fm_adapters::{descriptors, AdapterError, AgentAdapter, Tool};
use fm_core::{
    Clock, EventType, Execution, ExecutionEvent, ExecutionId, ExecutionReport, ExecutionSnapshot,
    LifecycleState, Policy, ReportStatus, StateMachine, SystemClock,
};
use fm_storage::{EventStore, PersistenceAdapter, StepCheckpoint, StorageError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Bounded backoff for event-log writes: base delay doubled per attempt.
const APPEND_RETRIES: u32 = 3;
const APPEND_BACKOFF: Duration = Duration::from_millis(10);

/// Optional knobs for a run: resume coordinates and cancellation.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Reuse an existing execution id instead of minting one.
    pub execution_id: Option<ExecutionId>,
    /// Resume from this step via event-log replay.
    pub from_step: Option<u64>,
    pub cancel: CancelToken,
}

impl RunOptions {
    /// Options for resuming an existing execution.
    pub fn resume(execution_id: ExecutionId, from_step: u64) -> Self {
        Self {
            execution_id: Some(execution_id),
            from_step: Some(from_step),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Drives one execution at a time; cheap to construct per run.
#[derive(Clone)]
pub struct Orchestrator {
    event_store: Arc<dyn EventStore>,
    persistence: Arc<dyn PersistenceAdapter>,
    policy: Policy,
    bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        persistence: Arc<dyn PersistenceAdapter>,
        policy: Policy,
    ) -> Self {
        Self {
            event_store,
            persistence,
            policy,
            bus: EventBus::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fan-out bus observers can subscribe to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Full ordered event log for an execution (trace read).
    pub async fn get_events(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<ExecutionEvent>, StorageError> {
        self.event_store.get(execution_id, 0, None).await
    }

    /// Run to terminal state with default options.
    pub async fn run(&self, agent: Arc<dyn AgentAdapter>, task: &str) -> ExecutionReport {
        self.run_with(agent, task, RunOptions::default()).await
    }

    /// Blocking entry point, semantically identical to [`run`].
    ///
    /// Must not be called from within an async runtime.
    pub fn run_blocking(&self, agent: Arc<dyn AgentAdapter>, task: &str) -> ExecutionReport {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.run(agent, task)),
            Err(err) => {
                error!(error = %err, "failed to build runtime for blocking run");
                self.failed_report_without_run(agent.name(), task)
            }
        }
    }

    /// Run one execution to its terminal state and report.
    pub async fn run_with(
        &self,
        agent: Arc<dyn AgentAdapter>,
        task: &str,
        opts: RunOptions,
    ) -> ExecutionReport {
        let started = self.clock.now();
        let mut policy = self.policy.clone();

        // Setup: bind snapshot, content hash, and id.
        let raw_tools = agent.tools();
        let snapshot = ExecutionSnapshot::new(task, &policy, agent.name(), descriptors(&raw_tools));
        let execution = Execution::new(snapshot, opts.execution_id.clone(), self.clock.as_ref());
        let execution_id = execution.execution_id.clone();

        // Resuming requires the stored snapshot to exist and hash-validate;
        // checked before the fresh spec overwrites it.
        let mut integrity_failure = false;
        if opts.from_step.is_some() {
            integrity_failure = match self.persistence.load_execution_spec(&execution_id).await {
                Ok(Some(stored)) => !stored.validate_hash(),
                Ok(None) => true,
                Err(err) => {
                    warn!(execution_id = %execution_id, error = %err, "failed to load stored spec for resume");
                    false
                }
            };
        }

        if let Err(err) = self.persistence.register_active_execution(&execution_id).await {
            warn!(execution_id = %execution_id, error = %err, "failed to register active execution");
        }
        if !integrity_failure {
            if let Err(err) = self.persistence.save_execution_spec(&execution).await {
                warn!(execution_id = %execution_id, error = %err, "failed to save execution spec");
            }
        }

        policy.start_timer(self.clock.as_ref());

        let ctx = ExecutionContext::new(
            execution_id.clone(),
            execution.execution_hash.clone(),
            task,
        )
        .shared();
        let mut machine = StateMachine::new(self.clock.as_ref());

        let tools = IdempotentTool::wrap_all(
            raw_tools,
            &self.event_store,
            &ctx,
            &policy,
            &self.bus,
            &self.clock,
        );

        let outcome = if integrity_failure {
            Err(EngineError::Integrity(execution_id.clone()))
        } else {
            self.drive(&agent, task, &tools, &mut machine, &ctx, &policy, &opts)
                .await
        };

        let status = self
            .finish(outcome, &execution_id, &mut machine, &ctx, &opts)
            .await;

        if let Err(err) = self.persistence.remove_active_execution(&execution_id).await {
            warn!(execution_id = %execution_id, error = %err, "failed to remove active execution");
        }

        let elapsed = self
            .clock
            .now()
            .saturating_duration_since(started)
            .as_secs_f64();
        self.report(agent.name(), status, elapsed, &machine, &ctx)
    }

    /// Replay hydration plus the lifecycle loop. Any error aborts the run
    /// and surfaces to [`finish`], which appends the single terminating
    /// event.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        agent: &Arc<dyn AgentAdapter>,
        task: &str,
        tools: &[Arc<dyn Tool>],
        machine: &mut StateMachine,
        ctx: &SharedContext,
        policy: &Policy,
        opts: &RunOptions,
    ) -> Result<(), EngineError> {
        let execution_id = ctx.lock().execution_id.clone();
        let replay_of = opts
            .from_step
            .map(|from_step| (execution_id.clone(), from_step));

        // Replay: rebuild counters and last output from the event log,
        // then anchor the machine at EXECUTE, the resumable state.
        if let Some(from_step) = opts.from_step {
            info!(execution_id = %execution_id, from_step, "resuming execution from event log");
            let state = self
                .event_store
                .replay_to_state(&execution_id, Some(from_step))
                .await?;
            ctx.lock().hydrate(&state);
            machine.force_set(LifecycleState::Execute, self.clock.as_ref());
        }

        let mut start_event = ExecutionEvent::new(
            execution_id.clone(),
            0,
            EventType::ExecutionStarted,
            self.clock.epoch_ms(),
        )
        .with_input(json!({
            "task": task,
            "agent": agent.name(),
            "execution_hash": ctx.lock().execution_hash.clone(),
        }));
        if let Some((original, from_step)) = &replay_of {
            start_event = start_event.with_replay(original.clone(), *from_step);
        }
        self.append_event(start_event).await?;

        while !machine.is_terminal() {
            // Cancellation is observed at the top of each iteration as
            // well as inside the handlers.
            if opts.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let policy_ctx = ctx.lock().policy_context();
            policy.validate(&policy_ctx, self.clock.as_ref())?;

            let current = machine.current();
            let (step, tokens, tool_calls) = {
                let ctx = ctx.lock();
                (ctx.step_count, ctx.token_usage, ctx.tool_calls)
            };

            // The durable checkpoint: resume always targets this event.
            let mut enter = ExecutionEvent::new(
                execution_id.clone(),
                step,
                EventType::StateEnter,
                self.clock.epoch_ms(),
            )
            .with_state(current)
            .with_counters(tokens, step, tool_calls);
            if let Some((original, from_step)) = &replay_of {
                enter = enter.with_replay(original.clone(), *from_step);
            }
            self.append_event(enter).await?;

            // Best-effort mirror for quick inspection; never consulted
            // for resume.
            let checkpoint = StepCheckpoint {
                step_number: step,
                timestamp_ms: self.clock.epoch_ms(),
                state: ctx.lock().safe_snapshot(),
            };
            if let Err(err) = self
                .persistence
                .save_execution_step(&execution_id, checkpoint)
                .await
            {
                warn!(execution_id = %execution_id, error = %err, "step checkpoint failed");
            }

            match current {
                LifecycleState::Init => {
                    self.handle_init(agent, ctx);
                    machine.transition(LifecycleState::Plan, self.clock.as_ref())?;
                }
                LifecycleState::Plan => {
                    self.handle_plan(agent, ctx, &opts.cancel).await?;
                    machine.transition(LifecycleState::Execute, self.clock.as_ref())?;
                }
                LifecycleState::Execute => {
                    self.handle_execute(agent, task, tools, ctx, policy, &opts.cancel)
                        .await?;
                    machine.transition(LifecycleState::Review, self.clock.as_ref())?;
                }
                LifecycleState::Review => {
                    self.handle_review(ctx);
                    machine.transition(LifecycleState::Terminate, self.clock.as_ref())?;
                }
                LifecycleState::Terminate | LifecycleState::Failed => break,
            }
        }

        Ok(())
    }

    fn handle_init(&self, agent: &Arc<dyn AgentAdapter>, ctx: &SharedContext) {
        info!(agent = agent.name(), "initializing execution context");
        let mut ctx = ctx.lock();
        ctx.plan = None;
        ctx.execution_result = None;
        ctx.final_output = None;
    }

    async fn handle_plan(
        &self,
        agent: &Arc<dyn AgentAdapter>,
        ctx: &SharedContext,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        let task = {
            let mut ctx = ctx.lock();
            ctx.step_count += 1;
            ctx.task.clone()
        };

        let plan = tokio::select! {
            plan = agent.plan(&task) => plan?,
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        };
        ctx.lock().plan = Some(plan);
        Ok(())
    }

    async fn handle_execute(
        &self,
        agent: &Arc<dyn AgentAdapter>,
        task: &str,
        tools: &[Arc<dyn Tool>],
        ctx: &SharedContext,
        policy: &Policy,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        let plan = {
            let mut ctx = ctx.lock();
            ctx.step_count += 1;
            ctx.plan.clone().unwrap_or_else(|| task.to_string())
        };

        // Retry notices are collected synchronously and land in the log
        // before the next STATE_ENTER (or the terminating event).
        let mut notices: Vec<(u32, String, Duration)> = Vec::new();
        let result = execute_with_retry(
            &policy.retry,
            cancel,
            |err: &AdapterError| policy.retry.should_retry(err.kind()),
            |attempt, err, delay| notices.push((attempt, err.to_string(), delay)),
            || agent.execute(&plan, tools),
        )
        .await;

        let execution_id = ctx.lock().execution_id.clone();
        for (attempt, err, delay) in notices {
            let (step, tokens, tool_calls) = {
                let ctx = ctx.lock();
                (ctx.step_count, ctx.token_usage, ctx.tool_calls)
            };
            let event = ExecutionEvent::new(
                execution_id.clone(),
                step,
                EventType::RetryAttempted,
                self.clock.epoch_ms(),
            )
            .with_error(err)
            .with_input(json!({ "attempt": attempt, "delay_ms": delay.as_millis() as u64 }))
            .with_counters(tokens, step, tool_calls);
            self.append_event(event).await?;
        }

        match result {
            Ok(value) => {
                let mut ctx = ctx.lock();
                ctx.execution_result = Some(value);
                ctx.token_usage += agent.token_usage();
                Ok(())
            }
            Err(RetryFailure::Error(err)) => Err(EngineError::Adapter(err)),
            Err(RetryFailure::Cancelled) => Err(EngineError::Cancelled),
        }
    }

    fn handle_review(&self, ctx: &SharedContext) {
        let mut ctx = ctx.lock();
        ctx.step_count += 1;

        // Canonicalize the final output: prefer an explicit "output"
        // field, fall back to the stringified result.
        ctx.final_output = match &ctx.execution_result {
            Some(Value::Object(map)) if map.contains_key("output") => {
                Some(match map.get("output") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
            }
            Some(other) => Some(other.to_string()),
            None => None,
        };
    }

    /// Append the single terminating event and return the report status.
    ///
    /// No side effects happen after the terminal decision except this one
    /// append and active-set cleanup.
    async fn finish(
        &self,
        outcome: Result<(), EngineError>,
        execution_id: &ExecutionId,
        machine: &mut StateMachine,
        ctx: &SharedContext,
        opts: &RunOptions,
    ) -> ReportStatus {
        let (step, tokens, tool_calls) = {
            let ctx = ctx.lock();
            (ctx.step_count, ctx.token_usage, ctx.tool_calls)
        };

        let (event_type, error, status) = match &outcome {
            Ok(()) => (EventType::ExecutionCompleted, None, ReportStatus::Success),
            Err(EngineError::Policy(violation)) => (
                EventType::PolicyViolation,
                Some(violation.to_string()),
                ReportStatus::Failed,
            ),
            Err(err) => (
                EventType::ExecutionFailed,
                Some(err.to_string()),
                ReportStatus::Failed,
            ),
        };

        let mut event = ExecutionEvent::new(
            execution_id.clone(),
            step,
            event_type,
            self.clock.epoch_ms(),
        )
        .with_counters(tokens, step, tool_calls);
        if let Some((original, from_step)) =
            opts.from_step.map(|s| (execution_id.clone(), s))
        {
            event = event.with_replay(original, from_step);
        }
        event = match &error {
            Some(message) => event.with_error(message.clone()),
            None => event.with_output(json!({ "status": "SUCCESS" })),
        };

        match &outcome {
            Ok(()) => {}
            Err(err) => {
                error!(execution_id = %execution_id, error = %err, "execution failed");
                machine.fail(self.clock.as_ref());
            }
        }

        if let Err(err) = self.append_event(event).await {
            // The terminal event could not be made durable: never claim
            // success.
            error!(execution_id = %execution_id, error = %err, "failed to append terminating event");
            return ReportStatus::Failed;
        }

        status
    }

    /// Append with bounded backoff; validation failures are not retried.
    async fn append_event(&self, event: ExecutionEvent) -> Result<(), EngineError> {
        let mut attempt = 0;
        loop {
            match self.event_store.append(event.clone()).await {
                Ok(()) => {
                    self.bus.publish(&event);
                    return Ok(());
                }
                Err(err @ StorageError::InvalidEvent(_)) => {
                    return Err(EngineError::Storage(err));
                }
                Err(err) if attempt < APPEND_RETRIES => {
                    attempt += 1;
                    warn!(error = %err, attempt, "event append failed, retrying");
                    tokio::time::sleep(APPEND_BACKOFF * 2u32.pow(attempt)).await;
                }
                Err(err) => return Err(EngineError::Storage(err)),
            }
        }
    }

    fn report(
        &self,
        agent_name: &str,
        status: ReportStatus,
        elapsed_seconds: f64,
        machine: &StateMachine,
        ctx: &SharedContext,
    ) -> ExecutionReport {
        let ctx = ctx.lock();
        ExecutionReport {
            execution_id: ctx.execution_id.clone(),
            agent_name: agent_name.to_string(),
            status,
            total_tokens: ctx.token_usage,
            total_steps: ctx.step_count,
            tool_calls: ctx.tool_calls,
            elapsed_seconds,
            state_history: machine.history().to_vec(),
            final_output: ctx.final_output.clone(),
            timestamp_ms: self.clock.epoch_ms(),
            execution_hash: ctx.execution_hash.clone(),
        }
    }

    /// Report for a run that could not start at all.
    fn failed_report_without_run(&self, agent_name: &str, task: &str) -> ExecutionReport {
        let snapshot = ExecutionSnapshot::new(task, &self.policy, agent_name, Vec::new());
        ExecutionReport {
            execution_id: ExecutionId::new(String::new()),
            agent_name: agent_name.to_string(),
            status: ReportStatus::Failed,
            total_tokens: 0,
            total_steps: 0,
            tool_calls: 0,
            elapsed_seconds: 0.0,
            state_history: vec![LifecycleState::Init],
            final_output: None,
            timestamp_ms: self.clock.epoch_ms(),
            execution_hash: snapshot.content_hash(),
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

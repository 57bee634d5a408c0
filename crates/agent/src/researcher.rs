//! ResearcherAgent: a bounded reason-act-observe loop over discovery tools.
//!
//! One call to [`ResearcherAgent::research`] runs one session:
//!
//! 1. **Initialize** the conversation (system prompt, kickoff, routing policy)
//! 2. **Reason**: request a completion that must carry tool calls
//! 3. **Act**: run each call in order through gating, the finish guard or
//!    the tool connector (under a per-tool timeout)
//! 4. **Observe**: append observations and record one step per iteration
//!
//! The loop ends on an approved `finish`, the iteration budget, the session
//! timeout or a completion failure. An exhausted budget gets one forced
//! `finish` request. Every session returns a [`ResearchResult`].

use chrono::{Datelike, Utc};
use serde_json::{Value, json};
use sleuth_config::{ResearchSettings, ToolSettings};
use sleuth_core::error::{ProviderError, ToolError};
use sleuth_core::message::{Conversation, Message, MessageToolCall, Role};
use sleuth_core::provider::{Completion, CompletionRequest, ToolChoice, ToolDefinition};
use sleuth_core::research::{AgentStep, ResearchResult, ResearchStatus};
use sleuth_core::tool::{ToolConnector, ToolKind};
use sleuth_core::trace::{NoopEmitter, TraceEmitter, TraceEventKind};
use sleuth_providers::CompletionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::guard::{self, GuardVerdict};
use crate::observation::{
    fallback_thought, format_observation, result_count, shorten, summarize_action,
    summarize_output,
};
use crate::policy::{Coverage, ToolPolicy};
use crate::prompts;
use crate::repair;
use crate::tracer::SessionTracer;

/// Output budget for reasoning and finish requests.
const REASONING_MAX_TOKENS: u32 = 6000;

const NO_TOOL_OUTPUTS: &str =
    "Research ended without any tool outputs; unable to auto-generate final report.";

/// The autonomous research agent.
pub struct ResearcherAgent {
    manager: Arc<CompletionManager>,
    tools: Arc<dyn ToolConnector>,
    emitter: Arc<dyn TraceEmitter>,
    settings: ResearchSettings,
    tool_settings: ToolSettings,
    definitions: Vec<ToolDefinition>,
    current_year: String,
}

/// Mutable state of one session. Never shared.
struct Session<'q> {
    query: &'q str,
    conversation: Conversation,
    policy: ToolPolicy,
    coverage: Coverage,
    steps: Vec<AgentStep>,
    iteration: u32,
    report: String,
    sources: Vec<String>,
    done: bool,
    timed_out: bool,
    error: Option<String>,
    /// System hints held until the current tool-call batch is answered.
    pending_hints: Vec<String>,
}

impl Session<'_> {
    fn status(&self) -> ResearchStatus {
        if self.timed_out {
            ResearchStatus::Timeout
        } else if self.done {
            ResearchStatus::Completed
        } else if self.error.is_some() || self.steps.is_empty() {
            ResearchStatus::Failed
        } else {
            ResearchStatus::Incomplete
        }
    }

    fn flush_hints(&mut self) {
        for hint in self.pending_hints.drain(..) {
            self.conversation.push(Message::system(hint));
        }
    }
}

/// One reasoning reply, shared by every call it requested.
struct Turn<'a> {
    iteration: u32,
    thought: &'a str,
    completion: &'a Completion,
    latency_seconds: f64,
}

enum CallOutcome {
    /// Blocked, rejected or unknown; nothing to record.
    Skipped,
    Observed(AgentStep),
    Finished(AgentStep),
}

/// The `{report, sources}` payload of a finish call.
struct FinishDraft {
    report: String,
    sources: Vec<String>,
}

impl FinishDraft {
    fn from_arguments(arguments: &Value) -> Self {
        let report = arguments
            .get("report")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let sources = match arguments.get("sources") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        };
        Self { report, sources }
    }

    fn is_empty(&self) -> bool {
        self.report.trim().is_empty()
    }
}

impl ResearcherAgent {
    pub fn new(manager: Arc<CompletionManager>, tools: Arc<dyn ToolConnector>) -> Self {
        Self {
            manager,
            tools,
            emitter: Arc::new(NoopEmitter),
            settings: ResearchSettings::default(),
            tool_settings: ToolSettings::default(),
            definitions: sleuth_tools::all_definitions(),
            current_year: Utc::now().year().to_string(),
        }
    }

    pub fn with_settings(mut self, settings: ResearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_tool_settings(mut self, tool_settings: ToolSettings) -> Self {
        self.tool_settings = tool_settings;
        self
    }

    /// Attach a sink for trace events.
    pub fn with_emitter(mut self, emitter: Arc<dyn TraceEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Override the year treated as "current" in prompts and recency checks.
    pub fn with_current_year(mut self, year: impl Into<String>) -> Self {
        self.current_year = year.into();
        self
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    fn prompt(&self, text: &str) -> String {
        if self.settings.ascii_prompts {
            prompts::normalize_ascii(text)
        } else {
            text.to_string()
        }
    }

    fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_minutes.saturating_mul(60))
    }

    /// Timeout for one tool execution; `None` when disabled.
    pub fn tool_timeout(&self, tool: ToolKind) -> Option<Duration> {
        let seconds = match tool {
            ToolKind::WebSearch => self.tool_settings.web_search_timeout_seconds,
            _ => self.tool_settings.tool_execution_timeout_seconds,
        };
        (seconds > 0).then(|| Duration::from_secs(seconds))
    }

    /// Run one research session to completion.
    pub async fn research(&self, query: &str, session_id: Option<String>) -> ResearchResult {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let started = Instant::now();
        let tracer = SessionTracer::new(self.emitter.clone(), session_id.clone());

        info!(
            session_id = %session_id,
            max_iterations = self.settings.max_iterations,
            timeout_minutes = self.settings.timeout_minutes,
            "Starting research session: {query}"
        );
        tracer
            .emit(
                TraceEventKind::SessionStart,
                json!({"query": query, "timestamp": Utc::now().to_rfc3339()}),
                None,
            )
            .await;

        let mut session = self.start_session(query);
        self.run_loop(&mut session, &tracer, started).await;

        if !session.done && !session.timed_out {
            if session.steps.is_empty() {
                error!("{NO_TOOL_OUTPUTS}");
                session.error.get_or_insert_with(|| NO_TOOL_OUTPUTS.to_string());
            } else {
                let auto_iteration = session.iteration + 1;
                if let Some(step) = self.force_finish(&mut session, &tracer, auto_iteration).await {
                    session.steps.push(step);
                    session.iteration = auto_iteration;
                    session.done = true;
                }
            }
        }

        let status = session.status();
        let (total_tokens, total_cost_usd) = ResearchResult::totals(&session.steps);
        let total_duration_seconds = started.elapsed().as_secs_f64();
        let summary = json!({
            "status": status.as_str(),
            "iterations": session.iteration,
            "duration_seconds": total_duration_seconds,
            "total_tokens": total_tokens,
            "total_cost_usd": total_cost_usd,
            "num_sources": session.sources.len(),
            "error": session.error,
        });
        if status == ResearchStatus::Failed {
            tracer.emit(TraceEventKind::SessionFailed, summary, None).await;
        } else {
            tracer.emit(TraceEventKind::SessionComplete, summary, None).await;
        }
        info!(
            session_id = %session_id,
            status = %status,
            iterations = session.iteration,
            "Research completed: {:.1}s, ${:.4}",
            total_duration_seconds,
            total_cost_usd
        );

        ResearchResult {
            session_id,
            query: query.to_string(),
            report: session.report,
            sources: session.sources,
            steps: session.steps,
            total_iterations: session.iteration,
            total_duration_seconds,
            total_tokens,
            total_cost_usd,
            status,
            error: session.error,
        }
    }

    fn start_session<'q>(&self, query: &'q str) -> Session<'q> {
        let policy = ToolPolicy::derive(query, &self.current_year)
            .with_sufficient_result_count(self.settings.sufficient_result_count)
            .with_sparse_result_threshold(self.settings.sparse_result_threshold);

        let mut conversation = Conversation::new();
        conversation.push(Message::system(self.prompt(&prompts::system_prompt(
            query,
            self.settings.max_iterations,
            &self.current_year,
        ))));
        conversation.push(Message::user(prompts::kickoff(query)));
        conversation.push(Message::system(self.prompt(&policy.routing_message())));

        Session {
            query,
            conversation,
            policy,
            coverage: Coverage::new(),
            steps: Vec::new(),
            iteration: 0,
            report: String::new(),
            sources: Vec::new(),
            done: false,
            timed_out: false,
            error: None,
            pending_hints: Vec::new(),
        }
    }

    async fn run_loop(&self, session: &mut Session<'_>, tracer: &SessionTracer, started: Instant) {
        let max = self.settings.max_iterations;
        while !session.done && session.iteration < max {
            if started.elapsed() > self.session_timeout() {
                warn!(iteration = session.iteration, "Research timeout exceeded");
                session.timed_out = true;
                session.error = Some("Timeout exceeded".into());
                break;
            }
            session.iteration += 1;
            let iteration = session.iteration;
            info!("Iteration {iteration}/{max}");
            tracer
                .emit(
                    TraceEventKind::IterationStart,
                    json!({
                        "mode": "normal",
                        "timestamp": Utc::now().to_rfc3339(),
                        "message": format!("Iteration {iteration} started"),
                    }),
                    Some(iteration),
                )
                .await;

            if let Err(e) = self.iterate(session, tracer, iteration).await {
                error!(iteration, "Error in iteration {iteration}: {e}");
                tracer
                    .emit(TraceEventKind::Error, json!({"error": e.to_string()}), Some(iteration))
                    .await;
                session.error = Some(e.to_string());
                break;
            }
        }
    }

    async fn iterate(
        &self,
        session: &mut Session<'_>,
        tracer: &SessionTracer,
        iteration: u32,
    ) -> Result<(), ProviderError> {
        let step_start = Instant::now();
        session.conversation.prune_incomplete_tool_calls();
        if session.conversation.len() > 1 && session.conversation.last_role() != Some(Role::User) {
            session.conversation.push(Message::user(prompts::CONTINUE));
        }
        if let Some(reminder) = session.coverage.reminder(session.policy.evidence_sufficient()) {
            session.conversation.push(Message::system(self.prompt(&reminder)));
        }

        info!(iteration, messages = session.conversation.len(), "Starting LLM call");
        let request = CompletionRequest::new(session.conversation.messages.clone())
            .with_tools(self.definitions.clone())
            .with_temperature(self.settings.effective_temperature())
            .with_max_tokens(REASONING_MAX_TOKENS)
            .require_tool_calls(true);
        let completion = self.manager.complete(request).await?;
        let latency_seconds = step_start.elapsed().as_secs_f64();

        let mut thought = completion.content.clone();
        if thought.trim().is_empty() {
            if completion.has_tool_calls() {
                thought = fallback_thought(&completion.tool_calls, iteration);
            } else {
                warn!(iteration, provider = %completion.provider, "LLM returned empty content");
            }
        }
        let primary = self.manager.primary_name();
        let provider_note = if !completion.provider.is_empty() && completion.provider != primary {
            format!(" (fallback from {primary})")
        } else {
            String::new()
        };
        let label = match thought.trim() {
            "" => "Reasoning step",
            text => text,
        };
        info!(
            iteration,
            provider = %completion.provider,
            total_tokens = completion.usage.total_tokens,
            "LLM call complete"
        );
        tracer
            .emit(
                TraceEventKind::Thought,
                json!({
                    "thought": thought,
                    "tokens_used": completion.usage.total_tokens,
                    "provider": completion.provider,
                    "latency_ms": latency_seconds * 1000.0,
                    "message": shorten(&format!("[{}{provider_note}] {label}", completion.provider), 600),
                }),
                Some(iteration),
            )
            .await;

        if !completion.has_tool_calls() {
            warn!("Agent did not call a tool, prompting for action");
            let text = if thought.is_empty() { prompts::NO_ACTION } else { thought.as_str() };
            session.conversation.push(Message::assistant(text));
            return Ok(());
        }

        session.conversation.push(Message::assistant_with_tools(
            thought.clone(),
            completion.tool_calls.clone(),
        ));
        let turn = Turn {
            iteration,
            thought: &thought,
            completion: &completion,
            latency_seconds,
        };

        let mut step_recorded = false;
        for (index, call) in completion.tool_calls.iter().enumerate() {
            match self.handle_call(session, tracer, &turn, index, call).await {
                CallOutcome::Skipped => {}
                CallOutcome::Observed(step) => {
                    if !step_recorded {
                        session.steps.push(step);
                        step_recorded = true;
                    }
                }
                CallOutcome::Finished(step) => {
                    if !step_recorded {
                        session.steps.push(step);
                    }
                    session.done = true;
                    break;
                }
            }
        }
        session.flush_hints();
        Ok(())
    }

    async fn handle_call(
        &self,
        session: &mut Session<'_>,
        tracer: &SessionTracer,
        turn: &Turn<'_>,
        index: usize,
        call: &MessageToolCall,
    ) -> CallOutcome {
        let iteration = turn.iteration;
        let arguments = repair::parse_arguments(&call.name, &call.arguments);

        let tool = match call.name.parse::<ToolKind>() {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %call.name, "Model requested an unknown tool");
                tracer
                    .emit(
                        TraceEventKind::Error,
                        json!({"tool": call.name, "error": e.to_string(), "index": index}),
                        Some(iteration),
                    )
                    .await;
                let available: Vec<&str> = ToolKind::ALL.iter().map(ToolKind::as_str).collect();
                session.conversation.push(Message::tool_result(
                    &call.id,
                    format!("{e}. Available tools: {}.", available.join(", ")),
                ));
                return CallOutcome::Skipped;
            }
        };
        info!(iteration, tool = %tool, "Action: {tool}");

        if let Err(reason) = session.policy.gate(tool, turn.thought) {
            info!(tool = %tool, "Tool blocked by heuristics: {reason}");
            tracer
                .emit(
                    TraceEventKind::ToolBlocked,
                    json!({"tool": tool.as_str(), "reason": reason, "index": index}),
                    Some(iteration),
                )
                .await;
            session.conversation.push(Message::tool_result(&call.id, reason));
            return CallOutcome::Skipped;
        }

        tracer
            .emit(
                TraceEventKind::Action,
                json!({
                    "tool": tool.as_str(),
                    "parameters": arguments,
                    "index": index,
                    "message": summarize_action(tool.as_str(), &arguments),
                }),
                Some(iteration),
            )
            .await;

        if tool == ToolKind::Finish {
            return self.handle_finish(session, tracer, turn, index, call, arguments).await;
        }
        let step = self
            .execute_tool(session, tracer, turn, index, call, tool, arguments)
            .await;
        CallOutcome::Observed(step)
    }

    async fn handle_finish(
        &self,
        session: &mut Session<'_>,
        tracer: &SessionTracer,
        turn: &Turn<'_>,
        index: usize,
        call: &MessageToolCall,
        arguments: Value,
    ) -> CallOutcome {
        let iteration = turn.iteration;
        let draft = FinishDraft::from_arguments(&arguments);

        let verdict = if draft.is_empty() {
            GuardVerdict {
                approved: false,
                feedback: prompts::EMPTY_REPORT.into(),
                hint: None,
            }
        } else if self.settings.finish_guard_enabled {
            guard::review(&self.manager, session.query, &draft.report, &draft.sources).await
        } else {
            GuardVerdict::disabled()
        };

        if !verdict.approved {
            let rejection = verdict.rejection().to_string();
            info!(iteration, "Finish rejected: {rejection}");
            tracer
                .emit(
                    TraceEventKind::FinishGuard,
                    json!({"approved": false, "feedback": rejection, "hint": verdict.hint}),
                    Some(iteration),
                )
                .await;
            tracer
                .emit(
                    TraceEventKind::Observation,
                    json!({
                        "observation": shorten(&rejection, 1000),
                        "index": index,
                        "message": shorten(&rejection, 400),
                    }),
                    Some(iteration),
                )
                .await;
            let mut content = rejection;
            if let Some(hint) = &verdict.hint {
                content.push_str(&format!(" Next step: {hint}"));
                session
                    .pending_hints
                    .push(self.prompt(&prompts::guard_guidance(hint)));
            }
            session.conversation.push(Message::tool_result(&call.id, content));
            return CallOutcome::Skipped;
        }

        tracer
            .emit(
                TraceEventKind::FinishGuard,
                json!({"approved": true, "feedback": verdict.feedback, "hint": verdict.hint}),
                Some(iteration),
            )
            .await;
        tracer
            .emit(
                TraceEventKind::Finish,
                json!({
                    "report_length": draft.report.chars().count(),
                    "num_sources": draft.sources.len(),
                    "report": draft.report,
                    "sources": draft.sources,
                    "message": "Final report drafted with cited sources",
                }),
                Some(iteration),
            )
            .await;
        info!(sources = draft.sources.len(), "Agent finished research");

        let observation = "Final report generated";
        session.conversation.push(Message::tool_result(&call.id, observation));
        let tool_output = json!({"report": draft.report, "sources": draft.sources});
        session.report = draft.report;
        session.sources = draft.sources;

        CallOutcome::Finished(AgentStep {
            iteration,
            thought: turn.thought.to_string(),
            action: ToolKind::Finish.to_string(),
            action_input: arguments,
            observation: observation.into(),
            tool_output,
            timestamp: Utc::now(),
            tokens_used: turn.completion.usage.total_tokens,
            cost_usd: turn.completion.cost_usd,
            latency_seconds: turn.latency_seconds,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_tool(
        &self,
        session: &mut Session<'_>,
        tracer: &SessionTracer,
        turn: &Turn<'_>,
        index: usize,
        call: &MessageToolCall,
        tool: ToolKind,
        arguments: Value,
    ) -> AgentStep {
        let iteration = turn.iteration;
        let timeout = self.tool_timeout(tool);

        let mut input = arguments.clone();
        if tool == ToolKind::WebSearch
            && let Some(filter) = session.policy.recency.preferred_date_filter()
            && let Some(fields) = input.as_object_mut()
            && fields
                .get("date_filter")
                .is_none_or(|v| v.is_null() || v.as_str() == Some(""))
        {
            info!("Applying default date_filter='{filter}' based on recency intent");
            fields.insert("date_filter".into(), Value::from(filter));
        }

        let tool_start = Instant::now();
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.tools.execute(tool, input)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    tool_name: tool.to_string(),
                    timeout_secs: limit.as_secs(),
                }),
            },
            None => self.tools.execute(tool, input).await,
        };
        let duration = tool_start.elapsed();

        let (output, timeout_message) = match result {
            Ok(output) => (output, None),
            Err(e @ ToolError::Timeout { .. }) => {
                let message = e.to_string();
                error!("{message}");
                (
                    json!({"status": "error", "error": message, "tool": tool.as_str(), "notes": [message]}),
                    Some(message),
                )
            }
            Err(e) => {
                error!(tool = %tool, "Tool execution failed: {e}");
                (
                    json!({"status": "error", "error": e.to_string(), "tool": tool.as_str()}),
                    None,
                )
            }
        };

        let success = output.get("status").and_then(Value::as_str) != Some("error");
        let summary = timeout_message
            .clone()
            .unwrap_or_else(|| summarize_output(tool, &output));
        let count = result_count(&output);
        info!(
            tool = %tool,
            index,
            duration_ms = duration.as_millis() as u64,
            "Tool completed: {summary}"
        );
        session.policy.observe_result_count(tool, count, iteration);

        tracer
            .emit(
                TraceEventKind::ToolExecution,
                json!({
                    "tool": tool.as_str(),
                    "duration_ms": duration.as_secs_f64() * 1000.0,
                    "success": success,
                    "result_summary": summary,
                    "index": index,
                    "provider": output.get("provider"),
                    "result_count": count,
                    "pipeline_stats": output.get("pipeline_stats"),
                    "notes": output.get("notes").cloned().unwrap_or_else(|| json!([])),
                    "timeout_seconds": timeout_message.as_ref().and(timeout.map(|t| t.as_secs())),
                    "message": summary,
                }),
                Some(iteration),
            )
            .await;
        session.coverage.record(tool, success);

        let observation = timeout_message.unwrap_or_else(|| format_observation(tool, &output));
        tracer
            .emit(
                TraceEventKind::Observation,
                json!({
                    "observation": shorten(&observation, 1000),
                    "index": index,
                    "message": shorten(&observation, 400),
                }),
                Some(iteration),
            )
            .await;
        session
            .conversation
            .push(Message::tool_result(&call.id, observation.clone()));

        if tool == ToolKind::WebSearch
            && let Some(hint) = session
                .policy
                .sparse_hint(arguments.get("query").and_then(Value::as_str), count)
        {
            info!("Sparse web results; injecting refinement hint");
            session.pending_hints.push(self.prompt(&hint));
        }

        AgentStep {
            iteration,
            thought: turn.thought.to_string(),
            action: tool.to_string(),
            action_input: arguments,
            observation,
            tool_output: output,
            timestamp: Utc::now(),
            tokens_used: turn.completion.usage.total_tokens,
            cost_usd: turn.completion.cost_usd,
            latency_seconds: turn.latency_seconds,
        }
    }

    async fn request_finish(&self, session: &Session<'_>) -> Result<Completion, ProviderError> {
        let request = CompletionRequest::new(session.conversation.messages.clone())
            .with_tools(self.definitions.clone())
            .with_temperature(self.settings.effective_temperature())
            .with_max_tokens(REASONING_MAX_TOKENS)
            .with_tool_choice(ToolChoice::Function(ToolKind::Finish.to_string()))
            .require_tool_calls(true);
        self.manager.complete(request).await
    }

    /// One last request forcing `finish` after the budget ran out.
    async fn force_finish(
        &self,
        session: &mut Session<'_>,
        tracer: &SessionTracer,
        iteration: u32,
    ) -> Option<AgentStep> {
        warn!("Max iterations reached without finish; generating final report automatically.");
        let started = Instant::now();
        tracer
            .emit(
                TraceEventKind::IterationStart,
                json!({
                    "mode": "auto_finish",
                    "timestamp": Utc::now().to_rfc3339(),
                    "message": format!("Auto-finish iteration {iteration} started"),
                }),
                Some(iteration),
            )
            .await;
        session.conversation.prune_incomplete_tool_calls();
        session.conversation.push(Message::user(prompts::FORCE_FINISH));

        let first = match self.request_finish(session).await {
            Ok(completion) => completion,
            Err(e) => {
                error!("Automatic finish attempt failed: {e}");
                return None;
            }
        };
        let Some(mut call) = first
            .tool_calls
            .iter()
            .find(|c| c.name == ToolKind::Finish.as_str())
            .cloned()
        else {
            error!("Automatic finish attempt did not return the finish tool");
            return None;
        };
        let mut thought = first.content.clone();
        let mut arguments = repair::parse_arguments(&call.name, &call.arguments);
        let mut draft = FinishDraft::from_arguments(&arguments);
        if draft.is_empty() {
            error!("Automatic finish returned an empty report");
            return None;
        }
        let mut tokens_used = first.usage.total_tokens;
        let mut cost_usd = first.cost_usd;

        if self.settings.finish_guard_enabled {
            let verdict = guard::review(&self.manager, session.query, &draft.report, &draft.sources).await;
            tracer
                .emit(
                    TraceEventKind::FinishGuard,
                    json!({
                        "approved": verdict.approved,
                        "feedback": verdict.feedback,
                        "hint": verdict.hint,
                        "auto": true,
                    }),
                    Some(iteration),
                )
                .await;

            if !verdict.approved && self.settings.finish_guard_retry_on_auto_finish {
                session.conversation.push(Message::system(
                    self.prompt(&prompts::auto_finish_feedback(verdict.rejection())),
                ));
                if let Some(hint) = &verdict.hint {
                    session
                        .conversation
                        .push(Message::system(self.prompt(&format!("Next step: {hint}"))));
                }
                match self.request_finish(session).await {
                    Ok(second) => {
                        tokens_used += second.usage.total_tokens;
                        cost_usd += second.cost_usd;
                        if second.has_content() {
                            thought = second.content.clone();
                        }
                        if let Some(next) = second
                            .tool_calls
                            .iter()
                            .find(|c| c.name == ToolKind::Finish.as_str())
                        {
                            let next_arguments = repair::parse_arguments(&next.name, &next.arguments);
                            let next_draft = FinishDraft::from_arguments(&next_arguments);
                            if !next_draft.is_empty() {
                                call = next.clone();
                                arguments = next_arguments;
                                draft = next_draft;
                            }
                        }
                    }
                    Err(e) => warn!("Auto-finish guard retry failed: {e}"),
                }
            }
        }

        let observation = "Final report generated automatically.";
        session
            .conversation
            .push(Message::assistant_with_tools(thought.clone(), vec![call.clone()]));
        session
            .conversation
            .push(Message::tool_result(&call.id, observation));

        tracer
            .emit(
                TraceEventKind::Finish,
                json!({
                    "report_length": draft.report.chars().count(),
                    "num_sources": draft.sources.len(),
                    "auto_generated": true,
                    "report": draft.report,
                    "sources": draft.sources,
                    "message": "Auto-finish generated the final report",
                }),
                Some(iteration),
            )
            .await;
        session.report = draft.report;
        session.sources = draft.sources;

        Some(AgentStep {
            iteration,
            thought,
            action: ToolKind::Finish.to_string(),
            action_input: arguments.clone(),
            observation: observation.into(),
            tool_output: arguments,
            timestamp: Utc::now(),
            tokens_used,
            cost_usd,
            latency_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

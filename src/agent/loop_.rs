//! Orchestration loop: Prompt → Directive → Tool → Log.
//!
//! Each iteration:
//! 1. Builds the prompt from the preamble, query and progress log
//! 2. Calls the model under a timeout
//! 3. Parses the directive line
//! 4. Coerces arguments and calls the tool
//! 5. Appends a progress entry
//!
//! A final answer, any failure, cancellation or the iteration cap ends the run.

use crate::agent::coerce::coerce_arguments;
use crate::agent::directive::parse_directive;
use crate::agent::error::AgentError;
use crate::agent::{context, system_prompt};
use crate::config::{AgentConfig, ModelConfig};
use crate::inference::LanguageModel;
use crate::tools::{ToolRegistry, ToolServer};
use crate::types::{Directive, ProgressEntry, RunState};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Knobs fixed for the lifetime of an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_iterations: u32,
    pub model_timeout: Duration,
    pub default_friendly_tools: Vec<String>,
    pub tool_filter: Vec<String>,
    pub instructions: String,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default(), &ModelConfig::default())
    }
}

impl LoopSettings {
    pub fn from_config(agent: &AgentConfig, model: &ModelConfig) -> Self {
        Self {
            max_iterations: agent.max_iterations,
            model_timeout: Duration::from_secs(model.timeout_secs),
            default_friendly_tools: agent.default_friendly_tools.clone(),
            tool_filter: agent.tool_filter.clone(),
            instructions: agent.instructions.clone(),
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed { answer: String },
    /// The cap was hit without a final answer. Incomplete, not an error.
    MaxIterationsReached { iterations: u32 },
    Failed { error: AgentError },
    Cancelled,
}

impl RunOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::MaxIterationsReached { .. } => "max_iterations",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable description: the answer, or why there is none.
    pub fn message(&self) -> String {
        match self {
            Self::Completed { answer } => answer.clone(),
            Self::MaxIterationsReached { iterations } => {
                format!("max iterations reached ({}) without a final answer", iterations)
            }
            Self::Failed { error } => format!("{} error: {}", error.kind(), error),
            Self::Cancelled => "run cancelled".into(),
        }
    }
}

/// Everything a finished run hands back to its caller.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub query: String,
    pub outcome: RunOutcome,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

enum Step {
    Continue,
    Finished(String),
}

/// Drives runs against one model and one tool server. Holds no per-run
/// state; each run owns its [`RunState`].
pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    server: Arc<dyn ToolServer>,
    registry: ToolRegistry,
    system_prompt: String,
    settings: LoopSettings,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Fetch the tool catalog and synthesize the preamble.
    pub async fn new(
        model: Arc<dyn LanguageModel>,
        server: Arc<dyn ToolServer>,
        settings: LoopSettings,
    ) -> Result<Self> {
        let catalog = server
            .list_tools()
            .await
            .context("Failed to fetch the tool catalog")?;
        let registry = ToolRegistry::from_catalog(catalog);
        info!("Tool catalog loaded: {} tools", registry.len());

        let system_prompt = system_prompt::build_system_prompt(
            &registry,
            &settings.tool_filter,
            &settings.default_friendly_tools,
            &settings.instructions,
        );

        Ok(Self {
            model,
            server,
            registry,
            system_prompt,
            settings,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop runs at the next iteration boundary once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run `query` to completion. `state` is cleared first, so a state
    /// handed back by an earlier run can be reused.
    pub async fn run(&self, query: &str, mut state: RunState) -> RunReport {
        state.reset();
        let run_id = ulid::Ulid::new().to_string();
        let started_at = Utc::now();
        info!("[Run {}] Starting: {}", run_id, query);

        let outcome = loop {
            if state.iteration_count >= self.settings.max_iterations {
                warn!(
                    "[Run {}] Max iterations ({}) reached",
                    run_id, self.settings.max_iterations
                );
                break RunOutcome::MaxIterationsReached {
                    iterations: state.iteration_count,
                };
            }
            if self.cancel.is_cancelled() {
                info!("[Run {}] Cancelled", run_id);
                break RunOutcome::Cancelled;
            }

            match self.step(query, &mut state).await {
                Ok(Step::Continue) => continue,
                Ok(Step::Finished(answer)) => {
                    info!("[Run {}] Final answer: {}", run_id, answer);
                    break RunOutcome::Completed { answer };
                }
                Err(e) => {
                    error!(
                        "[Run {}] Iteration {} failed: {}",
                        run_id,
                        state.iteration_count + 1,
                        e
                    );
                    break RunOutcome::Failed { error: e };
                }
            }
        };

        RunReport {
            run_id,
            query: query.to_string(),
            outcome,
            state,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// One model turn. `state` is only touched once the tool call returned.
    async fn step(&self, query: &str, state: &mut RunState) -> Result<Step, AgentError> {
        let iteration = state.iteration_count;
        info!("--- Iteration {} ---", iteration + 1);

        let prompt = context::build_prompt(&self.system_prompt, query, &state.progress);
        let completion =
            match tokio::time::timeout(self.settings.model_timeout, self.model.complete(&prompt))
                .await
            {
                Err(_) => return Err(AgentError::Timeout(self.settings.model_timeout)),
                Ok(Err(e)) => return Err(AgentError::Model(format!("{:#}", e))),
                Ok(Ok(completion)) => completion,
            };
        debug!("Model response: {}", completion.text.trim());

        let (tool_name, raw_args) = match parse_directive(&completion.text)? {
            Directive::FinalAnswer { text } => return Ok(Step::Finished(text)),
            Directive::Invoke {
                tool_name,
                raw_args,
            } => (tool_name, raw_args),
        };

        let descriptor = self.registry.lookup(&tool_name)?;
        let arguments =
            coerce_arguments(descriptor, &raw_args, &self.settings.default_friendly_tools)?;
        info!("Tool: {}({})", tool_name, serde_json::Value::Object(arguments.clone()));

        let response = self
            .server
            .call_tool(&tool_name, arguments.clone())
            .await
            .map_err(|e| AgentError::ToolInvocation {
                tool: tool_name.clone(),
                message: e.to_string(),
            })?;

        let summary = response.summary();
        if response.is_error {
            warn!("Tool {} reported an error: {}", tool_name, summary);
        } else {
            info!("Tool result: {} chars", summary.chars().count());
        }

        state.progress.push(ProgressEntry {
            iteration_index: iteration,
            tool_name,
            arguments,
            result_summary: summary,
            success: !response.is_error,
            recorded_at: Utc::now(),
        });
        state.last_result = Some(response);
        state.iteration_count += 1;
        Ok(Step::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mail::MailMessage;
    use crate::tools::{LocalMailbox, LocalToolServer, ToolInvokeError};
    use crate::types::{Arguments, Completion, ToolDescriptor, ToolResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every prompt it was given.
    struct ScriptedModel {
        responses: Mutex<VecDeque<anyhow::Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|r| Ok(r.to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::from([Err(anyhow::anyhow!(message.to_string()))])),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> anyhow::Result<Completion> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("FINAL_ANSWER: script exhausted".into()));
            next.map(|text| Completion {
                text,
                ..Completion::default()
            })
        }
    }

    /// Always asks for another tool call.
    struct AdversarialModel;

    #[async_trait]
    impl LanguageModel for AdversarialModel {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<Completion> {
            Ok(Completion {
                text: "Sure!\nFUNCTION_CALL: add|1|1\nFINAL_ANSWER: never".into(),
                ..Completion::default()
            })
        }
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<Completion> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Completion::default())
        }
    }

    /// Wraps the builtin server and records the calls it receives.
    struct RecordingServer {
        inner: LocalToolServer,
        calls: Mutex<Vec<(String, Arguments)>>,
        broken: bool,
    }

    impl RecordingServer {
        fn new() -> Arc<Self> {
            Self::build(false)
        }

        fn broken() -> Arc<Self> {
            Self::build(true)
        }

        fn build(broken: bool) -> Arc<Self> {
            let inbox = (1..=3)
                .map(|i| MailMessage {
                    id: format!("m{i}"),
                    from: "Alice <alice@example.com>".into(),
                    to: "me@localhost".into(),
                    subject: format!("Subject {i}"),
                    date: "Mon, 1 Jan 2024".into(),
                    snippet: String::new(),
                    body: String::new(),
                    unread: true,
                })
                .collect();
            Arc::new(Self {
                inner: LocalToolServer::new(Arc::new(LocalMailbox::in_memory(
                    "me@localhost",
                    inbox,
                ))),
                calls: Mutex::new(Vec::new()),
                broken,
            })
        }

        fn calls(&self) -> Vec<(String, Arguments)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolServer for RecordingServer {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
            self.inner.list_tools().await
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Arguments,
        ) -> Result<ToolResponse, ToolInvokeError> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments.clone()));
            if self.broken {
                return Err(ToolInvokeError::Terminated);
            }
            self.inner.call_tool(name, arguments).await
        }
    }

    async fn orchestrator(
        model: Arc<dyn LanguageModel>,
        server: Arc<dyn ToolServer>,
    ) -> Orchestrator {
        Orchestrator::new(model, server, LoopSettings::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn bare_default_friendly_call_sends_empty_arguments() {
        let model = ScriptedModel::new(&[
            "FUNCTION_CALL: show_unread_emails",
            "FINAL_ANSWER: [You have 3 unread emails]",
        ]);
        let server = RecordingServer::new();
        let report = orchestrator(model.clone(), server.clone())
            .await
            .run("Check my inbox", RunState::new())
            .await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Completed { ref answer } if answer == "[You have 3 unread emails]"
        ));
        assert_eq!(server.calls(), [("show_unread_emails".to_string(), Arguments::new())]);
        assert_eq!(report.state.iteration_count, 1);
        assert_eq!(report.state.progress.len(), 1);
        assert!(report.state.progress[0].success);
        assert!(report.state.progress[0]
            .result_summary
            .starts_with("📬 Found 3 unread emails"));
    }

    #[tokio::test]
    async fn trailing_separator_is_an_omitted_parameter() {
        let model = ScriptedModel::new(&["FUNCTION_CALL: show_unread_emails|", "FINAL_ANSWER: ok"]);
        let server = RecordingServer::new();
        orchestrator(model, server.clone())
            .await
            .run("q", RunState::new())
            .await;
        assert_eq!(server.calls()[0].1, Arguments::new());
    }

    #[tokio::test]
    async fn explicit_argument_is_coerced() {
        let model = ScriptedModel::new(&["FUNCTION_CALL: show_unread_emails|10", "FINAL_ANSWER: ok"]);
        let server = RecordingServer::new();
        orchestrator(model, server.clone())
            .await
            .run("q", RunState::new())
            .await;
        assert_eq!(server.calls()[0].1["max_emails"], serde_json::json!(10));
    }

    #[tokio::test]
    async fn unparseable_response_is_a_protocol_failure() {
        let model = ScriptedModel::new(&["FUNCTION_CALL: add|2|3", "I think the answer is 5."]);
        let server = RecordingServer::new();
        let report = orchestrator(model, server)
            .await
            .run("add 2 and 3", RunState::new())
            .await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Failed { error: AgentError::Protocol { .. } }
        ));
        // Only the successful first step is logged.
        assert_eq!(report.state.progress.len(), 1);
        assert_eq!(report.state.iteration_count, 1);
    }

    #[tokio::test]
    async fn five_calls_hit_the_cap() {
        let model = ScriptedModel::new(&["FUNCTION_CALL: add|1|2"; 5]);
        let server = RecordingServer::new();
        let report = orchestrator(model.clone(), server.clone())
            .await
            .run("q", RunState::new())
            .await;

        assert!(matches!(
            report.outcome,
            RunOutcome::MaxIterationsReached { iterations: 5 }
        ));
        assert_eq!(report.outcome.kind(), "max_iterations");
        assert_eq!(server.calls().len(), 5);
        assert_eq!(model.prompts().len(), 5);
    }

    #[tokio::test]
    async fn adversarial_model_is_bounded() {
        let server = RecordingServer::new();
        let settings = LoopSettings {
            max_iterations: 3,
            ..LoopSettings::default()
        };
        let report = Orchestrator::new(Arc::new(AdversarialModel), server.clone(), settings)
            .await
            .unwrap()
            .run("q", RunState::new())
            .await;
        assert!(matches!(
            report.outcome,
            RunOutcome::MaxIterationsReached { iterations: 3 }
        ));
        assert_eq!(server.calls().len(), 3);
    }

    #[tokio::test]
    async fn progress_is_fed_back_into_the_prompt() {
        let model = ScriptedModel::new(&["FUNCTION_CALL: add|2|3", "FINAL_ANSWER: [5]"]);
        let report = orchestrator(model.clone(), RecordingServer::new())
            .await
            .run("add 2 and 3", RunState::new())
            .await;
        assert!(matches!(report.outcome, RunOutcome::Completed { .. }));

        let prompts = model.prompts();
        assert!(!prompts[0].contains("\n\nProgress so far:\n"));
        assert!(!prompts[0].contains("Step 1 "));
        assert!(prompts[1].contains(
            "Step 1 completed: add was called successfully with {\"a\":2,\"b\":3}. Result: 5"
        ));
    }

    #[tokio::test]
    async fn tool_error_result_is_logged_and_loop_continues() {
        let model = ScriptedModel::new(&["FUNCTION_CALL: divide|1|0", "FINAL_ANSWER: cannot divide"]);
        let report = orchestrator(model.clone(), RecordingServer::new())
            .await
            .run("q", RunState::new())
            .await;
        assert!(matches!(report.outcome, RunOutcome::Completed { .. }));
        assert!(!report.state.progress[0].success);
        assert!(report.state.last_result.as_ref().unwrap().is_error);
        assert!(model.prompts()[1].contains("Step 1 failed: divide"));
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_arguments_fail() {
        for (response, kind) in [
            ("FUNCTION_CALL: paint|1", "unknown_tool"),
            ("FUNCTION_CALL: add|1", "missing_argument"),
            ("FUNCTION_CALL: add|one|2", "type_coercion"),
        ] {
            let server = RecordingServer::new();
            let report = orchestrator(ScriptedModel::new(&[response]), server.clone())
                .await
                .run("q", RunState::new())
                .await;
            match report.outcome {
                RunOutcome::Failed { error } => assert_eq!(error.kind(), kind),
                other => panic!("expected failure for {response}, got {other:?}"),
            }
            assert!(server.calls().is_empty());
            assert!(report.state.progress.is_empty());
        }
    }

    #[tokio::test]
    async fn transport_failure_is_a_tool_invocation_error() {
        let report = orchestrator(ScriptedModel::new(&["FUNCTION_CALL: add|1|2"]), RecordingServer::broken())
            .await
            .run("q", RunState::new())
            .await;
        assert!(matches!(
            report.outcome,
            RunOutcome::Failed { error: AgentError::ToolInvocation { .. } }
        ));
        assert_eq!(report.state.iteration_count, 0);
    }

    #[tokio::test]
    async fn model_errors_and_timeouts_stop_the_run() {
        let report = orchestrator(ScriptedModel::failing("503"), RecordingServer::new())
            .await
            .run("q", RunState::new())
            .await;
        assert!(matches!(
            report.outcome,
            RunOutcome::Failed { error: AgentError::Model(ref m) } if m.contains("503")
        ));

        let settings = LoopSettings {
            model_timeout: Duration::from_millis(20),
            ..LoopSettings::default()
        };
        let report = Orchestrator::new(Arc::new(SlowModel), RecordingServer::new(), settings)
            .await
            .unwrap()
            .run("q", RunState::new())
            .await;
        assert!(matches!(
            report.outcome,
            RunOutcome::Failed { error: AgentError::Timeout(_) }
        ));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_the_model_is_called() {
        let token = CancellationToken::new();
        token.cancel();
        let model = ScriptedModel::new(&["FINAL_ANSWER: too late"]);
        let report = orchestrator(model.clone(), RecordingServer::new())
            .await
            .with_cancellation(token)
            .run("q", RunState::new())
            .await;
        assert!(matches!(report.outcome, RunOutcome::Cancelled));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn runs_do_not_share_state() {
        let model = ScriptedModel::new(&[
            "FUNCTION_CALL: add|1|2",
            "FINAL_ANSWER: 3",
            "FINAL_ANSWER: fresh",
        ]);
        let orch = orchestrator(model, RecordingServer::new()).await;
        let first = orch.run("q1", RunState::new()).await;
        let second = orch.run("q2", RunState::new()).await;
        assert_eq!(first.state.progress.len(), 1);
        assert!(second.state.progress.is_empty());
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn reused_state_is_cleared_before_the_next_run() {
        let mut script = vec!["FUNCTION_CALL: add|1|2"; 5];
        script.push("FINAL_ANSWER: second query answered");
        let model = ScriptedModel::new(&script);
        let orch = orchestrator(model.clone(), RecordingServer::new()).await;

        let first = orch.run("count up", RunState::new()).await;
        assert!(matches!(
            first.outcome,
            RunOutcome::MaxIterationsReached { iterations: 5 }
        ));
        assert_eq!(first.state.progress.len(), 5);

        let second = orch.run("something else", first.state).await;
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 6);
        assert!(!prompts[5].contains("Step 1 "));
        assert!(matches!(second.outcome, RunOutcome::Completed { .. }));
        assert_eq!(second.state.iteration_count, 0);
        assert!(second.state.progress.is_empty());
        assert!(second.state.last_result.is_none());
    }
}

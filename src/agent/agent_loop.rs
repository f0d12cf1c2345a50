//! Main agent loop.
//!
//! Each operator turn is an independent run: the model sees the system
//! prompt and that one input, calls tools as often as it needs, and the
//! first plain-text reply is the answer.

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::error::Error;
use crate::llm::{ChatMessage, LlmProvider, Reasoning, ReasoningContext, RespondResult, TokenUsage};
use crate::tools::registry::ToolRegistry;

/// Collapse a tool output string into a single-line preview for display.
pub fn truncate_for_preview(output: &str, max_chars: usize) -> String {
    let collapsed: String = output
        .chars()
        .take(max_chars + 50)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    // char_indices gives us byte offsets at char boundaries, so the slice is always valid UTF-8.
    if collapsed.chars().count() > max_chars {
        let byte_offset = collapsed
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(collapsed.len());
        format!("{}...", &collapsed[..byte_offset])
    } else {
        collapsed
    }
}

/// Core dependencies for the agent.
pub struct AgentDeps {
    pub llm: Arc<dyn LlmProvider>,
    pub tools: Arc<ToolRegistry>,
}

/// What one operator turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    /// Tool names in the order they ran.
    pub tools_called: Vec<String>,
    pub usage: TokenUsage,
}

/// The assistant: a model plus the tools it may call.
pub struct Agent {
    pub(crate) config: AgentConfig,
    pub(crate) deps: AgentDeps,
    reasoning: Reasoning,
}

impl Agent {
    /// Create a new agent.
    pub fn new(config: AgentConfig, deps: AgentDeps) -> Self {
        let reasoning =
            Reasoning::new(Arc::clone(&deps.llm)).with_system_prompt(config.system_prompt.clone());
        Self {
            config,
            deps,
            reasoning,
        }
    }

    pub(crate) fn tools(&self) -> &Arc<ToolRegistry> {
        &self.deps.tools
    }

    /// Run one operator turn to its final answer.
    pub async fn run_turn(&self, input: &str) -> Result<TurnOutcome, Error> {
        let tool_defs = self.tools().tool_definitions().await;
        let mut context = ReasoningContext::new()
            .with_messages(vec![ChatMessage::user(input)])
            .with_tools(tool_defs);

        let mut usage = TokenUsage::default();
        let mut tools_called = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            let output = self.reasoning.respond_with_tools(&context).await?;
            usage.add(output.usage);

            match output.result {
                RespondResult::Text(answer) => {
                    tracing::debug!(
                        agent = %self.config.name,
                        iteration,
                        tokens = usage.total(),
                        tools = tools_called.len(),
                        "Turn complete"
                    );
                    return Ok(TurnOutcome {
                        answer,
                        tools_called,
                        usage,
                    });
                }
                RespondResult::ToolCalls {
                    tool_calls,
                    content,
                } => {
                    context
                        .messages
                        .push(ChatMessage::assistant_with_tool_calls(content, tool_calls.clone()));

                    for call in tool_calls {
                        tracing::info!(tool = %call.name, iteration, "Running tool");
                        let result = match self
                            .tools()
                            .execute(&call.name, call.arguments.clone())
                            .await
                        {
                            Ok(output) => output.as_text(),
                            Err(e) => {
                                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                                format!("Error: {e}")
                            }
                        };
                        tracing::debug!(
                            tool = %call.name,
                            preview = %truncate_for_preview(&result, 120),
                            "Tool result"
                        );
                        tools_called.push(call.name.clone());
                        context
                            .messages
                            .push(ChatMessage::tool_result(call.id, call.name, result));
                    }
                }
            }
        }

        tracing::warn!(
            agent = %self.config.name,
            max_iterations = self.config.max_iterations,
            "Iteration limit reached"
        );
        Err(Error::IterationLimit(self.config.max_iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{
        CompletionRequest, CompletionResponse, FinishReason, Role, ToolCall,
        ToolCompletionRequest, ToolCompletionResponse,
    };
    use crate::tools::tool::{Tool, ToolError, ToolOutput};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_truncate_short_input() {
        assert_eq!(truncate_for_preview("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_empty_input() {
        assert_eq!(truncate_for_preview("", 10), "");
    }

    #[test]
    fn test_truncate_over_limit() {
        let result = truncate_for_preview("hello world, this is long", 10);
        assert_eq!(result, "hello worl...");
    }

    #[test]
    fn test_truncate_collapses_newlines() {
        assert_eq!(
            truncate_for_preview("From: a\nSubject: b\n\nBody: c", 100),
            "From: a Subject: b Body: c"
        );
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_for_preview("caf\u{e9}s caf\u{e9}s", 4), "caf\u{e9}...");
    }

    /// Replays scripted replies and records every request's messages.
    struct ScriptedModel {
        replies: Mutex<VecDeque<ToolCompletionResponse>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<ToolCompletionResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    fn text(content: &str) -> ToolCompletionResponse {
        ToolCompletionResponse {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: FinishReason::Stop,
            response_id: None,
        }
    }

    fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCompletionResponse {
        ToolCompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            }],
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: FinishReason::ToolUse,
            response_id: None,
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "scripted".into(),
                reason: "plain completion not scripted".into(),
            })
        }

        async fn complete_with_tools(
            &self,
            request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request.messages);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::InvalidResponse {
                    provider: "scripted".into(),
                    reason: "script exhausted".into(),
                })
        }
    }

    struct CountTool;

    #[async_trait]
    impl Tool for CountTool {
        fn name(&self) -> &str {
            "retrieve_emails"
        }
        fn description(&self) -> &str {
            "test double"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
            let n = params.get("max_emails").and_then(|v| v.as_i64()).unwrap_or(10);
            Ok(ToolOutput::text(format!("{n} emails"), Duration::from_millis(1)))
        }
    }

    fn agent(model: Arc<ScriptedModel>, max_iterations: usize) -> Agent {
        let tools = Arc::new(ToolRegistry::new());
        tools.register_sync(Arc::new(CountTool));
        Agent::new(
            AgentConfig {
                max_iterations,
                ..AgentConfig::default()
            },
            AgentDeps { llm: model, tools },
        )
    }

    #[tokio::test]
    async fn direct_answer() {
        let model = ScriptedModel::new(vec![text("Hello!")]);
        let outcome = agent(model.clone(), 10).run_turn("hi").await.unwrap();
        assert_eq!(outcome.answer, "Hello!");
        assert!(outcome.tools_called.is_empty());
        assert_eq!(outcome.usage.total(), 15);

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].role, Role::System);
        assert_eq!(requests[0][1].content, "hi");
    }

    #[tokio::test]
    async fn tool_result_fed_back() {
        let model = ScriptedModel::new(vec![
            call("c1", "retrieve_emails", serde_json::json!({"max_emails": 3})),
            text("You have 3 emails."),
        ]);
        let outcome = agent(model.clone(), 10).run_turn("check mail").await.unwrap();
        assert_eq!(outcome.answer, "You have 3 emails.");
        assert_eq!(outcome.tools_called, vec!["retrieve_emails"]);

        let requests = model.requests.lock().unwrap();
        let second = &requests[1];
        let assistant = &second[2];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.tool_calls.len(), 1);
        let result = &second[3];
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(result.content, "3 emails");
    }

    #[tokio::test]
    async fn unknown_tool_reported_to_model() {
        let model = ScriptedModel::new(vec![
            call("c1", "delete_inbox", serde_json::json!({})),
            text("I can't do that."),
        ]);
        let outcome = agent(model.clone(), 10).run_turn("delete all").await.unwrap();
        assert_eq!(outcome.answer, "I can't do that.");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[1][3].content, "Error: Tool delete_inbox not found");
    }

    #[tokio::test]
    async fn iteration_limit() {
        let model = ScriptedModel::new(vec![
            call("c1", "retrieve_emails", serde_json::json!({})),
            call("c2", "retrieve_emails", serde_json::json!({})),
            text("never reached"),
        ]);
        let err = agent(model, 2).run_turn("loop").await.unwrap_err();
        assert!(matches!(err, Error::IterationLimit(2)));
    }

    #[tokio::test]
    async fn turns_do_not_share_history() {
        let model = ScriptedModel::new(vec![text("one"), text("two")]);
        let agent = agent(model.clone(), 10);
        agent.run_turn("first").await.unwrap();
        agent.run_turn("second").await.unwrap();

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[1].len(), 2);
        assert_eq!(requests[1][1].content, "second");
    }

    #[tokio::test]
    async fn model_error_propagates() {
        let model = ScriptedModel::new(vec![]);
        let err = agent(model, 10).run_turn("hi").await.unwrap_err();
        assert!(matches!(err, Error::Llm(LlmError::InvalidResponse { .. })));
    }
}

use std::time::Duration;

use tokio::time::timeout;

use crate::agent::prompt::{FINALIZE_INSTRUCTION, build_system_prompt};
use crate::agent::tools::ToolRegistry;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider,
    TokenUsage, ToolDescriptor,
};
use crate::notify::Notifier;
use crate::profile::ProfileContext;
use crate::trace::SessionTrace;

pub const ENDPOINT_ERROR_REPLY: &str = "Sorry, there was an error processing your request.";
pub const ROUND_LIMIT_REPLY: &str =
    "Sorry, I couldn't complete that request. Please try asking again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentConfig {
    pub max_rounds: usize,
    pub round_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            round_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    /// True when `text` is a fallback rather than the model's own answer.
    pub degraded: bool,
    pub rounds: usize,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentProgressEvent {
    RoundStarted {
        round: usize,
    },
    ModelResponse {
        round: usize,
        tool_calls: usize,
        has_text: bool,
    },
    ToolRequest {
        round: usize,
        id: String,
        name: String,
        arguments: String,
    },
    ToolResult {
        round: usize,
        id: String,
        name: String,
        content: String,
    },
}

/// Answers user turns as the configured persona. Holds only read-only state,
/// so one engine can serve concurrent turns.
pub struct ChatEngine<P, N> {
    provider: P,
    notifier: N,
    registry: ToolRegistry,
    context: ProfileContext,
    persona: String,
    config: AgentConfig,
    trace: Option<SessionTrace>,
}

impl<P: LlmProvider + Sync, N: Notifier + Sync> ChatEngine<P, N> {
    pub fn new(
        provider: P,
        notifier: N,
        context: ProfileContext,
        persona: impl Into<String>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            notifier,
            registry: ToolRegistry::standard(),
            context,
            persona: persona.into(),
            config,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn system_prompt(&self) -> String {
        build_system_prompt(&self.persona, &self.context)
    }

    /// Runs one user turn against `history` and returns the text to show.
    /// Never fails: endpoint and tool errors are folded into the reply.
    pub async fn chat(&self, message: &str, history: &[ChatMessage]) -> String {
        self.chat_with_events(message, history, &mut |_| {})
            .await
            .text
    }

    pub async fn chat_with_events<F: FnMut(AgentProgressEvent) + Send>(
        &self,
        message: &str,
        history: &[ChatMessage],
        on_event: &mut F,
    ) -> ChatReply {
        if let Some(trace) = &self.trace {
            trace.log_user_input(message);
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(message));

        let tools = self.registry.descriptors();
        let mut usage = TokenUsage::default();

        for round in 1..=self.config.max_rounds {
            on_event(AgentProgressEvent::RoundStarted { round });

            let response = match self.request(messages.clone(), tools.clone()).await {
                Ok(response) => response,
                Err(err) => {
                    self.log_error(&format!("round {round}: {err}"));
                    return self.finish(ChatReply {
                        text: ENDPOINT_ERROR_REPLY.to_string(),
                        degraded: true,
                        rounds: round,
                        usage,
                    });
                }
            };

            if let Some(round_usage) = response.usage {
                usage.add(round_usage);
            }
            on_event(AgentProgressEvent::ModelResponse {
                round,
                tool_calls: response.tool_calls.len(),
                has_text: response
                    .content
                    .as_deref()
                    .is_some_and(|text| !text.trim().is_empty()),
            });

            // A tool_calls finish with nothing to call is treated as final.
            if response.finish_reason != FinishReason::ToolCalls || response.tool_calls.is_empty()
            {
                return self.finish(ChatReply {
                    text: response.content.unwrap_or_default(),
                    degraded: false,
                    rounds: round,
                    usage,
                });
            }

            let invocations = response.tool_calls.clone();
            messages.push(response.into_assistant_message());

            for invocation in &invocations {
                on_event(AgentProgressEvent::ToolRequest {
                    round,
                    id: invocation.id.clone(),
                    name: invocation.name.clone(),
                    arguments: invocation.arguments.clone(),
                });
                if let Some(trace) = &self.trace {
                    trace.log_tool_call(&invocation.id, &invocation.name, &invocation.arguments);
                }

                let result = self.registry.dispatch(&self.notifier, invocation).await;

                if let Some(trace) = &self.trace {
                    trace.log_tool_result(&result.tool_call_id, &result.content);
                }
                on_event(AgentProgressEvent::ToolResult {
                    round,
                    id: invocation.id.clone(),
                    name: invocation.name.clone(),
                    content: result.content.clone(),
                });
                messages.push(result.into_message());
            }
        }

        let rounds = self.config.max_rounds + 1;
        on_event(AgentProgressEvent::RoundStarted { round: rounds });
        let text = match self.finalize_without_tools(messages).await {
            Ok(response) => {
                if let Some(round_usage) = response.usage {
                    usage.add(round_usage);
                }
                response
                    .content
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| ROUND_LIMIT_REPLY.to_string())
            }
            Err(err) => {
                self.log_error(&format!("final round without tools: {err}"));
                ROUND_LIMIT_REPLY.to_string()
            }
        };

        self.finish(ChatReply {
            text,
            degraded: true,
            rounds,
            usage,
        })
    }

    async fn request(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDescriptor>,
    ) -> Result<CompletionResponse, LlmError> {
        let budget = Duration::from_millis(self.config.round_timeout_ms);
        match timeout(
            budget,
            self.provider.complete(CompletionRequest { messages, tools }),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Transport(format!(
                "no response within {} ms",
                self.config.round_timeout_ms
            ))),
        }
    }

    async fn finalize_without_tools(
        &self,
        mut messages: Vec<ChatMessage>,
    ) -> Result<CompletionResponse, LlmError> {
        if let Some(first) = messages.first_mut() {
            *first = ChatMessage::system(format!(
                "{}\n\n{FINALIZE_INSTRUCTION}",
                self.system_prompt()
            ));
        }
        self.request(messages, Vec::new()).await
    }

    fn finish(&self, reply: ChatReply) -> ChatReply {
        if let Some(trace) = &self.trace {
            trace.log_assistant_output(&reply.text);
        }
        reply
    }

    fn log_error(&self, message: &str) {
        if let Some(trace) = &self.trace {
            trace.log_assistant_error(message);
        }
    }
}

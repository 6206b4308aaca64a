use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    agents::{elapsed_secs, seed_messages, AgentKind, AgentResult, AgentSettings, BenchAgent},
    functions::{FunctionRegistry, ToolChoice},
    tasks::Task,
    types::{ChatMessage, CompletionRequest, TokenUsage},
    LLMError, LLMProvider,
};

/// Reason-and-act loop: the model may call tools until it answers in plain
/// text or the step limit runs out.
pub struct ReactAgent {
    provider: Arc<dyn LLMProvider>,
    model: String,
    tools: Arc<FunctionRegistry>,
    max_steps: usize,
}

impl ReactAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: AgentSettings) -> Self {
        Self {
            provider,
            model: settings.model,
            tools: settings.tools.unwrap_or_default(),
            max_steps: settings.max_steps.max(1),
        }
    }

    /// Drives the conversation in `messages` to a final answer, adding the
    /// usage of every model call to `usage`.
    pub(crate) async fn run_loop(
        &self,
        mut messages: Vec<ChatMessage>,
        usage: &mut TokenUsage,
    ) -> Result<String, LLMError> {
        let mut steps = 0usize;

        loop {
            steps += 1;
            if steps > self.max_steps {
                return Err(LLMError::StepLimitExceeded(self.max_steps));
            }

            let mut request = CompletionRequest::new(self.model.clone(), messages.clone());
            if !self.tools.is_empty() {
                request = request
                    .with_function_registry(self.tools.as_ref())
                    .with_tool_choice(ToolChoice::Auto);
            }

            let response = self.provider.complete(request).await?;
            if let Some(step_usage) = response.usage {
                *usage += step_usage;
            }

            let mut reply = response.message;
            if reply.tool_calls.is_empty() {
                return Ok(reply.text().unwrap_or_default().to_string());
            }

            for (index, call) in reply.tool_calls.iter_mut().enumerate() {
                if call.id.is_none() {
                    call.id = Some(format!("call_{steps}_{index}"));
                }
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in calls {
                debug!(step = steps, tool = %call.function.name, "invoking tool");
                let output = match self.tools.invoke(&call.function).await {
                    Ok(value) => value,
                    Err(error) => {
                        warn!(tool = %call.function.name, error = %error, "tool call failed");
                        json!({ "error": error.to_string() })
                    }
                };
                let id = call.id.unwrap_or_default();
                messages.push(ChatMessage::tool(id, output.to_string()));
            }
        }
    }
}

#[async_trait]
impl BenchAgent for ReactAgent {
    async fn run(&self, task: &Task, system_prompt: Option<&str>) -> Result<AgentResult, LLMError> {
        let messages = seed_messages(system_prompt, &task.prompt);
        let mut usage = TokenUsage::default();

        let started = Instant::now();
        let response = self.run_loop(messages, &mut usage).await?;
        let time_taken = elapsed_secs(started);

        Ok(AgentResult {
            response,
            token_usage: usage,
            time_taken,
        })
    }

    fn name(&self) -> &str {
        AgentKind::React.as_str()
    }
}

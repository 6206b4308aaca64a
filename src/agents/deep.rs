use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    agents::{elapsed_secs, seed_messages, AgentKind, AgentResult, AgentSettings, BenchAgent, ReactAgent},
    tasks::Task,
    types::{ChatMessage, CompletionRequest, TokenUsage},
    LLMError, LLMProvider,
};

const PLANNER_PROMPT: &str = "Break the user's request into a short numbered plan of concrete steps. \
Reply with the plan only.";

/// Plans before acting: one call drafts a numbered plan, then the tool loop
/// executes it with the plan in its instructions.
pub struct DeepAgent {
    provider: Arc<dyn LLMProvider>,
    model: String,
    executor: ReactAgent,
}

impl DeepAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: AgentSettings) -> Self {
        let model = settings.model.clone();
        Self {
            executor: ReactAgent::new(provider.clone(), settings),
            provider,
            model,
        }
    }

    async fn plan(&self, prompt: &str, usage: &mut TokenUsage) -> Result<String, LLMError> {
        let request = CompletionRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(PLANNER_PROMPT), ChatMessage::user(prompt)],
        );
        let response = self.provider.complete(request).await?;
        if let Some(step_usage) = response.usage {
            *usage += step_usage;
        }
        Ok(response.message.text().unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl BenchAgent for DeepAgent {
    async fn run(&self, task: &Task, system_prompt: Option<&str>) -> Result<AgentResult, LLMError> {
        let mut usage = TokenUsage::default();
        let started = Instant::now();

        let plan = self.plan(&task.prompt, &mut usage).await?;
        debug!(task_id = %task.id, plan = %plan, "drafted plan");

        let instructions = match system_prompt.filter(|s| !s.trim().is_empty()) {
            Some(system) => format!("{system}\n\nFollow this plan:\n{plan}"),
            None => format!("Follow this plan:\n{plan}"),
        };
        let messages = seed_messages(Some(&instructions), &task.prompt);
        let response = self.executor.run_loop(messages, &mut usage).await?;

        Ok(AgentResult {
            response,
            token_usage: usage,
            time_taken: elapsed_secs(started),
        })
    }

    fn name(&self) -> &str {
        AgentKind::Deep.as_str()
    }
}

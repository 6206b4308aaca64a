//! The agent port: the one capability the run orchestrator needs from a system
//! under test, plus the adapters this crate ships.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    functions::FunctionRegistry,
    tasks::Task,
    types::{ChatMessage, CompletionRequest, TokenUsage},
    LLMError, LLMProvider,
};

pub mod deep;
pub mod react;

pub use deep::DeepAgent;
pub use react::ReactAgent;

pub const DEFAULT_MAX_STEPS: usize = 25;

/// What one agent invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub response: String,
    pub token_usage: TokenUsage,
    /// Wall-clock seconds spent inside the agent, rounded to milliseconds.
    pub time_taken: f64,
}

#[async_trait]
pub trait BenchAgent: Send + Sync {
    async fn run(&self, task: &Task, system_prompt: Option<&str>) -> Result<AgentResult, LLMError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Single completion, no tools.
    Direct,
    /// Tool-calling loop.
    React,
    /// Plans first, then runs the tool-calling loop.
    Deep,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Direct => "direct",
            AgentKind::React => "react",
            AgentKind::Deep => "deep",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct AgentSettings {
    pub model: String,
    pub tools: Option<Arc<FunctionRegistry>>,
    pub max_steps: usize,
}

impl AgentSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            tools: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_tools(mut self, tools: Arc<FunctionRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

pub fn build_agent(
    kind: AgentKind,
    provider: Arc<dyn LLMProvider>,
    settings: AgentSettings,
) -> Arc<dyn BenchAgent> {
    match kind {
        AgentKind::Direct => Arc::new(DirectAgent::new(provider, settings.model)),
        AgentKind::React => Arc::new(ReactAgent::new(provider, settings)),
        AgentKind::Deep => Arc::new(DeepAgent::new(provider, settings)),
    }
}

pub struct DirectAgent {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl DirectAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl BenchAgent for DirectAgent {
    async fn run(&self, task: &Task, system_prompt: Option<&str>) -> Result<AgentResult, LLMError> {
        let messages = seed_messages(system_prompt, &task.prompt);

        let started = Instant::now();
        let response = self
            .provider
            .complete(CompletionRequest::new(self.model.clone(), messages))
            .await?;
        let time_taken = elapsed_secs(started);

        Ok(AgentResult {
            response: response.message.text().unwrap_or_default().to_string(),
            token_usage: response.usage.unwrap_or_default(),
            time_taken,
        })
    }

    fn name(&self) -> &str {
        AgentKind::Direct.as_str()
    }
}

pub(crate) fn seed_messages(system_prompt: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

pub(crate) fn elapsed_secs(started: Instant) -> f64 {
    round_millis(started.elapsed().as_secs_f64())
}

/// Seconds at millisecond precision, rounded like the summary averages.
pub(crate) fn round_millis(seconds: f64) -> f64 {
    crate::eval::aggregate::round_to(seconds, 3)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::providers::scripted::ScriptedProvider;
    use crate::tasks::create_task;
    use crate::types::MessageRole;

    #[tokio::test]
    async fn direct_agent_reports_response_and_usage() {
        let provider = Arc::new(
            ScriptedProvider::new().with_usage_reply("hello world", TokenUsage::reported(7, 3, 0)),
        );
        let agent = build_agent(AgentKind::Direct, provider.clone(), AgentSettings::new("m"));
        let task = create_task("demo", "Say hello", "hello", ["greets"], None);

        let result = agent.run(&task, Some("Be brief.")).await.expect("run");

        assert_eq!(result.response, "hello world");
        assert_eq!(result.token_usage, TokenUsage::new(7, 3));
        assert!(result.time_taken >= 0.0);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "m");
        assert_eq!(requests[0].messages[0].role, MessageRole::System);
        assert_eq!(requests[0].messages[1].text(), Some("Say hello"));
    }

    #[tokio::test]
    async fn blank_system_prompt_is_omitted() {
        let provider = Arc::new(ScriptedProvider::new().with_reply("ok"));
        let agent = DirectAgent::new(provider.clone(), "m");
        let task = create_task("demo", "p", "g", Vec::<String>::new(), None);

        agent.run(&task, Some("  ")).await.expect("run");

        assert_eq!(provider.requests()[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new().with_failure("rate limited"));
        let agent = DirectAgent::new(provider, "m");
        let task = create_task("demo", "p", "g", Vec::<String>::new(), None);

        let error = agent.run(&task, None).await.unwrap_err();
        assert!(matches!(error, LLMError::Provider(message) if message == "rate limited"));
    }

    #[test]
    fn elapsed_time_rounds_ties_to_even() {
        assert_eq!(round_millis(0.0625), 0.062);
        assert_eq!(round_millis(1.2344), 1.234);
        assert_eq!(round_millis(2.0), 2.0);
    }

    #[test]
    fn agent_kind_names_are_stable() {
        use clap::ValueEnum;

        let names: Vec<&str> = AgentKind::value_variants().iter().map(AgentKind::as_str).collect();
        assert_eq!(names, vec!["direct", "react", "deep"]);
        assert_eq!(
            AgentKind::from_str("react", false).expect("parse"),
            AgentKind::React
        );
    }
}

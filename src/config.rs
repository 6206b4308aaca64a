//! Model selection from the environment.
//!
//! Models are written as `provider:model` (`openrouter:anthropic/claude-3.5-sonnet`);
//! a bare model name means OpenAI.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    providers::{openai::OpenAI, LLMProvider},
    BenchError,
};

pub const DEFAULT_MODEL: &str = "openai:gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    OpenRouter,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::OpenRouter => "openrouter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: ProviderKind,
    pub model: String,
}

impl ModelRef {
    /// Builds the provider client; API keys come from the environment.
    pub fn provider(&self) -> Result<Arc<dyn LLMProvider>, BenchError> {
        let provider = match self.provider {
            ProviderKind::OpenAI => OpenAI::from_env()?,
            ProviderKind::OpenRouter => OpenAI::openrouter_from_env()?,
        };
        Ok(Arc::new(provider))
    }
}

impl FromStr for ModelRef {
    type Err = BenchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (provider, model) = match value.split_once(':') {
            Some((prefix, model)) => {
                let provider = match prefix.to_ascii_lowercase().as_str() {
                    "openai" => ProviderKind::OpenAI,
                    "openrouter" => ProviderKind::OpenRouter,
                    other => {
                        return Err(BenchError::Config(format!(
                            "unknown model provider '{other}' in '{value}'"
                        )))
                    }
                };
                (provider, model.trim())
            }
            None => (ProviderKind::OpenAI, value),
        };

        if model.is_empty() {
            return Err(BenchError::Config(format!("missing model name in '{value}'")));
        }

        Ok(Self {
            provider,
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider.as_str(), self.model)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    pub agent_model: ModelRef,
    pub judge_model: ModelRef,
}

impl BenchConfig {
    pub fn from_env() -> Result<Self, BenchError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, BenchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = |key: &str| -> Result<ModelRef, BenchError> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .as_deref()
                .unwrap_or(DEFAULT_MODEL)
                .parse()
        };

        Ok(Self {
            agent_model: model("AGENT_MODEL")?,
            judge_model: model("JUDGE_MODEL")?,
        })
    }
}

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    functions::ToolCall,
    providers::LLMProvider,
    types::{ChatMessage, CompletionRequest, CompletionResponse, TokenUsage},
    LLMError,
};

#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Message {
        message: ChatMessage,
        usage: Option<TokenUsage>,
    },
    Failure(String),
}

/// Replays canned replies in order and records every request it receives.
/// Used to drive agents and the judge without network access.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.push(ScriptedReply::Message {
            message: ChatMessage::assistant(content),
            usage: None,
        });
        self
    }

    pub fn with_usage_reply(self, content: impl Into<String>, usage: TokenUsage) -> Self {
        self.push(ScriptedReply::Message {
            message: ChatMessage::assistant(content),
            usage: Some(usage),
        });
        self
    }

    pub fn with_tool_calls(self, calls: Vec<ToolCall>, usage: Option<TokenUsage>) -> Self {
        self.push(ScriptedReply::Message {
            message: ChatMessage::assistant_tool_calls(calls),
            usage,
        });
        self
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(ScriptedReply::Failure(message.into()));
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(reply);
    }

    pub fn remaining(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match next {
            Some(ScriptedReply::Message { message, usage }) => Ok(CompletionResponse { message, usage }),
            Some(ScriptedReply::Failure(message)) => Err(LLMError::Provider(message)),
            None => Err(LLMError::Provider("no more scripted responses".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

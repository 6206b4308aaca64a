use async_trait::async_trait;

use crate::types::{CompletionRequest, CompletionResponse};
use crate::LLMError;

pub mod openai;
pub mod scripted;

/// A chat-completion backend. Both the agents under test and the judge talk to
/// models through this trait.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError>;

    fn name(&self) -> &'static str;
}

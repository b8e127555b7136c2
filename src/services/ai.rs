use async_trait::async_trait;

use crate::error::{CommandError, CommandResult};

/// Text generation, embedding and semantic search backend.
///
/// The host only forwards calls; model serving lives outside this crate and
/// is plugged in through `Collaborators`.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> CommandResult<String>;

    async fn embed(&self, text: &str) -> CommandResult<Vec<f32>>;

    async fn search(&self, query: &str) -> CommandResult<Vec<serde_json::Value>>;
}

/// Default provider when no backend is configured. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAi;

const NOT_CONFIGURED: &str = "AI provider is not configured";

#[async_trait]
impl AiProvider for DisabledAi {
    async fn generate(&self, _prompt: &str) -> CommandResult<String> {
        Err(CommandError::collaborator(NOT_CONFIGURED))
    }

    async fn embed(&self, _text: &str) -> CommandResult<Vec<f32>> {
        Err(CommandError::collaborator(NOT_CONFIGURED))
    }

    async fn search(&self, _query: &str) -> CommandResult<Vec<serde_json::Value>> {
        Err(CommandError::collaborator(NOT_CONFIGURED))
    }
}
